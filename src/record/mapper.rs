// kintonesync/src/record/mapper.rs
use super::{DestinationRecord, SourceRow};
use crate::config::EntityMapping;

/// Builds the Kintone record for one source row.
///
/// Every configured (source column, destination field) pair yields exactly one
/// entry. A column missing from the row is sent as a null value.
pub fn build_record(row: &SourceRow, mapping: &EntityMapping) -> DestinationRecord {
    let mut record = DestinationRecord::new();

    for (column, field) in mapping.field_pairs() {
        let value = mapping.coercions.coerce(column, row.get(column));
        record.insert(field, value);
    }

    record
}
