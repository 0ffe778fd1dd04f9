// kintonesync/src/sync/upsert.rs
use super::outcome::{Action, OperationOutcome};
use crate::config::EntityMapping;
use crate::kintone::{AppCredentials, RecordStore, UpdateKey};
use crate::record::DestinationRecord;

/// Decides between create and update for each row and applies the write.
pub struct UpsertEngine<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> UpsertEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Reconciles one row with Kintone.
    ///
    /// A failed lookup never falls through to a create: the row is skipped
    /// and nothing is written. When several remote records share the key the
    /// row is still updated by key and Kintone decides whether that is valid.
    pub async fn reconcile(
        &self,
        mapping: &EntityMapping,
        business_id: &str,
        record: &DestinationRecord,
    ) -> OperationOutcome {
        let table = mapping.table.as_str();
        let app = AppCredentials {
            app_id: &mapping.app_id,
            api_token: &mapping.api_token,
        };

        let lookup = match self.store.lookup(app, &mapping.key_field, business_id).await {
            Ok(response) => response,
            Err(e) => {
                return OperationOutcome::skipped(
                    table,
                    Some(business_id),
                    None,
                    format!("lookup failed: {} Id={}", e, business_id),
                );
            }
        };

        let existing = match &lookup.body {
            Ok(result) if lookup.is_success() => result,
            _ => {
                return OperationOutcome::skipped(
                    table,
                    Some(business_id),
                    Some(lookup.status),
                    format!("{} Id={}", lookup.error_message(), business_id),
                );
            }
        };

        if existing.records.len() > 1 {
            tracing::warn!(
                "{} Kintone records in app {} match {}={}; updating by key",
                existing.records.len(),
                mapping.app_id,
                mapping.key_field,
                business_id
            );
        }
        if let Some(remote) = existing.first() {
            tracing::debug!(
                "Existing Kintone record for {}={}: {}",
                mapping.key_field,
                business_id,
                remote
            );
        }

        let (action, written) = if existing.found() {
            let key = UpdateKey {
                field: mapping.key_field.clone(),
                value: business_id.to_string(),
            };
            let payload = record.without(&mapping.key_field);
            (Action::Update, self.store.update(app, &key, &payload).await)
        } else {
            (Action::Create, self.store.create(app, record).await)
        };

        match written {
            Ok(response) if response.is_success() => {
                OperationOutcome::written(table, business_id, action, response.status)
            }
            Ok(response) => OperationOutcome::write_failed(
                table,
                business_id,
                action,
                Some(response.status),
                &response.error_message(),
            ),
            Err(e) => {
                OperationOutcome::write_failed(table, business_id, action, None, &e.to_string())
            }
        }
    }
}
