// kintonesync/src/sync/logic.rs
use std::fmt;

use super::outcome::{Action, OperationOutcome};
use super::upsert::UpsertEngine;
use crate::config::EntityMapping;
use crate::kintone::RecordStore;
use crate::record::{BUSINESS_ID_COLUMN, build_record};
use crate::source::SourceDatabase;

/// Outcomes of a whole run, in the order they were produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl BatchReport {
    /// Logs `outcome` and keeps it.
    fn record(&mut self, outcome: OperationOutcome) {
        let id = outcome.business_id.as_deref().unwrap_or("-");
        if outcome.success {
            tracing::info!(id, action = %outcome.action, "{}", outcome);
        } else {
            tracing::warn!(id, action = %outcome.action, "{}", outcome);
        }
        self.outcomes.push(outcome);
    }

    fn count(&self, action: Action, success: bool) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == action && o.success == success)
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(Action::Create, true)
    }

    pub fn updated(&self) -> usize {
        self.count(Action::Update, true)
    }

    pub fn skipped(&self) -> usize {
        self.count(Action::Skip, false)
    }

    /// Create or update attempts Kintone rejected.
    pub fn failed(&self) -> usize {
        self.count(Action::Create, false) + self.count(Action::Update, false)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} skipped, {} failed",
            self.created(),
            self.updated(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Feeds every entity's rows through the mapper and the upsert engine, one at a time.
pub struct BatchDriver<'a, D, S>
where
    D: SourceDatabase + ?Sized,
    S: RecordStore + ?Sized,
{
    source: &'a D,
    engine: UpsertEngine<'a, S>,
}

impl<'a, D, S> BatchDriver<'a, D, S>
where
    D: SourceDatabase + ?Sized,
    S: RecordStore + ?Sized,
{
    pub fn new(source: &'a D, store: &'a S) -> Self {
        Self {
            source,
            engine: UpsertEngine::new(store),
        }
    }

    /// Processes the entities in order. Failures are recorded per row or per
    /// entity and never stop the remaining work.
    pub async fn run_batch(&self, mappings: &[EntityMapping]) -> BatchReport {
        let mut report = BatchReport::default();
        for mapping in mappings {
            self.run_entity(mapping, &mut report).await;
        }
        report
    }

    async fn run_entity(&self, mapping: &EntityMapping, report: &mut BatchReport) {
        tracing::info!("{}", mapping.query);

        let rows = match self.source.fetch_rows(&mapping.query).await {
            Ok(rows) => rows,
            Err(e) => {
                report.record(OperationOutcome::skipped(
                    &mapping.table,
                    None,
                    None,
                    format!("source query failed: {}", e),
                ));
                return;
            }
        };

        if rows.is_empty() {
            report.record(OperationOutcome::no_records(&mapping.table));
            return;
        }

        tracing::debug!("{} rows to sync for table {}", rows.len(), mapping.table);
        for row in &rows {
            let Some(business_id) = row.business_id() else {
                report.record(OperationOutcome::skipped(
                    &mapping.table,
                    None,
                    None,
                    format!("row has no {} value", BUSINESS_ID_COLUMN),
                ));
                continue;
            };
            let record = build_record(row, mapping);
            let outcome = self.engine.reconcile(mapping, business_id, &record).await;
            report.record(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_mapping;
    use crate::record::SourceRow;
    use crate::sync::testing::{Call, FakeSource, FakeStore};

    fn customer(id: &str, name: &str) -> SourceRow {
        SourceRow::new()
            .with("Id", Some(id))
            .with("LiveDate", Some("2024-02-29"))
            .with("IsClec", Some("no"))
            .with("Name", Some(name))
    }

    fn orders_mapping() -> EntityMapping {
        let mut mapping = sample_mapping();
        mapping.name = "ORDERS".to_string();
        mapping.table = "orders".to_string();
        mapping.query = "SELECT Id, LiveDate, IsClec, Name FROM orders".to_string();
        mapping.app_id = "13".to_string();
        mapping
    }

    #[tokio::test]
    async fn test_rows_are_processed_in_query_order() {
        let mapping = sample_mapping();
        let source = FakeSource::new().with_rows(
            &mapping.query,
            vec![customer("1", "One"), customer("2", "Two"), customer("3", "Three")],
        );
        let store = FakeStore::new("Id").with_existing("2");

        let report = BatchDriver::new(&source, &store)
            .run_batch(std::slice::from_ref(&mapping))
            .await;

        let summary: Vec<(Option<&str>, Action)> = report
            .outcomes
            .iter()
            .map(|o| (o.business_id.as_deref(), o.action))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some("1"), Action::Create),
                (Some("2"), Action::Update),
                (Some("3"), Action::Create)
            ]
        );
        assert_eq!(report.created(), 2);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.to_string(), "2 created, 1 updated, 0 skipped, 0 failed");
    }

    #[tokio::test]
    async fn test_empty_result_emits_one_marker_and_no_lookups() {
        let mapping = sample_mapping();
        let source = FakeSource::new().with_rows(&mapping.query, Vec::new());
        let store = FakeStore::new("Id");

        let report = BatchDriver::new(&source, &store)
            .run_batch(std::slice::from_ref(&mapping))
            .await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].action, Action::NoRecords);
        assert_eq!(report.outcomes[0].table, "customers");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failing_entity_does_not_stop_later_entities() {
        let customers = sample_mapping();
        let orders = orders_mapping();
        // Only the orders query has canned rows; the customers query errors.
        let source = FakeSource::new().with_rows(&orders.query, vec![customer("9", "Nine")]);
        let store = FakeStore::new("Id");

        let report = BatchDriver::new(&source, &store)
            .run_batch(&[customers.clone(), orders.clone()])
            .await;

        assert_eq!(source.executed(), vec![customers.query, orders.query]);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].action, Action::Skip);
        assert!(report.outcomes[0].detail.starts_with("source query failed"));
        assert_eq!(report.outcomes[1].action, Action::Create);
        assert!(report.outcomes[1].success);
        assert_eq!(report.skipped(), 1);
    }

    #[tokio::test]
    async fn test_row_failures_do_not_abort_the_entity() {
        let mapping = sample_mapping();
        let source = FakeSource::new().with_rows(
            &mapping.query,
            vec![customer("1", "One"), customer("2", "Two")],
        );
        let store = FakeStore::new("Id").failing_writes(400, "Missing or invalid input.");

        let report = BatchDriver::new(&source, &store)
            .run_batch(std::slice::from_ref(&mapping))
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_row_without_id_is_skipped_without_remote_calls() {
        let mapping = sample_mapping();
        let source = FakeSource::new().with_rows(
            &mapping.query,
            vec![SourceRow::new().with("Id", None).with("Name", Some("Ghost"))],
        );
        let store = FakeStore::new("Id");

        let report = BatchDriver::new(&source, &store)
            .run_batch(std::slice::from_ref(&mapping))
            .await;

        assert_eq!(report.outcomes[0].action, Action::Skip);
        assert_eq!(report.outcomes[0].detail, "row has no Id value");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_updates_what_the_first_created() {
        let mapping = sample_mapping();
        let source = FakeSource::new().with_rows(&mapping.query, vec![customer("42", "Acme")]);
        let store = FakeStore::new("Id");
        let driver = BatchDriver::new(&source, &store);

        let first = driver.run_batch(std::slice::from_ref(&mapping)).await;
        let second = driver.run_batch(std::slice::from_ref(&mapping)).await;

        assert_eq!(first.outcomes[0].action, Action::Create);
        assert_eq!(second.outcomes[0].action, Action::Update);

        let calls = store.calls();
        let Call::Create { record: created, .. } = &calls[1] else {
            panic!("expected a create, got {:?}", calls[1]);
        };
        let Call::Update { key, record: updated, .. } = &calls[3] else {
            panic!("expected an update, got {:?}", calls[3]);
        };
        assert_eq!(key.value, "42");
        assert_eq!(&created.without("Id"), updated);
    }
}
