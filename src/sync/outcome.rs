// kintonesync/src/sync/outcome.rs
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    /// The row was not written.
    Skip,
    /// The entity's source query returned no rows.
    NoRecords,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Skip => "skip",
            Action::NoRecords => "no records",
        };
        f.write_str(name)
    }
}

/// Result of processing one row (or one empty entity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub table: String,
    pub business_id: Option<String>,
    pub action: Action,
    pub success: bool,
    /// HTTP status of the call that decided the outcome, if one answered.
    pub status: Option<u16>,
    pub detail: String,
}

impl OperationOutcome {
    pub fn written(table: &str, business_id: &str, action: Action, status: u16) -> Self {
        Self {
            table: table.to_string(),
            business_id: Some(business_id.to_string()),
            action,
            success: true,
            status: Some(status),
            detail: format!("Id={}", business_id),
        }
    }

    pub fn write_failed(
        table: &str,
        business_id: &str,
        action: Action,
        status: Option<u16>,
        message: &str,
    ) -> Self {
        Self {
            table: table.to_string(),
            business_id: Some(business_id.to_string()),
            action,
            success: false,
            status,
            detail: format!("{} Id={}", message, business_id),
        }
    }

    pub fn skipped(
        table: &str,
        business_id: Option<&str>,
        status: Option<u16>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            table: table.to_string(),
            business_id: business_id.map(str::to_string),
            action: Action::Skip,
            success: false,
            status,
            detail: detail.into(),
        }
    }

    pub fn no_records(table: &str) -> Self {
        Self {
            table: table.to_string(),
            business_id: None,
            action: Action::NoRecords,
            success: true,
            status: None,
            detail: "no matching records".to_string(),
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self.status {
            Some(status) => format!("HTTP code: {}", status),
            None => "no response".to_string(),
        };
        match (self.action, self.success) {
            (Action::NoRecords, _) => write!(
                f,
                "No matching records found in MySQL for table {}.",
                self.table
            ),
            (Action::Skip, _) if self.status.is_some() => write!(
                f,
                "Error in checking request for table {} ({}): {}",
                self.table, code, self.detail
            ),
            (Action::Skip, _) => write!(f, "Skipped row for table {}: {}", self.table, self.detail),
            (_, true) => write!(f, "Success for table {}: {}", self.table, self.detail),
            (_, false) => write!(
                f,
                "Error for table {} ({}): {}",
                self.table, code, self.detail
            ),
        }
    }
}
