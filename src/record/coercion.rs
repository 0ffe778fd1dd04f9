// kintonesync/src/record/coercion.rs
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use super::FieldValue;

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern compiles"));

/// How a raw source value is normalized before it is sent to Kintone.
///
/// No rule ever fails: input that does not fit the rule becomes a null value
/// and the row is still processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Pass the raw value through unchanged.
    Text,
    /// Keep the value only if it is a real calendar date written as `YYYY-MM-DD`.
    Date,
    /// Map `yes`/`no` (any case, surrounding whitespace ignored) to `Yes`/`No`.
    YesNo,
}

impl Coercion {
    pub fn apply(self, raw: Option<&str>) -> Option<String> {
        match self {
            Coercion::Text => raw.map(str::to_string),
            Coercion::Date => raw.filter(|s| is_calendar_date(s)).map(str::to_string),
            Coercion::YesNo => raw.and_then(normalize_yes_no),
        }
    }
}

impl FromStr for Coercion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Coercion::Text),
            "date" => Ok(Coercion::Date),
            "yes_no" | "yesno" => Ok(Coercion::YesNo),
            other => Err(format!(
                "unknown coercion rule '{}' (expected text, date or yes_no)",
                other
            )),
        }
    }
}

fn is_calendar_date(raw: &str) -> bool {
    DATE_SHAPE.is_match(raw) && NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// Characters stripped around a yes/no value. Only ASCII is removed, so
/// full-width or non-breaking spaces leave the value unrecognized.
const YES_NO_PADDING: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

fn normalize_yes_no(raw: &str) -> Option<String> {
    match raw.trim_matches(YES_NO_PADDING).to_ascii_uppercase().as_str() {
        "YES" => Some("Yes".to_string()),
        "NO" => Some("No".to_string()),
        _ => None,
    }
}

/// Per-column coercion table, keyed by *source* column name.
///
/// Columns without an entry fall back to [`Coercion::Text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionRules {
    rules: HashMap<String, Coercion>,
}

impl CoercionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules applied when an entity does not configure its own table.
    pub fn standard() -> Self {
        Self::new()
            .with_rule("LiveDate", Coercion::Date)
            .with_rule("IsClec", Coercion::YesNo)
    }

    pub fn with_rule(mut self, column: impl Into<String>, rule: Coercion) -> Self {
        self.rules.insert(column.into(), rule);
        self
    }

    /// Parses `Column:rule,Column:rule`. Every malformed entry is reported.
    pub fn parse(spec: &str) -> Result<Self, Vec<String>> {
        let mut rules: HashMap<String, Coercion> = HashMap::new();
        let mut problems = Vec::new();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once(':') {
                Some((column, rule)) if !column.trim().is_empty() => match rule.parse::<Coercion>() {
                    Ok(rule) => {
                        rules.insert(column.trim().to_string(), rule);
                    }
                    Err(e) => problems.push(format!("{} in entry '{}'", e, entry)),
                },
                _ => problems.push(format!(
                    "coercion entry '{}' must look like Column:rule",
                    entry
                )),
            }
        }

        if problems.is_empty() {
            Ok(Self { rules })
        } else {
            Err(problems)
        }
    }

    pub fn rule_for(&self, column: &str) -> Coercion {
        self.rules.get(column).copied().unwrap_or(Coercion::Text)
    }

    pub fn coerce(&self, column: &str, raw: Option<&str>) -> FieldValue {
        FieldValue::new(self.rule_for(column).apply(raw))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
