// kintonesync/src/config/mod.rs
use anyhow::{Context, Result};
use sqlx::mysql::MySqlConnectOptions;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::errors::SyncError;
use crate::record::{BUSINESS_ID_COLUMN, CoercionRules};

const DEFAULT_MYSQL_PORT: u16 = 3306;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One synchronizable entity: a source query and where its rows go in Kintone.
#[derive(Clone)]
pub struct EntityMapping {
    /// Entry from `APPS`; prefix of the entity's configuration keys.
    pub name: String,
    pub table: String,
    pub source_columns: Vec<String>,
    pub query: String,
    /// Parallel to `source_columns`.
    pub destination_fields: Vec<String>,
    pub app_id: String,
    pub api_token: String,
    /// Kintone field used as the update key and stripped from update payloads.
    pub key_field: String,
    pub coercions: CoercionRules,
}

impl EntityMapping {
    /// (source column, destination field) pairs in configured order.
    pub fn field_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.source_columns
            .iter()
            .map(String::as_str)
            .zip(self.destination_fields.iter().map(String::as_str))
    }
}

impl fmt::Debug for EntityMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapping")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("source_columns", &self.source_columns)
            .field("query", &self.query)
            .field("destination_fields", &self.destination_fields)
            .field("app_id", &self.app_id)
            .field("api_token", &"<redacted>")
            .field("key_field", &self.key_field)
            .field("coercions", &self.coercions)
            .finish()
    }
}

#[derive(Clone)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// How long to keep retrying the initial connection.
    pub connect_timeout: Duration,
}

impl MySqlSettings {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }
}

impl fmt::Debug for MySqlSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct KintoneSettings {
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub mysql: MySqlSettings,
    pub kintone: KintoneSettings,
    pub entities: Vec<EntityMapping>,
}

impl SyncConfig {
    /// Loads configuration from the process environment overlaid on `env_file`.
    ///
    /// A missing env file is only an error when `required` is set; otherwise the
    /// process environment alone is used.
    pub fn load(env_file: &Path, required: bool) -> Result<Self> {
        let file_vars = if env_file.exists() {
            read_env_file(env_file)
                .with_context(|| format!("Failed to read env file at {}", env_file.display()))?
        } else if required {
            anyhow::bail!("Env file not found: {}", env_file.display());
        } else {
            tracing::info!(
                "No env file at {}, using the process environment only",
                env_file.display()
            );
            HashMap::new()
        };

        let config = Self::from_lookup(|key| env::var(key).ok().or_else(|| file_vars.get(key).cloned()))?;
        Ok(config)
    }

    /// Builds and validates the whole configuration from a key lookup.
    /// Every problem found is reported at once.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = KeyReader::new(&lookup);

        let mysql = MySqlSettings {
            host: keys.required("MYSQL_SERVERNAME"),
            port: keys.parsed("MYSQL_PORT", DEFAULT_MYSQL_PORT),
            username: keys.required("MYSQL_USERNAME"),
            password: keys.present("MYSQL_PASSWORD"),
            database: keys.required("MYSQL_DBNAME"),
            connect_timeout: Duration::from_secs(
                keys.parsed("MYSQL_CONNECT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            ),
        };

        let timeout = Duration::from_secs(keys.parsed("KINTONE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));
        let base_url = keys.base_url();

        let mut entities = Vec::new();
        let mut seen = HashSet::new();
        for name in keys.list("APPS") {
            if !seen.insert(name.clone()) {
                keys.problem(format!("APPS lists entity '{}' more than once", name));
                continue;
            }
            entities.push(keys.entity(name));
        }

        if !keys.problems.is_empty() {
            return Err(SyncError::Config(keys.problems));
        }

        Ok(SyncConfig {
            mysql,
            kintone: KintoneSettings {
                // Only None when a problem was recorded above.
                base_url: base_url.ok_or_else(|| SyncError::Config(vec!["KINTONE_DOMAIN must be set".into()]))?,
                timeout,
            },
            entities,
        })
    }
}

/// Reads `KEY=VALUE` lines literally.
///
/// Each line is split at its first `=` and both sides are trimmed of ASCII
/// whitespace. Quotes, escapes and `$` are kept as written, so SQL reaches the
/// server exactly as it appears in the file. Blank lines, `#` comments and
/// lines without `=` are skipped.
fn read_env_file(path: &Path) -> std::result::Result<HashMap<String, String>, SyncError> {
    let content = fs::read_to_string(path)?;
    let mut vars = HashMap::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!("Ignoring line {} of {}: no '='", number + 1, path.display());
            continue;
        };
        let key = key.trim_ascii();
        if !key.is_empty() {
            vars.insert(key.to_string(), value.trim_ascii().to_string());
        }
    }
    Ok(vars)
}

/// Reads configuration keys and records what is missing or malformed.
struct KeyReader<'a, F> {
    lookup: &'a F,
    problems: Vec<String>,
}

impl<'a, F> KeyReader<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: &'a F) -> Self {
        Self { lookup, problems: Vec::new() }
    }

    fn problem(&mut self, message: String) {
        self.problems.push(message);
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim_ascii().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Key that must be set to a non-blank value.
    fn required(&mut self, key: &str) -> String {
        match self.optional(key) {
            Some(value) => value,
            None => {
                self.problem(format!("{} must be set", key));
                String::new()
            }
        }
    }

    /// Key that must exist but may be empty.
    fn present(&mut self, key: &str) -> String {
        match (self.lookup)(key) {
            Some(value) => value,
            None => {
                self.problem(format!("{} must be set (it may be empty)", key));
                String::new()
            }
        }
    }

    fn parsed<T>(&mut self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + PartialOrd + Default,
    {
        match self.optional(key) {
            None => default,
            Some(raw) => match raw.parse::<T>() {
                Ok(value) if value > T::default() => value,
                _ => {
                    self.problem(format!("{} must be a positive number, got '{}'", key, raw));
                    default
                }
            },
        }
    }

    fn list(&mut self, key: &str) -> Vec<String> {
        let raw = self.required(key);
        if raw.is_empty() {
            return Vec::new();
        }
        let items: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).collect();
        if items.iter().any(String::is_empty) {
            self.problem(format!("{} contains an empty entry: '{}'", key, raw));
        }
        items.into_iter().filter(|s| !s.is_empty()).collect()
    }

    fn base_url(&mut self) -> Option<Url> {
        let raw = match self.optional("KINTONE_BASE_URL") {
            Some(url) => url,
            None => match self.optional("KINTONE_DOMAIN") {
                Some(domain) => format!("https://{}", domain.trim_end_matches('/')),
                None => {
                    self.problem("KINTONE_DOMAIN (or KINTONE_BASE_URL) must be set".to_string());
                    return None;
                }
            },
        };
        match Url::parse(&raw) {
            Ok(mut url) => {
                // Endpoint paths are joined onto the base, which drops a last
                // segment that has no trailing slash.
                if !url.path().ends_with('/') {
                    let path = format!("{}/", url.path());
                    url.set_path(&path);
                }
                Some(url)
            }
            Err(e) => {
                self.problem(format!("Kintone base URL '{}' is invalid: {}", raw, e));
                None
            }
        }
    }

    fn entity(&mut self, name: String) -> EntityMapping {
        let key = |suffix: &str| format!("{}_{}", name, suffix);

        let table = self.required(&key("MYSQL_TABLE"));
        let source_columns = self.list(&key("MYSQL_FIELDS"));
        let query = self.required(&key("MYSQL_QUERY"));
        let destination_fields = self.list(&key("KINTONE_FIELDS"));
        let app_id = self.required(&key("KINTONE_APP_ID"));
        let api_token = self.required(&key("KINTONE_API_TOKEN"));
        let key_field = self
            .optional(&key("KINTONE_KEY_FIELD"))
            .unwrap_or_else(|| BUSINESS_ID_COLUMN.to_string());

        if !source_columns.is_empty()
            && !destination_fields.is_empty()
            && source_columns.len() != destination_fields.len()
        {
            self.problem(format!(
                "{} has {} columns but {} has {} fields; they must pair up",
                key("MYSQL_FIELDS"),
                source_columns.len(),
                key("KINTONE_FIELDS"),
                destination_fields.len()
            ));
        }

        let mut seen = HashSet::new();
        for field in &destination_fields {
            if !seen.insert(field.as_str()) {
                self.problem(format!("{} maps '{}' more than once", key("KINTONE_FIELDS"), field));
            }
        }

        let coercions = match self.optional(&key("FIELD_COERCIONS")) {
            None => CoercionRules::standard(),
            Some(spec) => match CoercionRules::parse(&spec) {
                Ok(rules) => rules,
                Err(problems) => {
                    for p in problems {
                        self.problem(format!("{}: {}", key("FIELD_COERCIONS"), p));
                    }
                    CoercionRules::new()
                }
            },
        };

        EntityMapping {
            name,
            table,
            source_columns,
            query,
            destination_fields,
            app_id,
            api_token,
            key_field,
            coercions,
        }
    }
}
