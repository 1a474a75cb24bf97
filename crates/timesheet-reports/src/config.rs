//! Configuration for the timesheet reports tool

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::constants;
use crate::error::ReportError;

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub smart_process: SmartProcessConfig,
    #[serde(default)]
    pub fields: FieldMap,
}

/// Portal connection settings
#[derive(Debug, Deserialize)]
pub struct PortalConfig {
    /// Portal host, e.g. "example.bitrix24.ru"
    #[serde(default)]
    pub domain: Option<String>,
    /// OAuth access token
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            domain: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Smart process holding the time entries
#[derive(Debug, Deserialize)]
pub struct SmartProcessConfig {
    #[serde(default = "default_entity_type_id")]
    pub entity_type_id: u64,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for SmartProcessConfig {
    fn default() -> Self {
        Self {
            entity_type_id: default_entity_type_id(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

/// Field codes read from each smart process item
///
/// Defaults match the production portal; any key can be overridden in the
/// `[fields]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub task_id: String,
    pub hierarchy_ids: String,
    pub hierarchy_titles: String,
    pub project_name: String,
    pub project_id: String,
    pub billable: String,
    pub hours: String,
    pub reflection_date: String,
    pub employee: String,
    pub assigned_by: String,
    pub entry_title: String,
    pub created_time: String,
    /// Optional display title for the task (no field is mapped by default)
    pub task_title: Option<String>,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            task_id: constants::FIELD_TASK_ID.to_string(),
            hierarchy_ids: constants::FIELD_HIERARCHY_IDS.to_string(),
            hierarchy_titles: constants::FIELD_HIERARCHY_TITLES.to_string(),
            project_name: constants::FIELD_PROJECT_NAME.to_string(),
            project_id: constants::FIELD_PROJECT_ID.to_string(),
            billable: constants::FIELD_BILLABLE.to_string(),
            hours: constants::FIELD_HOURS.to_string(),
            reflection_date: constants::FIELD_REFLECTION_DATE.to_string(),
            employee: constants::FIELD_EMPLOYEE.to_string(),
            assigned_by: constants::FIELD_ASSIGNED_BY.to_string(),
            entry_title: constants::FIELD_TITLE.to_string(),
            created_time: constants::FIELD_CREATED_TIME.to_string(),
            task_title: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    constants::DEFAULT_TIMEOUT_SECS
}

fn default_entity_type_id() -> u64 {
    constants::TIME_ENTRY_ENTITY_TYPE_ID
}

fn default_fetch_limit() -> usize {
    constants::SMART_PROCESS_FETCH_LIMIT
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| {
            "Failed to parse config.toml. Check for:\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Incorrect data types (strings vs numbers)\n\n\
             See config.toml.example for the expected format."
        })
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Domain and access token pair used for every REST call
#[derive(Debug, Clone)]
pub struct Credentials {
    pub domain: String,
    pub access_token: String,
}

impl Credentials {
    /// Pick the override when present, else the file value.
    /// Blank values count as missing.
    pub fn resolve(
        domain: Option<String>,
        access_token: Option<String>,
        portal: &PortalConfig,
    ) -> std::result::Result<Self, ReportError> {
        let pick = |over: Option<String>, file: &Option<String>| {
            over.or_else(|| file.clone())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        match (
            pick(domain, &portal.domain),
            pick(access_token, &portal.access_token),
        ) {
            (Some(domain), Some(access_token)) => Ok(Self {
                domain,
                access_token,
            }),
            _ => Err(ReportError::AuthenticationMissing),
        }
    }
}

/// Main configuration struct with resolved values
pub struct Config {
    pub credentials: Credentials,
    pub timeout_secs: u64,
    pub entity_type_id: u64,
    pub fetch_limit: usize,
    pub fields: FieldMap,
}

impl Config {
    /// Create config from file config and credential overrides (CLI flags or env)
    pub fn from_file(
        file_config: FileConfig,
        domain: Option<String>,
        access_token: Option<String>,
    ) -> std::result::Result<Self, ReportError> {
        let credentials = Credentials::resolve(domain, access_token, &file_config.portal)?;

        Ok(Self {
            credentials,
            timeout_secs: file_config.portal.timeout_secs,
            entity_type_id: file_config.smart_process.entity_type_id,
            fetch_limit: file_config.smart_process.fetch_limit,
            fields: file_config.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.smart_process.entity_type_id, 1164);
        assert_eq!(config.smart_process.fetch_limit, 1500);
        assert_eq!(config.portal.timeout_secs, 30);
        assert_eq!(config.fields.task_id, constants::FIELD_TASK_ID);
        assert!(config.fields.task_title.is_none());
    }

    #[test]
    fn test_partial_field_override() {
        let config = FileConfig::parse(
            r#"
            [portal]
            domain = "example.bitrix24.ru"

            [fields]
            hours = "ufCrm99_1"
            task_title = "ufCrm99_2"
            "#,
        )
        .unwrap();

        assert_eq!(config.portal.domain.as_deref(), Some("example.bitrix24.ru"));
        assert_eq!(config.fields.hours, "ufCrm99_1");
        assert_eq!(config.fields.task_title.as_deref(), Some("ufCrm99_2"));
        // Untouched keys keep their defaults
        assert_eq!(config.fields.project_name, constants::FIELD_PROJECT_NAME);
    }

    #[test]
    fn test_credentials_override_wins() {
        let portal = PortalConfig {
            domain: Some("file.bitrix24.ru".to_string()),
            access_token: Some("file-token".to_string()),
            timeout_secs: 30,
        };

        let creds =
            Credentials::resolve(Some("cli.bitrix24.ru".to_string()), None, &portal).unwrap();
        assert_eq!(creds.domain, "cli.bitrix24.ru");
        assert_eq!(creds.access_token, "file-token");
    }

    #[test]
    fn test_credentials_missing_token() {
        let portal = PortalConfig::default();
        let err = Credentials::resolve(
            Some("a.bitrix24.ru".to_string()),
            Some("  ".to_string()),
            &portal,
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::AuthenticationMissing));
    }
}
