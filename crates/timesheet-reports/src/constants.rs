//! Centralized constants for the timesheet reports tool
//!
//! Portal-specific values (domain, token, field overrides) are loaded from
//! config.toml. Everything here is fixed by the Bitrix24 REST API or by the
//! report layout.

// =============================================================================
// Bitrix24 REST API
// =============================================================================

/// Page size used by Bitrix24 list methods
pub const BATCH_SIZE: usize = 50;

/// Default ceiling for `fetch_all`
pub const DEFAULT_FETCH_LIMIT: usize = 5000;

/// Default ceiling for smart process item fetches
pub const SMART_PROCESS_FETCH_LIMIT: usize = 1500;

/// Smart process holding the time-tracking records
pub const TIME_ENTRY_ENTITY_TYPE_ID: u64 = 1164;

/// List method for smart process items
pub const METHOD_ITEM_LIST: &str = "crm.item.list";

/// List method for portal users
pub const METHOD_USER_GET: &str = "user.get";

/// List method for smart process types
pub const METHOD_TYPE_LIST: &str = "crm.type.list";

/// HTTP timeout for a single REST call
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Smart Process Field Codes (entity 1164)
// =============================================================================

pub const FIELD_TASK_ID: &str = "ufCrm87_1761919581";
pub const FIELD_HIERARCHY_IDS: &str = "ufCrm87_1764191110";
pub const FIELD_HIERARCHY_TITLES: &str = "ufCrm87_1764191133";
pub const FIELD_PROJECT_NAME: &str = "ufCrm87_1764265641";
pub const FIELD_PROJECT_ID: &str = "ufCrm87_1764265626";
pub const FIELD_BILLABLE: &str = "ufCrm87_1763717129";
pub const FIELD_HOURS: &str = "ufCrm87_1761919617";
pub const FIELD_REFLECTION_DATE: &str = "ufCrm87_1764446274";
/// Composite "{id}_{name}" employee field
pub const FIELD_EMPLOYEE: &str = "ufCrm87_1761919601";

// Standard item fields
pub const FIELD_ASSIGNED_BY: &str = "assignedById";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_CREATED_TIME: &str = "createdTime";

// =============================================================================
// Fallback Labels
// =============================================================================

/// Project name when neither the field nor the hierarchy provides one
pub const UNDETERMINED_PROJECT: &str = "Не определён";

/// Task name when the hierarchy is empty
pub const UNTITLED_TASK: &str = "Без названия";

/// Employee key when the entry carries no employee id
pub const UNKNOWN_EMPLOYEE: &str = "unknown";

pub const BILLABLE_LABEL: &str = "Учитываемые";
pub const NON_BILLABLE_LABEL: &str = "Неучитываемые";

// =============================================================================
// Export Files
// =============================================================================

pub const EMPLOYEES_REPORT_FILENAME: &str = "Отчет_по_сотрудникам.xlsx";
pub const PROJECTS_REPORT_FILENAME: &str = "Отчет_по_проектам.xlsx";

pub const EMPLOYEES_SHEET_NAME: &str = "Отчет по сотрудникам";
pub const PROJECTS_SHEET_NAME: &str = "Отчет по проектам";

/// Default config file path
pub const CONFIG_FILENAME: &str = "config.toml";
