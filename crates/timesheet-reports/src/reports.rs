//! Report service (data query, spreadsheet export, CSV and console summaries)

use clap::ValueEnum;
use csv::Writer;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::io;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

use crate::aggregate::{GroupBy, Report, Totals, aggregate};
use crate::bitrix::BitrixClient;
use crate::config::{Config, FieldMap};
use crate::constants;
use crate::error::Result;
use crate::normalize::{NormalizedBatch, RejectionSink, TimeEntry, normalize_all};
use crate::spreadsheet;

// =============================================================================
// Filters
// =============================================================================

/// Report filter as accepted from the caller. Empty values are ignored.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub employee_id: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
}

impl ReportFilter {
    /// Translate into a `crm.item.list` filter object
    pub fn to_crm_filter(&self, fields: &FieldMap) -> Map<String, Value> {
        let conditions = [
            (format!(">={}", fields.reflection_date), &self.date_from),
            (format!("<={}", fields.reflection_date), &self.date_to),
            (format!("={}", fields.assigned_by), &self.employee_id),
            (format!("={}", fields.project_id), &self.project_id),
            (format!("={}", fields.project_name), &self.project_name),
        ];

        let mut filter = Map::new();
        for (key, value) in conditions {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                filter.insert(key, json!(value));
            }
        }
        filter
    }
}

/// Which top-level grouping a report uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Employee → project → task
    Employees,
    /// Project → employee → task
    Projects,
}

impl ReportKind {
    pub fn group_by(self) -> GroupBy {
        match self {
            ReportKind::Employees => GroupBy::Employee,
            ReportKind::Projects => GroupBy::Project,
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            ReportKind::Employees => constants::EMPLOYEES_REPORT_FILENAME,
            ReportKind::Projects => constants::PROJECTS_REPORT_FILENAME,
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Flat report data returned by the `data` command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub items: Vec<TimeEntry>,
    pub count: usize,
    pub skipped_count: usize,
}

impl From<NormalizedBatch> for ReportData {
    fn from(batch: NormalizedBatch) -> Self {
        Self {
            count: batch.entries.len(),
            items: batch.entries,
            skipped_count: batch.skipped,
        }
    }
}

/// A rendered spreadsheet ready to be written out
pub struct ExportedReport {
    pub filename: &'static str,
    pub bytes: Vec<u8>,
}

/// Fetch and normalize every time entry matching `filter`
pub async fn fetch_entries(
    client: &BitrixClient,
    config: &Config,
    filter: &ReportFilter,
    sink: &mut dyn RejectionSink,
) -> Result<NormalizedBatch> {
    let crm_filter = filter.to_crm_filter(&config.fields);
    let items = client
        .fetch_smart_process_items(config.entity_type_id, crm_filter, config.fetch_limit)
        .await?;

    Ok(normalize_all(items, &config.fields, sink))
}

pub async fn fetch_report_data(
    client: &BitrixClient,
    config: &Config,
    filter: &ReportFilter,
    sink: &mut dyn RejectionSink,
) -> Result<ReportData> {
    Ok(fetch_entries(client, config, filter, sink).await?.into())
}

/// Fetch, normalize and aggregate entries into a report tree
pub async fn build_report(
    client: &BitrixClient,
    config: &Config,
    filter: &ReportFilter,
    kind: ReportKind,
    sink: &mut dyn RejectionSink,
) -> Result<Report> {
    let batch = fetch_entries(client, config, filter, sink).await?;
    let report = aggregate(&batch.entries, kind.group_by());

    info!(
        groups = report.groups.len(),
        entries = report.entry_count(),
        "report aggregated"
    );

    Ok(report)
}

/// Build the report and render it as an XLSX workbook
pub async fn export_report(
    client: &BitrixClient,
    config: &Config,
    filter: &ReportFilter,
    kind: ReportKind,
    sink: &mut dyn RejectionSink,
) -> Result<ExportedReport> {
    let report = build_report(client, config, filter, kind, sink).await?;

    Ok(ExportedReport {
        filename: kind.filename(),
        bytes: spreadsheet::render(&report)?,
    })
}

// =============================================================================
// CSV
// =============================================================================

const CSV_HEADERS: [&str; 12] = [
    "Entry_ID",
    "Entry_Title",
    "Task_ID",
    "Task_Name",
    "Project_ID",
    "Project_Name",
    "Hierarchy",
    "Employee_ID",
    "Employee_Name",
    "Type",
    "Hours",
    "Date",
];

/// Write entries as a flat CSV ledger
pub fn write_csv<W: io::Write>(entries: &[TimeEntry], writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(CSV_HEADERS)?;

    for entry in entries {
        wtr.write_record([
            entry.id.as_str(),
            entry.entry_title.as_deref().unwrap_or(""),
            &entry.task_id,
            entry.task_title.as_deref().unwrap_or(&entry.task_name),
            entry.project_id.as_deref().unwrap_or(""),
            &entry.project_name,
            &entry.hierarchy_titles.join(" / "),
            &entry.employee_id,
            entry.employee_name.as_deref().unwrap_or(""),
            entry.entry_type.label(),
            &format!("{:.2}", entry.hours),
            &entry.date,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file(path: &Path, entries: &[TimeEntry]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(entries, file)
}

// =============================================================================
// Console summary
// =============================================================================

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Учитываемые")]
    billable: String,
    #[tabled(rename = "Неучитываемые")]
    non_billable: String,
    #[tabled(rename = "Всего")]
    total: String,
}

impl SummaryRow {
    fn new(id: &str, name: &str, totals: &Totals) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            billable: format!("{:.2}", totals.billable_hours),
            non_billable: format!("{:.2}", totals.non_billable_hours),
            total: format!("{:.2}", totals.total_hours),
        }
    }
}

/// Table of top-level group totals followed by the grand total
pub fn summary_table(report: &Report) -> String {
    let mut rows: Vec<SummaryRow> = report
        .groups
        .values()
        .map(|group| SummaryRow::new(&group.id, &group.name, &group.totals))
        .collect();
    rows.push(SummaryRow::new("", "Итого", &report.grand_totals()));

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}
