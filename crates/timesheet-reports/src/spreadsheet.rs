//! XLSX rendering of an aggregated report
//!
//! Rendering happens in two steps: `layout` walks the tree depth-first and
//! produces a flat row plan, then `render` writes the plan with
//! `rust_xlsxwriter`.
//!
//! ```text
//! | Название задачи / Метка     | ID | Учит. | Неучит. | Всего | Дата       |
//! | 👤 Сотрудник: Alice (ID: 5) |    |       |         |       |            |
//! |   📁 Проект: P1             |    |       |         |       |            |
//! |     📝 Review PR            |    |       |         |       |            |
//! |       ⏱ Метка #10           | T1 | 2.50  |         | 2.50  | 28.11.2025 |
//! |     Итого по задаче:        |    | 2.50  | 0.00    | 2.50  |            |
//! |   Итого по проекту:         |    | 2.50  | 0.00    | 2.50  |            |
//! | Итого по сотруднику:        |    | 2.50  | 0.00    | 2.50  |            |
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};

use crate::aggregate::{Dimension, GroupBy, GroupNode, Report, Totals};
use crate::constants;
use crate::error::Result;
use crate::normalize::TimeEntry;

const HEADERS: [&str; 6] = [
    "Название задачи / Метка",
    "ID задачи",
    "Учитываемые",
    "Неучитываемые",
    "Всего",
    "Дата",
];

const LAST_COL: u16 = 5;

/// Role of a planned row; decides its styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Header,
    TopBanner,
    MidBanner,
    TaskBanner,
    Entry,
    TaskSubtotal,
    MidSubtotal,
    TopSubtotal,
    Blank,
}

/// One spreadsheet row before styling
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub kind: RowKind,
    pub label: String,
    pub task_id: Option<String>,
    pub billable: Option<Decimal>,
    pub non_billable: Option<Decimal>,
    pub total: Option<Decimal>,
    pub date: Option<String>,
}

impl SheetRow {
    fn labelled(kind: RowKind, label: String) -> Self {
        Self {
            kind,
            label,
            task_id: None,
            billable: None,
            non_billable: None,
            total: None,
            date: None,
        }
    }

    fn entry(entry: &TimeEntry) -> Self {
        let title = entry
            .entry_title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Метка #{}", entry.id));
        let billable = entry.is_billable();

        Self {
            kind: RowKind::Entry,
            label: format!("      ⏱ {}", title),
            task_id: Some(entry.task_id.clone()),
            billable: billable.then_some(entry.hours),
            non_billable: (!billable).then_some(entry.hours),
            total: Some(entry.hours),
            date: Some(format_date(&entry.date)),
        }
    }

    fn subtotal(kind: RowKind, label: String, totals: &Totals) -> Self {
        Self {
            billable: Some(totals.billable_hours),
            non_billable: Some(totals.non_billable_hours),
            total: Some(totals.total_hours),
            ..Self::labelled(kind, label)
        }
    }
}

/// Flatten a report into rows: header, then per top-level group its banner,
/// nested banners, entries and subtotals, with one blank row between groups.
pub fn layout(report: &Report) -> Vec<SheetRow> {
    let mut rows = vec![SheetRow::labelled(RowKind::Header, String::new())];

    for (index, top) in report.groups.values().enumerate() {
        if index > 0 {
            rows.push(SheetRow::labelled(RowKind::Blank, String::new()));
        }

        rows.push(SheetRow::labelled(RowKind::TopBanner, banner_label(top, 0)));

        for mid in top.children.values() {
            rows.push(SheetRow::labelled(RowKind::MidBanner, banner_label(mid, 2)));

            for task in mid.children.values() {
                rows.push(SheetRow::labelled(
                    RowKind::TaskBanner,
                    format!("    📝 {}", task.name),
                ));
                rows.extend(task.entries.iter().map(SheetRow::entry));
                rows.push(SheetRow::subtotal(
                    RowKind::TaskSubtotal,
                    "    Итого по задаче:".to_string(),
                    &task.totals,
                ));
            }

            rows.push(SheetRow::subtotal(
                RowKind::MidSubtotal,
                format!("  {}", subtotal_label(mid.dimension)),
                &mid.totals,
            ));
        }

        rows.push(SheetRow::subtotal(
            RowKind::TopSubtotal,
            subtotal_label(top.dimension).to_string(),
            &top.totals,
        ));
    }

    rows
}

fn banner_label<C>(node: &GroupNode<C>, indent: usize) -> String {
    let pad = " ".repeat(indent);
    match node.dimension {
        Dimension::Employee => format!("{}👤 Сотрудник: {} (ID: {})", pad, node.name, node.id),
        Dimension::Project => format!("{}📁 Проект: {}", pad, node.name),
    }
}

fn subtotal_label(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Employee => "Итого по сотруднику:",
        Dimension::Project => "Итого по проекту:",
    }
}

pub fn sheet_name(group_by: GroupBy) -> &'static str {
    match group_by {
        GroupBy::Employee => constants::EMPLOYEES_SHEET_NAME,
        GroupBy::Project => constants::PROJECTS_SHEET_NAME,
    }
}

/// Render "dd.mm.yyyy" from RFC 3339, "YYYY-MM-DDTHH:MM:SS" or "YYYY-MM-DD";
/// anything else is passed through unchanged
pub fn format_date(raw: &str) -> String {
    const OUT: &str = "%d.%m.%Y";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(OUT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return dt.format(OUT).to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.format(OUT).to_string();
    }
    raw.to_string()
}

// =============================================================================
// XLSX Writer
// =============================================================================

struct SheetFormats {
    header: Format,
    group: Format,
    banner: Format,
    hours: Format,
    subtotal: Format,
    subtotal_hours: Format,
    grand: Format,
    grand_hours: Format,
}

impl SheetFormats {
    fn new() -> Self {
        let subtotal = Format::new()
            .set_bold()
            .set_italic()
            .set_background_color(0xF4F4F4);
        let grand = Format::new().set_bold().set_background_color(0xFFF2CC);

        Self {
            header: Format::new()
                .set_bold()
                .set_font_color(0xFFFFFF)
                .set_background_color(0x4472C4)
                .set_align(FormatAlign::Center),
            group: Format::new().set_bold().set_background_color(0xE7E6E6),
            banner: Format::new(),
            hours: Format::new().set_num_format("0.00"),
            subtotal_hours: subtotal.clone().set_num_format("0.00"),
            subtotal,
            grand_hours: grand.clone().set_num_format("0.00"),
            grand,
        }
    }
}

/// Render the report as an XLSX workbook
pub fn render(report: &Report) -> Result<Vec<u8>> {
    let formats = SheetFormats::new();
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(report.group_by))?;

    for (index, row) in layout(report).iter().enumerate() {
        write_row(sheet, index as u32, row, &formats)?;
    }

    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn write_row(
    sheet: &mut Worksheet,
    row: u32,
    plan: &SheetRow,
    formats: &SheetFormats,
) -> Result<()> {
    match plan.kind {
        RowKind::Header => {
            for (col, header) in HEADERS.iter().enumerate() {
                sheet.write_string_with_format(row, col as u16, *header, &formats.header)?;
            }
        }
        RowKind::TopBanner => {
            sheet.merge_range(row, 0, row, 1, &plan.label, &formats.group)?;
            for col in 2..=LAST_COL {
                sheet.write_blank(row, col, &formats.group)?;
            }
        }
        RowKind::MidBanner | RowKind::TaskBanner => {
            sheet.merge_range(row, 0, row, 1, &plan.label, &formats.banner)?;
        }
        RowKind::Entry => {
            sheet.write_string(row, 0, &plan.label)?;
            if let Some(task_id) = &plan.task_id {
                sheet.write_string(row, 1, task_id)?;
            }
            write_hours(sheet, row, plan, &formats.hours)?;
            if let Some(date) = &plan.date {
                sheet.write_string(row, 5, date)?;
            }
        }
        RowKind::TaskSubtotal | RowKind::MidSubtotal => {
            write_subtotal(sheet, row, plan, &formats.subtotal, &formats.subtotal_hours)?;
        }
        RowKind::TopSubtotal => {
            write_subtotal(sheet, row, plan, &formats.grand, &formats.grand_hours)?;
        }
        RowKind::Blank => {}
    }

    Ok(())
}

fn write_hours(sheet: &mut Worksheet, row: u32, plan: &SheetRow, format: &Format) -> Result<()> {
    for (col, value) in [(2u16, plan.billable), (3, plan.non_billable), (4, plan.total)] {
        // Cells are f64; sums stay exact up to this point
        if let Some(hours) = value.and_then(|h| h.to_f64()) {
            sheet.write_number_with_format(row, col, hours, format)?;
        }
    }
    Ok(())
}

fn write_subtotal(
    sheet: &mut Worksheet,
    row: u32,
    plan: &SheetRow,
    text: &Format,
    hours: &Format,
) -> Result<()> {
    sheet.write_string_with_format(row, 0, &plan.label, text)?;
    sheet.write_blank(row, 1, text)?;
    write_hours(sheet, row, plan, hours)?;
    sheet.write_blank(row, LAST_COL, text)?;
    Ok(())
}
