//! Grouping of time entries into employee/project/task totals
//!
//! Two layouts share one tree shape:
//! - by employee: employee -> project -> task
//! - by project:  project -> employee -> task
//!
//! Nodes are created the first time their key is seen and kept in that order.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::constants;
use crate::normalize::TimeEntry;

/// Top-level dimension of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Employee,
    Project,
}

/// Dimension a group node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Employee,
    Project,
}

/// Billable, non-billable and total hours.
///
/// Sums are exact decimals, so `total_hours` always equals
/// `billable_hours + non_billable_hours` regardless of summation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub billable_hours: Decimal,
    pub non_billable_hours: Decimal,
    pub total_hours: Decimal,
}

impl Totals {
    pub fn add(&mut self, entry: &TimeEntry) {
        if entry.is_billable() {
            self.billable_hours += entry.hours;
        } else {
            self.non_billable_hours += entry.hours;
        }
        self.total_hours = self.billable_hours + self.non_billable_hours;
    }

    pub fn merge(&mut self, other: &Totals) {
        self.billable_hours += other.billable_hours;
        self.non_billable_hours += other.non_billable_hours;
        self.total_hours = self.billable_hours + self.non_billable_hours;
    }
}

/// Leaf group: one task with its entries in input order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub totals: Totals,
    pub entries: Vec<TimeEntry>,
}

/// Employee or project group
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", bound(serialize = "C: Serialize"))]
pub struct GroupNode<C> {
    pub dimension: Dimension,
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(serialize_with = "ordered_values")]
    pub children: IndexMap<String, C>,
}

impl<C> GroupNode<C> {
    fn new(key: GroupKey) -> Self {
        Self {
            dimension: key.dimension,
            id: key.id,
            name: key.name,
            totals: Totals::default(),
            children: IndexMap::new(),
        }
    }
}

/// Second level of the tree (project under employee, or employee under project)
pub type MidNode = GroupNode<TaskNode>;

/// First level of the tree
pub type TopNode = GroupNode<MidNode>;

/// Aggregated report, top-level groups in first-seen order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub group_by: GroupBy,
    #[serde(serialize_with = "ordered_values")]
    pub groups: IndexMap<String, TopNode>,
}

impl Report {
    /// Sum over every top-level group
    pub fn grand_totals(&self) -> Totals {
        let mut totals = Totals::default();
        for group in self.groups.values() {
            totals.merge(&group.totals);
        }
        totals
    }

    pub fn entry_count(&self) -> usize {
        self.tasks().map(|task| task.entries.len()).sum()
    }

    /// Every task node, depth-first
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.groups
            .values()
            .flat_map(|top| top.children.values())
            .flat_map(|mid| mid.children.values())
    }
}

/// Key and display name of a group, derived from one entry
struct GroupKey {
    dimension: Dimension,
    id: String,
    name: String,
}

impl GroupKey {
    fn employee(entry: &TimeEntry) -> Self {
        let id = if entry.employee_id.is_empty() {
            constants::UNKNOWN_EMPLOYEE.to_string()
        } else {
            entry.employee_id.clone()
        };
        let name = entry
            .employee_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("User {}", id));

        Self {
            dimension: Dimension::Employee,
            id,
            name,
        }
    }

    fn project(entry: &TimeEntry) -> Self {
        let name = if entry.project_name.is_empty() {
            constants::UNDETERMINED_PROJECT.to_string()
        } else {
            entry.project_name.clone()
        };
        let id = entry
            .project_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| name.clone());

        Self {
            dimension: Dimension::Project,
            id,
            name,
        }
    }
}

/// Group entries into a three-level tree.
///
/// Every entry lands in exactly one task node and adds its hours to that
/// task, its mid-level group, and its top-level group.
pub fn aggregate(entries: &[TimeEntry], group_by: GroupBy) -> Report {
    let mut groups: IndexMap<String, TopNode> = IndexMap::new();

    for entry in entries {
        let (top_key, mid_key) = match group_by {
            GroupBy::Employee => (GroupKey::employee(entry), GroupKey::project(entry)),
            GroupBy::Project => (GroupKey::project(entry), GroupKey::employee(entry)),
        };

        let top = groups
            .entry(top_key.id.clone())
            .or_insert_with(|| GroupNode::new(top_key));
        top.totals.add(entry);

        let mid = top
            .children
            .entry(mid_key.id.clone())
            .or_insert_with(|| GroupNode::new(mid_key));
        mid.totals.add(entry);

        let task = mid
            .children
            .entry(entry.task_id.clone())
            .or_insert_with(|| TaskNode {
                id: entry.task_id.clone(),
                name: entry
                    .task_title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| entry.task_name.clone()),
                totals: Totals::default(),
                entries: Vec::new(),
            });
        task.totals.add(entry);
        task.entries.push(entry.clone());
    }

    Report { group_by, groups }
}

fn ordered_values<S, V>(map: &IndexMap<String, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_seq(map.values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{EntryType, parse_hours};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn entry(
        id: &str,
        task: &str,
        project: &str,
        employee: &str,
        hours: Decimal,
        billable: bool,
    ) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            entry_title: None,
            task_id: task.to_string(),
            task_name: format!("Task {}", task),
            task_title: None,
            project_id: None,
            project_name: project.to_string(),
            hierarchy_ids: Vec::new(),
            hierarchy_titles: Vec::new(),
            hours,
            entry_type: if billable {
                EntryType::Billable
            } else {
                EntryType::NonBillable
            },
            date: "2025-11-28".to_string(),
            employee_id: employee.to_string(),
            employee_name: None,
        }
    }

    /// Entry whose hours come from a raw field value, as the normalizer sees them
    fn parsed(id: &str, employee: &str, hours: &str, billable: bool) -> TimeEntry {
        entry(id, "T1", "P1", employee, parse_hours(Some(&json!(hours))), billable)
    }

    fn sample_entries() -> Vec<TimeEntry> {
        vec![
            entry("1", "T1", "P1", "5", dec!(2.3), true),
            entry("2", "T2", "P2", "6", dec!(1.1), false),
            entry("3", "T1", "P1", "6", dec!(0.7), true),
            entry("4", "T3", "P1", "5", dec!(4.2), false),
            entry("5", "T2", "P2", "5", dec!(0.9), true),
            entry("6", "T1", "P1", "5", dec!(3.3), false),
        ]
    }

    fn assert_balanced(totals: &Totals) {
        assert_eq!(totals.total_hours, totals.billable_hours + totals.non_billable_hours);
    }

    #[test]
    fn test_single_billable_entry_by_employee() {
        let mut e = entry("1", "T1", "P1", "5", dec!(2.5), true);
        e.employee_name = Some("Alice".to_string());

        let report = aggregate(&[e], GroupBy::Employee);
        assert_eq!(report.groups.len(), 1);

        let employee = &report.groups["5"];
        assert_eq!(employee.dimension, Dimension::Employee);
        assert_eq!(employee.name, "Alice");
        assert_eq!(employee.totals.total_hours, dec!(2.5));
        assert_eq!(employee.totals.billable_hours, dec!(2.5));
        assert_eq!(employee.totals.non_billable_hours, Decimal::ZERO);

        assert_eq!(employee.children.len(), 1);
        let project = &employee.children["P1"];
        assert_eq!(project.dimension, Dimension::Project);
        assert_eq!(project.children.len(), 1);
        assert_eq!(project.children["T1"].entries.len(), 1);
    }

    #[test]
    fn test_mixed_types_collapse_into_one_task() {
        let entries = vec![
            entry("a", "T1", "P1", "5", dec!(3), true),
            entry("b", "T1", "P1", "5", dec!(1), false),
        ];

        let report = aggregate(&entries, GroupBy::Employee);
        let task = &report.groups["5"].children["P1"].children["T1"];

        assert_eq!(task.totals.total_hours, dec!(4));
        assert_eq!(task.totals.billable_hours, dec!(3));
        assert_eq!(task.totals.non_billable_hours, dec!(1));
        let ids: Vec<&str> = task.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_decimal_hours_stay_balanced() {
        let entries = vec![
            parsed("1", "5", "7.8", false),
            parsed("2", "5", "1.1", true),
            parsed("3", "5", "4.7", false),
        ];

        let report = aggregate(&entries, GroupBy::Employee);
        let totals = report.groups["5"].totals;

        assert_eq!(totals.billable_hours, dec!(1.1));
        assert_eq!(totals.non_billable_hours, dec!(12.5));
        assert_eq!(totals.total_hours, dec!(13.6));
        assert_balanced(&totals);
    }

    #[test]
    fn test_decimal_hours_conserved_across_groups() {
        let entries = vec![
            parsed("1", "5", "5.9", true),
            parsed("2", "6", "5.7", true),
            parsed("3", "6", "2.4", false),
        ];
        let input_total: Decimal = entries.iter().map(|e| e.hours).sum();
        assert_eq!(input_total, dec!(14));

        for group_by in [GroupBy::Employee, GroupBy::Project] {
            let report = aggregate(&entries, group_by);
            let top_total: Decimal = report.groups.values().map(|g| g.totals.total_hours).sum();
            assert_eq!(top_total, input_total);
        }
    }

    #[test]
    fn test_hours_conserved() {
        let entries = sample_entries();
        let input_total: Decimal = entries.iter().map(|e| e.hours).sum();

        for group_by in [GroupBy::Employee, GroupBy::Project] {
            let report = aggregate(&entries, group_by);
            let task_total: Decimal = report.tasks().map(|t| t.totals.total_hours).sum();

            assert_eq!(task_total, input_total);
            assert_eq!(report.grand_totals().total_hours, input_total);
            assert_eq!(report.entry_count(), entries.len());
        }
    }

    #[test]
    fn test_every_node_balanced() {
        for group_by in [GroupBy::Employee, GroupBy::Project] {
            let report = aggregate(&sample_entries(), group_by);

            for top in report.groups.values() {
                assert_balanced(&top.totals);
                for mid in top.children.values() {
                    assert_balanced(&mid.totals);
                    for task in mid.children.values() {
                        assert_balanced(&task.totals);
                    }
                }
            }
        }
    }

    #[test]
    fn test_layouts_agree_on_grand_total() {
        let entries = sample_entries();
        let by_employee = aggregate(&entries, GroupBy::Employee).grand_totals();
        let by_project = aggregate(&entries, GroupBy::Project).grand_totals();

        assert_eq!(by_employee, by_project);
    }

    #[test]
    fn test_first_seen_order() {
        let report = aggregate(&sample_entries(), GroupBy::Employee);

        let employees: Vec<&str> = report.groups.keys().map(String::as_str).collect();
        assert_eq!(employees, vec!["5", "6"]);

        let projects: Vec<&str> = report.groups["5"].children.keys().map(String::as_str).collect();
        assert_eq!(projects, vec!["P1", "P2"]);

        let tasks: Vec<&str> = report.groups["5"].children["P1"]
            .children
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(tasks, vec!["T1", "T3"]);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[], GroupBy::Employee);
        assert!(report.groups.is_empty());
        assert_eq!(report.grand_totals(), Totals::default());
    }

    #[test]
    fn test_project_key_prefers_id() {
        let mut first = entry("1", "T1", "Same name", "5", dec!(1), true);
        first.project_id = Some("100".to_string());
        let mut second = entry("2", "T1", "Same name", "5", dec!(1), true);
        second.project_id = Some("200".to_string());
        let third = entry("3", "T1", "Same name", "5", dec!(1), true);

        let report = aggregate(&[first, second, third], GroupBy::Project);
        let keys: Vec<&str> = report.groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["100", "200", "Same name"]);
        assert!(report.groups.values().all(|g| g.name == "Same name"));
    }

    #[test]
    fn test_unknown_employee_fallbacks() {
        let report = aggregate(&[entry("1", "T1", "P1", "", dec!(1), false)], GroupBy::Employee);
        let employee = &report.groups[constants::UNKNOWN_EMPLOYEE];
        assert_eq!(employee.name, "User unknown");

        let report = aggregate(&[entry("1", "T1", "P1", "42", dec!(1), false)], GroupBy::Project);
        assert_eq!(report.groups["P1"].children["42"].name, "User 42");
    }

    #[test]
    fn test_task_title_preferred_for_name() {
        let mut titled = entry("1", "T1", "P1", "5", dec!(1), true);
        titled.task_title = Some("Display title".to_string());

        let report = aggregate(&[titled], GroupBy::Employee);
        assert_eq!(report.groups["5"].children["P1"].children["T1"].name, "Display title");
    }

    #[test]
    fn test_serializes_children_as_arrays() {
        let report = aggregate(&sample_entries()[..1], GroupBy::Employee);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["groupBy"], json!("employee"));
        assert_eq!(value["groups"][0]["id"], json!("5"));
        assert_eq!(value["groups"][0]["totalHours"], json!(2.3));
        assert_eq!(value["groups"][0]["children"][0]["dimension"], json!("project"));
        assert_eq!(value["groups"][0]["children"][0]["children"][0]["id"], json!("T1"));
        assert_eq!(
            value["groups"][0]["children"][0]["children"][0]["entries"][0]["id"],
            json!("1")
        );
    }
}
