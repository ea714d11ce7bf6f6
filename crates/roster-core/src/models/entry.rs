use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// A single contact on the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RosterEntry {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub department: String,
}

impl RosterEntry {
    /// Build a normalized entry. Returns None when name or phone is blank.
    pub fn new(name: &str, phone: &str, department: &str) -> Option<Self> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() || phone.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            phone: phone.to_string(),
            department: normalize_department(department),
        })
    }
}

pub(crate) fn normalize_department(department: &str) -> String {
    department.trim().to_uppercase()
}

/// Where a rendered roster came from, ordered by confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SourceTag {
    Cache,
    Snapshot,
    Live,
}

impl SourceTag {
    /// Status line for the render collaborator.
    ///
    /// `at` is the cache timestamp for `Cache` and the render time for `Live`;
    /// the snapshot carries no meaningful time of its own.
    pub fn status_label(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&Local).format("%d/%m/%Y, %H:%M:%S");
        match self {
            SourceTag::Cache => format!("Cached ({})", local),
            SourceTag::Snapshot => "Snapshot".to_string(),
            SourceTag::Live => format!("Live ({})", local),
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTag::Cache => write!(f, "Cache"),
            SourceTag::Snapshot => write!(f, "Snapshot"),
            SourceTag::Live => write!(f, "Live"),
        }
    }
}

/// Entries sharing a department, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentGroup<'a> {
    pub department: &'a str,
    pub entries: Vec<&'a RosterEntry>,
}

/// Group entries by department, keeping departments in first-seen order.
pub fn group_by_department(entries: &[RosterEntry]) -> Vec<DepartmentGroup<'_>> {
    let mut groups: Vec<DepartmentGroup<'_>> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|g| g.department == entry.department) {
            Some(group) => group.entries.push(entry),
            None => groups.push(DepartmentGroup {
                department: &entry.department,
                entries: vec![entry],
            }),
        }
    }
    groups
}
