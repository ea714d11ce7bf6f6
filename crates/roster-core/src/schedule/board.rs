use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::payload::department_columns;
use crate::utils::UNKNOWN_PHONE;

/// Hour at which a new duty day begins. Earlier times belong to the
/// previous day's shift.
pub const DUTY_DAY_START_HOUR: u32 = 8;

/// Sub-group name for department columns with no qualifier.
pub const GENERAL_GROUP: &str = "General";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Timetable is empty")]
    EmptyTimetable,

    #[error("No on-call schedule found for today ({0})")]
    NoScheduleForDate(String),

    #[error("Unable to load schedule: {0}")]
    Unavailable(String),
}

/// The duty date for a local wall-clock time.
pub fn duty_date(local: NaiveDateTime) -> NaiveDate {
    let date = local.date();
    if local.hour() < DUTY_DAY_START_HOUR {
        date - Duration::days(1)
    } else {
        date
    }
}

/// `DD/MM/YYYY`, the format of the timetable's date column.
pub fn duty_key(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Phone lookup by department then doctor name.
#[derive(Debug, Default, Clone)]
pub struct ContactDirectory {
    departments: HashMap<String, HashMap<String, String>>,
}

impl ContactDirectory {
    /// Build from the contacts sheet (`"<DEPT> NAME"`/phone column pairs).
    /// A name listed twice keeps its last phone.
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut departments: HashMap<String, HashMap<String, String>> = HashMap::new();
        if let Some((header, body)) = rows.split_first() {
            for (col, department) in department_columns(header) {
                let names = departments.entry(department).or_default();
                for row in body {
                    let name = row.get(col).map(|s| s.trim()).unwrap_or("");
                    let phone = row.get(col + 1).map(|s| s.trim()).unwrap_or("");
                    if !name.is_empty() && !phone.is_empty() {
                        names.insert(name.to_string(), phone.to_string());
                    }
                }
            }
        }
        Self { departments }
    }

    pub fn phone(&self, department: &str, name: &str) -> Option<&str> {
        self.departments
            .get(department)
            .and_then(|names| names.get(name))
            .map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnCallDoctor {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardGroup {
    pub name: String,
    pub doctors: Vec<OnCallDoctor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDepartment {
    pub name: String,
    pub groups: Vec<BoardGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnCallBoard {
    pub date: String,
    pub departments: Vec<BoardDepartment>,
}

impl OnCallBoard {
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    fn group_mut(&mut self, department: &str, group: &str) -> &mut BoardGroup {
        let dept_idx = match self.departments.iter().position(|d| d.name == department) {
            Some(idx) => idx,
            None => {
                self.departments.push(BoardDepartment {
                    name: department.to_string(),
                    groups: Vec::new(),
                });
                self.departments.len() - 1
            }
        };
        let groups = &mut self.departments[dept_idx].groups;
        let group_idx = match groups.iter().position(|g| g.name == group) {
            Some(idx) => idx,
            None => {
                groups.push(BoardGroup {
                    name: group.to_string(),
                    doctors: Vec::new(),
                });
                groups.len() - 1
            }
        };
        &mut groups[group_idx]
    }
}

/// Build the board for `date_key` from the timetable and contacts sheets.
///
/// Timetable row 0 is `["DATE", <department columns>...]`. A cell may list
/// several doctors, one per line. The department is the first word of the
/// column header; the rest of the header names the sub-group.
pub fn build_board(
    timetable: &[Vec<String>],
    contacts: &[Vec<String>],
    date_key: &str,
) -> Result<OnCallBoard, ScheduleError> {
    let Some((header, rows)) = timetable.split_first() else {
        return Err(ScheduleError::EmptyTimetable);
    };

    let today = rows
        .iter()
        .find(|row| row.first().map(|d| d.trim()) == Some(date_key))
        .ok_or_else(|| ScheduleError::NoScheduleForDate(date_key.to_string()))?;

    let directory = ContactDirectory::from_rows(contacts);
    let mut board = OnCallBoard {
        date: date_key.to_string(),
        departments: Vec::new(),
    };

    for (i, column) in header.iter().enumerate().skip(1) {
        let Some(cell) = today.get(i) else {
            continue;
        };
        let doctors: Vec<&str> = cell.lines().map(str::trim).filter(|d| !d.is_empty()).collect();
        if doctors.is_empty() {
            continue;
        }

        let column = column.trim();
        let (first, rest) = column.split_once(' ').unwrap_or((column, ""));
        let department = first.to_uppercase();
        let group = match rest.trim() {
            "" => GENERAL_GROUP,
            sub => sub,
        };

        let target = board.group_mut(&department, group);
        for name in doctors {
            let phone = directory.phone(&department, name).unwrap_or(UNKNOWN_PHONE);
            target.doctors.push(OnCallDoctor {
                name: name.to_string(),
                phone: phone.to_string(),
            });
        }
    }

    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_duty_date_rolls_back_before_eight() {
        assert_eq!(duty_key(duty_date(at("2024-03-01", "07:59"))), "29/02/2024");
        assert_eq!(duty_key(duty_date(at("2024-03-01", "08:00"))), "01/03/2024");
        assert_eq!(duty_key(duty_date(at("2024-01-01", "00:30"))), "31/12/2023");
    }

    #[test]
    fn test_build_board_groups_and_phones() {
        let timetable = sheet(&[
            &["DATE", "MEDICAL", "MEDICAL Ward 5", "SURGICAL"],
            &["31/12/2023", "Dr. Old", "", ""],
            &["01/01/2024", "Dr. A\r\nDr. B", "Dr. C", " \n "],
        ]);
        let contacts = sheet(&[
            &["MEDICAL NAME", "MEDICAL PHONE"],
            &["Dr. A", "0111"],
            &["Dr. C", "0333"],
        ]);

        let board = build_board(&timetable, &contacts, "01/01/2024").unwrap();
        assert_eq!(board.departments.len(), 1);
        let medical = &board.departments[0];
        assert_eq!(medical.name, "MEDICAL");
        assert_eq!(medical.groups[0].name, GENERAL_GROUP);
        assert_eq!(
            medical.groups[0].doctors,
            vec![
                OnCallDoctor { name: "Dr. A".into(), phone: "0111".into() },
                OnCallDoctor { name: "Dr. B".into(), phone: UNKNOWN_PHONE.into() },
            ]
        );
        assert_eq!(medical.groups[1].name, "Ward 5");
        assert_eq!(medical.groups[1].doctors[0].phone, "0333");
    }

    #[test]
    fn test_missing_date_and_empty_timetable() {
        let timetable = sheet(&[&["DATE", "MEDICAL"], &["01/01/2024", "Dr. A"]]);
        assert_eq!(
            build_board(&timetable, &[], "02/01/2024"),
            Err(ScheduleError::NoScheduleForDate("02/01/2024".into()))
        );
        assert_eq!(build_board(&[], &[], "02/01/2024"), Err(ScheduleError::EmptyTimetable));
    }

    #[test]
    fn test_directory_last_phone_wins() {
        let directory = ContactDirectory::from_rows(&sheet(&[
            &["ED NAME", "ED PHONE"],
            &["Dr. E", "1"],
            &["Dr. E", "2"],
        ]));
        assert_eq!(directory.phone("ED", "Dr. E"), Some("2"));
        assert_eq!(directory.phone("ED", "Dr. F"), None);
    }
}
