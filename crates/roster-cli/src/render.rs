//! Plain-text rendering of rosters and boards.

use roster_core::models::{group_by_department, RosterEntry};
use roster_core::resolver::{RosterObserver, EXHAUSTED_MESSAGE, FAILED_LABEL};
use roster_core::schedule::{
    BoardObserver, BoardOrigin, LoadedBoard, ScheduleError, GENERAL_GROUP,
};
use roster_core::utils::dial_links;
use roster_core::SourceTag;

pub fn status_line(label: &str) -> String {
    format!("Data Source: {}", label)
}

fn contact_line(name: &str, phone: &str) -> String {
    match dial_links(phone) {
        Some(links) => format!("    {:<28} {:<16} {}  {}", name, phone, links.tel, links.whatsapp),
        None => format!("    {:<28} {}", name, phone),
    }
}

pub fn roster_text(entries: &[RosterEntry]) -> String {
    if entries.is_empty() {
        return "No contacts available.\n".to_string();
    }
    let mut out = String::new();
    for group in group_by_department(entries) {
        out.push_str(&format!("{}\n", group.department));
        for entry in group.entries {
            out.push_str(&contact_line(&entry.name, &entry.phone));
            out.push('\n');
        }
    }
    out
}

pub fn board_text(loaded: &LoadedBoard) -> String {
    let mut out = format!("On call for {}\n", loaded.board.date);
    match loaded.origin {
        BoardOrigin::Live(at) => out.push_str(&format!(
            "Last updated: {}\n",
            at.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M")
        )),
        BoardOrigin::Cache(at) => out.push_str(&format!(
            "(offline - showing data cached {})\n",
            at.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M")
        )),
    }
    if loaded.board.is_empty() {
        out.push_str("No doctors on-call today.\n");
        return out;
    }
    for department in &loaded.board.departments {
        out.push_str(&format!("\n{}\n", department.name));
        for group in &department.groups {
            if group.name != GENERAL_GROUP {
                out.push_str(&format!("  {}\n", group.name));
            }
            for doctor in &group.doctors {
                out.push_str(&contact_line(&doctor.name, &doctor.phone));
                out.push('\n');
            }
        }
    }
    out
}

/// Prints every render to stdout as it arrives.
#[derive(Debug, Default)]
pub struct TerminalObserver {
    pub last_tag: Option<SourceTag>,
}

impl RosterObserver for TerminalObserver {
    fn on_data(&mut self, entries: &[RosterEntry], tag: SourceTag, label: &str) {
        if self.last_tag.is_some() {
            println!("--- updated ---");
        }
        println!("{}\n", status_line(label));
        print!("{}", roster_text(entries));
        self.last_tag = Some(tag);
    }

    fn on_timeout(&mut self, message: &str) {
        println!("⚠️ {}", message);
    }

    fn on_exhausted(&mut self) {
        println!("⚠️ {}", EXHAUSTED_MESSAGE);
        println!("{}", status_line(&format!("❌ {}", FAILED_LABEL)));
        println!("Run again to retry.");
    }
}

/// Prints the cached board, then the live one once it arrives.
#[derive(Debug, Default)]
pub struct TerminalBoardObserver {
    rendered: bool,
}

impl BoardObserver for TerminalBoardObserver {
    fn on_board(&mut self, loaded: &LoadedBoard) {
        if self.rendered {
            println!("--- updated ---");
        }
        print!("{}", board_text(loaded));
        self.rendered = true;
    }

    fn on_timeout(&mut self, message: &str) {
        println!("⚠️ {}", message);
    }

    fn on_failure(&mut self, error: &ScheduleError) {
        println!("⚠️ {}", error);
    }
}
