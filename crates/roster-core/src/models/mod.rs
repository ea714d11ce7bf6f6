//! Data models for the on-call roster.
//!
//! - `RosterEntry`: one contact (name, phone, department)
//! - `SourceTag`: which data source produced a render
//! - Payload parsing for the shapes the snapshot and live backend serve

pub mod entry;
pub mod payload;

pub use entry::{group_by_department, DepartmentGroup, RosterEntry, SourceTag};
pub use payload::{parse_payload, parse_raw_rows, parse_str, RawRows};
