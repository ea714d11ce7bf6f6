//! Today's on-call board.
//!
//! Combines the duty timetable (one row per date, one column per
//! department) with the contact directory sheet to list who is on call for
//! the current duty date and how to reach them.

pub mod board;
pub mod loader;

pub use board::{
    build_board, duty_date, duty_key, BoardDepartment, BoardGroup, ContactDirectory, OnCallBoard,
    OnCallDoctor, ScheduleError, DUTY_DAY_START_HOUR, GENERAL_GROUP,
};
pub use loader::{
    BoardLoader, BoardObserver, BoardOrigin, LoadedBoard, SheetPair, BOARD_TIMEOUT_MESSAGE,
};
