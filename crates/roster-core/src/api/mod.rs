//! Roster data sources.
//!
//! This module provides the `RosterSource` abstraction and the `HttpSource`
//! used for both the static snapshot and the live spreadsheet backend.
//! Both serve the same payload shapes; see `models::payload`.

pub mod client;
pub mod error;

pub use client::{HttpSource, RosterSource};
pub use error::SourceError;
