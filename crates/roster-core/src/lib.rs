//! On-call roster core library.
//!
//! Resolves which copy of the contact roster to show - the local cache, the
//! published snapshot, or the live spreadsheet backend - and keeps the
//! display consistent as those sources answer out of order.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod resolver;
pub mod schedule;
pub mod utils;

pub use api::{HttpSource, RosterSource, SourceError};
pub use cache::{CacheManager, CacheRecord, FileStore, KeyValueStore, MemoryStore};
pub use config::Config;
pub use models::{RosterEntry, SourceTag};
pub use resolver::{Resolution, ResolverEvent, RosterObserver, SourceResolver};
