//! Small helpers shared across the crate.

pub mod clock;
pub mod format;

pub use clock::{Clock, FixedClock, SystemClock};
pub use format::{dial_links, tel_link, whatsapp_link, DialLinks, UNKNOWN_PHONE};
