//! Shared domain types, configuration and the request-level
//! error taxonomy used by every other parkwatch crate.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ParkwatchConfig;
pub use error::{ParkError, Result};
pub use types::{Capture, Session, SessionStats, SessionStatus, Slot, SlotStats};
