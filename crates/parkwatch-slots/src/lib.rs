pub mod db;
pub mod error;
pub mod service;
pub mod store;

pub use error::SlotError;
pub use service::{SlotService, SlotUpdate};
pub use store::{SlotStore, SqliteSlotStore};
