pub mod billing;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod store;

pub use billing::Tariff;
pub use error::SessionError;
pub use lifecycle::{EntryRequest, ExitRequest, SessionController};
pub use store::{SessionStore, SqliteSessionStore};
