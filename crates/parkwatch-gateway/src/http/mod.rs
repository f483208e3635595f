pub mod captures;
pub mod error;
pub mod health;
pub mod sessions;
pub mod slots;
