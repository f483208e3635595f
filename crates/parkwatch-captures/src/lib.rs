pub mod db;
pub mod error;
pub mod service;
pub mod storage;
pub mod store;

pub use error::CaptureError;
pub use service::{CaptureService, Upload};
pub use storage::{ImageStore, LocalImageStore};
pub use store::{CaptureStore, SqliteCaptureStore};
