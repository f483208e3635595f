//! Slot occupancy detection.
//!
//! A stored capture is handed to [`DetectionDispatcher`], which classifies it
//! on a spawned task and delivers the result over a channel. The
//! [`DetectionReconciler`] drains that channel and applies only the slots
//! whose observed occupancy differs from the store.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod reconciler;
pub mod types;

pub use client::{Classifier, HttpClassifier};
pub use dispatcher::DetectionDispatcher;
pub use error::ClassifierError;
pub use reconciler::{DetectionReconciler, ReconcileReport};
pub use types::{Classification, Detection, Frame};
