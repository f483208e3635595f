use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An image submitted for classification.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Classifier output: slot code to observed occupancy.
///
/// Slots missing from `slot_status` were not observed and must be left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub vehicles_detected: u32,
    #[serde(default)]
    pub slot_status: BTreeMap<String, bool>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_success() -> bool {
    true
}

impl Classification {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        let slot_status: BTreeMap<String, bool> =
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Self {
            success: true,
            vehicles_detected: slot_status.values().filter(|v| **v).count() as u32,
            slot_status,
            timestamp: None,
        }
    }
}

/// A classification tied to the capture it came from.
#[derive(Debug, Clone)]
pub struct Detection {
    pub capture_id: Uuid,
    pub classification: Classification,
}
