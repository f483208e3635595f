//! Wire shapes shared by the gateway and its viewers.
//!
//! - [`events`]: the live push stream (`{"type": ..., "data": ...}` frames).
//! - [`envelope`]: the REST response envelope (`{"success": ..., "data": ...}`).

pub mod envelope;
pub mod events;

pub use envelope::ApiEnvelope;
pub use events::{EventKind, HubEvent, SessionEntryPayload, SessionExitPayload};
