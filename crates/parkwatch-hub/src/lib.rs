//! In-process broadcast hub for live slot and session events.
//!
//! # Overview
//!
//! A single [`BroadcastHub`] task owns the set of live subscribers. Everything
//! else talks to it through a cloneable [`HubHandle`], which turns
//! `register` / `unregister` / `broadcast` calls into messages on one FIFO
//! command channel. Because only the hub task touches the subscriber map, no
//! lock guards it, and every subscriber observes events in the order the
//! broadcasts reached the hub.
//!
//! Each subscriber owns a bounded outbound queue. When it is full the newest
//! event is dropped for that subscriber only; producers and other
//! subscribers are never slowed down.

pub mod error;
pub mod handle;
pub mod hub;

pub use error::{HubError, Result};
pub use handle::{HubHandle, Subscription, SubscriberId};
pub use hub::{BroadcastHub, HubStats};
