//! Preference-gated push notification relay for forum activity.
//!
//! The host hands activity records to a [`notification::Dispatcher`]; the
//! dispatcher decides whether each one is pushed, delivers it to the provider
//! and writes a [`notification::DeliveryStatus`] back onto the record.

// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Core
pub mod delivery;
pub mod gate;
pub mod host;
pub mod notification;
pub mod preference;
pub mod template;

// HTTP surface
pub mod api;

pub use config::Settings;
pub use host::{Host, MemoryHost};
pub use notification::{DeliveryStatus, DispatchBatch, Dispatcher, Event};
