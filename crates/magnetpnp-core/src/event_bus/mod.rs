//! # Notification Bus
//!
//! Decouples the placement core from whatever shows notifications to the
//! user:
//! - The core emits typed [`PnpEvent`]s through a [`NotificationSink`]
//! - [`EventBus`] is the stock sink; subscribers filter by category
//! - Handlers run synchronously, in subscription order
//!
//! ## Usage
//!
//! ```rust
//! use magnetpnp_core::event_bus::{EventBus, EventCategory, EventFilter, NotificationSink, PnpEvent};
//!
//! let bus = EventBus::new();
//! bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Error]),
//!     |event| eprintln!("{}", event.to_message()),
//! );
//!
//! bus.notify(PnpEvent::error("Unknown part 42", Some(42)));
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
