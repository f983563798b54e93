//! # MagnetPnP Core
//!
//! Core types shared by every MagnetPnP crate:
//! parts and the part catalog, operation phases, error types and the
//! notification bus used to talk to the UI.

pub mod data;
pub mod error;
pub mod event_bus;

pub use data::{
    extract_embedded_description, Classification, Destination, InMemoryPartCatalog,
    OperationPhase, Part, PartCatalog, PartId,
};

pub use error::{AllocationError, CatalogError, Error, OperationError, Result};

pub use event_bus::{
    EventBus, EventCategory, EventFilter, FileEvent, NotificationSink,
    PartSummary, PnpEvent, SubscriptionId,
};
