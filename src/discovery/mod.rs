//! Bindings to discovered services.
//!
//! A consumer binds a `Record` into a `ServiceReference`, calls the service through the
//! reference's accessor (optionally guarded by a breaker via `guarded_call`), and releases
//! the reference when done.

pub mod record;
pub mod reference;

pub use record::{Record, ServiceKind};
pub use reference::{
    guarded_call, EventBusReference, EventBusSender, HttpEndpoint, HttpEndpointReference,
    ReferenceError, ServiceReference,
};
