//! Service references.
//!
//! # Responsibilities
//! - Give typed access to a bound service (`get`)
//! - Tear the binding down (`release`); a released reference refuses access
//! - Let breakers wrap calls made through the accessor
//!
//! # Design Decisions
//! - One implementation per service kind, behind the `ServiceReference` trait
//! - The breaker never releases a reference; its owner does

use std::future::Future;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::discovery::record::{Record, ServiceKind};
use crate::notification::{LocalEventBus, NotificationChannel, NotificationError};
use crate::resilience::{BreakerError, CircuitBreaker};

/// Errors from binding or using a reference.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference to '{0}' has been released")]
    Released(String),

    #[error("record '{name}' is a {actual:?} service, expected {expected:?}")]
    KindMismatch {
        name: String,
        expected: ServiceKind,
        actual: ServiceKind,
    },

    #[error("invalid location '{location}': {source}")]
    InvalidLocation {
        location: String,
        #[source]
        source: url::ParseError,
    },
}

/// A consumer's binding to one discovered service.
pub trait ServiceReference {
    type Accessor;

    fn record(&self) -> &Record;

    /// Object used to call the service.
    fn get(&self) -> Result<&Self::Accessor, ReferenceError>;

    /// Remove the binding. The reference must not be used afterwards.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

fn expect_kind(record: &Record, expected: ServiceKind) -> Result<(), ReferenceError> {
    if record.kind == expected {
        Ok(())
    } else {
        Err(ReferenceError::KindMismatch {
            name: record.name.clone(),
            expected,
            actual: record.kind,
        })
    }
}

/// HTTP client rooted at a service's base URL.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    base: Url,
}

impl HttpEndpoint {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }

    pub fn get(&self, path: &str) -> Result<reqwest::RequestBuilder, url::ParseError> {
        Ok(self.client.get(self.url(path)?))
    }

    pub fn post(&self, path: &str) -> Result<reqwest::RequestBuilder, url::ParseError> {
        Ok(self.client.post(self.url(path)?))
    }
}

#[derive(Debug)]
pub struct HttpEndpointReference {
    record: Record,
    accessor: Option<HttpEndpoint>,
}

impl HttpEndpointReference {
    pub fn bind(record: Record) -> Result<Self, ReferenceError> {
        Self::bind_with_client(record, reqwest::Client::new())
    }

    pub fn bind_with_client(record: Record, client: reqwest::Client) -> Result<Self, ReferenceError> {
        expect_kind(&record, ServiceKind::HttpEndpoint)?;
        let base = Url::parse(&record.location).map_err(|source| ReferenceError::InvalidLocation {
            location: record.location.clone(),
            source,
        })?;
        tracing::debug!(service = %record.name, base = %base, "HTTP endpoint bound");
        Ok(Self {
            record,
            accessor: Some(HttpEndpoint { client, base }),
        })
    }
}

impl ServiceReference for HttpEndpointReference {
    type Accessor = HttpEndpoint;

    fn record(&self) -> &Record {
        &self.record
    }

    fn get(&self) -> Result<&HttpEndpoint, ReferenceError> {
        self.accessor
            .as_ref()
            .ok_or_else(|| ReferenceError::Released(self.record.name.clone()))
    }

    fn release(&mut self) {
        if self.accessor.take().is_some() {
            tracing::debug!(service = %self.record.name, "HTTP endpoint released");
        }
    }

    fn is_released(&self) -> bool {
        self.accessor.is_none()
    }
}

/// Sends messages to one address on the local bus.
#[derive(Debug, Clone)]
pub struct EventBusSender {
    bus: LocalEventBus,
    address: String,
}

impl EventBusSender {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn send(&self, message: Value) -> Result<(), NotificationError> {
        self.bus.publish(&self.address, message)
    }
}

#[derive(Debug)]
pub struct EventBusReference {
    record: Record,
    accessor: Option<EventBusSender>,
}

impl EventBusReference {
    pub fn bind(record: Record, bus: LocalEventBus) -> Result<Self, ReferenceError> {
        expect_kind(&record, ServiceKind::EventBus)?;
        let address = record.location.clone();
        Ok(Self {
            record,
            accessor: Some(EventBusSender { bus, address }),
        })
    }
}

impl ServiceReference for EventBusReference {
    type Accessor = EventBusSender;

    fn record(&self) -> &Record {
        &self.record
    }

    fn get(&self) -> Result<&EventBusSender, ReferenceError> {
        self.accessor
            .as_ref()
            .ok_or_else(|| ReferenceError::Released(self.record.name.clone()))
    }

    fn release(&mut self) {
        self.accessor = None;
    }

    fn is_released(&self) -> bool {
        self.accessor.is_none()
    }
}

/// Call a bound service through `breaker`.
///
/// A released reference fails with `BreakerError::Operation` without touching the breaker.
pub async fn guarded_call<'r, R, T, E, F, Fut>(
    breaker: &CircuitBreaker,
    reference: &'r R,
    call: F,
) -> Result<T, BreakerError<E>>
where
    R: ServiceReference,
    F: FnOnce(&'r R::Accessor) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ReferenceError>,
{
    let accessor = reference
        .get()
        .map_err(|e| BreakerError::Operation(E::from(e)))?;
    breaker.execute(|| call(accessor)).await
}
