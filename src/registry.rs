//! Named breaker registry.
//!
//! # Responsibilities
//! - Own every breaker of the process, keyed by name
//! - Create breakers from configuration at startup
//! - Reconcile against reloaded configuration
//!
//! # Design Decisions
//! - Explicit object built once at startup, shared via Arc; no global state
//! - A breaker's options never change; changed options replace the breaker

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::options::BreakerOptions;
use crate::config::schema::BreakerEntry;
use crate::notification::NotificationChannel;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty() && self.removed.is_empty()
    }
}

/// Process-wide collection of named breakers.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
    channel: Option<Arc<dyn NotificationChannel>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Breakers created by this registry publish through `channel`.
    pub fn with_channel(channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            breakers: DashMap::new(),
            channel: Some(channel),
        }
    }

    /// Build a registry holding one breaker per entry.
    pub fn from_entries(
        entries: &[BreakerEntry],
        channel: Option<Arc<dyn NotificationChannel>>,
    ) -> Self {
        let registry = Self {
            breakers: DashMap::new(),
            channel,
        };
        for entry in entries {
            registry.get_or_create(&entry.name, entry.options.clone());
        }
        registry
    }

    fn create(&self, name: &str, options: BreakerOptions) -> CircuitBreaker {
        match &self.channel {
            Some(channel) => CircuitBreaker::with_channel(name, options, channel.clone()),
            None => CircuitBreaker::new(name, options),
        }
    }

    /// Return the breaker called `name`, creating it with `options` if absent.
    ///
    /// An existing breaker keeps its own options.
    pub fn get_or_create(&self, name: &str, options: BreakerOptions) -> CircuitBreaker {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| self.create(name, options))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.get(name).map(|b| b.clone())
    }

    /// Discard a breaker. Outstanding clones keep working until dropped.
    pub fn remove(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.remove(name).map(|(_, b)| b)
    }

    /// Sorted breaker names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<CircuitBreaker> =
            self.breakers.iter().map(|e| e.value().clone()).collect();
        let mut snapshots: Vec<BreakerSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Manually close a breaker. Returns false if it does not exist.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Manually open a breaker. Returns false if it does not exist.
    pub fn force_open(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.force_open();
                true
            }
            None => false,
        }
    }

    /// Bring the registry in line with `entries`.
    pub fn reconcile(&self, entries: &[BreakerEntry]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for entry in entries {
            let current = self.get(&entry.name);
            match current {
                None => {
                    self.get_or_create(&entry.name, entry.options.clone());
                    summary.added.push(entry.name.clone());
                }
                Some(existing) if existing.options() != &entry.options => {
                    let fresh = self.create(&entry.name, entry.options.clone());
                    self.breakers.insert(entry.name.clone(), fresh);
                    summary.replaced.push(entry.name.clone());
                }
                Some(_) => {}
            }
        }

        for name in self.names() {
            if !entries.iter().any(|entry| entry.name == name) {
                self.breakers.remove(&name);
                summary.removed.push(name);
            }
        }

        if !summary.is_empty() {
            tracing::info!(
                added = ?summary.added,
                replaced = ?summary.replaced,
                removed = ?summary.removed,
                "Breaker registry reconciled"
            );
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
