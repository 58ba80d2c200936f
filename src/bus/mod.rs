//! Inter-process bus seam
//!
//! Two sides of the bus:
//!
//! - [`ObjectServer`]: objects this service exports (button objects, their
//!   properties and signals). Publication never fails from the caller's view.
//! - [`BusClient`]: calls into peer services (object lookup, property
//!   get/set, signal subscription). Every call returns an explicit error kind
//!   so callers can branch on `Lookup` vs `Bus` failures.
//!
//! [`LocalBus`] implements both in-process.

mod local;
pub mod names;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;
pub use crate::events::BusSignal;

pub use local::{LocalBus, PropertyWrite};

/// Property value carried over the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    U64(u64),
    Str(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        Self::U64(v as u64)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Calls into peer services
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Resolve the service owning `path` with `interface`
    ///
    /// Fails with `Lookup` when no service implements it.
    async fn get_service(&self, path: &str, interface: &str) -> Result<String>;

    async fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue>;

    async fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<BusSignal>;
}

/// Objects exported by this service
pub trait ObjectServer: Send + Sync {
    fn add_object(&self, path: &str, interface: &str);

    fn remove_object(&self, path: &str);

    /// Set a property on an exported object and announce the change
    fn publish_property(&self, path: &str, interface: &str, property: &str, value: PropertyValue);

    fn emit(&self, signal: BusSignal);
}
