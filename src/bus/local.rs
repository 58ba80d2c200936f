//! In-process bus
//!
//! Keeps exported and peer objects in one table and routes signals through
//! the [`EventBus`]. Peer objects are registered with [`LocalBus::register_peer`].

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{BusClient, BusSignal, ObjectServer, PropertyValue};
use crate::error::{AppError, Result};
use crate::events::EventBus;

#[derive(Debug, Default)]
struct LocalObject {
    service: String,
    interfaces: HashMap<String, HashMap<String, PropertyValue>>,
}

/// Record of a property write issued through [`BusClient::set_property`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyWrite {
    pub service: String,
    pub path: String,
    pub interface: String,
    pub property: String,
    pub value: PropertyValue,
}

/// In-process implementation of [`BusClient`] and [`ObjectServer`]
pub struct LocalBus {
    service_name: String,
    objects: RwLock<HashMap<String, LocalObject>>,
    writes: RwLock<Vec<PropertyWrite>>,
    events: Arc<EventBus>,
    /// When set, every client call fails as if the transport were down
    unreachable: AtomicBool,
}

impl LocalBus {
    pub fn new(service_name: impl Into<String>, events: Arc<EventBus>) -> Self {
        Self {
            service_name: service_name.into(),
            objects: RwLock::new(HashMap::new()),
            writes: RwLock::new(Vec::new()),
            events,
            unreachable: AtomicBool::new(false),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Register (or extend) an object owned by another service
    pub fn register_peer<I, K>(&self, service: &str, path: &str, interface: &str, properties: I)
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: Into<String>,
    {
        let mut objects = self.objects.write();
        let object = objects.entry(path.to_string()).or_default();
        object.service = service.to_string();
        let props = object.interfaces.entry(interface.to_string()).or_default();
        for (name, value) in properties {
            props.insert(name.into(), value);
        }
    }

    /// Read a property directly, bypassing service resolution
    pub fn property(&self, path: &str, interface: &str, property: &str) -> Option<PropertyValue> {
        self.objects
            .read()
            .get(path)
            .and_then(|o| o.interfaces.get(interface))
            .and_then(|props| props.get(property))
            .cloned()
    }

    pub fn has_object(&self, path: &str) -> bool {
        self.objects.read().contains_key(path)
    }

    /// Property writes issued by clients, oldest first
    pub fn writes(&self) -> Vec<PropertyWrite> {
        self.writes.read().clone()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(AppError::Bus("bus connection unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BusClient for LocalBus {
    async fn get_service(&self, path: &str, interface: &str) -> Result<String> {
        self.check_reachable()?;
        let objects = self.objects.read();
        objects
            .get(path)
            .filter(|o| o.interfaces.contains_key(interface))
            .map(|o| o.service.clone())
            .filter(|service| !service.is_empty())
            .ok_or_else(|| AppError::Lookup(format!("no service implements {} at {}", interface, path)))
    }

    async fn get_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue> {
        self.check_reachable()?;
        let objects = self.objects.read();
        let object = objects
            .get(path)
            .filter(|o| o.service == service)
            .ok_or_else(|| AppError::Lookup(format!("{} has no object {}", service, path)))?;
        object
            .interfaces
            .get(interface)
            .and_then(|props| props.get(property))
            .cloned()
            .ok_or_else(|| {
                AppError::Lookup(format!("{} has no property {}.{}", path, interface, property))
            })
    }

    async fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        property: &str,
        value: PropertyValue,
    ) -> Result<()> {
        self.check_reachable()?;
        {
            let mut objects = self.objects.write();
            let props = objects
                .get_mut(path)
                .filter(|o| o.service == service)
                .and_then(|o| o.interfaces.get_mut(interface))
                .ok_or_else(|| {
                    AppError::Lookup(format!("{} has no interface {} at {}", service, interface, path))
                })?;
            props.insert(property.to_string(), value.clone());
        }

        info!("Set {} {}.{} = {:?}", path, interface, property, value);
        self.writes.write().push(PropertyWrite {
            service: service.to_string(),
            path: path.to_string(),
            interface: interface.to_string(),
            property: property.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusSignal> {
        self.events.subscribe()
    }
}

impl ObjectServer for LocalBus {
    fn add_object(&self, path: &str, interface: &str) {
        let mut objects = self.objects.write();
        let object = objects.entry(path.to_string()).or_default();
        object.service = self.service_name.clone();
        object.interfaces.entry(interface.to_string()).or_default();
        debug!("Exported {} at {}", interface, path);
    }

    fn remove_object(&self, path: &str) {
        if self.objects.write().remove(path).is_some() {
            debug!("Removed object {}", path);
        }
    }

    fn publish_property(&self, path: &str, interface: &str, property: &str, value: PropertyValue) {
        {
            let mut objects = self.objects.write();
            let object = objects.entry(path.to_string()).or_default();
            if object.service.is_empty() {
                object.service = self.service_name.clone();
            }
            object
                .interfaces
                .entry(interface.to_string())
                .or_default()
                .insert(property.to_string(), value.clone());
        }

        self.events.publish(BusSignal::PropertyChanged {
            path: path.to_string(),
            interface: interface.to_string(),
            property: property.to_string(),
            value,
        });
    }

    fn emit(&self, signal: BusSignal) {
        self.events.publish(signal);
    }
}
