//! Host selector switch
//!
//! N lines form a bitmask: bit i follows line i, set while the line is low.
//! The raw value is looked up (as a decimal string) in the configured
//! `host_selector_map`; unmapped values never reach the `Position` property.
//! When the boot pattern is unmapped `Position` starts at the BMC position.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use super::ButtonBase;
use crate::bus::names::{BMC_POSITION, PROP_MAX_POSITION, PROP_POSITION};
use crate::error::{AppError, Result};
use crate::gpio::{Level, Line};

/// Only the low byte of the position is significant
const POSITION_MASK: u32 = 0xff;

/// Bitmask aggregation and position lookup
#[derive(Debug, Clone)]
pub struct HostSelectorDecoder {
    raw_position: u32,
    position_map: HashMap<String, u32>,
    max_position: u32,
}

impl HostSelectorDecoder {
    pub fn new(position_map: HashMap<String, u32>, max_position: u32) -> Self {
        Self {
            raw_position: 0,
            position_map,
            max_position,
        }
    }

    /// Build from the `host_selector_map` / `max_position` parameters
    ///
    /// `max_position` defaults to the largest mapped host.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let raw_map = params.get("host_selector_map").ok_or_else(|| {
            AppError::Config("HOST_SELECTOR: host_selector_map is missing".to_string())
        })?;
        let position_map: HashMap<String, u32> = serde_json::from_value(raw_map.clone())
            .map_err(|e| AppError::Config(format!("HOST_SELECTOR: bad host_selector_map: {}", e)))?;

        let max_position = match params.get("max_position") {
            None | Some(Value::Null) => position_map.values().copied().max().unwrap_or(0),
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    AppError::Config(format!("HOST_SELECTOR: bad max_position {}", value))
                })?,
        };

        Ok(Self::new(position_map, max_position))
    }

    pub fn raw_position(&self) -> u32 {
        self.raw_position
    }

    pub fn max_position(&self) -> u32 {
        self.max_position
    }

    /// Fold the level of line `index` into the raw position
    pub fn decode(&mut self, index: usize, level: Level) -> u32 {
        let bit = u32::try_from(index)
            .ok()
            .and_then(|i| 1u32.checked_shl(i))
            .unwrap_or(0)
            & POSITION_MASK;

        match level {
            Level::Low => self.raw_position |= bit,
            Level::High => self.raw_position &= !bit,
        }
        self.raw_position
    }

    /// Host index for a raw position, `None` when unmapped
    pub fn map_to_host(&self, raw_position: u32) -> Option<u32> {
        self.position_map.get(&raw_position.to_string()).copied()
    }
}

pub struct HostSelector {
    pub(super) base: ButtonBase,
    decoder: Mutex<HostSelectorDecoder>,
    published: Mutex<Option<u32>>,
}

impl HostSelector {
    /// Read every line's current level once and publish the boot position
    pub fn new(base: ButtonBase, params: &Map<String, Value>, lines: &[Line]) -> Result<Self> {
        let mut decoder = HostSelectorDecoder::from_params(params)?;
        base.publish(PROP_MAX_POSITION, decoder.max_position());

        for (index, line) in lines.iter().enumerate() {
            let level = line.level()?;
            decoder.decode(index, level);
        }

        let raw = decoder.raw_position();
        let mapped = decoder.map_to_host(raw);
        info!("HOST_SELECTOR: initial raw position {} -> {:?}", raw, mapped);

        let selector = Self {
            base,
            decoder: Mutex::new(decoder),
            published: Mutex::new(None),
        };
        let host = mapped.unwrap_or_else(|| {
            info!("HOST_SELECTOR: raw position {} is unmapped, starting at the BMC", raw);
            BMC_POSITION
        });
        selector.publish_position(host, true);
        Ok(selector)
    }

    /// Last published host position, always set once constructed
    pub fn position(&self) -> Option<u32> {
        *self.published.lock()
    }

    pub fn raw_position(&self) -> u32 {
        self.decoder.lock().raw_position()
    }

    /// Apply one edge. Returns the mapped host, `None` when the line is not
    /// ours or the new raw position is unmapped.
    pub fn handle_event(&self, asserted: bool, physical_name: &str) -> Option<u32> {
        let index = self.base.line_index(physical_name)?;
        let level = self.base.edge_policy(index).level_after(asserted);

        let (raw, mapped) = {
            let mut decoder = self.decoder.lock();
            let raw = decoder.decode(index, level);
            (raw, decoder.map_to_host(raw))
        };

        match mapped {
            Some(host) => self.publish_position(host, false),
            None => debug!("HOST_SELECTOR: raw position {} has no mapping", raw),
        }
        mapped
    }

    fn publish_position(&self, host: u32, force: bool) {
        let mut published = self.published.lock();
        if force || *published != Some(host) {
            *published = Some(host);
            drop(published);
            info!("HOST_SELECTOR: position {}", host);
            self.base.publish(PROP_POSITION, host);
        }
    }
}
