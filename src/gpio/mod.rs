//! Button line handling
//!
//! Owns everything that touches the GPIO character device:
//!
//! - [`LineRegistry`] tracks every open line so all of them can be released together
//! - [`spawn_watch`] runs the per-line edge loop and feeds a handler closure
//! - [`CdevBackend`] finds and requests lines by name via `/dev/gpiochip*`
//!
//! Lines are always requested for both edges. Which edge counts as "asserted"
//! is a per-line [`EdgePolicy`]; the default is falling edge = pressed.

mod cdev;
mod registry;
#[cfg(test)]
pub(crate) mod sim;
mod watch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use cdev::CdevBackend;
use registry::LineLease;
pub use registry::LineRegistry;
pub use watch::{spawn_watch, EdgeHandler};

/// Observed edge on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Electrical level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn from_raw(value: u8) -> Self {
        if value == 0 {
            Self::Low
        } else {
            Self::High
        }
    }
}

/// Which edge means "button asserted"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    RisingAsserted,
    FallingAsserted,
}

impl Default for EdgePolicy {
    fn default() -> Self {
        Self::FallingAsserted
    }
}

impl EdgePolicy {
    /// Parse the `direction` field of a gpio definition.
    ///
    /// Case-insensitive; only `"rising"` selects rising edge, everything else
    /// (including an empty string) falls back to falling edge.
    pub fn from_direction(direction: &str) -> Self {
        if direction.trim().eq_ignore_ascii_case("rising") {
            Self::RisingAsserted
        } else {
            Self::FallingAsserted
        }
    }

    pub fn is_asserted(self, edge: Edge) -> bool {
        matches!(
            (self, edge),
            (Self::RisingAsserted, Edge::Rising) | (Self::FallingAsserted, Edge::Falling)
        )
    }

    /// Level the line sits at right after an edge of the given assertion
    pub fn level_after(self, asserted: bool) -> Level {
        match (self, asserted) {
            (Self::FallingAsserted, true) | (Self::RisingAsserted, false) => Level::Low,
            (Self::FallingAsserted, false) | (Self::RisingAsserted, true) => Level::High,
        }
    }
}

/// Static description of one button line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineConfig {
    /// Logical button name (e.g. `POWER_BUTTON`, `HOST_SELECTOR_BIT0`)
    pub logical_name: String,
    /// Kernel line name used to locate the line
    pub physical_name: String,
    pub edge_policy: EdgePolicy,
}

impl LineConfig {
    pub fn new(
        logical_name: impl Into<String>,
        physical_name: impl Into<String>,
        edge_policy: EdgePolicy,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            physical_name: physical_name.into(),
            edge_policy,
        }
    }
}

/// Source of edge events for a single requested line
#[async_trait]
pub trait EdgeSource: Send {
    /// Sample the current level without consuming an event
    fn level(&self) -> Result<Level>;

    /// Wait for the next edge
    ///
    /// An error means the line is no longer usable.
    async fn next_edge(&mut self) -> Result<Edge>;
}

/// Hardware access used by the [`LineRegistry`]
pub trait GpioBackend: Send + Sync {
    /// Locate and request a line for edge events.
    ///
    /// Fails with a configuration error when no line with that name exists.
    fn request(&self, config: &LineConfig) -> Result<Box<dyn EdgeSource>>;
}

/// Shared view of a line that survives after its source moved into a watch
#[derive(Debug, Clone)]
pub struct LineStatus {
    pub config: LineConfig,
    watch_active: Arc<AtomicBool>,
}

impl LineStatus {
    pub fn watch_active(&self) -> bool {
        self.watch_active.load(Ordering::Relaxed)
    }
}

/// An open line, as handed out by [`LineRegistry::open`]
///
/// Dropping it closes the hardware handle, then frees the registry entry.
pub struct Line {
    config: LineConfig,
    source: Box<dyn EdgeSource>,
    // declared after `source` so the handle is gone before the entry
    lease: LineLease,
    cancel: CancellationToken,
    watch_active: Arc<AtomicBool>,
}

impl Line {
    pub(crate) fn new(
        config: LineConfig,
        source: Box<dyn EdgeSource>,
        lease: LineLease,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            source,
            lease,
            cancel,
            watch_active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    pub fn physical_name(&self) -> &str {
        &self.config.physical_name
    }

    /// Current static level of the line
    pub fn level(&self) -> Result<Level> {
        self.source.level()
    }

    pub fn status(&self) -> LineStatus {
        LineStatus {
            config: self.config.clone(),
            watch_active: self.watch_active.clone(),
        }
    }
}
