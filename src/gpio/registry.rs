//! Process-wide registry of open button lines
//!
//! Every line requested by any button goes through one [`LineRegistry`], so a
//! fatal error on one line can release all of them at once. Closing a line
//! cancels its watch. The entry stays until the [`Line`] holding the hardware
//! handle is dropped, so a physical line cannot be reopened while the old
//! handle is still live.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{GpioBackend, Line, LineConfig};
use crate::error::{AppError, Result};

struct OpenLine {
    logical_name: String,
    cancel: CancellationToken,
}

type OpenLines = Mutex<HashMap<String, OpenLine>>;

/// Registry entry owned by a [`Line`]; dropping it forgets the line
pub(crate) struct LineLease {
    open: Weak<OpenLines>,
    physical_name: String,
}

impl Drop for LineLease {
    fn drop(&mut self) {
        let Some(open) = self.open.upgrade() else {
            return;
        };
        if let Some(line) = open.lock().remove(&self.physical_name) {
            debug!("Closed line {} ({})", self.physical_name, line.logical_name);
        };
    }
}

/// Registry of open lines, keyed by physical line name
pub struct LineRegistry {
    backend: Arc<dyn GpioBackend>,
    open: Arc<OpenLines>,
}

impl LineRegistry {
    pub fn new(backend: Arc<dyn GpioBackend>) -> Self {
        Self {
            backend,
            open: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open a line for edge events
    ///
    /// Fails with `ResourceBusy` when the physical line is already open, or
    /// was closed but its handle has not been dropped yet, and with `Config`
    /// when the backend cannot find it.
    pub fn open(&self, config: &LineConfig) -> Result<Line> {
        let mut open = self.open.lock();

        if let Some(existing) = open.get(&config.physical_name) {
            let state = if existing.cancel.is_cancelled() {
                "closing, still held by"
            } else {
                "already held by"
            };
            return Err(AppError::ResourceBusy(format!(
                "line {} requested by {} is {} {}",
                config.physical_name, config.logical_name, state, existing.logical_name
            )));
        }

        let source = self.backend.request(config)?;
        let cancel = CancellationToken::new();
        open.insert(
            config.physical_name.clone(),
            OpenLine {
                logical_name: config.logical_name.clone(),
                cancel: cancel.clone(),
            },
        );
        let lease = LineLease {
            open: Arc::downgrade(&self.open),
            physical_name: config.physical_name.clone(),
        };

        debug!(
            "Opened line {} for {}",
            config.physical_name, config.logical_name
        );
        Ok(Line::new(config.clone(), source, lease, cancel))
    }

    /// Release one line. No-op if it is not open or already closing.
    pub fn close_one(&self, physical_name: &str) {
        let open = self.open.lock();
        if let Some(line) = open.get(physical_name) {
            if !line.cancel.is_cancelled() {
                line.cancel.cancel();
                info!("Released the {} line", line.logical_name);
            }
        }
    }

    /// Release every open line
    pub fn close_all(&self) {
        let open = self.open.lock();
        let mut pending = open
            .values()
            .filter(|line| !line.cancel.is_cancelled())
            .peekable();
        if pending.peek().is_none() {
            return;
        }

        info!("Closing all button gpio lines");
        for line in pending {
            line.cancel.cancel();
            info!("Released the {} line", line.logical_name);
        }
    }

    /// Whether the physical line has a live handle
    pub fn is_open(&self, physical_name: &str) -> bool {
        self.open.lock().contains_key(physical_name)
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }
}
