//! GPIO character device backend
//!
//! Lines are located by their kernel name across every `/dev/gpiochip*`
//! and requested as inputs with both-edge events.

use async_trait::async_trait;
use futures::StreamExt;
use gpio_cdev::{AsyncLineEventHandle, EventRequestFlags, EventType, LineRequestFlags};
use tracing::{debug, info};

use super::{Edge, EdgeSource, GpioBackend, Level, LineConfig};
use crate::error::{AppError, Result};

const DEFAULT_CONSUMER: &str = "button-bridge";

/// Backend talking to the kernel through `gpio-cdev`
pub struct CdevBackend {
    consumer: String,
}

impl CdevBackend {
    pub fn new() -> Self {
        Self {
            consumer: DEFAULT_CONSUMER.to_string(),
        }
    }

    /// Find a line by its kernel name
    fn find_line(&self, name: &str) -> Result<Option<gpio_cdev::Line>> {
        let chips = gpio_cdev::chips()
            .map_err(|e| AppError::Config(format!("Failed to enumerate GPIO chips: {}", e)))?;

        for chip in chips {
            let chip = match chip {
                Ok(chip) => chip,
                Err(e) => {
                    debug!("Skipping unreadable GPIO chip: {}", e);
                    continue;
                }
            };

            for line in chip.lines() {
                let info = match line.info() {
                    Ok(info) => info,
                    Err(_) => continue,
                };
                if info.name() == Some(name) {
                    debug!(
                        "Found line {} on {} offset {}",
                        name,
                        chip.path().display(),
                        line.offset()
                    );
                    return Ok(Some(line));
                }
            }
        }

        Ok(None)
    }
}

impl Default for CdevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioBackend for CdevBackend {
    fn request(&self, config: &LineConfig) -> Result<Box<dyn EdgeSource>> {
        let line = self.find_line(&config.physical_name)?.ok_or_else(|| {
            AppError::Config(format!(
                "Failed to find the {} line for {}",
                config.physical_name, config.logical_name
            ))
        })?;

        let handle = line
            .events(
                LineRequestFlags::INPUT,
                EventRequestFlags::BOTH_EDGES,
                &self.consumer,
            )
            .map_err(|e| {
                AppError::hardware(
                    &config.logical_name,
                    format!("Failed to request events: {}", e),
                )
            })?;

        let events = AsyncLineEventHandle::new(handle).map_err(|e| {
            AppError::hardware(
                &config.logical_name,
                format!("Failed to register event fd: {}", e),
            )
        })?;

        info!("Button GPIO configured: {}", config.logical_name);

        Ok(Box::new(CdevEdgeSource {
            name: config.logical_name.clone(),
            events,
        }))
    }
}

struct CdevEdgeSource {
    name: String,
    events: AsyncLineEventHandle,
}

#[async_trait]
impl EdgeSource for CdevEdgeSource {
    fn level(&self) -> Result<Level> {
        let value = self
            .events
            .as_ref()
            .get_value()
            .map_err(|e| AppError::hardware(&self.name, format!("GPIO read failed: {}", e)))?;
        Ok(Level::from_raw(value))
    }

    async fn next_edge(&mut self) -> Result<Edge> {
        match self.events.next().await {
            Some(Ok(event)) => Ok(match event.event_type() {
                EventType::RisingEdge => Edge::Rising,
                EventType::FallingEdge => Edge::Falling,
            }),
            Some(Err(e)) => Err(AppError::hardware(
                &self.name,
                format!("fd handler error: {}", e),
            )),
            None => Err(AppError::hardware(&self.name, "event stream closed")),
        }
    }
}
