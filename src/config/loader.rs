use std::path::Path;
use tracing::{debug, info};

use super::GpioDefs;
use crate::error::{AppError, Result};

/// Platform location of the button wiring
pub const DEFAULT_CONFIG_PATH: &str = "/etc/default/obmc/gpio/gpio_defs.json";

/// Load and parse `gpio_defs.json`
///
/// Read and parse failures are configuration errors; the service cannot
/// start without its wiring.
pub async fn load(path: &Path) -> Result<GpioDefs> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let defs: GpioDefs = serde_json::from_str(&raw)
        .map_err(|e| AppError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!(
        "Loaded {} gpio definitions from {}",
        defs.gpio_definitions.len(),
        path.display()
    );
    debug!("Service settings: {:?}", defs.settings);
    Ok(defs)
}
