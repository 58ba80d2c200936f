use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::gpio::{EdgePolicy, LineConfig};

/// Default long-press threshold in milliseconds
pub const DEFAULT_LONG_PRESS_MS: u64 = 3000;

/// LED group toggled by the identify button
pub const DEFAULT_ID_LED_GROUP: &str = "enclosure_identify";

/// Root of `gpio_defs.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioDefs {
    pub gpio_definitions: Vec<GpioDefinition>,
    /// Service settings
    pub settings: ServiceSettings,
}

/// One entry of `gpio_definitions`
///
/// Either a single line (`gpio_name` + `direction`) or a group
/// (`group_gpio_config`). Unrecognised keys (host selector map, max
/// position, keys used by other services) are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioDefinition {
    /// Form factor name, e.g. `POWER_BUTTON`
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_gpio_config: Option<Vec<GroupGpioConfig>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of a grouped definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupGpioConfig {
    pub name: String,
    pub gpio_name: String,
    #[serde(default)]
    pub direction: String,
}

impl GpioDefinition {
    /// Build the button configuration, resolving single vs grouped lines
    pub fn to_button_config(&self) -> Result<ButtonConfig> {
        let lines = match (&self.group_gpio_config, &self.gpio_name) {
            (Some(group), _) => {
                if group.is_empty() {
                    return Err(AppError::Config(format!(
                        "{}: group_gpio_config is empty",
                        self.name
                    )));
                }
                group
                    .iter()
                    .map(|g| {
                        LineConfig::new(&g.name, &g.gpio_name, EdgePolicy::from_direction(&g.direction))
                    })
                    .collect()
            }
            (None, Some(gpio_name)) => vec![LineConfig::new(
                &self.name,
                gpio_name,
                EdgePolicy::from_direction(self.direction.as_deref().unwrap_or_default()),
            )],
            (None, None) => {
                return Err(AppError::Config(format!(
                    "{}: neither gpio_name nor group_gpio_config given",
                    self.name
                )))
            }
        };

        Ok(ButtonConfig {
            form_factor_name: self.name.clone(),
            lines,
            extra: self.extra.clone(),
        })
    }
}

/// Everything a button model needs from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonConfig {
    pub form_factor_name: String,
    /// Ordered; for a host selector, index i is bit i of the position
    pub lines: Vec<LineConfig>,
    /// Form-factor specific parameters
    pub extra: Map<String, Value>,
}

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Power button hold time above which a release counts as long press
    pub long_press_ms: u64,
    /// Long press with the BMC selected power-cycles the sled
    pub sled_cycle_enabled: bool,
    /// LED group toggled on identify button release
    pub id_led_group: String,
    /// Diagnostic HTTP surface
    pub web: WebSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            sled_cycle_enabled: cfg!(feature = "chassis-system-reset"),
            id_led_group: DEFAULT_ID_LED_GROUP.to_string(),
            web: WebSettings::default(),
        }
    }
}

impl ServiceSettings {
    pub fn long_press_threshold(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

/// Diagnostic HTTP surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub enabled: bool,
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            http_port: 8089,
        }
    }
}
