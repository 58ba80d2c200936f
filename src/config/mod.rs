//! Configuration
//!
//! Button wiring comes from the platform `gpio_defs.json`; service settings
//! live in an optional `settings` object in the same file.

mod loader;
mod schema;

pub use loader::{load, DEFAULT_CONFIG_PATH};
pub use schema::{
    ButtonConfig, GpioDefinition, GpioDefs, GroupGpioConfig, ServiceSettings, WebSettings,
    DEFAULT_ID_LED_GROUP, DEFAULT_LONG_PRESS_MS,
};
