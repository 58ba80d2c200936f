//! Button models
//!
//! One model per configured form factor. Every model owns its lines (through
//! the registry), exports one bus object and turns raw `(asserted, line)`
//! callbacks into button signals:
//!
//! | Form factor     | Config name     | Signals / properties                    |
//! |-----------------|-----------------|-----------------------------------------|
//! | Power           | `POWER_BUTTON`  | `Pressed`, `Released(us)`, `PressedLong`|
//! | Reset           | `RESET_BUTTON`  | `Pressed`, `Released`                   |
//! | Identify        | `ID_BTN`        | `Pressed`, `Released`                   |
//! | Host selector   | `HOST_SELECTOR` | `Position`, `MaxPosition`               |

mod factory;
mod host_selector;
mod power;

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::bus::names::*;
use crate::bus::{BusSignal, ObjectServer};
use crate::error::{AppError, Result};
use crate::gpio::{EdgePolicy, LineRegistry, LineStatus};

pub use factory::{ButtonContext, ButtonFactory, Constructor, CreatedButton};
pub use host_selector::{HostSelector, HostSelectorDecoder};
pub use power::{classify, PowerButton, PowerTiming, PressOutcome};

/// Supported button form factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFactor {
    Power,
    Reset,
    Identify,
    HostSelector,
}

impl FormFactor {
    pub const ALL: [FormFactor; 4] = [
        FormFactor::Power,
        FormFactor::Reset,
        FormFactor::Identify,
        FormFactor::HostSelector,
    ];

    /// Name used in `gpio_defs.json`
    pub fn config_name(self) -> &'static str {
        match self {
            Self::Power => "POWER_BUTTON",
            Self::Reset => "RESET_BUTTON",
            Self::Identify => "ID_BTN",
            Self::HostSelector => "HOST_SELECTOR",
        }
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ff| ff.config_name() == name)
    }

    /// Short name used by the diagnostic surface
    pub fn slug(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Reset => "reset",
            Self::Identify => "id",
            Self::HostSelector => "host-selector",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ff| ff.slug() == slug)
    }

    pub fn object_path(self) -> &'static str {
        match self {
            Self::Power => POWER_BUTTON_PATH,
            Self::Reset => RESET_BUTTON_PATH,
            Self::Identify => ID_BUTTON_PATH,
            Self::HostSelector => HOST_SELECTOR_PATH,
        }
    }

    pub fn interface(self) -> &'static str {
        match self {
            Self::Power => POWER_BUTTON_IFACE,
            Self::Reset => RESET_BUTTON_IFACE,
            Self::Identify => ID_BUTTON_IFACE,
            Self::HostSelector => HOST_SELECTOR_IFACE,
        }
    }
}

/// State shared by every form factor: lines, exported object, registry
pub struct ButtonBase {
    form_factor: FormFactor,
    lines: Vec<LineStatus>,
    server: Arc<dyn ObjectServer>,
    registry: Arc<LineRegistry>,
}

impl ButtonBase {
    /// Export the button object; lines must already be open
    pub fn new(
        form_factor: FormFactor,
        lines: Vec<LineStatus>,
        server: Arc<dyn ObjectServer>,
        registry: Arc<LineRegistry>,
    ) -> Self {
        server.add_object(form_factor.object_path(), form_factor.interface());
        Self {
            form_factor,
            lines,
            server,
            registry,
        }
    }

    pub fn form_factor(&self) -> FormFactor {
        self.form_factor
    }

    pub fn lines(&self) -> &[LineStatus] {
        &self.lines
    }

    pub fn line_index(&self, physical_name: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.config.physical_name == physical_name)
    }

    pub fn edge_policy(&self, index: usize) -> EdgePolicy {
        self.lines
            .get(index)
            .map(|l| l.config.edge_policy)
            .unwrap_or_default()
    }

    fn path(&self) -> String {
        self.form_factor.object_path().to_string()
    }

    pub(crate) fn emit_pressed(&self) {
        self.server.emit(BusSignal::Pressed { path: self.path() });
    }

    pub(crate) fn emit_released(&self, elapsed_us: Option<u64>) {
        self.server.emit(BusSignal::Released {
            path: self.path(),
            elapsed_us,
        });
    }

    pub(crate) fn emit_pressed_long(&self) {
        self.server.emit(BusSignal::PressedLong { path: self.path() });
    }

    pub(crate) fn publish(&self, property: &str, value: impl Into<crate::bus::PropertyValue>) {
        self.server.publish_property(
            self.form_factor.object_path(),
            self.form_factor.interface(),
            property,
            value.into(),
        );
    }

    /// Release the lines and withdraw the object. Safe to call repeatedly.
    pub fn deinit(&self) {
        for line in &self.lines {
            self.registry.close_one(&line.config.physical_name);
        }
        self.server.remove_object(self.form_factor.object_path());
    }
}

impl Drop for ButtonBase {
    fn drop(&mut self) {
        self.deinit();
    }
}

/// Reset and identify buttons: plain press/release
pub struct SimpleButton {
    base: ButtonBase,
}

impl SimpleButton {
    pub fn new(base: ButtonBase) -> Self {
        Self { base }
    }

    pub fn handle_event(&self, asserted: bool) {
        let name = self.base.form_factor.config_name();
        if asserted {
            debug!("{}: pressed", name);
            self.base.emit_pressed();
        } else {
            debug!("{}: released", name);
            self.base.emit_released(None);
        }
    }
}

/// A configured button, one variant per form factor
pub enum ButtonModel {
    Power(PowerButton),
    Reset(SimpleButton),
    Identify(SimpleButton),
    HostSelector(HostSelector),
}

/// Snapshot of a line for the diagnostic surface
#[derive(Debug, Clone, Serialize)]
pub struct LineView {
    pub logical_name: String,
    pub physical_name: String,
    pub edge_policy: EdgePolicy,
    pub watch_active: bool,
}

/// Snapshot of a button for the diagnostic surface
#[derive(Debug, Clone, Serialize)]
pub struct ButtonStatus {
    pub form_factor: FormFactor,
    pub name: &'static str,
    pub object_path: &'static str,
    pub lines: Vec<LineView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl ButtonModel {
    fn base(&self) -> &ButtonBase {
        match self {
            Self::Power(b) => &b.base,
            Self::Reset(b) | Self::Identify(b) => &b.base,
            Self::HostSelector(b) => &b.base,
        }
    }

    pub fn form_factor(&self) -> FormFactor {
        self.base().form_factor
    }

    pub fn lines(&self) -> &[LineStatus] {
        self.base().lines()
    }

    /// Interpret one edge callback
    pub fn handle_event(&self, asserted: bool, physical_name: &str) {
        match self {
            Self::Power(b) => b.handle_event(asserted),
            Self::Reset(b) | Self::Identify(b) => b.handle_event(asserted),
            Self::HostSelector(b) => {
                b.handle_event(asserted, physical_name);
            }
        }
    }

    /// Emit `Pressed` without touching any timing state
    pub fn simulate_press(&self) -> Result<()> {
        match self {
            Self::Power(b) => b.simulate_press(),
            Self::Reset(b) | Self::Identify(b) => b.base.emit_pressed(),
            Self::HostSelector(_) => {
                return Err(AppError::BadRequest(
                    "host selector has no press semantics".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Emit `PressedLong`; only meaningful for the power button
    pub fn simulate_long_press(&self) -> Result<()> {
        match self {
            Self::Power(b) => {
                b.simulate_long_press();
                Ok(())
            }
            other => Err(AppError::BadRequest(format!(
                "{} does not support long press",
                other.form_factor().config_name()
            ))),
        }
    }

    pub fn deinit(&self) {
        self.base().deinit();
    }

    pub fn status(&self) -> ButtonStatus {
        let base = self.base();
        let (pressed, position) = match self {
            Self::Power(b) => (Some(b.is_pressed()), None),
            Self::HostSelector(b) => (None, b.position()),
            _ => (None, None),
        };

        ButtonStatus {
            form_factor: base.form_factor,
            name: base.form_factor.config_name(),
            object_path: base.form_factor.object_path(),
            lines: base
                .lines
                .iter()
                .map(|l| LineView {
                    logical_name: l.config.logical_name.clone(),
                    physical_name: l.config.physical_name.clone(),
                    edge_policy: l.config.edge_policy,
                    watch_active: l.watch_active(),
                })
                .collect(),
            pressed,
            position,
        }
    }
}
