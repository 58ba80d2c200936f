//! Form factor → constructor table
//!
//! Assembled once at startup. Definitions whose name is not in the table
//! belong to other services and are skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{ButtonBase, ButtonModel, FormFactor, HostSelector, PowerButton, SimpleButton};
use crate::bus::ObjectServer;
use crate::config::ButtonConfig;
use crate::error::Result;
use crate::gpio::{Line, LineRegistry};

/// Shared collaborators handed to every constructor
#[derive(Clone)]
pub struct ButtonContext {
    pub server: Arc<dyn ObjectServer>,
    pub registry: Arc<LineRegistry>,
    pub long_press: Duration,
}

/// Builds one model from its exported base, configuration and open lines
pub type Constructor = fn(ButtonBase, &ButtonConfig, &[Line], &ButtonContext) -> Result<ButtonModel>;

/// A constructed model together with the lines still waiting to be watched
pub struct CreatedButton {
    pub model: Arc<ButtonModel>,
    pub lines: Vec<Line>,
}

pub struct ButtonFactory {
    table: HashMap<&'static str, (FormFactor, Constructor)>,
}

fn new_power(base: ButtonBase, _: &ButtonConfig, _: &[Line], ctx: &ButtonContext) -> Result<ButtonModel> {
    Ok(ButtonModel::Power(PowerButton::new(base, ctx.long_press)))
}

fn new_reset(base: ButtonBase, _: &ButtonConfig, _: &[Line], _: &ButtonContext) -> Result<ButtonModel> {
    Ok(ButtonModel::Reset(SimpleButton::new(base)))
}

fn new_identify(base: ButtonBase, _: &ButtonConfig, _: &[Line], _: &ButtonContext) -> Result<ButtonModel> {
    Ok(ButtonModel::Identify(SimpleButton::new(base)))
}

fn new_host_selector(
    base: ButtonBase,
    config: &ButtonConfig,
    lines: &[Line],
    _: &ButtonContext,
) -> Result<ButtonModel> {
    Ok(ButtonModel::HostSelector(HostSelector::new(
        base,
        &config.extra,
        lines,
    )?))
}

impl ButtonFactory {
    pub fn new() -> Self {
        let entries: [(FormFactor, Constructor); 4] = [
            (FormFactor::Power, new_power),
            (FormFactor::Reset, new_reset),
            (FormFactor::Identify, new_identify),
            (FormFactor::HostSelector, new_host_selector),
        ];
        Self {
            table: entries
                .into_iter()
                .map(|(ff, ctor)| (ff.config_name(), (ff, ctor)))
                .collect(),
        }
    }

    pub fn supports(&self, form_factor_name: &str) -> bool {
        self.table.contains_key(form_factor_name)
    }

    /// Open the lines of `config` and build its model
    ///
    /// Returns `Ok(None)` for unsupported form factors. On failure every line
    /// opened here is released again.
    pub fn create(&self, config: &ButtonConfig, ctx: &ButtonContext) -> Result<Option<CreatedButton>> {
        let Some((form_factor, ctor)) = self.table.get(config.form_factor_name.as_str()).copied() else {
            debug!("Skipping unsupported gpio definition {}", config.form_factor_name);
            return Ok(None);
        };

        // lines opened so far are released when `lines` drops on error
        let mut lines = Vec::with_capacity(config.lines.len());
        for line_config in &config.lines {
            lines.push(ctx.registry.open(line_config)?);
        }

        let base = ButtonBase::new(
            form_factor,
            lines.iter().map(Line::status).collect(),
            ctx.server.clone(),
            ctx.registry.clone(),
        );
        let model = ctor(base, config, &lines, ctx)?;

        info!(
            "{} configured with {} line(s)",
            config.form_factor_name,
            lines.len()
        );
        Ok(Some(CreatedButton {
            model: Arc::new(model),
            lines,
        }))
    }
}

impl Default for ButtonFactory {
    fn default() -> Self {
        Self::new()
    }
}
