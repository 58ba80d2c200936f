//! button-bridge - BMC button event bridge
//!
//! Watches the chassis button GPIO lines, turns edges into button signals
//! and routes power/reset presses to the selected host or chassis.

pub mod buttons;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod gpio;
pub mod handler;
pub mod service;
pub mod state;
pub mod web;

pub use error::{AppError, Result};
