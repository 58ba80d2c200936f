use std::sync::Arc;

use crate::bus::LocalBus;
use crate::events::EventBus;
use crate::service::ButtonService;

/// Application-wide state shared across handlers
pub struct AppState {
    /// Configured buttons and their watches
    pub buttons: Arc<ButtonService>,
    /// Bus the buttons are exported on
    pub bus: Arc<LocalBus>,
    /// Signal stream
    pub events: Arc<EventBus>,
}

impl AppState {
    pub fn new(
        buttons: Arc<ButtonService>,
        bus: Arc<LocalBus>,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            buttons,
            bus,
            events,
        })
    }
}
