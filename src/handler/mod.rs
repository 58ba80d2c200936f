//! Button signal handler
//!
//! Subscribes to the button signals and turns them into host/chassis
//! transitions (through the [`Router`]) or an identify LED toggle. Only
//! buttons whose object was discoverable when the handler was built are
//! acted on. Errors are logged per signal and never end the loop.

mod router;

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buttons::FormFactor;
use crate::bus::names::*;
use crate::bus::{BusClient, BusSignal};
use crate::config::ServiceSettings;
use crate::error::{AppError, Result};

pub use router::{PowerEvent, Router, RoutingDecision, Transition};

pub struct SignalHandler {
    bus: Arc<dyn BusClient>,
    router: Router,
    led_group_path: String,
    registered: HashSet<FormFactor>,
}

impl SignalHandler {
    /// Probe which buttons are present and build the handler
    pub async fn new(bus: Arc<dyn BusClient>, settings: &ServiceSettings) -> Self {
        let mut registered = HashSet::new();
        for ff in [FormFactor::Power, FormFactor::Reset, FormFactor::Identify] {
            match bus.get_service(ff.object_path(), ff.interface()).await {
                Ok(_) => {
                    info!("Registering {} button handler", ff.slug());
                    registered.insert(ff);
                }
                Err(e) => debug!("{} button not implemented: {}", ff.slug(), e),
            }
        }

        let sled_cycle = settings.sled_cycle_enabled && cfg!(feature = "chassis-system-reset");
        Self {
            router: Router::new(bus.clone(), sled_cycle),
            bus,
            led_group_path: led_group_path(&settings.id_led_group),
            registered,
        }
    }

    pub fn is_registered(&self, form_factor: FormFactor) -> bool {
        self.registered.contains(&form_factor)
    }

    /// Act on one signal, logging any failure
    pub async fn dispatch(&self, signal: &BusSignal) {
        let path = signal.path();
        let form_factor = FormFactor::ALL
            .into_iter()
            .find(|ff| ff.object_path() == path);
        let Some(form_factor) = form_factor.filter(|ff| self.is_registered(*ff)) else {
            return;
        };

        match (form_factor, signal) {
            (FormFactor::Power, BusSignal::Released { .. }) => {
                if let Err(e) = self.router.route(PowerEvent::PowerReleased).await {
                    error!("Failed power state change on a power button press: {}", e);
                }
            }
            (FormFactor::Power, BusSignal::PressedLong { .. }) => {
                if let Err(e) = self.router.route(PowerEvent::PowerLongPressed).await {
                    error!("Failed powering off on long power button press: {}", e);
                }
            }
            (FormFactor::Reset, BusSignal::Released { .. }) => {
                if let Err(e) = self.router.route(PowerEvent::ResetReleased).await {
                    error!("Failed power state change on a reset button press: {}", e);
                }
            }
            (FormFactor::Identify, BusSignal::Released { .. }) => {
                if let Err(e) = self.toggle_id_led().await {
                    error!("Error toggling ID LED group on ID button press: {}", e);
                }
            }
            _ => {}
        }
    }

    /// Flip the identify LED group
    ///
    /// Returns the new state, or `None` when the group does not exist.
    pub async fn toggle_id_led(&self) -> Result<Option<bool>> {
        let service = match self.bus.get_service(&self.led_group_path, LED_GROUP_IFACE).await {
            Ok(service) => service,
            Err(AppError::Lookup(_)) => {
                info!("No {} found during ID button press", self.led_group_path);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let current = self
            .bus
            .get_property(&service, &self.led_group_path, LED_GROUP_IFACE, PROP_ASSERTED)
            .await?;
        let state = !current.as_bool().ok_or_else(|| {
            AppError::Lookup(format!("unexpected {} value {:?}", PROP_ASSERTED, current))
        })?;

        info!(
            "Changing ID LED group state on ID button press, group {} state {}",
            self.led_group_path, state
        );
        self.bus
            .set_property(
                &service,
                &self.led_group_path,
                LED_GROUP_IFACE,
                PROP_ASSERTED,
                state.into(),
            )
            .await?;
        Ok(Some(state))
    }

    /// Dispatch signals until cancelled or the bus goes away
    pub async fn run(self, mut rx: broadcast::Receiver<BusSignal>, cancel: CancellationToken) {
        loop {
            let signal = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                signal = rx.recv() => signal,
            };

            match signal {
                Ok(signal) => self.dispatch(&signal).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Signal handler lagged, {} signals dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Signal handler stopped");
    }
}
