//! Button service
//!
//! Builds one model per supported `gpio_defs.json` entry, spawns a watch per
//! line and supervises the watches. The first fatal watch error releases
//! every line and ends [`ButtonService::run`].

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::buttons::{ButtonContext, ButtonFactory, ButtonModel, CreatedButton, FormFactor};
use crate::bus::ObjectServer;
use crate::config::{GpioDefs, ServiceSettings};
use crate::error::{AppError, Result};
use crate::gpio::{spawn_watch, EdgeHandler, GpioBackend, LineRegistry};

pub struct ButtonService {
    registry: Arc<LineRegistry>,
    models: Vec<Arc<ButtonModel>>,
    watches: Mutex<JoinSet<Result<()>>>,
    shutdown: CancellationToken,
}

impl ButtonService {
    /// Configure every supported button and start watching its lines
    ///
    /// Any configuration or resource error aborts startup with all lines
    /// released. Must be called from within a tokio runtime.
    pub fn start(
        defs: &GpioDefs,
        backend: Arc<dyn GpioBackend>,
        server: Arc<dyn ObjectServer>,
        settings: &ServiceSettings,
    ) -> Result<Self> {
        let registry = Arc::new(LineRegistry::new(backend));
        let ctx = ButtonContext {
            server,
            registry: registry.clone(),
            long_press: settings.long_press_threshold(),
        };

        let created = match Self::create_all(defs, &ctx) {
            Ok(created) => created,
            Err(e) => {
                registry.close_all();
                return Err(e);
            }
        };

        let mut watches = JoinSet::new();
        let mut models = Vec::with_capacity(created.len());
        for CreatedButton { model, lines } in created {
            let weak = Arc::downgrade(&model);
            for line in lines {
                let weak = weak.clone();
                let handler: EdgeHandler = Box::new(move |asserted, physical_name| {
                    let model = weak
                        .upgrade()
                        .ok_or_else(|| AppError::hardware(physical_name, "button model released"))?;
                    model.handle_event(asserted, physical_name);
                    Ok(())
                });
                spawn_watch(&mut watches, registry.clone(), line, handler);
            }
            models.push(model);
        }

        info!(
            "Button service started: {} button(s), {} line(s)",
            models.len(),
            registry.open_count()
        );
        Ok(Self {
            registry,
            models,
            watches: Mutex::new(watches),
            shutdown: CancellationToken::new(),
        })
    }

    fn create_all(defs: &GpioDefs, ctx: &ButtonContext) -> Result<Vec<CreatedButton>> {
        let factory = ButtonFactory::new();
        let mut seen = HashSet::new();
        let mut created = Vec::new();

        for def in &defs.gpio_definitions {
            if !factory.supports(&def.name) {
                debug!("Skipping gpio definition {}", def.name);
                continue;
            }
            if !seen.insert(def.name.as_str()) {
                return Err(AppError::Config(format!("{} is defined more than once", def.name)));
            }

            let config = def.to_button_config()?;
            if let Some(button) = factory.create(&config, ctx)? {
                created.push(button);
            }
        }
        Ok(created)
    }

    pub fn models(&self) -> &[Arc<ButtonModel>] {
        &self.models
    }

    pub fn model(&self, form_factor: FormFactor) -> Option<&Arc<ButtonModel>> {
        self.models.iter().find(|m| m.form_factor() == form_factor)
    }

    pub fn registry(&self) -> &Arc<LineRegistry> {
        &self.registry
    }

    /// Supervise the watches until shutdown or the first fatal error
    ///
    /// Every watch task has exited, and so every line handle is dropped, by
    /// the time this returns.
    pub async fn run(&self) -> Result<()> {
        let mut watches = self.watches.lock().await;
        let result = loop {
            let joined = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break Ok(()),
                joined = watches.join_next() => joined,
            };

            match joined {
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => {
                    error!("Button watch failed, stopping: {}", e);
                    break Err(e);
                }
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => {
                    error!("Button watch task panicked: {}", e);
                    break Err(AppError::hardware("watch", e));
                }
                // Nothing left to watch; idle until asked to stop
                None => {
                    self.shutdown.cancelled().await;
                    break Ok(());
                }
            }
        };

        if result.is_err() {
            self.registry.close_all();
        }
        watches.shutdown().await;
        result
    }

    /// Release every line and withdraw the button objects
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("Shutting down button service");
        self.shutdown.cancel();
        for model in &self.models {
            model.deinit();
        }
        self.registry.close_all();
    }

    /// [`shutdown`](Self::shutdown), then wait until every line handle is dropped
    pub async fn stop(&self) {
        self.shutdown();
        self.watches.lock().await.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::names::*;
    use crate::bus::{BusClient, BusSignal, LocalBus, PropertyValue};
    use crate::events::EventBus;
    use crate::gpio::sim::SimBackend;
    use crate::gpio::{Edge, Level};
    use crate::handler::{PowerEvent, Router, Transition};
    use std::time::Duration;
    use tokio::sync::broadcast;

    const LINES: &[&str] = &["power-btn", "reset-btn", "hs-bit0", "hs-bit1", "hs-bit2", "nmi-btn"];

    fn defs(json: serde_json::Value) -> GpioDefs {
        serde_json::from_value(json).unwrap()
    }

    fn platform() -> GpioDefs {
        defs(serde_json::json!({
            "gpio_definitions": [
                { "name": "POWER_BUTTON", "gpio_name": "power-btn", "direction": "falling" },
                { "name": "RESET_BUTTON", "gpio_name": "reset-btn", "direction": "falling" },
                { "name": "NMI_BUTTON", "gpio_name": "nmi-btn", "direction": "falling" },
                {
                    "name": "HOST_SELECTOR",
                    "host_selector_map": { "1": 2, "6": 1 },
                    "group_gpio_config": [
                        { "name": "HOST_SELECTOR_BIT0", "gpio_name": "hs-bit0", "direction": "falling" },
                        { "name": "HOST_SELECTOR_BIT1", "gpio_name": "hs-bit1", "direction": "falling" },
                        { "name": "HOST_SELECTOR_BIT2", "gpio_name": "hs-bit2", "direction": "falling" }
                    ]
                }
            ]
        }))
    }

    struct Harness {
        backend: Arc<SimBackend>,
        bus: Arc<LocalBus>,
        rx: broadcast::Receiver<BusSignal>,
    }

    impl Harness {
        fn new() -> Self {
            let backend = SimBackend::new(LINES);
            // boot pattern [low, high, high] -> raw 1
            backend.set_level("hs-bit0", Level::Low);
            let bus = Arc::new(LocalBus::new(BUS_NAME, Arc::new(EventBus::new())));
            let rx = bus.subscribe();
            Self { backend, bus, rx }
        }

        fn start(&self, defs: &GpioDefs) -> Result<ButtonService> {
            ButtonService::start(
                defs,
                self.backend.clone(),
                self.bus.clone(),
                &ServiceSettings::default(),
            )
        }

        fn next(&mut self) -> Option<BusSignal> {
            self.rx.try_recv().ok()
        }

        /// Next non-property signal
        fn next_button_signal(&mut self) -> Option<BusSignal> {
            loop {
                match self.next()? {
                    BusSignal::PropertyChanged { .. } => continue,
                    signal => return Some(signal),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_start_configures_supported_buttons() {
        let h = Harness::new();
        let service = h.start(&platform()).unwrap();

        assert_eq!(service.models().len(), 3);
        assert!(service.model(FormFactor::Identify).is_none());
        assert_eq!(service.registry().open_count(), 5);
        assert!(!service.registry().is_open("nmi-btn"));

        assert!(h.bus.get_service(POWER_BUTTON_PATH, POWER_BUTTON_IFACE).await.is_ok());
        assert_eq!(
            h.bus.property(HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE, PROP_POSITION),
            Some(PropertyValue::from(2u32))
        );
        assert_eq!(
            h.bus.property(HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE, PROP_MAX_POSITION),
            Some(PropertyValue::from(2u32))
        );

        h.backend.settle().await;
        let power = service.model(FormFactor::Power).unwrap();
        assert!(power.lines().iter().all(|l| l.watch_active()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_press_end_to_end() {
        let mut h = Harness::new();
        let _service = h.start(&platform()).unwrap();
        h.backend.settle().await;

        h.backend.edge("power-btn", Edge::Falling);
        h.backend.settle().await;
        tokio::time::advance(Duration::from_millis(100)).await;
        h.backend.edge("power-btn", Edge::Rising);
        h.backend.settle().await;

        assert_eq!(
            h.next_button_signal(),
            Some(BusSignal::Pressed {
                path: POWER_BUTTON_PATH.to_string()
            })
        );
        assert_eq!(
            h.next_button_signal(),
            Some(BusSignal::Released {
                path: POWER_BUTTON_PATH.to_string(),
                elapsed_us: Some(100_000)
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_press_end_to_end() {
        let mut h = Harness::new();
        let _service = h.start(&platform()).unwrap();
        h.backend.settle().await;

        h.backend.edge("power-btn", Edge::Falling);
        h.backend.settle().await;
        tokio::time::advance(Duration::from_millis(3001)).await;
        h.backend.edge("power-btn", Edge::Rising);
        h.backend.settle().await;

        assert!(matches!(h.next_button_signal(), Some(BusSignal::Pressed { .. })));
        assert_eq!(
            h.next_button_signal(),
            Some(BusSignal::PressedLong {
                path: POWER_BUTTON_PATH.to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_host_selector_edges_update_position() {
        let h = Harness::new();
        let service = h.start(&platform()).unwrap();
        h.backend.settle().await;

        // [low, low, high] -> raw 3, unmapped
        h.backend.edge("hs-bit1", Edge::Falling);
        h.backend.settle().await;
        let selector = service.model(FormFactor::HostSelector).unwrap();
        assert_eq!(selector.status().position, Some(2));

        // [high, low, low] -> raw 6 -> host 1
        h.backend.edge("hs-bit0", Edge::Rising);
        h.backend.edge("hs-bit2", Edge::Falling);
        h.backend.settle().await;
        assert_eq!(selector.status().position, Some(1));
        assert_eq!(
            h.bus.property(HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE, PROP_POSITION),
            Some(PropertyValue::from(1u32))
        );
    }

    #[tokio::test]
    async fn test_unmapped_boot_position_routes_to_bmc() {
        let h = Harness::new();
        // [high, high] -> raw 0, not in the map
        h.backend.set_level("hs-bit0", Level::High);
        let _service = h
            .start(&defs(serde_json::json!({
                "gpio_definitions": [
                    { "name": "POWER_BUTTON", "gpio_name": "power-btn", "direction": "falling" },
                    {
                        "name": "HOST_SELECTOR",
                        "host_selector_map": { "1": 1, "2": 2 },
                        "group_gpio_config": [
                            { "name": "HOST_SELECTOR_BIT0", "gpio_name": "hs-bit0", "direction": "falling" },
                            { "name": "HOST_SELECTOR_BIT1", "gpio_name": "hs-bit1", "direction": "falling" }
                        ]
                    }
                ]
            })))
            .unwrap();
        assert_eq!(
            h.bus.property(HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE, PROP_POSITION),
            Some(PropertyValue::from(BMC_POSITION))
        );

        h.bus.register_peer(
            "xyz.openbmc_project.State.Chassis",
            &chassis_system_state_path(0),
            CHASSIS_STATE_IFACE,
            [(PROP_REQUESTED_POWER_TRANSITION, PropertyValue::from(""))],
        );
        let router = Router::new(h.bus.clone(), true);

        assert_eq!(router.route(PowerEvent::PowerReleased).await.unwrap(), None);
        let decision = router
            .route(PowerEvent::PowerLongPressed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.host_number, BMC_POSITION);
        assert_eq!(decision.transition, Transition::ChassisPowerCycle);

        let writes = h.bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].path, chassis_system_state_path(0));
        assert_eq!(writes[0].property, PROP_REQUESTED_POWER_TRANSITION);
    }

    #[tokio::test]
    async fn test_hardware_error_closes_all_lines() {
        let h = Harness::new();
        let service = Arc::new(h.start(&platform()).unwrap());
        let runner = tokio::spawn({
            let service = service.clone();
            async move { service.run().await }
        });
        h.backend.settle().await;

        h.backend.fail("reset-btn");
        let err = runner.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::HardwareIo { .. }));
        assert_eq!(service.registry().open_count(), 0);
        assert!(LINES[..5].iter().all(|name| h.backend.handle_count(name) == 0));
    }

    #[tokio::test]
    async fn test_shutdown_ends_run() {
        let h = Harness::new();
        let service = Arc::new(h.start(&platform()).unwrap());
        let runner = tokio::spawn({
            let service = service.clone();
            async move { service.run().await }
        });
        h.backend.settle().await;

        service.shutdown();
        runner.await.unwrap().unwrap();
        assert_eq!(service.registry().open_count(), 0);
        assert_eq!(h.backend.handle_count("power-btn"), 0);
        assert!(!h.bus.has_object(POWER_BUTTON_PATH));

        service.shutdown();
    }

    #[tokio::test]
    async fn test_stop_without_run_drops_handles() {
        let h = Harness::new();
        let service = h.start(&platform()).unwrap();
        h.backend.settle().await;
        assert_eq!(h.backend.handle_count("reset-btn"), 1);

        service.stop().await;
        assert_eq!(service.registry().open_count(), 0);
        assert!(LINES[..5].iter().all(|name| h.backend.handle_count(name) == 0));
    }

    #[tokio::test]
    async fn test_shared_line_fails_startup() {
        let h = Harness::new();
        let result = h.start(&defs(serde_json::json!({
            "gpio_definitions": [
                { "name": "POWER_BUTTON", "gpio_name": "power-btn", "direction": "falling" },
                { "name": "RESET_BUTTON", "gpio_name": "power-btn", "direction": "falling" }
            ]
        })));

        assert!(matches!(result, Err(AppError::ResourceBusy(_))));
        assert!(!h.bus.has_object(POWER_BUTTON_PATH));
        assert!(!h.bus.has_object(RESET_BUTTON_PATH));
    }

    #[tokio::test]
    async fn test_missing_line_fails_startup() {
        let h = Harness::new();
        let result = h.start(&defs(serde_json::json!({
            "gpio_definitions": [
                { "name": "POWER_BUTTON", "gpio_name": "power-btn", "direction": "falling" },
                { "name": "ID_BTN", "gpio_name": "id-btn", "direction": "falling" }
            ]
        })));

        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(!h.bus.has_object(POWER_BUTTON_PATH));
    }

    #[tokio::test]
    async fn test_duplicate_definition_fails_startup() {
        let h = Harness::new();
        let result = h.start(&defs(serde_json::json!({
            "gpio_definitions": [
                { "name": "POWER_BUTTON", "gpio_name": "power-btn", "direction": "falling" },
                { "name": "POWER_BUTTON", "gpio_name": "reset-btn", "direction": "falling" }
            ]
        })));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_config_idles_until_shutdown() {
        let h = Harness::new();
        let service = Arc::new(h.start(&GpioDefs::default()).unwrap());
        let runner = tokio::spawn({
            let service = service.clone();
            async move { service.run().await }
        });
        h.backend.settle().await;
        assert!(!runner.is_finished());

        service.shutdown();
        runner.await.unwrap().unwrap();
    }
}
