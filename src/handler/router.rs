//! Power event router
//!
//! Decides which host or chassis object a classified power/reset event
//! applies to. Stateless: every decision re-reads the topology and power
//! state from the bus.
//!
//! | Event              | Target                         | Transition            |
//! |--------------------|--------------------------------|-----------------------|
//! | `PowerReleased`    | `host<N>`                      | `Off` if on, else `On`|
//! | `PowerLongPressed` | `chassis<N>` (if powered)      | `Off`                 |
//! | `PowerLongPressed` | `chassis_system0` (BMC chosen) | `PowerCycle`          |
//! | `ResetReleased`    | `host<N>` (if powered)         | `Reboot`              |

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bus::names::*;
use crate::bus::BusClient;
use crate::error::{AppError, Result};

/// Classified button event the router acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    PowerReleased,
    PowerLongPressed,
    ResetReleased,
}

impl fmt::Display for PowerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PowerReleased => "power released",
            Self::PowerLongPressed => "power long pressed",
            Self::ResetReleased => "reset released",
        };
        f.write_str(name)
    }
}

/// Requested state transition written to the target object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    HostOn,
    HostOff,
    HostReboot,
    ChassisOff,
    ChassisPowerCycle,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostOn => "xyz.openbmc_project.State.Host.Transition.On",
            Self::HostOff => "xyz.openbmc_project.State.Host.Transition.Off",
            Self::HostReboot => "xyz.openbmc_project.State.Host.Transition.Reboot",
            Self::ChassisOff => "xyz.openbmc_project.State.Chassis.Transition.Off",
            Self::ChassisPowerCycle => "xyz.openbmc_project.State.Chassis.Transition.PowerCycle",
        }
    }

    fn interface(self) -> &'static str {
        match self {
            Self::HostOn | Self::HostOff | Self::HostReboot => HOST_STATE_IFACE,
            Self::ChassisOff | Self::ChassisPowerCycle => CHASSIS_STATE_IFACE,
        }
    }

    fn property(self) -> &'static str {
        match self {
            Self::HostOn | Self::HostOff | Self::HostReboot => PROP_REQUESTED_HOST_TRANSITION,
            Self::ChassisOff | Self::ChassisPowerCycle => PROP_REQUESTED_POWER_TRANSITION,
        }
    }
}

/// Where and what to write for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub host_number: u32,
    pub object_path: String,
    pub interface: &'static str,
    pub property: &'static str,
    pub transition: Transition,
}

impl RoutingDecision {
    fn new(host_number: u32, object_path: String, transition: Transition) -> Self {
        Self {
            host_number,
            object_path,
            interface: transition.interface(),
            property: transition.property(),
            transition,
        }
    }
}

pub struct Router {
    bus: Arc<dyn BusClient>,
    sled_cycle_enabled: bool,
}

impl Router {
    pub fn new(bus: Arc<dyn BusClient>, sled_cycle_enabled: bool) -> Self {
        Self {
            bus,
            sled_cycle_enabled,
        }
    }

    /// True iff a host selector object is discoverable
    ///
    /// A failed lookup means single host; any other failure is returned.
    pub async fn is_multi_host(&self) -> Result<bool> {
        match self
            .bus
            .get_service(HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE)
            .await
        {
            Ok(service) => Ok(!service.is_empty()),
            Err(AppError::Lookup(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Current host selector position
    pub async fn host_selector_value(&self) -> Result<u32> {
        let service = self
            .bus
            .get_service(HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE)
            .await?;
        let value = self
            .bus
            .get_property(&service, HOST_SELECTOR_PATH, HOST_SELECTOR_IFACE, PROP_POSITION)
            .await?;
        value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| AppError::Lookup(format!("unexpected host selector Position {:?}", value)))
    }

    /// Whether the chassis of `host` reports power on
    pub async fn powered_on(&self, host: u32) -> Result<bool> {
        let path = chassis_state_path(host);
        let service = self.bus.get_service(&path, CHASSIS_STATE_IFACE).await?;
        let state = self
            .bus
            .get_property(&service, &path, CHASSIS_STATE_IFACE, PROP_CURRENT_POWER_STATE)
            .await?;
        match state.as_str() {
            Some(s) => Ok(s == POWER_STATE_ON),
            None => Err(AppError::Lookup(format!(
                "unexpected {} at {}: {:?}",
                PROP_CURRENT_POWER_STATE, path, state
            ))),
        }
    }

    /// Work out the target of `event` without writing anything
    ///
    /// `Ok(None)` means the event is deliberately dropped.
    pub async fn decide(&self, event: PowerEvent) -> Result<Option<RoutingDecision>> {
        let multi_host = self.is_multi_host().await?;
        let host = if multi_host {
            let position = self.host_selector_value().await?;
            info!("Multi host system detected, position {}", position);
            position
        } else {
            0
        };

        // The BMC position only has long-press semantics
        if multi_host && host == BMC_POSITION && event != PowerEvent::PowerLongPressed {
            info!("BMC selected on multi host system, ignoring {}", event);
            return Ok(None);
        }

        let decision = match event {
            PowerEvent::PowerReleased => {
                let transition = if self.powered_on(host).await? {
                    Transition::HostOff
                } else {
                    Transition::HostOn
                };
                RoutingDecision::new(host, host_state_path(host), transition)
            }
            PowerEvent::PowerLongPressed if multi_host && host == BMC_POSITION => {
                if !self.sled_cycle_enabled {
                    info!("Sled cycle disabled, ignoring long power button press");
                    return Ok(None);
                }
                RoutingDecision::new(
                    host,
                    chassis_system_state_path(host),
                    Transition::ChassisPowerCycle,
                )
            }
            PowerEvent::PowerLongPressed => {
                if !self.powered_on(host).await? {
                    info!("Host {} is off, ignoring long power button press", host);
                    return Ok(None);
                }
                RoutingDecision::new(host, chassis_state_path(host), Transition::ChassisOff)
            }
            PowerEvent::ResetReleased => {
                if !self.powered_on(host).await? {
                    info!("Host {} is off, ignoring reset button press", host);
                    return Ok(None);
                }
                RoutingDecision::new(host, host_state_path(host), Transition::HostReboot)
            }
        };

        Ok(Some(decision))
    }

    /// Decide and apply; returns what was written, if anything
    pub async fn route(&self, event: PowerEvent) -> Result<Option<RoutingDecision>> {
        let Some(decision) = self.decide(event).await? else {
            return Ok(None);
        };

        let service = self
            .bus
            .get_service(&decision.object_path, decision.interface)
            .await?;
        self.bus
            .set_property(
                &service,
                &decision.object_path,
                decision.interface,
                decision.property,
                decision.transition.as_str().into(),
            )
            .await?;

        debug!(
            "Handled {}: {} -> {}",
            event,
            decision.object_path,
            decision.transition.as_str()
        );
        Ok(Some(decision))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::{LocalBus, PropertyValue};
    use crate::events::EventBus;

    pub(crate) const STATE_SERVICE: &str = "xyz.openbmc_project.State.Host";
    pub(crate) const CHASSIS_SERVICE: &str = "xyz.openbmc_project.State.Chassis";

    fn power_state(on: bool) -> PropertyValue {
        PropertyValue::from(if on { POWER_STATE_ON } else { POWER_STATE_OFF })
    }

    /// Register host and chassis state objects for `host`
    pub(crate) fn add_host(bus: &LocalBus, host: u32, on: bool) {
        bus.register_peer(
            STATE_SERVICE,
            &host_state_path(host),
            HOST_STATE_IFACE,
            [(PROP_REQUESTED_HOST_TRANSITION, PropertyValue::from(""))],
        );
        bus.register_peer(
            CHASSIS_SERVICE,
            &chassis_state_path(host),
            CHASSIS_STATE_IFACE,
            [
                (PROP_CURRENT_POWER_STATE, power_state(on)),
                (PROP_REQUESTED_POWER_TRANSITION, PropertyValue::from("")),
            ],
        );
    }

    fn add_selector(bus: &LocalBus, position: u32) {
        bus.register_peer(
            BUS_NAME,
            HOST_SELECTOR_PATH,
            HOST_SELECTOR_IFACE,
            [(PROP_POSITION, PropertyValue::from(position))],
        );
    }

    fn add_sled(bus: &LocalBus) {
        bus.register_peer(
            CHASSIS_SERVICE,
            &chassis_system_state_path(0),
            CHASSIS_STATE_IFACE,
            [(PROP_REQUESTED_POWER_TRANSITION, PropertyValue::from(""))],
        );
    }

    fn setup(sled_cycle_enabled: bool) -> (Arc<LocalBus>, Router) {
        let bus = Arc::new(LocalBus::new(BUS_NAME, Arc::new(EventBus::new())));
        let router = Router::new(bus.clone(), sled_cycle_enabled);
        (bus, router)
    }

    #[test]
    fn test_transition_targets() {
        assert_eq!(Transition::HostReboot.interface(), HOST_STATE_IFACE);
        assert_eq!(Transition::HostOn.property(), PROP_REQUESTED_HOST_TRANSITION);
        assert_eq!(Transition::ChassisOff.interface(), CHASSIS_STATE_IFACE);
        assert_eq!(
            Transition::ChassisPowerCycle.property(),
            PROP_REQUESTED_POWER_TRANSITION
        );
    }

    #[tokio::test]
    async fn test_single_host_power_release_toggles() {
        let (bus, router) = setup(true);
        add_host(&bus, 0, false);

        assert!(!router.is_multi_host().await.unwrap());
        let decision = router.route(PowerEvent::PowerReleased).await.unwrap().unwrap();
        assert_eq!(decision.host_number, 0);
        assert_eq!(decision.transition, Transition::HostOn);

        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].service, STATE_SERVICE);
        assert_eq!(writes[0].path, "/xyz/openbmc_project/state/host0");
        assert_eq!(writes[0].property, PROP_REQUESTED_HOST_TRANSITION);
        assert_eq!(
            writes[0].value,
            PropertyValue::from("xyz.openbmc_project.State.Host.Transition.On")
        );
    }

    #[tokio::test]
    async fn test_single_host_power_release_when_on() {
        let (bus, router) = setup(true);
        add_host(&bus, 0, true);

        let decision = router.route(PowerEvent::PowerReleased).await.unwrap().unwrap();
        assert_eq!(decision.transition, Transition::HostOff);
    }

    #[tokio::test]
    async fn test_single_host_long_press_powers_off_chassis() {
        let (bus, router) = setup(true);
        add_host(&bus, 0, true);

        let decision = router
            .route(PowerEvent::PowerLongPressed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.object_path, "/xyz/openbmc_project/state/chassis0");
        assert_eq!(decision.transition, Transition::ChassisOff);
        assert_eq!(
            bus.property(&chassis_state_path(0), CHASSIS_STATE_IFACE, PROP_REQUESTED_POWER_TRANSITION),
            Some(PropertyValue::from(
                "xyz.openbmc_project.State.Chassis.Transition.Off"
            ))
        );
    }

    #[tokio::test]
    async fn test_long_press_with_power_off_is_dropped() {
        let (bus, router) = setup(true);
        add_host(&bus, 0, false);

        assert_eq!(router.route(PowerEvent::PowerLongPressed).await.unwrap(), None);
        assert!(bus.writes().is_empty());
    }

    #[tokio::test]
    async fn test_reset_on_powered_off_host_makes_no_call() {
        let (bus, router) = setup(true);
        add_host(&bus, 0, false);

        assert_eq!(router.route(PowerEvent::ResetReleased).await.unwrap(), None);
        assert!(bus.writes().is_empty());
    }

    #[tokio::test]
    async fn test_reset_on_powered_host_reboots() {
        let (bus, router) = setup(true);
        add_host(&bus, 0, true);

        let decision = router.route(PowerEvent::ResetReleased).await.unwrap().unwrap();
        assert_eq!(decision.object_path, host_state_path(0));
        assert_eq!(decision.transition, Transition::HostReboot);
    }

    #[tokio::test]
    async fn test_multi_host_bmc_drops_release_events() {
        let (bus, router) = setup(true);
        add_selector(&bus, BMC_POSITION);
        add_host(&bus, 0, true);

        assert!(router.is_multi_host().await.unwrap());
        assert_eq!(router.route(PowerEvent::PowerReleased).await.unwrap(), None);
        assert_eq!(router.route(PowerEvent::ResetReleased).await.unwrap(), None);
        assert!(bus.writes().is_empty());
    }

    #[tokio::test]
    async fn test_multi_host_bmc_long_press_cycles_sled() {
        let (bus, router) = setup(true);
        add_selector(&bus, BMC_POSITION);
        add_sled(&bus);

        let decision = router
            .route(PowerEvent::PowerLongPressed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.object_path, "/xyz/openbmc_project/state/chassis_system0");
        assert_eq!(decision.transition, Transition::ChassisPowerCycle);

        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].property, PROP_REQUESTED_POWER_TRANSITION);
        assert_eq!(
            writes[0].value,
            PropertyValue::from("xyz.openbmc_project.State.Chassis.Transition.PowerCycle")
        );
    }

    #[tokio::test]
    async fn test_multi_host_bmc_long_press_without_sled_cycle() {
        let (bus, router) = setup(false);
        add_selector(&bus, BMC_POSITION);
        add_sled(&bus);

        assert_eq!(router.route(PowerEvent::PowerLongPressed).await.unwrap(), None);
        assert!(bus.writes().is_empty());
    }

    #[tokio::test]
    async fn test_multi_host_routes_to_selected_host() {
        let (bus, router) = setup(true);
        add_selector(&bus, 2);
        add_host(&bus, 1, false);
        add_host(&bus, 2, true);

        let decision = router.route(PowerEvent::PowerReleased).await.unwrap().unwrap();
        assert_eq!(decision.host_number, 2);
        assert_eq!(decision.object_path, "/xyz/openbmc_project/state/host2");
        assert_eq!(decision.transition, Transition::HostOff);

        let decision = router
            .route(PowerEvent::PowerLongPressed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.object_path, chassis_state_path(2));
    }

    #[tokio::test]
    async fn test_unreadable_position_is_propagated() {
        let (bus, router) = setup(true);
        bus.register_peer(
            BUS_NAME,
            HOST_SELECTOR_PATH,
            HOST_SELECTOR_IFACE,
            [(PROP_MAX_POSITION, PropertyValue::from(4u32))],
        );

        let err = router.route(PowerEvent::PowerReleased).await.unwrap_err();
        assert!(matches!(err, AppError::Lookup(_)));
        assert!(bus.writes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_chassis_is_lookup_error() {
        let (_bus, router) = setup(true);
        let err = router.route(PowerEvent::ResetReleased).await.unwrap_err();
        assert!(matches!(err, AppError::Lookup(_)));
    }

    #[tokio::test]
    async fn test_unreachable_bus_is_not_single_host() {
        let (bus, router) = setup(true);
        add_host(&bus, 0, true);
        bus.set_unreachable(true);

        assert!(matches!(router.is_multi_host().await, Err(AppError::Bus(_))));
        assert!(matches!(
            router.route(PowerEvent::PowerReleased).await,
            Err(AppError::Bus(_))
        ));
    }
}
