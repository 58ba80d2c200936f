//! Object paths, interfaces and enum strings used on the bus

pub const BUS_NAME: &str = "xyz.openbmc_project.Chassis.Buttons";

pub const POWER_BUTTON_PATH: &str = "/xyz/openbmc_project/Chassis/Buttons/Power0";
pub const RESET_BUTTON_PATH: &str = "/xyz/openbmc_project/Chassis/Buttons/Reset0";
pub const ID_BUTTON_PATH: &str = "/xyz/openbmc_project/Chassis/Buttons/ID0";
pub const HOST_SELECTOR_PATH: &str = "/xyz/openbmc_project/Chassis/Buttons/HostSelector0";

pub const POWER_BUTTON_IFACE: &str = "xyz.openbmc_project.Chassis.Buttons.Power";
pub const RESET_BUTTON_IFACE: &str = "xyz.openbmc_project.Chassis.Buttons.Reset";
pub const ID_BUTTON_IFACE: &str = "xyz.openbmc_project.Chassis.Buttons.ID";
pub const HOST_SELECTOR_IFACE: &str = "xyz.openbmc_project.Chassis.Buttons.HostSelector";

pub const HOST_STATE_PATH_PREFIX: &str = "/xyz/openbmc_project/state/host";
pub const CHASSIS_STATE_PATH_PREFIX: &str = "/xyz/openbmc_project/state/chassis";
pub const CHASSIS_SYSTEM_STATE_PATH_PREFIX: &str = "/xyz/openbmc_project/state/chassis_system";

pub const HOST_STATE_IFACE: &str = "xyz.openbmc_project.State.Host";
pub const CHASSIS_STATE_IFACE: &str = "xyz.openbmc_project.State.Chassis";

pub const LED_GROUP_IFACE: &str = "xyz.openbmc_project.Led.Group";
pub const LED_GROUP_PATH_PREFIX: &str = "/xyz/openbmc_project/led/groups/";

pub const PROP_POSITION: &str = "Position";
/// Host selector `Position` addressing the BMC itself
pub const BMC_POSITION: u32 = 0;
pub const PROP_MAX_POSITION: &str = "MaxPosition";
pub const PROP_CURRENT_POWER_STATE: &str = "CurrentPowerState";
pub const PROP_REQUESTED_HOST_TRANSITION: &str = "RequestedHostTransition";
pub const PROP_REQUESTED_POWER_TRANSITION: &str = "RequestedPowerTransition";
pub const PROP_ASSERTED: &str = "Asserted";

pub const POWER_STATE_ON: &str = "xyz.openbmc_project.State.Chassis.PowerState.On";
pub const POWER_STATE_OFF: &str = "xyz.openbmc_project.State.Chassis.PowerState.Off";

pub fn host_state_path(host: u32) -> String {
    format!("{}{}", HOST_STATE_PATH_PREFIX, host)
}

pub fn chassis_state_path(host: u32) -> String {
    format!("{}{}", CHASSIS_STATE_PATH_PREFIX, host)
}

pub fn chassis_system_state_path(host: u32) -> String {
    format!("{}{}", CHASSIS_SYSTEM_STATE_PATH_PREFIX, host)
}

pub fn led_group_path(group: &str) -> String {
    format!("{}{}", LED_GROUP_PATH_PREFIX, group)
}
