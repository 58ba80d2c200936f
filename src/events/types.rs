//! Bus signal types
//!
//! Signals emitted by button objects and property-change notifications.
//! Serialized with the signal name as tag, e.g.
//! ```json
//! { "signal": "Released", "data": { "path": "/xyz/openbmc_project/Chassis/Buttons/Power0", "elapsed_us": 100000 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::bus::PropertyValue;

/// Signal published on the bus
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "data")]
pub enum BusSignal {
    /// Button asserted (or a simulated press)
    Pressed { path: String },

    /// Button deasserted
    ///
    /// Power buttons carry the press duration in microseconds.
    Released {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        elapsed_us: Option<u64>,
    },

    /// Power button held longer than the long-press threshold
    PressedLong { path: String },

    /// Property of an exported object changed
    PropertyChanged {
        path: String,
        interface: String,
        property: String,
        value: PropertyValue,
    },
}

impl BusSignal {
    /// Object path the signal originates from
    pub fn path(&self) -> &str {
        match self {
            Self::Pressed { path }
            | Self::Released { path, .. }
            | Self::PressedLong { path }
            | Self::PropertyChanged { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_serialization() {
        let signal = BusSignal::Released {
            path: "/xyz/openbmc_project/Chassis/Buttons/Power0".to_string(),
            elapsed_us: Some(100_000),
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["signal"], "Released");
        assert_eq!(json["data"]["elapsed_us"], 100_000);
    }

    #[test]
    fn test_released_without_payload_omits_elapsed() {
        let signal = BusSignal::Released {
            path: "/xyz/openbmc_project/Chassis/Buttons/Reset0".to_string(),
            elapsed_us: None,
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert!(json["data"].get("elapsed_us").is_none());
    }

    #[test]
    fn test_path() {
        let signal = BusSignal::PressedLong {
            path: "/a".to_string(),
        };
        assert_eq!(signal.path(), "/a");
    }
}
