use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::DeviceAddress;
use crate::device::constants::{make_read_uuid, make_service_uuid, make_write_uuid};
use crate::protocol::layout::Sensor;

/// One of the three RGB status LEDs on the pod.
///
/// Component values are clamped to [0, 255] by construction. A disabled LED
/// always goes over the wire as (0, 0, 0), whatever its stored components.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Led {
    pub enabled: bool,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Led {
    pub const OFF: Led = Led { enabled: false, red: 0, green: 0, blue: 0 };

    pub fn solid(red: u8, green: u8, blue: u8) -> Led {
        Led { enabled: true, red, green, blue }
    }
}

impl Default for Led {
    fn default() -> Self {
        Led::OFF
    }
}

/// The BLE service/characteristic triple the device exposes. Fixed per device
/// family and immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleConfig {
    pub service: Uuid,
    /// Notify characteristic carrying sensor frames.
    pub read: Uuid,
    /// Write characteristic accepting configuration commands.
    pub write: Uuid,
}

impl Default for BleConfig {
    fn default() -> Self {
        BleConfig {
            service: make_service_uuid(),
            read: make_read_uuid(),
            write: make_write_uuid(),
        }
    }
}

/// Declarative sensor selection for one streaming session.
///
/// Every recognized option is an explicit field; the command bitmask and the
/// expected frame layout are both derived from the same sensor table, so a
/// selection can never configure the device one way and decode another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabotConfig {
    pub accel: bool,
    pub linear_accel: bool,
    pub gyro: bool,
    pub magneto: bool,
    pub pressure: bool,
    pub ambient_light: bool,
    pub distance: bool,
    pub external_temp: bool,

    /// Refresh interval in milliseconds between frames.
    pub refresh: u16,

    pub led1: Led,
    pub led2: Led,
    pub led3: Led,

    /// Known device address. When set, [`crate::client::Databot::run`] skips
    /// address resolution entirely.
    pub address: Option<DeviceAddress>,
}

impl Default for DatabotConfig {
    fn default() -> Self {
        DatabotConfig {
            accel: false,
            linear_accel: false,
            gyro: false,
            magneto: false,
            pressure: false,
            ambient_light: false,
            distance: false,
            external_temp: false,
            refresh: 500,
            led1: Led::OFF,
            led2: Led::OFF,
            led3: Led::OFF,
            address: None,
        }
    }
}

impl DatabotConfig {
    /// Whether the given sensor is enabled in this selection.
    pub fn enabled(&self, sensor: Sensor) -> bool {
        match sensor {
            Sensor::Acceleration => self.accel,
            Sensor::LinearAcceleration => self.linear_accel,
            Sensor::Gyroscope => self.gyro,
            Sensor::Magnetometer => self.magneto,
            Sensor::Pressure => self.pressure,
            Sensor::AmbientLight => self.ambient_light,
            Sensor::Distance => self.distance,
            Sensor::ExternalTemperature => self.external_temp,
        }
    }

    /// A selection with every sensor enabled. Exceeds the firmware frame
    /// limit; useful for validation tests and error paths.
    pub fn all_sensors() -> Self {
        DatabotConfig {
            accel: true,
            linear_accel: true,
            gyro: true,
            magneto: true,
            pressure: true,
            ambient_light: true,
            distance: true,
            external_temp: true,
            ..Default::default()
        }
    }
}
