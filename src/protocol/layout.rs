use crate::config::types::DatabotConfig;

/**
 * Version of the sensor table below. Sent in every configuration command so
 * the firmware can reject a host that was built against a different table.
 */
pub const LAYOUT_VERSION: u8 = 1;

/**
 * Width (bytes) of every sensor field on the wire: one little-endian f32.
 */
pub const FIELD_WIDTH: usize = 4;

/**
 * Largest notification payload the link delivers in one message
 * (ATT_MTU 23 minus the 3 byte ATT header). Frames longer than this
 * arrive split across multiple notifications.
 */
pub const FRAGMENT_LEN: usize = 20;

/**
 * Largest reassembled frame the firmware supports. Sensor selections whose
 * combined field widths exceed this are rejected before any link activity.
 */
pub const MAX_FRAME_LEN: usize = 60;

/**
 * Total size (bytes) of a configuration command:
 * opcode, layout version, sensor bitmask, u16 refresh interval,
 * three 4-byte LED groups.
 */
pub const COMMAND_LEN: usize = 5 + 3 * 4;

/**
 * Opcode of the configure-and-start-streaming command.
 */
pub const COMMAND_CONFIGURE: u8 = 0x0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    Acceleration,
    LinearAcceleration,
    Gyroscope,
    Magnetometer,
    Pressure,
    AmbientLight,
    Distance,
    ExternalTemperature,
}

/// One row of the sensor table: which bit enables the sensor in the command
/// bitmask, and which named fields it contributes to a frame, in wire order.
pub struct SensorLayout {
    pub sensor: Sensor,
    pub bit: u8,
    pub fields: &'static [&'static str],
}

/**
 * The sensor table. Both the command encoder and the frame decoder derive
 * their view of the wire from this one constant: the encoder packs the
 * bitmask from the `bit` column, the decoder walks the `fields` column of
 * every enabled row in array order to parse a frame. Keeping a single table
 * is what guarantees the command and the expected frame layout cannot drift
 * apart.
 */
pub const SENSOR_TABLE: [SensorLayout; 8] = [
    SensorLayout {
        sensor: Sensor::Acceleration,
        bit: 0,
        fields: &["acceleration_x", "acceleration_y", "acceleration_z"],
    },
    SensorLayout {
        sensor: Sensor::LinearAcceleration,
        bit: 1,
        fields: &["linear_acceleration_x", "linear_acceleration_y", "linear_acceleration_z"],
    },
    SensorLayout {
        sensor: Sensor::Gyroscope,
        bit: 2,
        fields: &["gyro_x", "gyro_y", "gyro_z"],
    },
    SensorLayout {
        sensor: Sensor::Magnetometer,
        bit: 3,
        fields: &["mag_x", "mag_y", "mag_z"],
    },
    SensorLayout {
        sensor: Sensor::Pressure,
        bit: 4,
        fields: &["pressure"],
    },
    SensorLayout {
        sensor: Sensor::AmbientLight,
        bit: 5,
        fields: &["ambient_light_in_lux"],
    },
    SensorLayout {
        sensor: Sensor::Distance,
        bit: 6,
        fields: &["distance"],
    },
    SensorLayout {
        sensor: Sensor::ExternalTemperature,
        bit: 7,
        fields: &["external_temp_1"],
    },
];

/// Pack the enabled sensors of `config` into the command bitmask.
pub fn bitmask(config: &DatabotConfig) -> u8 {
    SENSOR_TABLE
        .iter()
        .filter(|row| config.enabled(row.sensor))
        .fold(0u8, |mask, row| mask | (1 << row.bit))
}

/// Field names contributed by the enabled sensors of `config`, in wire order.
pub fn enabled_fields(config: &DatabotConfig) -> Vec<&'static str> {
    SENSOR_TABLE
        .iter()
        .filter(|row| config.enabled(row.sensor))
        .flat_map(|row| row.fields.iter().copied())
        .collect()
}

/// Length (bytes) of one fully reassembled frame for the given selection.
pub fn frame_len(config: &DatabotConfig) -> usize {
    enabled_fields(config).len() * FIELD_WIDTH
}
