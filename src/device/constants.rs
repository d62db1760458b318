use uuid::Uuid;

/**
 * How long (milliseconds) a discovery scan may run before giving up on
 * finding the device.
 */
pub const SCAN_DEADLINE: u64 = 15_000;

/**
 * How often (milliseconds) to re-poll the adapter for discovered peripherals
 * while scanning.
 */
pub const SCAN_POLL_DELAY: u64 = 250;

/**
 * How long (milliseconds) establishing the link may take.
 */
pub const CONNECT_DEADLINE: u64 = 10_000;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2_000;

/**
 * Advertised name prefix of the device. Used as a fallback match when a
 * platform does not expose advertised service UUIDs during the scan.
 */
pub const DEVICE_NAME_PREFIX: &str = "databot";

/**
 * The UUID of the UART-style BLE service the device exposes.
 */
pub const UART_SERVICE: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/**
 * The UUID of the GATT characteristic configuration commands are written to.
 */
pub const UART_WRITE_CHARACTERISTIC: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/**
 * The UUID of the GATT notify characteristic that streams sensor frames.
 */
pub const UART_READ_CHARACTERISTIC: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

pub fn make_service_uuid() -> Uuid {
    Uuid::parse_str(UART_SERVICE).unwrap()
}

pub fn make_write_uuid() -> Uuid {
    Uuid::parse_str(UART_WRITE_CHARACTERISTIC).unwrap()
}

pub fn make_read_uuid() -> Uuid {
    Uuid::parse_str(UART_READ_CHARACTERISTIC).unwrap()
}
