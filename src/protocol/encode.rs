use crate::config::types::{DatabotConfig, Led};
use crate::error::ConfigError;
use crate::protocol::layout::{bitmask, frame_len, COMMAND_CONFIGURE, COMMAND_LEN, LAYOUT_VERSION, MAX_FRAME_LEN};

/// Build the configuration command for `config`.
///
/// Pure function, no I/O. Layout:
///
/// | offset | size | field |
/// |-------:|-----:|-------|
/// | 0 | 1 | opcode (`0x0A`) |
/// | 1 | 1 | layout version |
/// | 2 | 1 | sensor bitmask |
/// | 3 | 2 | refresh interval ms, u16 little-endian |
/// | 5 | 4 | LED1: enabled, red, green, blue |
/// | 9 | 4 | LED2 |
/// | 13 | 4 | LED3 |
///
/// Rejects an empty selection and any selection whose reassembled frame would
/// exceed the firmware limit, before any link activity happens.
pub fn encode_config(config: &DatabotConfig) -> Result<Vec<u8>, ConfigError> {
    let mask = bitmask(config);
    if mask == 0 {
        return Err(ConfigError::EmptySelection);
    }

    let expected = frame_len(config);
    if expected > MAX_FRAME_LEN {
        return Err(ConfigError::payload_too_large(expected));
    }

    let mut command = Vec::with_capacity(COMMAND_LEN);
    command.push(COMMAND_CONFIGURE);
    command.push(LAYOUT_VERSION);
    command.push(mask);
    command.extend_from_slice(&config.refresh.to_le_bytes());

    for led in [&config.led1, &config.led2, &config.led3] {
        push_led(&mut command, led);
    }

    debug_assert_eq!(command.len(), COMMAND_LEN);
    Ok(command)
}

fn push_led(command: &mut Vec<u8>, led: &Led) {
    if led.enabled {
        command.extend_from_slice(&[1, led.red, led.green, led.blue]);
    } else {
        // A disabled LED always encodes dark, whatever its stored components.
        command.extend_from_slice(&[0, 0, 0, 0]);
    }
}
