use log::debug;

use crate::config::types::DatabotConfig;
use crate::error::ProtocolError;
use crate::protocol::frame::{epoch_now, SensorFrame};
use crate::protocol::layout::{enabled_fields, FIELD_WIDTH};

/// Reassembles notification fragments into [`SensorFrame`]s.
///
/// The link delivers bounded-size notifications, so one logical frame may
/// arrive split across several payloads. The expected frame length is fixed
/// by the active sensor selection (every enabled sensor contributes a fixed
/// number of fields), which lets the decoder reassemble purely by length:
/// buffer fragments until exactly one frame's worth of bytes is present.
pub struct FrameDecoder {
    fields: Vec<&'static str>,
    expected: usize,
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// A decoder for the given selection. Derives the field order and the
    /// expected frame length from the same sensor table the command encoder
    /// uses.
    pub fn new(config: &DatabotConfig) -> Self {
        let fields = enabled_fields(config);
        let expected = fields.len() * FIELD_WIDTH;
        FrameDecoder {
            fields,
            expected,
            buffer: Vec::with_capacity(expected),
        }
    }

    /// Bytes expected for one complete frame under the active selection.
    pub fn expected_len(&self) -> usize {
        self.expected
    }

    /// Feed one notification payload.
    ///
    /// Returns `Ok(None)` while the frame is still incomplete, and
    /// `Ok(Some(frame))` once the buffered bytes add up to exactly one frame.
    /// If the buffer overshoots the expected length the stream is corrupt:
    /// the buffer is discarded so decoding can resynchronize on the next
    /// fragment, and the overflow is reported.
    pub fn push(&mut self, fragment: &[u8]) -> Result<Option<SensorFrame>, ProtocolError> {
        self.buffer.extend_from_slice(fragment);

        if self.buffer.len() < self.expected {
            debug!("fragment buffered: {} of {} bytes", self.buffer.len(), self.expected);
            return Ok(None);
        }

        if self.buffer.len() > self.expected {
            let received = self.buffer.len();
            self.buffer.clear();
            return Err(ProtocolError::FrameOverflow { expected: self.expected, received });
        }

        let mut frame = SensorFrame::new(epoch_now());
        for (i, name) in self.fields.iter().enumerate() {
            let offset = i * FIELD_WIDTH;
            let raw: [u8; FIELD_WIDTH] = self.buffer[offset..offset + FIELD_WIDTH]
                .try_into()
                .expect("buffer length was checked against the field count");
            frame.insert(*name, f32::from_le_bytes(raw) as f64);
        }

        self.buffer.clear();
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::layout::FRAGMENT_LEN;

    fn frame_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn gyro_pressure_config() -> DatabotConfig {
        let mut config = DatabotConfig::default();
        config.gyro = true;
        config.pressure = true;
        config
    }

    #[test]
    fn partial_fragments_need_more_bytes() {
        let mut decoder = FrameDecoder::new(&gyro_pressure_config());
        assert_eq!(decoder.expected_len(), 16);

        let bytes = frame_bytes(&[1.0, 2.0, 3.0, 101_325.0]);
        assert!(decoder.push(&bytes[..7]).unwrap().is_none());
        assert!(decoder.push(&bytes[7..12]).unwrap().is_none());

        let frame = decoder.push(&bytes[12..]).unwrap().expect("frame should complete");
        let names: Vec<&str> = frame.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["gyro_x", "gyro_y", "gyro_z", "pressure"]);
        assert_eq!(frame.get_f64("gyro_y"), Some(2.0));
        assert_eq!(frame.get_f64("pressure"), Some(101_325.0));
        assert!(frame.epoch > 0.0);
    }

    #[test]
    fn single_field_selection_decodes_in_one_fragment() {
        let mut config = DatabotConfig::default();
        config.pressure = true;
        let mut decoder = FrameDecoder::new(&config);

        let bytes = frame_bytes(&[99_000.5]);
        assert!(bytes.len() <= FRAGMENT_LEN);

        let frame = decoder.push(&bytes).unwrap().expect("complete frame");
        assert_eq!(frame.fields.len(), 1);
        assert_eq!(frame.get_f64("pressure"), Some(99_000.5_f32 as f64));
    }

    #[test]
    fn overflow_resets_and_resynchronizes() {
        let mut config = DatabotConfig::default();
        config.pressure = true;
        let mut decoder = FrameDecoder::new(&config);

        // 3 buffered + 4 more = 7 > 4 expected: corrupt stream.
        assert!(decoder.push(&[0, 1, 2]).unwrap().is_none());
        let err = decoder.push(&[3, 4, 5, 6]).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameOverflow { expected: 4, received: 7 }));

        // The next well-formed frame decodes cleanly.
        let frame = decoder.push(&frame_bytes(&[42.0])).unwrap().expect("complete frame");
        assert_eq!(frame.get_f64("pressure"), Some(42.0));
    }

    #[test]
    fn consecutive_frames_decode_independently() {
        let mut config = DatabotConfig::default();
        config.ambient_light = true;
        let mut decoder = FrameDecoder::new(&config);

        for lux in [10.0_f32, 550.0, 901.0] {
            let frame = decoder.push(&frame_bytes(&[lux])).unwrap().expect("complete frame");
            assert_eq!(frame.get_f64("ambient_light_in_lux"), Some(lux as f64));
        }
    }
}
