use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// One fully reassembled sensor reading.
///
/// `fields` preserves wire order (the order of the sensor table), so iterating
/// or serializing a frame always lists fields the way the device sent them.
/// A frame is created once per decoded notification, handed to exactly one
/// consumer, and owned by that consumer from then on.
#[derive(Debug, Clone, Serialize)]
pub struct SensorFrame {
    /// Seconds since the Unix epoch, host clock, assigned at decode time.
    pub epoch: f64,
    pub fields: IndexMap<String, Value>,
}

impl SensorFrame {
    pub fn new(epoch: f64) -> Self {
        SensorFrame { epoch, fields: IndexMap::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Numeric field accessor; `None` when absent or not a number.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    /// One flat, self-describing JSON record: every field in wire order,
    /// preceded by an injected `time` field carrying the epoch timestamp.
    pub fn to_record_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Record<'a> {
            time: f64,
            #[serde(flatten)]
            fields: &'a IndexMap<String, Value>,
        }

        serde_json::to_string(&Record { time: self.epoch, fields: &self.fields })
    }
}

/// Seconds since the Unix epoch as a float, host clock.
pub fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keep_insertion_order() {
        let mut frame = SensorFrame::new(1.0);
        frame.insert("gyro_x", 0.5);
        frame.insert("gyro_y", -0.5);
        frame.insert("pressure", 101_325.0);

        let names: Vec<&str> = frame.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["gyro_x", "gyro_y", "pressure"]);
        assert_eq!(frame.get_f64("pressure"), Some(101_325.0));
        assert_eq!(frame.get_f64("missing"), None);
    }

    #[test]
    fn record_json_injects_time_first_and_keeps_field_order() {
        let mut frame = SensorFrame::new(1_700_000_000.5);
        frame.insert("pressure", 101_325.0);
        frame.insert("distance", 1.25);

        let line = frame.to_record_json().unwrap();
        assert_eq!(line, "{\"time\":1700000000.5,\"pressure\":101325.0,\"distance\":1.25}");
    }
}
