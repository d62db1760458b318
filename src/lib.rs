use std::env;

pub mod address;
pub mod client;
pub mod config;
pub mod consumer;
pub mod device;
pub mod error;
pub mod protocol;

pub use address::{resolve, DeviceAddress};
pub use client::{Databot, StopReason};
pub use config::types::{BleConfig, DatabotConfig, Led};
pub use consumer::{CallbackConsumer, Disposition, FileConsumer, FrameConsumer, FrameReceiver, QueueConsumer};
pub use protocol::frame::SensorFrame;

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}
