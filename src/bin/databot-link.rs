use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use tokio::spawn;

use databot_link::consumer::{CallbackConsumer, Disposition, FileConsumer};
use databot_link::error::{ConsumerError, RunError};
use databot_link::{init_logging, resolve, BleConfig, Databot, DatabotConfig, Led};

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Stream sensor data from a databot pod over BLE.\n\nExample: databot-link stream --sensors pressure,gyro --refresh 100", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the device address and print it
    Address {
        /// Ignore any cached address and scan again
        #[arg(long)]
        force: bool,
    },

    /// Stream decoded frames to stdout (JSON lines) or to a file
    Stream {
        /// Comma separated sensors to enable: accel, linear-accel, gyro,
        /// magneto, pressure, ambient-light, distance, external-temp
        #[arg(long, value_delimiter = ',', required = true)]
        sensors: Vec<String>,

        /// Refresh interval in milliseconds
        #[arg(long, default_value_t = 500)]
        refresh: u16,

        /// Append records to this file instead of printing to stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Stop after this many records (file output only)
        #[arg(long)]
        records: Option<u64>,

        /// First LED color as R,G,B (0-255 each)
        #[arg(long, value_name = "R,G,B")]
        led1: Option<String>,

        /// Second LED color as R,G,B
        #[arg(long, value_name = "R,G,B")]
        led2: Option<String>,

        /// Third LED color as R,G,B
        #[arg(long, value_name = "R,G,B")]
        led3: Option<String>,
    },
}

fn apply_sensor(config: &mut DatabotConfig, name: &str) -> Result<(), String> {
    match name {
        "accel" => config.accel = true,
        "linear-accel" => config.linear_accel = true,
        "gyro" => config.gyro = true,
        "magneto" => config.magneto = true,
        "pressure" => config.pressure = true,
        "ambient-light" => config.ambient_light = true,
        "distance" => config.distance = true,
        "external-temp" => config.external_temp = true,
        other => return Err(format!("unknown sensor: {}", other)),
    }
    Ok(())
}

fn parse_led(value: &str) -> Result<Led, String> {
    let components: Vec<&str> = value.split(',').collect();
    if components.len() != 3 {
        return Err(format!("expected R,G,B but got: {}", value));
    }

    let mut rgb = [0u8; 3];
    for (slot, component) in rgb.iter_mut().zip(&components) {
        *slot = component
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("LED component out of range (0-255): {}", component))?;
    }

    Ok(Led::solid(rgb[0], rgb[1], rgb[2]))
}

fn build_config(
    sensors: &[String],
    refresh: u16,
    led1: Option<&str>,
    led2: Option<&str>,
    led3: Option<&str>,
) -> Result<DatabotConfig, String> {
    let mut config = DatabotConfig::default();
    config.refresh = refresh;

    for sensor in sensors {
        apply_sensor(&mut config, sensor.trim())?;
    }

    if let Some(value) = led1 {
        config.led1 = parse_led(value)?;
    }
    if let Some(value) = led2 {
        config.led2 = parse_led(value)?;
    }
    if let Some(value) = led3 {
        config.led3 = parse_led(value)?;
    }

    Ok(config)
}

fn watch_for_ctrl_c(databot: &Databot<impl databot_link::FrameConsumer>) {
    let cancel = databot.cancel_token();
    spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; stopping after the current frame");
            cancel.cancel();
        }
    });
}

async fn run_stream(
    config: DatabotConfig,
    output: Option<PathBuf>,
    records: Option<u64>,
) -> Result<(), RunError> {
    match output {
        Some(path) => {
            let consumer = FileConsumer::create(&path, records)
                .await
                .map_err(|source| RunError::Consumer { source })?;
            let databot = Databot::new(config, consumer);
            watch_for_ctrl_c(&databot);
            let reason = databot.run().await?;
            info!("Stopped: {:?}", reason);
        }
        None => {
            let consumer = CallbackConsumer::new(|frame: databot_link::SensorFrame| {
                let line = frame.to_record_json().map_err(ConsumerError::from)?;
                println!("{}", line);
                Ok(Disposition::Continue)
            });
            let databot = Databot::new(config, consumer);
            watch_for_ctrl_c(&databot);
            let reason = databot.run().await?;
            info!("Stopped: {:?}", reason);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), RunError> {
    init_logging();

    let args = Args::parse();

    match args.command {
        Command::Address { force } => {
            let address = resolve(&BleConfig::default(), force).await?;
            println!("{}", address);
            Ok(())
        }
        Command::Stream { sensors, refresh, output, records, led1, led2, led3 } => {
            let config = build_config(
                &sensors,
                refresh,
                led1.as_deref(),
                led2.as_deref(),
                led3.as_deref(),
            )
            .unwrap_or_else(|message| {
                eprintln!("{}", message);
                std::process::exit(2);
            });

            run_stream(config, output, records).await
        }
    }
}
