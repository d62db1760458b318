use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::address::DeviceAddress;
use crate::config::types::BleConfig;
use crate::device::constants::{CONNECT_DEADLINE, SCAN_POLL_DELAY, WRITE_DEADLINE};
use crate::device::types::{SessionEvent, SessionState};
use crate::error::ConnectionError;

/// Capacity of the channel between the notification reader task and the run
/// loop. Dispatch normally keeps up; the bound only smooths short bursts.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One streaming session against the device.
///
/// Owns the whole link lifecycle: locate the peripheral, connect, subscribe
/// to the read characteristic, write the configuration command, and forward
/// every notification payload through the event channel returned by
/// [`ConnectionSession::open`]. The session moves strictly forward through
/// [`SessionState`]; there is no reconnect. Callers that need resilience
/// start a fresh session.
pub struct ConnectionSession {
    peripheral: Peripheral,
    read_char: Characteristic,
    state: SessionState,
    reader_cancel: CancellationToken,
    reader_handle: JoinHandle<()>,
}

impl ConnectionSession {
    /// Establish the link and start streaming.
    ///
    /// Connects to the peripheral with `address`, subscribes to the read
    /// characteristic, then writes `command` to the write characteristic.
    /// Subscribing first means the first frame cannot slip past the host
    /// between configuration and subscription.
    ///
    /// Returns the session plus the receiving end of its event channel.
    pub async fn open(
        address: &DeviceAddress,
        ble: &BleConfig,
        command: &[u8],
    ) -> Result<(ConnectionSession, mpsc::Receiver<SessionEvent>), ConnectionError> {
        info!("Connecting to peripheral {}...", address);
        let peripheral = locate_peripheral(address, ble).await?;

        match timeout(Duration::from_millis(CONNECT_DEADLINE), peripheral.connect()).await {
            Err(_) => return Err(ConnectionError::ConnectTimeout),
            Ok(result) => result?,
        }

        let read_char = match configure(&peripheral, ble, command).await {
            Ok(read_char) => read_char,
            Err(err) => {
                // Do not leave a half-configured link behind.
                let _ = peripheral.disconnect().await;
                return Err(err);
            }
        };

        let reader_cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader_handle = read_notifications_task(
            reader_cancel.clone(),
            &peripheral,
            ble.read,
            events_tx,
        );

        let session = ConnectionSession {
            peripheral,
            read_char,
            state: SessionState::Streaming,
            reader_cancel,
            reader_handle,
        };

        Ok((session, events_rx))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Tear the session down: stop the reader task, unsubscribe, disconnect.
    ///
    /// Failures during teardown are logged rather than surfaced; after this
    /// call the link is no longer subscribed either way.
    pub async fn close(mut self) {
        self.state = SessionState::Closed;
        self.reader_cancel.cancel();

        if let Err(err) = (&mut self.reader_handle).await {
            warn!("Failed to join the notification reader task: {:?}", err);
        }

        if let Err(err) = self.peripheral.unsubscribe(&self.read_char).await {
            warn!("Failed to unsubscribe from the read characteristic: {:?}", err);
        }

        if let Err(err) = self.peripheral.disconnect().await {
            warn!("Failed to disconnect from the peripheral: {:?}", err);
        }

        info!("Session closed");
    }
}

/// Discover services, subscribe to the read characteristic, and write the
/// configuration command. Returns the read characteristic for later
/// unsubscription.
async fn configure(
    peripheral: &Peripheral,
    ble: &BleConfig,
    command: &[u8],
) -> Result<Characteristic, ConnectionError> {
    info!("Connected; discovering services...");
    peripheral.discover_services().await?;

    let read_char = find_characteristic(peripheral, ble.service, ble.read)?;
    let write_char = find_characteristic(peripheral, ble.service, ble.write)?;

    info!("Subscribing to characteristic {:?}", read_char.uuid);
    peripheral.subscribe(&read_char).await?;

    write_command(peripheral, &write_char, command).await?;
    debug!("Configuration command accepted ({} bytes)", command.len());

    Ok(read_char)
}

/// Find the peripheral whose id matches the resolved address. Scanning is
/// required even for a known address: platforms only hand out peripherals
/// they have seen advertise.
async fn locate_peripheral(
    address: &DeviceAddress,
    ble: &BleConfig,
) -> Result<Peripheral, ConnectionError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    let filter = ScanFilter {
        services: vec![ble.service],
    };
    for adapter in &adapters {
        adapter.start_scan(filter.clone()).await?;
    }

    let deadline = Instant::now() + Duration::from_millis(CONNECT_DEADLINE);
    let found = 'scan: loop {
        for adapter in &adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                }
            };

            for peripheral in peripherals {
                if peripheral.id().to_string() == address.as_str() {
                    break 'scan Some(peripheral);
                }
            }
        }

        if Instant::now() >= deadline {
            break None;
        }
        sleep(Duration::from_millis(SCAN_POLL_DELAY)).await;
    };

    for adapter in &adapters {
        let _ = adapter.stop_scan().await;
    }

    found.ok_or(ConnectionError::PeripheralNotFound)
}

fn find_characteristic(
    peripheral: &Peripheral,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
) -> Result<Characteristic, ConnectionError> {
    for service in peripheral.services() {
        if !service.uuid.eq(&service_uuid) {
            continue;
        }

        for characteristic in &service.characteristics {
            if characteristic.uuid.eq(&characteristic_uuid) {
                return Ok(characteristic.clone());
            }
        }
    }

    Err(ConnectionError::MissingCharacteristic)
}

async fn write_command(
    peripheral: &Peripheral,
    write_char: &Characteristic,
    command: &[u8],
) -> Result<(), ConnectionError> {
    let fut = peripheral.write(write_char, command, WriteType::WithResponse);

    tokio::select! {
        _ = sleep(Duration::from_millis(WRITE_DEADLINE)) => {
            Err(ConnectionError::WriteTimeout)
        }
        result = fut => {
            result?;
            Ok(())
        }
    }
}

fn read_notifications_task(
    cancel: CancellationToken,
    peripheral: &Peripheral,
    read_uuid: Uuid,
    events: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()> {
    let peripheral = peripheral.clone();

    spawn(async move {
        let mut notification_stream = match peripheral.notifications().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Could not open the notification stream: {:?}", err);
                let _ = events.send(SessionEvent::Dropped).await;
                return;
            }
        };

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                next = notification_stream.next() => match next {
                    Some(data) if data.uuid.eq(&read_uuid) => {
                        if events.send(SessionEvent::Notification(data.value)).await.is_err() {
                            // Receiver side is gone; the run loop has exited.
                            break 'mainloop;
                        }
                    },
                    Some(data) => {
                        debug!("Ignoring notification from {:?}", data.uuid);
                    },
                    None => {
                        warn!("Notification stream ended; link dropped");
                        let _ = events.send(SessionEvent::Dropped).await;
                        break 'mainloop;
                    },
                }
            }
        }
    })
}
