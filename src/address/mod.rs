use std::fmt;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration, Instant};

use crate::config::types::BleConfig;
use crate::device::constants::{DEVICE_NAME_PREFIX, SCAN_DEADLINE, SCAN_POLL_DELAY};
use crate::error::DiscoveryError;

pub mod cache;

/// Opaque link-layer identifier of the device: the platform peripheral id
/// (a MAC address on Linux and Windows, a CoreBluetooth UUID on macOS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        DeviceAddress(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve the device address.
///
/// With `force == false` an existing cache entry is returned without touching
/// the link layer at all. With `force == true`, or when no cache exists, a
/// discovery scan runs until a matching device appears; the result overwrites
/// the cache. Fails with [`DiscoveryError::Timeout`] when nothing matches
/// within the scan deadline.
pub async fn resolve(ble: &BleConfig, force: bool) -> Result<DeviceAddress, DiscoveryError> {
    if !force {
        if let Some(address) = cache::read_cached().await? {
            info!("Using cached device address {}", address);
            return Ok(address);
        }
    }

    let address = scan_for_device(ble).await?;
    cache::write_cache(&address).await?;
    Ok(address)
}

async fn start_scanning(manager: &Manager, ble: &BleConfig) -> Result<Vec<Adapter>, DiscoveryError> {
    let adapters = manager.adapters().await?;
    if adapters.is_empty() {
        return Err(DiscoveryError::NoAdapter);
    }

    let filter = ScanFilter {
        services: vec![ble.service],
    };

    for adapter in &adapters {
        info!(
            "Scanning using adapter {}...",
            adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string())
        );
        adapter.start_scan(filter.clone()).await?;
    }

    Ok(adapters)
}

async fn find_device(adapters: &[Adapter], ble: &BleConfig) -> Option<DeviceAddress> {
    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            }
        };

        for peripheral in peripherals {
            let properties = match peripheral.properties().await {
                Ok(Some(properties)) => properties,
                Ok(None) => continue,
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                    continue;
                }
            };

            // Some environments ignore the scan filter, so check the service
            // uuid again; fall back to the advertised name when the platform
            // does not relay service uuids.
            let service_match = properties.services.contains(&ble.service);
            let name_match = properties
                .local_name
                .as_deref()
                .map(|name| name.to_ascii_lowercase().starts_with(DEVICE_NAME_PREFIX))
                .unwrap_or(false);

            if service_match || name_match {
                info!(
                    "Using peripheral {} {} {:?}",
                    properties.address,
                    properties.local_name.unwrap_or(String::from("NONE")),
                    properties.services,
                );
                return Some(DeviceAddress::new(peripheral.id().to_string()));
            }
        }
    }

    None
}

async fn scan_for_device(ble: &BleConfig) -> Result<DeviceAddress, DiscoveryError> {
    let manager = Manager::new().await?;
    let adapters = start_scanning(&manager, ble).await?;

    let deadline = Instant::now() + Duration::from_millis(SCAN_DEADLINE);
    let found = loop {
        if let Some(address) = find_device(&adapters, ble).await {
            break address;
        }
        if Instant::now() >= deadline {
            for adapter in &adapters {
                let _ = adapter.stop_scan().await;
            }
            return Err(DiscoveryError::Timeout { timeout_ms: SCAN_DEADLINE });
        }
        sleep(Duration::from_millis(SCAN_POLL_DELAY)).await;
    };

    for adapter in &adapters {
        let _ = adapter.stop_scan().await;
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_serializes_as_a_plain_string() {
        let address = DeviceAddress::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(serde_json::to_string(&address).unwrap(), "\"AA:BB:CC:DD:EE:FF\"");
        assert_eq!(address.to_string(), "AA:BB:CC:DD:EE:FF");
    }
}
