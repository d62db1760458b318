use std::path::PathBuf;

use directories_next::ProjectDirs;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::address::DeviceAddress;
use crate::error::DiscoveryError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedAddress {
    address: String,
}

// the address cache lives in an os dependent standard directory, such as
// %LocalAppData% on windows.
fn get_cache_path() -> Result<PathBuf, DiscoveryError> {
    match ProjectDirs::from("io", "databot", "databot-link") {
        None => Err(DiscoveryError::NoCachePath),
        Some(dirs) => Ok(dirs.cache_dir().join("databot-address.json")),
    }
}

/// The cached device address for this host, if a previous scan stored one.
pub async fn read_cached() -> Result<Option<DeviceAddress>, DiscoveryError> {
    let path = get_cache_path()?;

    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let cached: CachedAddress = serde_json::from_str(&content)?;
    Ok(Some(DeviceAddress::new(cached.address)))
}

/// Overwrite the cache with `address`. Last writer wins; there is no locking
/// beyond the filesystem's own atomicity for a single write.
pub async fn write_cache(address: &DeviceAddress) -> Result<(), DiscoveryError> {
    let path = get_cache_path()?;

    let directory = path.parent().ok_or(DiscoveryError::NoCachePath)?;
    fs::create_dir_all(directory).await?;

    let content = serde_json::to_string_pretty(&CachedAddress {
        address: address.as_str().to_string(),
    })?;
    fs::write(&path, content).await?;

    info!("Cached device address at {}", path.to_string_lossy());
    Ok(())
}
