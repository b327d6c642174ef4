use std::path::{Path, PathBuf};

use log::info;
use tokio::fs;

use crate::{Result, Timer};

/// Make sure the artifact exists at `dest`, fetching it from `url` otherwise.
///
/// An existing file is trusted as is. Returns whether a download happened.
pub async fn ensure_artifact(url: &str, dest: &Path) -> Result<bool> {
    if fs::try_exists(dest).await? {
        info!("Using cached model at {}", dest.display());
        return Ok(false);
    }

    let mut t = Timer::new_start(&format!("Fetching model from {}", url));

    let data = reqwest::get(url).await?.error_for_status()?.bytes().await?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    // the rename keeps a partial write from being mistaken for a cached model
    let part = partial_path(dest);
    fs::write(&part, &data).await?;
    fs::rename(&part, dest).await?;

    t.stop();
    info!("Wrote {} bytes to {}", data.len(), dest.display());

    Ok(true)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
