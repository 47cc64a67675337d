use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write through a temporary file and rename, so readers never observe a
/// partially written file. A replaced file keeps its permissions; a new one
/// is readable by the owner only.
pub async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let existing = tokio::fs::metadata(path).await.ok().map(|m| m.permissions());
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, content.as_bytes()).await?;

    match existing {
        Some(permissions) => tokio::fs::set_permissions(&tmp, permissions).await?,
        #[cfg(unix)]
        None => {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        #[cfg(not(unix))]
        None => {}
    }

    tokio::fs::rename(&tmp, path).await?;
    debug!("{} written", path.display());
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
