use crate::config::Config;
use crate::utils::{ensure_dir, get_bridge_home};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use tracing::warn;

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_bridge_home()?.join("config.json"))
}

/// Load the configuration document. If the file is missing, write a fresh
/// default document to disk and return it, so the path exists for external
/// writers (the web UI this bridge shares `pending_triggers` with) from the
/// very first run.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    if !path.exists() {
        let mut default_config = Config::default();
        crate::config::credentials::apply_env_overrides(&mut default_config);
        default_config
            .validate()
            .with_context(|| "Default configuration failed validation")?;
        if let Err(e) = save_config(&default_config, Some(path)) {
            warn!("Could not write default config to {}: {}", path.display(), e);
        }
        return Ok(default_config);
    }

    // Acquire shared (read) lock — allows concurrent readers, blocks during writes
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open config at {}", path.display()))?;
    file.lock_shared()
        .with_context(|| "Failed to acquire shared lock on config file")?;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    // Lock released when `file` drops at end of scope

    let data: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?;

    // Every field in `Config` and its descendants carries `#[serde(default)]`
    // (directly or via its type's `Default` impl), so deserializing any
    // partial/older document here already performs the deep-merge-with-defaults
    // the schema promises — newly introduced keys appear typed, untouched keys
    // round-trip unchanged.
    let mut config: Config =
        serde_json::from_value(data).with_context(|| "Failed to deserialize config")?;

    crate::config::credentials::apply_env_overrides(&mut config);

    check_file_permissions(path);

    config.validate().with_context(|| "Configuration validation failed")?;

    Ok(config)
}

/// Warn if the config file or its parent directory has overly permissive permissions.
/// Only emits warnings once per process to avoid spam when config is loaded multiple times.
#[cfg(unix)]
fn check_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Once;

    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        if let Ok(meta) = std::fs::metadata(path) {
            let mode = meta.permissions().mode();
            if mode & 0o077 != 0 {
                warn!(
                    "config file {} has permissions {:o} — recommend 0600",
                    path.display(),
                    mode & 0o777
                );
            }
        }

        if let Some(parent) = path.parent()
            && let Ok(meta) = std::fs::metadata(parent)
        {
            let mode = meta.permissions().mode();
            if mode & 0o077 != 0 {
                warn!(
                    "config directory {} has permissions {:o} — recommend 0700",
                    parent.display(),
                    mode & 0o777
                );
            }
        }
    });
}

#[cfg(not(unix))]
fn check_file_permissions(_path: &Path) {}

pub fn save_config(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    ensure_dir(path.parent().context("Config path has no parent")?)?;

    // Acquire exclusive lock via separate lockfile.
    // A separate file is needed because atomic_write() uses rename(), which
    // invalidates flock on the original inode. The .lock file survives renames.
    let lock_path = path.with_extension("json.lock");
    let lock_file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to create lock file at {}", lock_path.display()))?;
    lock_file
        .lock_exclusive()
        .with_context(|| "Failed to acquire exclusive lock on config lock file")?;

    let content = serde_json::to_string_pretty(config)?;
    crate::utils::atomic_write(path, &content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    // Lock released when lock_file drops
    Ok(())
}

#[cfg(test)]
mod tests;
