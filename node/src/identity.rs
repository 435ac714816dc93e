//! Node key loading and persistence.
//!
//! Keys are stored as a single line of hex, the same format `--key` takes.

use anyhow::{Context, Result};
use std::path::Path;

use swarm_protocol::crypto::PrivateKey;

/// Resolves the node key from `--key`, then `--key-file`, else generates a
/// throwaway one. The flag reports whether the key is ephemeral.
pub fn resolve_key(key: Option<&str>, key_file: Option<&Path>) -> Result<(PrivateKey, bool)> {
    if let Some(hex) = key {
        let key = PrivateKey::from_hex(hex.trim()).context("invalid --key")?;
        return Ok((key, false));
    }
    if let Some(path) = key_file {
        return Ok((read_key_file(path)?, false));
    }
    Ok((PrivateKey::generate(), true))
}

/// Reads a hex key file written by [`write_key_file`].
pub fn read_key_file(path: &Path) -> Result<PrivateKey> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read node key from {}", path.display()))?;
    PrivateKey::from_hex(contents.trim())
        .with_context(|| format!("invalid node key in {}", path.display()))
}

/// Writes `key` as hex, readable only by the owner on Unix.
pub fn write_key_file(path: &Path, key: &PrivateKey) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, format!("{}\n", key.to_hex()))
        .with_context(|| format!("failed to write node key to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
