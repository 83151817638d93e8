//! Config directory resolution.

use std::path::PathBuf;

/// The hidden config dir, `~/.muxtunnel`.
///
/// Falls back to a relative `.muxtunnel` when `$HOME` is unset (containers,
/// stripped environments) so the stores still have somewhere to write.
pub fn config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".muxtunnel")
}
