//! Optional TOML defaults for repeated flags.
//!
//! Operators run the same deidentification against the same history for
//! months; `deidmap.toml` keeps the paths and column lists out of every
//! invocation. Flags always win over the file.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Contents of `deidmap.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Shared history directory holding the bare store repositories.
    pub history: Option<String>,
    /// Directory for this machine's working copies.
    pub work_dir: Option<String>,
    /// Pool file of pre-generated identifiers.
    pub pool: Option<String>,
    /// Column holding the local subject id.
    pub id_column: Option<String>,
    /// Date columns to shift.
    #[serde(default)]
    pub date_columns: Vec<String>,
    /// Shift window width in days.
    pub window: Option<i64>,
}

impl Settings {
    /// Load settings from `path`; a missing file yields empty defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };
        toml::from_str(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))
    }
}

/// Resolve one value from flag, then config, then error.
pub fn require(
    flag: Option<String>,
    fallback: Option<&String>,
    name: &str,
) -> Result<String, String> {
    flag.or_else(|| fallback.cloned())
        .ok_or_else(|| format!("missing --{name} (not on the command line or in the config file)"))
}

/// Default work root: a dot-directory next to the current process.
pub fn default_work_dir() -> String {
    ".deidmap/work".to_string()
}
