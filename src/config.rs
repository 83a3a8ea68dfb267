//! Process-wide settings supplied by the embedding application.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable that switches state persistence on.
pub const STATE_ENABLED_VAR: &str = "UUID1_STATE_ENABLED";

/// Environment variable that overrides the location of the state file.
pub const STATE_FILE_VAR: &str = "UUID1_STATE_FILE";

/// Settings that control clock sequence persistence.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Settings {
    /// Whether the clock sequence state is restored at startup and stored at shutdown.
    pub state_enabled: bool,

    /// Location of the state file used by the default store.
    pub state_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_enabled: false,
            state_file: env::temp_dir().join("uuid1-state.json"),
        }
    }
}

impl Settings {
    /// Reads the settings from `UUID1_STATE_ENABLED` and `UUID1_STATE_FILE`, falling back to the
    /// defaults for variables that are unset.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var_os(key))
    }

    /// Builds the settings from a variable lookup. The state file is taken as an OS string, so a
    /// path that is not valid Unicode is kept as is; a non-Unicode flag counts as unset.
    fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> Self {
        let mut settings = Self::default();
        if let Some(value) = var(STATE_ENABLED_VAR).and_then(|v| v.into_string().ok()) {
            settings.state_enabled = parse_flag(&value);
        }
        if let Some(value) = var(STATE_FILE_VAR).filter(|v| !v.is_empty()) {
            settings.state_file = PathBuf::from(value);
        }
        settings
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
