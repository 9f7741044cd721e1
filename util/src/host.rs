//! Host platform utility functions

use std::path::PathBuf;

/// Environment variable pointing at the root of the software tree, under which the `params` and
/// `sessions` directories live.
pub const SW_ROOT_ENV_VAR: &str = "STAB_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get the name of the machine we're running on, if it can be found.
pub fn get_hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}
