use std::path::PathBuf;

/// Config files looked up in the project root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["isle.config.toml", "isle.config.json"];

/// Prefix of environment variable overrides (`ISLE_PORT`, ...).
pub const ENV_PREFIX: &str = "ISLE_";

/// Keys accepted from every config source.
pub const CONFIG_KEYS: &[&str] = &[
    "port",
    "host",
    "open",
    "debounce_ms",
    "routes_dir",
    "components_dir",
    "public_dir",
    "client_entry",
    "aliases",
    "watch_ignore",
];

pub fn default_port() -> u16 {
    3000
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_debounce_ms() -> u64 {
    200
}

pub fn default_routes_dir() -> PathBuf {
    PathBuf::from("app/routes")
}

pub fn default_components_dir() -> PathBuf {
    PathBuf::from("app/components")
}

pub fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}
