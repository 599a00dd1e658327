use crate::config::Config;
use imex_store::JsonlStore;
use serde::Serialize;
use std::path::Path;
use std::process;

/// Configuration and startup failures: nothing was processed.
pub const EXIT_STARTUP: i32 = 1;

pub fn fail_startup(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(EXIT_STARTUP);
}

pub fn load_config_or_exit(path: &str) -> Config {
    Config::load_or_default(path).unwrap_or_else(|e| fail_startup(e))
}

pub fn open_store_or_exit(path: &Path) -> JsonlStore {
    JsonlStore::open(path)
        .unwrap_or_else(|e| fail_startup(format!("failed to open store {}: {e}", path.display())))
}

pub fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => fail_startup(format!("json serialization failed: {e}")),
    }
}

pub fn yes_no(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}

pub fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}
