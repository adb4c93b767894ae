//!
//! contactbook configuration
//! -------------------------
//! Server settings are resolved in three layers: built-in defaults, then
//! `CONTACTBOOK_*` environment variables, then command-line flags. A value
//! that does not parse is logged and the previous layer's value is kept.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::query::page::DEFAULT_PAGE_SIZE;

pub const ENV_BIND: &str = "CONTACTBOOK_BIND";
pub const ENV_HTTP_PORT: &str = "CONTACTBOOK_HTTP_PORT";
pub const ENV_DATA_FILE: &str = "CONTACTBOOK_DATA_FILE";
pub const ENV_PAGE_SIZE: &str = "CONTACTBOOK_PAGE_SIZE";

pub const USAGE: &str = "contactbook\n\nUSAGE:\n  contactbook [--bind ADDR] [--port N] [--data-file PATH] [--page-size N]\n\nOPTIONS:\n  --bind ADDR         Listen address (env: CONTACTBOOK_BIND, default 0.0.0.0)\n  --port N            HTTP port (env: CONTACTBOOK_HTTP_PORT, default 3000)\n  --data-file PATH    JSON snapshot file; in-memory only when unset (env: CONTACTBOOK_DATA_FILE)\n  --page-size N       Default listing page size (env: CONTACTBOOK_PAGE_SIZE, default 10)\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub http_port: u16,
    pub data_file: Option<PathBuf>,
    pub default_page_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 3000,
            data_file: None,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn parse_or_keep<T: FromStr>(source: &str, raw: &str, current: T) -> T {
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(target: "startup", "ignoring unparseable value '{}' for {}", raw, source);
            current
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl ServerConfig {
    /// Resolve from the process environment and `std::env::args()`.
    pub fn load() -> Self {
        let args: Vec<String> = env::args().collect();
        Self::resolve(|name| env::var(name).ok(), &args)
    }

    /// Resolve from an explicit environment lookup and argument list.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>, args: &[String]) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_BIND) {
            cfg.bind = parse_or_keep(ENV_BIND, &v, cfg.bind);
        }
        if let Some(v) = lookup(ENV_HTTP_PORT) {
            cfg.http_port = parse_or_keep(ENV_HTTP_PORT, &v, cfg.http_port);
        }
        if let Some(v) = lookup(ENV_DATA_FILE).filter(|v| !v.trim().is_empty()) {
            cfg.data_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_PAGE_SIZE) {
            cfg.default_page_size = parse_or_keep(ENV_PAGE_SIZE, &v, cfg.default_page_size);
        }

        // CLI arguments override environment
        if let Some(v) = arg_value(args, "--bind") {
            cfg.bind = parse_or_keep("--bind", v, cfg.bind);
        }
        if let Some(v) = arg_value(args, "--port") {
            cfg.http_port = parse_or_keep("--port", v, cfg.http_port);
        }
        if let Some(v) = arg_value(args, "--data-file") {
            cfg.data_file = Some(PathBuf::from(v));
        }
        if let Some(v) = arg_value(args, "--page-size") {
            cfg.default_page_size = parse_or_keep("--page-size", v, cfg.default_page_size);
        }

        if cfg.default_page_size == 0 {
            warn!(target: "startup", "page size must be positive; using {}", DEFAULT_PAGE_SIZE);
            cfg.default_page_size = DEFAULT_PAGE_SIZE;
        }
        cfg
    }
}
