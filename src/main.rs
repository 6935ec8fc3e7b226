// src/main.rs
//! Process entry point.
//!
//! Takes a single positional port argument, parsed leniently (leading digits
//! accepted, trailing garbage warned about but not fatal), applies
//! environment-driven executor/expiry configuration, and logs the PID before
//! the accept loop starts.

use cacheproxy::config::ProxyConfig;
use cacheproxy::proxy::Proxy;

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <port>");
}

/// Parses a port argument leniently: leading whitespace and sign are
/// accepted, the longest valid decimal prefix is used, and any unparsed
/// suffix only produces a warning, not a failure.
///
/// Returns `None` only when no digit at all could be parsed.
fn get_port(raw: &str) -> Option<u16> {
    let trimmed = raw.trim();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    let mut idx = 0;
    if idx < bytes.len() && (bytes[idx] == b'+' || bytes[idx] == b'-') {
        idx += 1;
    }
    let digits_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    end = idx;
    if end == digits_start {
        cacheproxy::log!("unable to parse port from {:?}: no digits found", raw);
        return None;
    }
    let prefix = &trimmed[..end];
    if end < trimmed.len() {
        cacheproxy::log!(
            "trailing characters {:?} in port argument {:?} ignored",
            &trimmed[end..],
            raw
        );
    }
    match prefix.parse::<i64>() {
        Ok(value) => {
            if !(0..=u16::MAX as i64).contains(&value) {
                cacheproxy::log!("port value {} out of range, clamping to 0", value);
                Some(0)
            } else {
                Some(value as u16)
            }
        }
        Err(_) => {
            cacheproxy::log!("unable to parse port from {:?}", raw);
            None
        }
    }
}

fn main() -> std::process::ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("cacheproxy");

    let Some(port_arg) = args.get(1) else {
        print_usage(program);
        return std::process::ExitCode::FAILURE;
    };

    let port = get_port(port_arg).unwrap_or(0);
    let config = ProxyConfig::from_env();

    let proxy = match Proxy::create(port, &config) {
        Ok(proxy) => proxy,
        Err(err) => {
            cacheproxy::log!("failed to start proxy: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };

    cacheproxy::log!("Proxy PID: {}", std::process::id());

    if let Err(err) = proxy.start() {
        cacheproxy::log!("accept loop exited with error: {}", err);
        proxy.shutdown();
        return std::process::ExitCode::FAILURE;
    }

    proxy.shutdown();
    std::process::ExitCode::SUCCESS
}
