// src/log.rs
//! Serialized, timestamped, thread-tagged line logging.
//!
//! One entry point that renders a local-time timestamp with millisecond
//! precision, looks up the calling thread's name, replaces control
//! characters with spaces, and writes a single line. All writes are
//! serialized behind one mutex so lines from concurrent executors are never
//! interleaved.
//!
//! Thread names come from [`std::thread::Thread::name`], which returns
//! `None` for unnamed threads; those are logged as `"<unnamed>"`.

use std::io::Write;
use std::sync::Mutex;

use chrono::Local;

/// Maximum rendered message length.
const MAX_LOG_MESSAGE_LENGTH: usize = 1024;

static SINK: Mutex<()> = Mutex::new(());

/// Renders and writes one log line to stdout.
///
/// Serialized across threads; flushes after every line; never panics on a
/// write failure (a full disk or closed stdout must not bring down a proxy
/// thread — the failure is silently swallowed).
pub fn log(args: std::fmt::Arguments<'_>) {
    let mut text = args.to_string();
    if text.len() > MAX_LOG_MESSAGE_LENGTH {
        text.truncate(MAX_LOG_MESSAGE_LENGTH);
    }
    sanitize_in_place(&mut text);

    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");

    let now = Local::now();
    let line = format!(
        "{} --- [{:>15}] : {}\n",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        truncate_name(thread_name),
        text
    );

    let _guard = SINK.lock().unwrap_or_else(|e| e.into_inner());
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(line.as_bytes());
    let _ = stdout.flush();
}

/// Replaces `\n`/`\r` with spaces so every call produces exactly one line.
fn sanitize_in_place(text: &mut str) {
    // Safety-free in-place rewrite: '\n'/'\r' and ' ' are all single-byte
    // ASCII, so replacing bytes in place cannot split a multi-byte UTF-8
    // sequence.
    unsafe {
        for b in text.as_bytes_mut() {
            if *b == b'\n' || *b == b'\r' {
                *b = b' ';
            }
        }
    }
}

/// Right-aligns (and truncates) a thread name to the 15-character field the
/// original's `%15s` format specifier produces.
fn truncate_name(name: &str) -> &str {
    if name.len() <= 15 {
        name
    } else {
        &name[name.len() - 15..]
    }
}

/// Logs a formatted line. Thin wrapper over [`log`] so call sites read like
/// `log!("Proxy PID: {}", pid)` instead of threading `format_args!` through.
#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::log::log(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_newlines() {
        let mut s = String::from("line one\nline two\r\n");
        sanitize_in_place(&mut s);
        assert!(!s.contains('\n'));
        assert!(!s.contains('\r'));
    }

    #[test]
    fn test_truncate_name_short() {
        assert_eq!(truncate_name("worker-1"), "worker-1");
    }

    #[test]
    fn test_truncate_name_long() {
        let long = "a-very-long-thread-name";
        let truncated = truncate_name(long);
        assert_eq!(truncated.len(), 15);
        assert_eq!(truncated, &long[long.len() - 15..]);
    }

    #[test]
    fn test_log_does_not_panic() {
        log(format_args!("hello from test"));
        crate::log!("macro form with arg {}", 42);
    }

    #[test]
    fn test_concurrent_logging_does_not_interleave_badly() {
        use std::thread;
        let handles: Vec<_> = (0..8)
            .map(|i| {
                thread::Builder::new()
                    .name(format!("log-test-{i}"))
                    .spawn(move || {
                        for j in 0..20 {
                            crate::log!("thread {} iteration {}", i, j);
                        }
                    })
                    .unwrap()
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
