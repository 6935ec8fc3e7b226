// src/proxy.rs
//! The accept loop and per-connection task body.
//!
//! This is deliberately thin: it exists so the cache and worker pool have
//! somewhere to plug in, not as a compliant HTTP implementation. Request
//! framing is reduced to "read until the blank line that ends the header
//! block, or give up past a size cap"; the bytes read are the fingerprint
//! verbatim.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use crate::cache::{Cache, CacheEntry};
use crate::config::{BufferPoolKind, ProxyConfig};
use crate::connection::PooledConnectionBuffers;
use crate::fingerprint::Fingerprint;
use crate::pool::{BufferPool, FastBufferPool, PoolConfig, WorkerPool};
use crate::proxy_error::{ProxyError, Result};

/// Size of the read buffer each task stages the client's request line into.
const REQUEST_READ_BUF_SIZE: usize = 8192;

/// Header block read larger than this without finding `\r\n\r\n` is rejected
/// rather than buffered without bound.
const MAX_REQUEST_HEADER_BYTES: usize = 64 * 1024;

/// Scratch-buffer source for per-connection I/O, abstracting over the two
/// buffer pool implementations so the accept loop doesn't need to know which
/// one `BUFFER_POOL_KIND` selected.
enum ScratchPool {
    Standard(Arc<BufferPool>),
    Fast(Arc<FastBufferPool>),
}

impl ScratchPool {
    fn new(kind: BufferPoolKind, config: PoolConfig) -> Self {
        match kind {
            BufferPoolKind::Standard => ScratchPool::Standard(Arc::new(BufferPool::new(config))),
            BufferPoolKind::Fast => ScratchPool::Fast(Arc::new(FastBufferPool::new(config))),
        }
    }

    /// Reads from `stream` into a pooled scratch buffer until the request
    /// header's terminating blank line is seen, EOF, or the size cap is hit.
    ///
    /// The standard-pool path stages the read through a
    /// [`PooledConnectionBuffers`] (a connection-scoped buffer holder), so
    /// the request buffer is burned and returned to the pool as soon as the
    /// connection-handling closure drops it — not just the raw `Buffer`
    /// underneath. The fast-pool path has no connection-scoped wrapper to
    /// thread through (`PooledConnectionBuffers` is built specifically over
    /// `Arc<BufferPool>`) and reads directly from a `FastPooledBuffer`.
    fn read_request_header(&self, stream: &mut TcpStream) -> io::Result<Vec<u8>> {
        match self {
            ScratchPool::Standard(pool) => {
                let mut conn = PooledConnectionBuffers::new(Arc::clone(pool));
                conn.buffers().init_read_buf(REQUEST_READ_BUF_SIZE);
                let buf = conn.buffers().read_buf.as_mut().expect("just initialized");
                let capacity = buf.capacity();
                buf.set_len(capacity).map_err(io::Error::other)?;
                let result = read_header_with(stream, buf.as_mut_slice());
                conn.release_to_pool();
                result
            }
            ScratchPool::Fast(pool) => {
                let mut scratch = pool.acquire();
                let capacity = scratch.capacity();
                scratch.set_len(capacity).map_err(io::Error::other)?;
                read_header_with(stream, scratch.as_mut_slice())
            }
        }
    }
}

/// Reads repeatedly into `scratch` (a full-capacity writable window onto a
/// pooled buffer) until the accumulated bytes contain `\r\n\r\n`, the stream
/// reaches EOF, or the size cap is exceeded.
fn read_header_with(stream: &mut TcpStream, scratch: &mut [u8]) -> io::Result<Vec<u8>> {
    let mut acc = Vec::new();
    loop {
        let n = stream.read(scratch)?;
        if n == 0 {
            break;
        }
        acc.extend_from_slice(&scratch[..n]);
        if acc.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if acc.len() > MAX_REQUEST_HEADER_BYTES {
            break;
        }
    }
    Ok(acc)
}

/// Extracts the upstream host (and optional port) from a `Host:` header
/// line, defaulting to port 80.
fn upstream_addr(request: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(request);
    for line in text.split("\r\n") {
        let lower = line.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("host:") {
            let host = rest.trim();
            if host.is_empty() {
                return None;
            }
            return Some(if host.contains(':') {
                host.to_string()
            } else {
                format!("{host}:80")
            });
        }
    }
    None
}

/// The concurrent caching forward proxy: an accept loop over the worker
/// pool, backed by the response cache.
pub struct Proxy {
    listener: TcpListener,
    cache: Arc<Cache>,
    workers: Arc<WorkerPool>,
    scratch: Arc<ScratchPool>,
}

impl Proxy {
    /// Binds `port` and wires up the cache and worker pool per `config`.
    pub fn create(port: u16, config: &ProxyConfig) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| ProxyError::Io(e.to_string()))?;
        let cache = Cache::create(config.cache_capacity, config.expiry_ms);
        let workers = WorkerPool::create(config.executor_count, config.queue_capacity);
        let scratch = Arc::new(ScratchPool::new(config.buffer_pool_kind, PoolConfig::default()));
        crate::log!(
            "Proxy listening on port {} (executors={}, cache_capacity={}, expiry_ms={})",
            port,
            config.executor_count,
            config.cache_capacity,
            config.expiry_ms
        );
        Ok(Self {
            listener,
            cache,
            workers,
            scratch,
        })
    }

    /// Accepts connections in a loop, handing each to the worker pool as a
    /// task. Runs until the listener errors out (e.g. a transient shutdown
    /// request); callers typically run this on a dedicated accept thread.
    pub fn start(&self) -> Result<()> {
        for incoming in self.listener.incoming() {
            let stream = match incoming {
                Ok(stream) => stream,
                Err(err) => {
                    crate::log!("accept() failed: {}", err);
                    continue;
                }
            };
            let cache = Arc::clone(&self.cache);
            let scratch = Arc::clone(&self.scratch);
            // Submission is a silent no-op once shutdown has begun: the
            // connection is simply dropped, not logged as an error.
            self.workers.submit(move || {
                if let Err(err) = handle_connection(stream, &cache, &scratch) {
                    crate::log!("connection task failed: {}", err);
                }
            });
        }
        Ok(())
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Shuts down the worker pool and cache expirer. The listener itself is
    /// closed when `self` drops.
    pub fn shutdown(&self) {
        self.workers.shutdown();
        self.cache.destroy();
    }
}

fn handle_connection(mut client: TcpStream, cache: &Arc<Cache>, scratch: &ScratchPool) -> Result<()> {
    let request = scratch
        .read_request_header(&mut client)
        .map_err(|e| ProxyError::Io(e.to_string()))?;
    if request.is_empty() {
        return Ok(());
    }

    let fingerprint = Fingerprint::from_bytes(&request);
    let (node, is_new) = cache.get_or_create(fingerprint, || std::sync::Arc::new(CacheEntry::new()));

    if !is_new {
        return stream_from_entry(&mut client, &node.entry);
    }

    let upstream = match upstream_addr(&request) {
        Some(addr) => addr,
        None => {
            node.entry.complete();
            return Err(ProxyError::Generic("request missing Host header".into()));
        }
    };

    let result = fetch_upstream(&upstream, &request, &node.entry);
    let stream_result = stream_from_entry(&mut client, &node.entry);
    result.and(stream_result)
}

/// Connects upstream, forwards the request verbatim, and copies the
/// response into the cache entry as bytes arrive — so subscribers racing the
/// fetch observe partial bytes, not just the final result.
fn fetch_upstream(upstream: &str, request: &[u8], entry: &CacheEntry) -> Result<()> {
    let do_fetch = || -> io::Result<()> {
        let mut upstream_stream = TcpStream::connect(upstream)?;
        upstream_stream.write_all(request)?;
        let mut chunk = [0u8; 8192];
        loop {
            let n = upstream_stream.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            entry.append(&chunk[..n]);
        }
        Ok(())
    };
    let outcome = do_fetch();
    entry.complete();
    outcome.map_err(|e| ProxyError::Io(e.to_string()))
}

/// Streams an entry's bytes to `client` as they become available, blocking
/// on the entry's readiness coordinator between chunks, until the entry
/// completes or is deleted out from under the subscriber.
fn stream_from_entry(client: &mut TcpStream, entry: &CacheEntry) -> Result<()> {
    let mut cursor = 0usize;
    loop {
        let snapshot = entry.wait_for_more(cursor);
        if !snapshot.bytes.is_empty() {
            client
                .write_all(&snapshot.bytes)
                .map_err(|e| ProxyError::Io(e.to_string()))?;
            cursor += snapshot.bytes.len();
        }
        if snapshot.complete || snapshot.deleted {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_addr_from_host_header() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert_eq!(upstream_addr(req).as_deref(), Some("example.com:80"));
    }

    #[test]
    fn test_upstream_addr_with_explicit_port() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com:8080\r\n\r\n";
        assert_eq!(upstream_addr(req).as_deref(), Some("example.com:8080"));
    }

    #[test]
    fn test_upstream_addr_missing_host() {
        let req = b"GET / HTTP/1.1\r\n\r\n";
        assert_eq!(upstream_addr(req), None);
    }
}
