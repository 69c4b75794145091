use super::codec::{transport, Transport, DEFAULT_MAX_FRAME_LENGTH};
use crate::ports::transformer::RpcError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::net::TcpStream;

/// Idle transformation-service connections, keyed by resolved address.
#[derive(Debug)]
pub struct ConnectionPool {
    idle: Mutex<HashMap<String, Vec<Transport>>>,
    max_idle_per_addr: usize,
    max_frame_length: usize,
    closed: AtomicBool,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(8)
    }
}

impl ConnectionPool {
    pub fn new(max_idle_per_addr: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_addr,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    pub async fn connect(&self, addr: &str) -> Result<Transport, RpcError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RpcError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        tracing::debug!(addr, "opened transformation service connection");
        Ok(transport(stream, self.max_frame_length))
    }

    /// An idle connection to `addr` if one exists, otherwise a new one.
    /// The flag tells whether the connection was reused.
    pub async fn checkout(&self, addr: &str) -> Result<(Transport, bool), RpcError> {
        let pooled = self
            .idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.get_mut(addr).and_then(Vec::pop));
        match pooled {
            Some(conn) => Ok((conn, true)),
            None => Ok((self.connect(addr).await?, false)),
        }
    }

    /// Return a connection that finished a call cleanly.
    pub fn checkin(&self, addr: &str, conn: Transport) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            let conns = idle.entry(addr.to_string()).or_default();
            if conns.len() < self.max_idle_per_addr {
                conns.push(conn);
            }
        }
    }

    pub fn idle_count(&self, addr: &str) -> usize {
        self.idle
            .lock()
            .map(|idle| idle.get(addr).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Close every idle connection and stop pooling new ones.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut idle) = self.idle.lock() {
            let count: usize = idle.values().map(Vec::len).sum();
            idle.clear();
            tracing::info!(count, "closed pooled transformation connections");
        }
    }
}
