//! Server configuration

use std::net::SocketAddr;

/// Subprotocols advertised during the WebSocket upgrade
pub const STOMP_SUBPROTOCOLS: [&str; 3] = ["v10.stomp", "v11.stomp", "v12.stomp"];

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Whether to request per-message compression on the transport
    ///
    /// Carried for deployments that front the relay with a proxy that
    /// honors it; the built-in WebSocket layer does not negotiate
    /// permessage-deflate.
    pub compression: bool,

    /// WebSocket read buffer size in bytes
    pub read_buffer_size: usize,

    /// WebSocket write buffer size in bytes
    pub write_buffer_size: usize,

    /// Maximum accepted WebSocket message size in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8448".parse().unwrap(),
            compression: true,
            // Small buffers keep per-connection memory bounded; STOMP
            // control frames are tiny.
            read_buffer_size: 128,
            write_buffer_size: 512,
            max_message_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    /// Create a new config with a custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Enable or disable transport compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Set the read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the write buffer size
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set the maximum accepted message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}
