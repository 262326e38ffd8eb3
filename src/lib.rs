//! Local development HTTPS server.
//!
//! On startup a self-signed certificate for `localhost` and the host's IPv4
//! addresses is created if none exists ([`tls`]), then a static directory and
//! the `/update-time` endpoint are served over TLS ([`server`]).

pub mod config;
pub mod server;
pub mod tls;
