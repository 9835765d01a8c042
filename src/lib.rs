//! Viaduct - a UDP to DNS-over-HTTPS proxy.
//!
//! Listens for classic DNS queries over UDP and relays each one, as an
//! opaque byte blob, to a DoH resolver over HTTPS. The response bytes come
//! back to the original sender over the same socket. No parsing, caching,
//! or retries: a pure transport bridge.

pub mod pool;
pub mod proxy;
pub mod trust;
pub mod upstream;
