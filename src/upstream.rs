//! DNS-over-HTTPS upstream client (RFC 8484).
//!
//! Queries go out as HTTP GET requests with the raw DNS message encoded in
//! the `dns` query parameter (base64url, no padding). The client is built
//! once at startup and shared by every forwarder task; connection pooling
//! and the per-request timeout live here.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::debug;

use crate::trust::TrustConfig;

/// Timeout applied when the configured value is below the 1 second floor.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const KEEPALIVE: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_IDLE_CONNS: usize = 32;

/// Coerce a configured timeout in seconds to its effective value.
///
/// Anything below 1 second falls back to the 3 second default.
pub fn effective_timeout(secs: i64) -> Duration {
    if secs < 1 {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    } else {
        Duration::from_secs(secs as u64)
    }
}

/// Build the upstream request URL for a raw DNS query.
pub fn query_url(base: &str, query: &[u8]) -> String {
    format!("{}?dns={}", base, URL_SAFE_NO_PAD.encode(query))
}

/// Shared HTTPS client bound to one DoH endpoint.
pub struct DohClient {
    http: reqwest::Client,
    base_url: String,
}

impl DohClient {
    /// Build the client with the given trust configuration and per-request
    /// timeout. One attempt per query, no retries.
    pub fn new(
        base_url: String,
        trust: &TrustConfig,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let builder = reqwest::Client::builder()
            .use_rustls_tls()
            .no_proxy()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(KEEPALIVE)
            .pool_max_idle_per_host(MAX_IDLE_CONNS)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .timeout(timeout);

        let http = trust.apply(builder).build()?;

        Ok(Self { http, base_url })
    }

    /// The configured DoH endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one DNS query upstream and return the raw HTTP response.
    ///
    /// Status and body handling are the caller's concern; a timeout surfaces
    /// here as an ordinary transport error.
    pub async fn fetch(&self, query: &[u8]) -> reqwest::Result<reqwest::Response> {
        let url = query_url(&self.base_url, query);

        debug!(query_len = query.len(), "sending DoH query");

        self.http
            .get(url)
            .header("Accept", "application/dns-message")
            .send()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_timeout_coerces_zero_and_negative() {
        assert_eq!(effective_timeout(0), Duration::from_secs(3));
        assert_eq!(effective_timeout(-5), Duration::from_secs(3));
    }

    #[test]
    fn effective_timeout_keeps_valid_values() {
        assert_eq!(effective_timeout(1), Duration::from_secs(1));
        assert_eq!(effective_timeout(10), Duration::from_secs(10));
    }

    #[test]
    fn query_url_encodes_base64url_without_padding() {
        // One byte encodes to two base64 chars; no '=' padding appended.
        let url = query_url("https://dns.example/dns-query", &[0x00]);
        assert_eq!(url, "https://dns.example/dns-query?dns=AA");
    }

    #[test]
    fn query_url_uses_url_safe_alphabet() {
        // 0xfb 0xff maps to "+/" in the standard alphabet, "-_" in url-safe.
        let url = query_url("https://dns.example/dns-query", &[0xfb, 0xff]);
        assert_eq!(url, "https://dns.example/dns-query?dns=-_8");
    }

    #[test]
    fn query_url_encodes_only_given_bytes() {
        let buf = [0x12u8; 16];
        let url = query_url("https://dns.example/dns-query", &buf[..4]);
        assert_eq!(url, "https://dns.example/dns-query?dns=EhISEg");
    }
}
