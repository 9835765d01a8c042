//! TLS trust configuration for the upstream HTTPS leg.
//!
//! Built once at startup from the CLI flags and an optional PEM bundle on
//! disk, then shared read-only by every request. A usable bundle always
//! wins over `--no-verify`: if at least one certificate parses, the bundle
//! becomes the exact trust root set and verification is forced back on.
//! Anything wrong with the bundle is a warning, never a startup failure.

use std::fs;
use std::path::Path;

use reqwest::Certificate;
use tracing::warn;

/// Immutable verification policy plus root certificate set.
pub struct TrustConfig {
    verify: bool,
    roots: Vec<Certificate>,
}

impl TrustConfig {
    /// Build the trust configuration from the requested verify flag and an
    /// optional CA bundle path.
    ///
    /// With no bundle (or a missing/empty/unparseable one) the system trust
    /// roots apply and `verify` follows `!verify_disabled`. A bundle with at
    /// least one parseable certificate replaces the root set entirely and
    /// re-enables verification regardless of `verify_disabled`.
    pub fn load(verify_disabled: bool, ca_bundle: Option<&Path>) -> Self {
        let mut config = Self {
            verify: !verify_disabled,
            roots: Vec::new(),
        };

        let Some(path) = ca_bundle else {
            return config;
        };

        // A missing bundle at the default path is the normal case.
        let Ok(meta) = fs::metadata(path) else {
            return config;
        };
        if meta.len() == 0 {
            return config;
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read CA bundle");
                return config;
            }
        };

        let roots: Vec<Certificate> = rustls_pemfile::certs(&mut data.as_slice())
            .filter_map(|der| der.ok())
            .filter_map(|der| Certificate::from_der(&der).ok())
            .collect();

        if roots.is_empty() {
            warn!(path = %path.display(), "no certificates parsed from CA bundle");
            return config;
        }

        config.roots = roots;
        config.verify = true;
        config
    }

    /// Whether the upstream server certificate is verified.
    pub fn verify_enabled(&self) -> bool {
        self.verify
    }

    /// Number of custom root certificates (0 means system roots).
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Apply this configuration to a reqwest client builder.
    pub(crate) fn apply(&self, mut builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        if !self.roots.is_empty() {
            // The bundle is the exact trust root set.
            builder = builder.tls_built_in_root_certs(false);
            for cert in &self.roots {
                builder = builder.add_root_certificate(cert.clone());
            }
        }
        builder.danger_accept_invalid_certs(!self.verify)
    }
}
