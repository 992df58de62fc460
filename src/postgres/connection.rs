// ABOUTME: Opens tokio-postgres connections with native TLS
// ABOUTME: Holds the process-wide policy for self-signed certificates

use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::sync::OnceLock;
use tokio_postgres::Client;

use crate::error::{Result, SyncError};
use crate::utils::strip_password_from_url;

static ALLOW_SELF_SIGNED: OnceLock<bool> = OnceLock::new();

/// Set whether TLS connections accept self-signed certificates.
///
/// Only the first call takes effect. Call it once at startup, before any
/// connection is opened.
pub fn init_tls_policy(allow_self_signed_certs: bool) {
    if ALLOW_SELF_SIGNED.set(allow_self_signed_certs).is_err() {
        tracing::debug!("TLS policy already initialized, ignoring");
    }
    if allow_self_signed_certs {
        tracing::warn!("TLS certificate verification is disabled (--allow-self-signed-certs)");
    }
}

fn allow_self_signed() -> bool {
    ALLOW_SELF_SIGNED.get().copied().unwrap_or(false)
}

fn build_tls_connector() -> Result<MakeTlsConnector> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(allow_self_signed())
        .danger_accept_invalid_hostnames(allow_self_signed())
        .build()
        .map_err(|e| SyncError::connection("Failed to build TLS connector", e))?;

    Ok(MakeTlsConnector::new(connector))
}

/// Connect to PostgreSQL and spawn the connection driver.
///
/// TLS is negotiated according to the URL's `sslmode` (default `prefer`).
/// The driver task ends when the returned client is dropped, which closes the
/// connection.
pub async fn connect(url: &str) -> Result<Client> {
    let tls = build_tls_connector()?;
    let display_url = strip_password_from_url(url);

    let (client, connection) = tokio_postgres::connect(url, tls)
        .await
        .map_err(|e| SyncError::connection(format!("Failed to connect to {}", display_url), e))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("PostgreSQL connection error: {}", e);
        }
    });

    tracing::debug!("Connected to {}", display_url);

    Ok(client)
}
