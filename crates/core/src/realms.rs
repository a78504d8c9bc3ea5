//! Realms lookup and address resolution
//!
//! Turns an invite code into a dialable `host:port`. The hosted world's join
//! endpoint routinely answers 503 while the realm is powering on, and may
//! return a UUID instead of an address when it only advertises the WebRTC
//! transport. The resolver retries through both within a bounded budget.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;

/// Base URL of the Realms service.
pub const REALMS_API_BASE: &str = "https://pocket.realms.minecraft.net";

/// Maximum attempts of the outer address-resolution loop.
pub const MAX_RESOLVE_ATTEMPTS: u32 = 10;

/// Pause between outer resolution attempts.
pub const RESOLVE_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Join-call backoff on transient upstream errors.
const JOIN_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Resolution failure taxonomy. Rendered messages keep the kind prefix.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("InviteInvalid: {0}")]
    InviteInvalid(String),

    #[error("AuthExpired: {0}")]
    AuthExpired(String),

    #[error("TransientUpstream: {0}")]
    TransientUpstream(String),

    #[error("UnsupportedTransport: {0}")]
    UnsupportedTransport(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ResolveError {
    /// Transient errors are worth another attempt; the rest are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientUpstream(_))
    }
}

/// A capability producing bearer tokens for the Realms endpoints.
pub trait TokenSource: Send + Sync {
    fn realms_token(&self) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;
}

/// A hosted world as returned by the invite lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct Realm {
    pub id: i64,
    pub name: String,
}

/// Payload of the join endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub network_protocol: String,
    #[serde(default)]
    pub pending_update: bool,
}

/// The join call, as a seam so the retry loop is testable without HTTP.
pub trait JoinEndpoint: Send + Sync {
    fn join(
        &self,
        realm_id: i64,
    ) -> impl std::future::Future<Output = Result<JoinResponse, ResolveError>> + Send;
}

/// HTTP client for the Realms service.
pub struct RealmsClient<T> {
    http: reqwest::Client,
    tokens: T,
    base_url: String,
}

impl<T: TokenSource> RealmsClient<T> {
    pub fn new(tokens: T) -> Self {
        Self::with_base_url(tokens, REALMS_API_BASE)
    }

    pub fn with_base_url(tokens: T, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            tokens,
            base_url: base_url.into(),
        }
    }

    /// Look up a realm by its invite code. Failures here are terminal.
    pub async fn realm_by_invite(&self, invite: &str) -> Result<Realm, ResolveError> {
        let url = format!("{}/worlds/v1/lookup/{}", self.base_url, invite);
        let body = self.get(&url).await?;
        serde_json::from_str(&body)
            .map_err(|err| ResolveError::InviteInvalid(format!("malformed realm response: {err}")))
    }

    /// One raw call to the join endpoint.
    async fn join_once(&self, realm_id: i64) -> Result<JoinResponse, ResolveError> {
        let url = format!("{}/worlds/{}/join", self.base_url, realm_id);
        let body = self.get(&url).await?;
        serde_json::from_str(&body).map_err(|err| {
            ResolveError::TransientUpstream(format!("malformed join response: {err}"))
        })
    }

    async fn get(&self, url: &str) -> Result<String, ResolveError> {
        let token = self
            .tokens
            .realms_token()
            .await
            .map_err(|err| ResolveError::AuthExpired(err.to_string()))?;

        let response = self
            .http
            .get(url)
            .header("User-Agent", "MCPE/UWP")
            .header("Client-Version", "1.10.1")
            .header("Authorization", token)
            .send()
            .await
            .map_err(|err| ResolveError::TransientUpstream(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ResolveError::TransientUpstream(err.to_string()))?;
        tracing::debug!(%status, body = %body, url, "realms API response");

        if status.is_success() {
            return Ok(body);
        }
        let message = format!("realms API error {status}: {body}");
        match status.as_u16() {
            401 | 403 => Err(ResolveError::AuthExpired(message)),
            404 => Err(ResolveError::InviteInvalid(message)),
            // 503 while the realm is powering on, and any other 5xx.
            s if s >= 500 => Err(ResolveError::TransientUpstream(message)),
            _ => Err(ResolveError::InviteInvalid(message)),
        }
    }
}

impl<T: TokenSource> JoinEndpoint for RealmsClient<T> {
    /// Join with exponential backoff over transient errors: a realm that is
    /// powering on returns 503 for its first several seconds.
    async fn join(&self, realm_id: i64) -> Result<JoinResponse, ResolveError> {
        let mut last_err = None;
        for (attempt, delay) in JOIN_BACKOFF.iter().enumerate() {
            match self.join_once(realm_id).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() => {
                    tracing::warn!(error = %err, attempt = attempt + 1, "realm join failed, retrying");
                    last_err = Some(err);
                    tokio::time::sleep(*delay).await;
                }
                Err(err) => return Err(err),
            }
        }
        match self.join_once(realm_id).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_transient() => Err(last_err.unwrap_or(err)),
            Err(err) => Err(err),
        }
    }
}

/// Resolve an invite code all the way to a dialable address.
pub async fn resolve_realm_address<T: TokenSource>(
    client: &RealmsClient<T>,
    invite: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<String, ResolveError> {
    tracing::info!("looking up realm...");
    let realm = client.realm_by_invite(invite).await?;
    tracing::info!(name = %realm.name, id = realm.id, "found realm");

    resolve_address_with(
        client,
        realm.id,
        shutdown,
        MAX_RESOLVE_ATTEMPTS,
        RESOLVE_RETRY_DELAY,
    )
    .await
}

/// The bounded retry loop over the join endpoint. Handles 503 storms and
/// addresses returned for the wrong transport (UUIDs instead of host:port).
pub async fn resolve_address_with<J: JoinEndpoint>(
    join: &J,
    realm_id: i64,
    mut shutdown: watch::Receiver<bool>,
    attempts: u32,
    retry_delay: Duration,
) -> Result<String, ResolveError> {
    for attempt in 1..=attempts {
        match join.join(realm_id).await {
            Ok(response) => {
                tracing::info!(
                    address = %response.address,
                    protocol = %response.network_protocol,
                    attempt,
                    "realm join response"
                );
                if is_host_port(&response.address) {
                    return Ok(response.address);
                }
                tracing::warn!(
                    address = %response.address,
                    "address not in host:port format (likely WebRTC-only), retrying"
                );
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, attempt, "realm join failed, retrying");
            }
            Err(err) => return Err(err),
        }
        sleep_cancellable(retry_delay, &mut shutdown).await?;
    }

    Err(ResolveError::UnsupportedTransport(
        "realm address never resolved to host:port — realm may only support the WebRTC transport"
            .to_string(),
    ))
}

/// Sleep that returns `Cancelled` as soon as shutdown is signalled.
async fn sleep_cancellable(
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), ResolveError> {
    if *shutdown.borrow() {
        return Err(ResolveError::Cancelled("shutting down".to_string()));
    }
    tokio::select! {
        _ = shutdown.changed() => Err(ResolveError::Cancelled("shutting down".to_string())),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// True when `addr` looks like `host:port`. Join responses for the WebRTC
/// transport carry a bare UUID here instead.
fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
