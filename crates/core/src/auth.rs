//! Xbox Live authentication and the cached token file
//!
//! The proxy needs a bearer token for the Realms endpoints and an identity
//! to present upstream. A refresh token is cached at `.realm-token` (JSON,
//! mode 0600); when no cache exists the device-code flow runs once and the
//! operator finishes it in a browser.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use realmbridge_proto::IdentityData;

use crate::realms::TokenSource;

/// Default location of the cached OAuth token.
pub const TOKEN_FILE: &str = ".realm-token";

const LIVE_DEVICE_CODE_URL: &str = "https://login.live.com/oauth20_connect.srf";
const LIVE_TOKEN_URL: &str = "https://login.live.com/oauth20_token.srf";
const XBL_AUTH_URL: &str = "https://user.auth.xboxlive.com/user/authenticate";
const XSTS_AUTH_URL: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
const REALMS_RELYING_PARTY: &str = "https://pocket.realms.minecraft.net/";

const LIVE_CLIENT_ID: &str = "0000000048183522";
const LIVE_SCOPE: &str = "service::user.auth.xboxlive.com::MBI_SSL";

/// Refresh this long before the access token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The cached OAuth2 token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds at which the access token stops being usable.
    pub expires_at: u64,
}

impl Token {
    fn from_response(response: LiveTokenResponse) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now + response.expires_in,
        }
    }

    /// True when the access token is stale or about to become stale.
    pub fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        now + EXPIRY_MARGIN >= Duration::from_secs(self.expires_at)
    }
}

#[derive(Debug, Deserialize)]
struct LiveTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    user_code: String,
    device_code: String,
    verification_uri: String,
    #[serde(default = "default_poll_interval")]
    interval: u64,
    expires_in: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// XSTS grant for the Realms relying party, with the display claims the
/// proxy uses as its identity.
#[derive(Debug, Clone)]
struct XstsGrant {
    token: String,
    user_hash: String,
    xuid: String,
    gamertag: String,
}

#[derive(Debug, Deserialize)]
struct XboxAuthResponse {
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "DisplayClaims")]
    display_claims: DisplayClaims,
}

#[derive(Debug, Deserialize)]
struct DisplayClaims {
    xui: Vec<XuiClaim>,
}

#[derive(Debug, Deserialize, Default)]
struct XuiClaim {
    #[serde(default)]
    uhs: String,
    #[serde(default)]
    xid: String,
    #[serde(default)]
    gtg: String,
}

/// Token source backed by the Live refresh flow and the XBL/XSTS exchange.
pub struct XboxTokenSource {
    http: reqwest::Client,
    cache_path: PathBuf,
    live: Mutex<Token>,
    xsts: Mutex<Option<XstsGrant>>,
}

impl XboxTokenSource {
    /// Load the cached token or run the interactive device-code flow.
    pub async fn bootstrap(cache_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let cache_path = cache_path.as_ref().to_path_buf();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;

        let live = match load_token(&cache_path) {
            Ok(token) => {
                tracing::info!("using cached authentication");
                token
            }
            Err(_) => {
                tracing::info!("no cached token, starting device-code auth (check browser)");
                let token = request_live_token(&http).await?;
                if let Err(err) = save_token(&cache_path, &token) {
                    tracing::warn!("could not cache token: {err}");
                }
                token
            }
        };

        Ok(Self {
            http,
            cache_path,
            live: Mutex::new(live),
            xsts: Mutex::new(None),
        })
    }

    /// The identity presented to the upstream at login, from the XSTS
    /// display claims.
    pub async fn identity(&self) -> anyhow::Result<IdentityData> {
        let grant = self.ensure_xsts().await?;
        Ok(IdentityData {
            display_name: grant.gamertag,
            xuid: grant.xuid,
            identity: uuid::Uuid::new_v4().to_string(),
        })
    }

    async fn ensure_live(&self) -> anyhow::Result<Token> {
        let mut live = self.live.lock().await;
        if live.is_expired() {
            tracing::debug!("refreshing Live token");
            let response: LiveTokenResponse = self
                .http
                .post(LIVE_TOKEN_URL)
                .form(&[
                    ("client_id", LIVE_CLIENT_ID),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", &live.refresh_token),
                    ("scope", LIVE_SCOPE),
                ])
                .send()
                .await?
                .error_for_status()
                .context("refreshing Live token")?
                .json()
                .await?;
            *live = Token::from_response(response);
            if let Err(err) = save_token(&self.cache_path, &live) {
                tracing::warn!("could not cache refreshed token: {err}");
            }
            // The old XSTS grant was derived from the stale token.
            *self.xsts.lock().await = None;
        }
        Ok(live.clone())
    }

    async fn ensure_xsts(&self) -> anyhow::Result<XstsGrant> {
        let live = self.ensure_live().await?;
        let mut xsts = self.xsts.lock().await;
        if let Some(grant) = xsts.as_ref() {
            return Ok(grant.clone());
        }

        let xbl: XboxAuthResponse = self
            .http
            .post(XBL_AUTH_URL)
            .json(&serde_json::json!({
                "Properties": {
                    "AuthMethod": "RPS",
                    "SiteName": "user.auth.xboxlive.com",
                    "RpsTicket": live.access_token,
                },
                "RelyingParty": "http://auth.xboxlive.com",
                "TokenType": "JWT",
            }))
            .send()
            .await?
            .error_for_status()
            .context("XBL user authentication")?
            .json()
            .await?;

        let response: XboxAuthResponse = self
            .http
            .post(XSTS_AUTH_URL)
            .json(&serde_json::json!({
                "Properties": {
                    "SandboxId": "RETAIL",
                    "UserTokens": [xbl.token],
                },
                "RelyingParty": REALMS_RELYING_PARTY,
                "TokenType": "JWT",
            }))
            .send()
            .await?
            .error_for_status()
            .context("XSTS authorization")?
            .json()
            .await?;

        let claim = response
            .display_claims
            .xui
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("XSTS response carried no display claims"))?;
        let grant = XstsGrant {
            token: response.token,
            user_hash: claim.uhs,
            xuid: claim.xid,
            gamertag: claim.gtg,
        };
        *xsts = Some(grant.clone());
        Ok(grant)
    }
}

impl TokenSource for XboxTokenSource {
    async fn realms_token(&self) -> anyhow::Result<String> {
        let grant = self.ensure_xsts().await?;
        Ok(format!("XBL3.0 x={};{}", grant.user_hash, grant.token))
    }
}

/// Run the device-code flow: print the code, poll until the operator
/// finishes in a browser.
async fn request_live_token(http: &reqwest::Client) -> anyhow::Result<Token> {
    let device: DeviceCodeResponse = http
        .post(LIVE_DEVICE_CODE_URL)
        .form(&[
            ("client_id", LIVE_CLIENT_ID),
            ("scope", LIVE_SCOPE),
            ("response_type", "device_code"),
        ])
        .send()
        .await?
        .error_for_status()
        .context("requesting device code")?
        .json()
        .await?;

    tracing::info!(
        "authenticate at {} with code {}",
        device.verification_uri,
        device.user_code
    );

    let deadline = SystemTime::now() + Duration::from_secs(device.expires_in);
    loop {
        tokio::time::sleep(Duration::from_secs(device.interval)).await;
        if SystemTime::now() > deadline {
            return Err(anyhow!("device-code authentication timed out"));
        }

        let response = http
            .post(LIVE_TOKEN_URL)
            .form(&[
                ("client_id", LIVE_CLIENT_ID),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("device_code", &device.device_code),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(Token::from_response(response.json().await?));
        }
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        match body["error"].as_str() {
            Some("authorization_pending") => continue,
            Some(other) => return Err(anyhow!("device-code auth failed: {other}")),
            None => return Err(anyhow!("device-code auth failed with malformed error")),
        }
    }
}

/// Read the cached token.
pub fn load_token(path: &Path) -> anyhow::Result<Token> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Write the token cache, owner-readable only.
pub fn save_token(path: &Path, token: &Token) -> anyhow::Result<()> {
    let data = serde_json::to_vec(token)?;
    std::fs::write(path, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_token(expires_at: u64) -> Token {
        Token {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_token_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".realm-token");

        let token = sample_token(1_900_000_000);
        save_token(&path, &token).unwrap();
        let loaded = load_token(&path).unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token, "refresh");
        assert_eq!(loaded.expires_at, 1_900_000_000);
    }

    #[cfg(unix)]
    #[test]
    fn test_token_cache_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".realm-token");
        save_token(&path, &sample_token(0)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_token_missing_file() {
        assert!(load_token(Path::new("/nonexistent/.realm-token")).is_err());
    }

    #[test]
    fn test_token_expiry() {
        // Long in the future: fresh.
        assert!(!sample_token(4_000_000_000).is_expired());
        // Already past: stale.
        assert!(sample_token(1_000_000).is_expired());
    }
}
