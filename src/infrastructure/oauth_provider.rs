// OAuth sign-in provider backed by a pre-issued access token
use crate::application::dashboard_controller::DashboardEvent;
use crate::application::spreadsheet_source::AuthProvider;
use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::mpsc;

const TOKEN_INFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Signs in by checking the configured access token with Google's token-info
/// endpoint. The outcome is pushed back as `AuthStatusChanged`.
pub struct OAuthTokenProvider {
    client: reqwest::Client,
    access_token: Option<String>,
    scope: String,
    events: mpsc::Sender<DashboardEvent>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    scope: String,
    #[serde(default)]
    expires_in: Option<String>,
}

impl OAuthTokenProvider {
    pub fn new(access_token: Option<String>, scope: String, events: mpsc::Sender<DashboardEvent>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
            scope,
            events,
        }
    }
}

async fn verify_token(client: &reqwest::Client, token: &str, scope: &str) -> Result<bool> {
    let response = client
        .get(TOKEN_INFO_URL)
        .query(&[("access_token", token)])
        .send()
        .await
        .context("Failed to reach token info endpoint")?;

    if !response.status().is_success() {
        tracing::warn!("Access token rejected with status {}", response.status());
        return Ok(false);
    }

    let info = response
        .json::<TokenInfo>()
        .await
        .context("Failed to parse token info response")?;
    tracing::debug!("Access token expires in {:?}s", info.expires_in);

    Ok(scope_granted(&info.scope, scope))
}

/// Every scope in `required` is present in `granted` (both space separated).
fn scope_granted(granted: &str, required: &str) -> bool {
    let granted: Vec<&str> = granted.split_whitespace().collect();
    required.split_whitespace().all(|s| granted.contains(&s))
}

impl AuthProvider for OAuthTokenProvider {
    fn sign_in(&self) {
        let client = self.client.clone();
        let token = self.access_token.clone();
        let scope = self.scope.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let signed_in = match token {
                None => {
                    tracing::warn!("No access token configured, cannot sign in");
                    false
                }
                Some(token) => match verify_token(&client, &token, &scope).await {
                    Ok(granted) => {
                        if !granted {
                            tracing::warn!("Access token lacks scope {}", scope);
                        }
                        granted
                    }
                    Err(e) => {
                        tracing::error!("Sign-in failed: {:#}", e);
                        false
                    }
                },
            };
            let _ = events.send(DashboardEvent::AuthStatusChanged(signed_in)).await;
        });
    }
}
