//! Client for the managed auth service (GoTrue).

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, error, warn};
use url::Url;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Provider metadata attached to the user record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// User record as returned by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .full_name
            .clone()
            .or_else(|| self.user_metadata.name.clone())
    }
}

/// Tokens issued by a code exchange or a refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    pub user: AuthUser,
}

#[derive(Debug, Serialize)]
struct PkceExchangeRequest<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Operations the session store needs from the auth service.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// URL the browser is sent to for provider sign-in.
    fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> AuthResult<String>;

    /// Redeem a one-time authorization code.
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> AuthResult<TokenGrant>;

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenGrant>;

    /// Look up the user behind an access token; fails when it was revoked.
    async fn get_user(&self, access_token: &str) -> AuthResult<AuthUser>;

    /// Revoke the session server-side.
    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;
}

/// GoTrue over HTTP.
#[derive(Clone)]
pub struct GoTrueClient {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl GoTrueClient {
    /// `api_url` is the project URL, e.g. `https://xyz.supabase.co`.
    pub fn new(api_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.into(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    async fn token_request<B: Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> AuthResult<Result<TokenGrant, (u16, String)>> {
        let url = self.auth_url(&format!("token?grant_type={}", grant_type));
        debug!(grant_type, "requesting token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, grant_type, body_summary = %body_summary, "token request rejected");
            return Ok(Err((status.as_u16(), body_summary)));
        }

        Ok(Ok(response.json().await?))
    }
}

#[async_trait]
impl AuthApi for GoTrueClient {
    fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> AuthResult<String> {
        let mut url = Url::parse(&self.auth_url("authorize"))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url.into())
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> AuthResult<TokenGrant> {
        let request = PkceExchangeRequest {
            auth_code,
            code_verifier,
        };
        match self.token_request("pkce", &request).await? {
            Ok(grant) => Ok(grant),
            Err((status, summary)) if status >= 500 => Err(AuthError::Server {
                status,
                message: summary,
            }),
            Err((status, summary)) => Err(AuthError::CodeExchange(format!(
                "HTTP {} ({})",
                status, summary
            ))),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenGrant> {
        match self
            .token_request("refresh_token", &RefreshRequest { refresh_token })
            .await?
        {
            Ok(grant) => Ok(grant),
            Err((status, summary)) if status >= 500 => Err(AuthError::Server {
                status,
                message: summary,
            }),
            Err((status, summary)) => Err(AuthError::TokenRefresh(format!(
                "HTTP {} ({})",
                status, summary
            ))),
        }
    }

    async fn get_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "session verification failed");
            if status.is_server_error() {
                return Err(AuthError::Server {
                    status: status.as_u16(),
                    message: body_summary,
                });
            }
            return Err(AuthError::SessionInvalid(format!(
                "Server rejected session: HTTP {}",
                status
            )));
        }

        let user: AuthUser = response.json().await?;
        debug!(user_id = %user.id, "session verified with server");
        Ok(user)
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        // 401/404: the session is already gone server-side.
        if status.is_success() || status.as_u16() == 401 || status.as_u16() == 404 {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        error!(status = %status, body_summary = %body_summary, "remote sign-out failed");
        Err(AuthError::Server {
            status: status.as_u16(),
            message: body_summary,
        })
    }
}
