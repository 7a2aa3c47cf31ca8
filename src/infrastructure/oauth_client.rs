use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use log::warn;
use reqwest::Client;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECONDS: i64 = 3600;

/// Credentials identifying this installed application to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken(String),
}

#[derive(Debug, Clone)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn request_token(
        &self,
        credentials: &ClientCredentials,
        grant: TokenGrant,
    ) -> Result<OAuthTokenResponse, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct TokenEndpointPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ReqwestOAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

fn grant_params(credentials: &ClientCredentials, grant: TokenGrant) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("client_id", credentials.client_id.clone()),
        ("client_secret", credentials.client_secret.clone()),
    ];
    match grant {
        TokenGrant::AuthorizationCode { code, redirect_uri } => {
            params.push(("grant_type", "authorization_code".to_string()));
            params.push(("code", code));
            params.push(("redirect_uri", redirect_uri));
        }
        TokenGrant::RefreshToken(refresh_token) => {
            params.push(("grant_type", "refresh_token".to_string()));
            params.push(("refresh_token", refresh_token));
        }
    }
    params
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn request_token(
        &self,
        credentials: &ClientCredentials,
        grant: TokenGrant,
    ) -> Result<OAuthTokenResponse, InfraError> {
        let response = self
            .client
            .post(&credentials.token_endpoint)
            .form(&grant_params(credentials, grant))
            .send()
            .await
            .map_err(|error| InfraError::OAuth(format!("request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::OAuth(format!("failed reading token response: {error}")))?;

        let parsed = serde_json::from_str::<TokenEndpointPayload>(&body).map_err(|error| {
            InfraError::OAuth(format!("invalid token response payload: {error}; body={body}"))
        })?;

        if !status.is_success() || parsed.error.is_some() {
            let code = parsed.error.unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let detail = parsed.error_description.unwrap_or(body);
            return Err(InfraError::OAuth(format!("token endpoint error: {code}; {detail}")));
        }

        let access_token = parsed
            .access_token
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| InfraError::OAuth("token response did not include access_token".to_string()))?;

        let expires_in = match parsed.expires_in {
            Some(seconds) => seconds.max(0),
            None => {
                warn!("event=token_response status=no_expiry assumed_seconds={DEFAULT_EXPIRES_IN_SECONDS}");
                DEFAULT_EXPIRES_IN_SECONDS
            }
        };

        Ok(OAuthTokenResponse {
            access_token,
            refresh_token: parsed.refresh_token,
            expires_in,
            token_type: parsed.token_type,
            scope: parsed.scope,
        })
    }
}
