use crate::domain::models::OAuthToken;
use crate::infrastructure::calendar_gateway::AccessTokenProvider;
use crate::infrastructure::config::ClientSecret;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{
    ClientCredentials, OAuthHttpClient, OAuthTokenResponse, TokenGrant,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const CALENDAR_EVENTS_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";
const TOKEN_LEEWAY_SECONDS: i64 = 60;
const MAX_REDIRECT_REQUEST_BYTES: usize = 16 * 1024;
const STATE_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub credentials: ClientCredentials,
    pub scopes: Vec<String>,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            credentials: ClientCredentials {
                token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            },
            scopes: vec![CALENDAR_EVENTS_SCOPE.to_string()],
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }

    /// Environment values win over the client-secret file.
    pub fn resolve<F>(lookup: F, client_secret: Option<ClientSecret>) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup_first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let client_id = lookup_first(&["CALENDAR_TODO_CLIENT_ID", "GOOGLE_CLIENT_ID"])
            .or_else(|| client_secret.as_ref().map(|secret| secret.client_id.trim().to_string()))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::InvalidConfig(
                    "google client id missing; provide credentials.json or CALENDAR_TODO_CLIENT_ID"
                        .to_string(),
                )
            })?;
        let client_secret_value =
            lookup_first(&["CALENDAR_TODO_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET"])
                .or_else(|| client_secret.as_ref().map(|secret| secret.client_secret.trim().to_string()))
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    InfraError::InvalidConfig(
                        "google client secret missing; provide credentials.json or CALENDAR_TODO_CLIENT_SECRET"
                            .to_string(),
                    )
                })?;

        let mut config = Self::new(client_id, client_secret_value);
        if let Some(secret) = client_secret {
            if let Some(token_uri) = secret.token_uri.filter(|value| !value.trim().is_empty()) {
                config.credentials.token_endpoint = token_uri;
            }
            if let Some(auth_uri) = secret.auth_uri.filter(|value| !value.trim().is_empty()) {
                config.authorization_endpoint = auth_uri;
            }
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Refreshed(OAuthToken),
    ReauthenticationRequired,
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_token_valid(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS)
    }

    pub fn build_authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.credentials.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.to_string())
    }

    pub async fn authenticate_with_code(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken, InfraError> {
        if authorization_code.trim().is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .request_token(
                &self.config.credentials,
                TokenGrant::AuthorizationCode {
                    code: authorization_code.trim().to_string(),
                    redirect_uri: redirect_uri.to_string(),
                },
            )
            .await?;

        let token = self.token_from_response(response, None);
        self.credential_store.save_token(&token)?;
        Ok(token)
    }

    /// Loads the stored token and refreshes it when it is about to expire.
    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let stored_token = match self.credential_store.load_token() {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(EnsureTokenResult::ReauthenticationRequired),
            Err(InfraError::CorruptToken(message)) => {
                warn!("event=token_load status=unreadable detail={message}");
                self.clear_stored_token()?;
                return Ok(EnsureTokenResult::ReauthenticationRequired);
            }
            Err(error) => return Err(error),
        };

        if self.is_token_valid(&stored_token) {
            return Ok(EnsureTokenResult::Existing(stored_token));
        }

        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        match self
            .oauth_client
            .request_token(&self.config.credentials, TokenGrant::RefreshToken(refresh_token))
            .await
        {
            Ok(response) => {
                let token = self.token_from_response(response, stored_token.refresh_token);
                self.credential_store.save_token(&token)?;
                info!("event=token_refresh status=ok expires_at={}", token.expires_at.to_rfc3339());
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(InfraError::OAuth(message)) => {
                warn!("event=token_refresh status=rejected detail={message}");
                Ok(EnsureTokenResult::ReauthenticationRequired)
            }
            Err(error) => Err(error),
        }
    }

    pub fn clear_stored_token(&self) -> Result<(), InfraError> {
        self.credential_store.delete_token()
    }

    /// Runs the browser consent flow with a one-shot listener on a loopback
    /// port, then exchanges the returned code for a token.
    pub async fn authorize_interactively<W>(&self, out: &mut W) -> Result<OAuthToken, InfraError>
    where
        W: Write,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
        let state = generate_state();
        let authorization_url = self.build_authorization_url(&state, &redirect_uri)?;

        writeln!(out, "Open this URL in a browser to grant calendar access:")?;
        writeln!(out)?;
        writeln!(out, "{authorization_url}")?;
        writeln!(out)?;
        out.flush()?;
        info!("event=oauth_flow status=waiting redirect_uri={redirect_uri}");

        loop {
            let (mut stream, _) = listener.accept().await?;
            let request = read_request_head(&mut stream).await?;
            let target = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/");

            let outcome = parse_redirect_target(target, &state);
            let message = match &outcome {
                Ok(RedirectOutcome::Code(_)) => "Authorization complete. You can close this window.",
                Ok(RedirectOutcome::Ignored) => "Waiting for authorization.",
                Ok(RedirectOutcome::Denied(_)) => "Authorization was denied.",
                Err(_) => "Authorization failed: unexpected state.",
            };
            respond_with_message(&mut stream, message).await;

            match outcome? {
                RedirectOutcome::Ignored => continue,
                RedirectOutcome::Denied(reason) => {
                    return Err(InfraError::OAuth(format!("authorization denied: {reason}")));
                }
                RedirectOutcome::Code(code) => {
                    let token = self.authenticate_with_code(&code, &redirect_uri).await?;
                    info!("event=oauth_flow status=ok expires_at={}", token.expires_at.to_rfc3339());
                    return Ok(token);
                }
            }
        }
    }

    fn token_from_response(
        &self,
        response: OAuthTokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
        }
    }
}

#[async_trait]
impl<S, C> AccessTokenProvider for OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    async fn access_token(&self) -> Result<String, InfraError> {
        match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => {
                Ok(token.access_token)
            }
            EnsureTokenResult::ReauthenticationRequired => Err(InfraError::OAuth(
                "google authorization is no longer valid; restart to sign in again".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Code(String),
    Denied(String),
    /// Requests that carry neither a code nor an error, e.g. `/favicon.ico`.
    Ignored,
}

/// Interprets the request target the browser was redirected to.
pub fn parse_redirect_target(target: &str, expected_state: &str) -> Result<RedirectOutcome, InfraError> {
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .map_err(|error| InfraError::OAuth(format!("invalid redirect target '{target}': {error}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if code.is_none() && error.is_none() {
        return Ok(RedirectOutcome::Ignored);
    }
    if state.as_deref() != Some(expected_state) {
        return Err(InfraError::OAuth("oauth state mismatch; retry the sign-in".to_string()));
    }
    if let Some(error) = error {
        let reason = match description {
            Some(description) => format!("{error} ({description})"),
            None => error,
        };
        return Ok(RedirectOutcome::Denied(reason));
    }
    Ok(code.map(RedirectOutcome::Code).unwrap_or(RedirectOutcome::Ignored))
}

async fn read_request_head(stream: &mut tokio::net::TcpStream) -> Result<String, InfraError> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|window| window == b"\r\n\r\n")
            || buffer.len() >= MAX_REDIRECT_REQUEST_BYTES
        {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn respond_with_message(stream: &mut tokio::net::TcpStream, message: &str) {
    let body = format!("<!doctype html><html><body><p>{message}</p></body></html>");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(error) = stream.write_all(response.as_bytes()).await {
        warn!("event=oauth_flow status=respond_failed error={error}");
    }
    if let Err(error) = stream.shutdown().await {
        warn!("event=oauth_flow status=shutdown_failed error={error}");
    }
}

fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}
