use crate::{backoff::Backoff, Error, Result};
use livedrop_types::{
    api::{
        AuthRequest, AuthResponse, CampaignResponse, ContributeRequest, ContributeResponse,
        ErrorBody, InventoryItem, InventoryResponse, JoinResponse, OpenCaseResponse,
        ProfileResponse, SellResponse, User, MAX_INVENTORY_LIMIT,
    },
    CampaignView,
};
use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    sync::{Arc, RwLock},
    time::Duration,
};
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Retry behaviour for requests that hit transient failures.
///
/// Only GETs are retried by default: an open, sell or contribution that
/// reached the authority must never be replayed behind the viewer's back.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

impl RetryPolicy {
    fn retries(&self, method: &Method) -> bool {
        *method == Method::GET || self.retry_non_idempotent
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Client for the authority API.
///
/// Clones share the bearer credential, so a login through one clone is seen
/// by every engine holding another.
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    pub http_client: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
    retry_policy: RetryPolicy,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url,
            http_client,
            token: Arc::new(RwLock::new(None)),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(token);
        self
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = (!token.is_empty()).then_some(token);
    }

    pub fn clear_token(&self) {
        let mut slot = self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidScheme(self.base_url.scheme().to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_once<B: Serialize>(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&B>,
    ) -> reqwest::Result<Response> {
        let mut request = self.http_client.request(method.clone(), url.clone());
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        request = match body {
            Some(body) => request.json(body),
            // The authority decodes every POST body, so send an empty object
            None if *method == Method::POST => request.json(&serde_json::json!({})),
            None => request,
        };
        request.send().await
    }

    async fn send_with_retry<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response> {
        let policy = &self.retry_policy;
        let max_attempts = if policy.retries(&method) {
            policy.max_attempts.max(1)
        } else {
            1
        };
        let mut backoff = Backoff::new(policy.initial_backoff, policy.max_backoff);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.send_once(&method, &url, body).await;
            let retryable = match &result {
                Ok(response) => is_retryable_status(response.status()),
                Err(err) => err.is_timeout() || err.is_connect(),
            };
            if !retryable {
                return Ok(result?);
            }
            if attempt >= max_attempts {
                return match result {
                    Ok(response) => {
                        let status = response.status();
                        let text = response.text().await.unwrap_or_default();
                        Err(Error::FailedWithBody {
                            status,
                            body: format!(
                                "{method} {url} failed after {attempt} attempt(s): {text}"
                            ),
                        })
                    }
                    Err(err) => Err(err.into()),
                };
            }

            let delay = backoff.next_delay(&mut rand::thread_rng());
            match &result {
                Ok(response) => {
                    warn!(%method, %url, status = %response.status(), attempt, ?delay, "retrying request")
                }
                Err(err) => warn!(%method, %url, ?err, attempt, ?delay, "retrying request"),
            }
            sleep(delay).await;
        }
    }

    pub async fn get_with_retry(&self, url: Url) -> Result<Response> {
        self.send_with_retry::<()>(Method::GET, url, None).await
    }

    pub async fn post_json_with_retry<B: Serialize>(
        &self,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response> {
        self.send_with_retry(Method::POST, url, body).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get_with_retry(url).await?;
        decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: Url,
        body: Option<&B>,
    ) -> Result<T> {
        let response = self.post_json_with_retry(url, body).await?;
        decode(response).await
    }

    pub async fn login(&self, identity: &str, password: &str) -> Result<AuthResponse> {
        let request = AuthRequest {
            identity: identity.to_string(),
            password: password.to_string(),
            ..Default::default()
        };
        let url = self.endpoint(&["api", "auth", "login"])?;
        let response: AuthResponse = self.post_json(url, Some(&request)).await?;
        self.set_token(response.token.clone());
        Ok(response)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthResponse> {
        let request = AuthRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            ..Default::default()
        };
        let url = self.endpoint(&["api", "auth", "register"])?;
        let response: AuthResponse = self.post_json(url, Some(&request)).await?;
        self.set_token(response.token.clone());
        Ok(response)
    }

    /// End the session. The local credential is dropped even if the
    /// authority cannot be reached.
    pub async fn logout(&self) -> Result<()> {
        let url = self.endpoint(&["api", "auth", "logout"])?;
        let result = self.post_json::<(), serde_json::Value>(url, None).await;
        self.clear_token();
        result.map(|_| ())
    }

    pub async fn profile(&self) -> Result<User> {
        let url = self.endpoint(&["api", "auth", "me"])?;
        let response: ProfileResponse = self.get_json(url).await?;
        Ok(response.user)
    }

    pub async fn inventory(&self, limit: usize) -> Result<Vec<InventoryItem>> {
        let mut url = self.endpoint(&["api", "inventory", "me"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.clamp(1, MAX_INVENTORY_LIMIT).to_string());
        let response: InventoryResponse = self.get_json(url).await?;
        Ok(response.items)
    }

    pub async fn open_case(&self, item_id: i64) -> Result<OpenCaseResponse> {
        let url = self.endpoint(&["api", "inventory", "open", &item_id.to_string()])?;
        debug!(item_id, "opening case");
        self.post_json::<(), _>(url, None).await
    }

    pub async fn sell_item(&self, item_id: i64) -> Result<SellResponse> {
        let url = self.endpoint(&["api", "inventory", "sell", &item_id.to_string()])?;
        self.post_json::<(), _>(url, None).await
    }

    pub async fn contribute(&self, case_id: i64, amount_cents: i64) -> Result<ContributeResponse> {
        let url = self.endpoint(&["api", "cases", &case_id.to_string(), "contribute"])?;
        let request = ContributeRequest {
            amount_cents,
            amount_dollars: amount_cents as f64 / 100.0,
        };
        self.post_json(url, Some(&request)).await
    }

    /// Latest campaign bound to an invite, if the authority reports one.
    pub async fn campaign(&self, invite: &str) -> Result<Option<CampaignView>> {
        let url = self.endpoint(&["api", "crowdfunding", "invite", invite])?;
        let response: CampaignResponse = self.get_json(url).await?;
        Ok(response.campaign)
    }

    pub async fn join_invite(&self, invite: &str) -> Result<bool> {
        let url = self.endpoint(&["api", "streams", "join", invite])?;
        let response: JoinResponse = self.post_json::<(), _>(url, None).await?;
        Ok(response.joined)
    }
}

/// Decode a success body or classify the failure.
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(status_error(status, &text));
    }
    let body = if text.trim().is_empty() { "{}" } else { text.as_str() };
    Ok(serde_json::from_str(body)?)
}

pub(crate) fn status_error(status: StatusCode, text: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(text)
        .ok()
        .and_then(|body| body.text().map(str::to_string))
        .or_else(|| {
            let raw = text.trim();
            (!raw.is_empty()).then(|| raw.to_string())
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthenticated,
        StatusCode::FORBIDDEN => Error::Forbidden { message },
        _ => Error::Rejected { status, message },
    }
}
