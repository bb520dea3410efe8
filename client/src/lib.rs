mod backoff;
pub mod catalog;
pub mod client;
pub mod credentials;

pub use catalog::{CatalogFeeds, DEFAULT_CASES_URL, DEFAULT_SKINS_URL};
pub use client::Client;
pub use client::RetryPolicy;
pub use credentials::CredentialStore;
pub use reqwest::StatusCode;
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("not authenticated")]
    Unauthenticated,
    #[error("permission denied: {message}")]
    Forbidden { message: String },
    #[error("{message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("credential store error: {0}")]
    Io(#[from] std::io::Error),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

impl Error {
    /// Whether the failure happened on the way to or from the authority
    /// rather than being a decision the authority made.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Reqwest(_) | Error::FailedWithBody { .. } | Error::Json(_)
        )
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State as AxumState},
        http::{HeaderMap, StatusCode as AxumStatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::{
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };
    use tokio::time::sleep;

    async fn serve_router(router: Router) -> (String, tokio::task::JoinHandle<()>) {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let actual_addr = listener.local_addr().unwrap();
        let base_url = format!("http://{actual_addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .await
                .unwrap();
        });

        sleep(Duration::from_millis(50)).await;
        (base_url, handle)
    }

    fn no_backoff(retry_non_idempotent: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            retry_non_idempotent,
        }
    }

    fn bearer(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_client_invalid_scheme() {
        let result = Client::new("ftp://example.com");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(matches!(err, Error::InvalidScheme(_)));
            assert_eq!(
                err.to_string(),
                "invalid URL scheme: ftp (expected http or https)"
            );
        }

        assert!(Client::new("http://localhost:8080").is_ok());
        assert!(Client::new("https://localhost:8080").is_ok());
    }

    #[test]
    fn test_token_shared_between_clones() {
        let client = Client::new("http://localhost:8080").unwrap();
        let clone = client.clone();
        assert!(!clone.is_authenticated());

        client.set_token("jwt");
        assert_eq!(clone.token().as_deref(), Some("jwt"));

        clone.clear_token();
        assert!(!client.is_authenticated());

        client.set_token("");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = Client::new("http://localhost:8080/app/").unwrap();
        let url = client
            .endpoint(&["api", "crowdfunding", "invite", "room 7/a"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/app/api/crowdfunding/invite/room%207%2Fa"
        );
    }

    #[tokio::test]
    async fn test_get_with_retry_retries_retryable_statuses() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/flaky",
                get(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>| async move {
                        let attempt = counter.fetch_add(1, Ordering::SeqCst);
                        if attempt < 2 {
                            AxumStatusCode::SERVICE_UNAVAILABLE
                        } else {
                            AxumStatusCode::OK
                        }
                    },
                ),
            )
            .with_state(counter.clone());

        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url)
            .unwrap()
            .with_retry_policy(no_backoff(false));

        let url = client.base_url.join("flaky").unwrap();
        let response = client.get_with_retry(url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_post_with_retry_respects_retry_non_idempotent_default() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/flaky-post",
                post(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        AxumStatusCode::SERVICE_UNAVAILABLE
                    },
                ),
            )
            .with_state(counter.clone());

        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url)
            .unwrap()
            .with_retry_policy(no_backoff(false));

        let url = client.base_url.join("flaky-post").unwrap();
        let err = client
            .post_json_with_retry(url.clone(), Some(&json!({"amount_cents": 100})))
            .await
            .expect_err("POST should not be retried by default");
        let Error::FailedWithBody { status, body } = err else {
            panic!("expected FailedWithBody, got {err:?}");
        };
        assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("POST"));
        assert!(body.contains(url.as_str()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_post_with_retry_retries_when_enabled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/flaky-post",
                post(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>| async move {
                        let attempt = counter.fetch_add(1, Ordering::SeqCst);
                        if attempt < 2 {
                            AxumStatusCode::SERVICE_UNAVAILABLE
                        } else {
                            AxumStatusCode::OK
                        }
                    },
                ),
            )
            .with_state(counter.clone());

        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url)
            .unwrap()
            .with_retry_policy(no_backoff(true));

        let url = client.base_url.join("flaky-post").unwrap();
        client
            .post_json_with_retry::<()>(url, None)
            .await
            .expect("POST should succeed after retry");
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_open_case_sends_bearer_and_decodes_drop() {
        let router = Router::new().route(
            "/api/inventory/open/:id",
            post(|Path(id): Path<i64>, headers: HeaderMap| async move {
                if bearer(&headers) != "Bearer jwt" {
                    return (
                        AxumStatusCode::UNAUTHORIZED,
                        Json(json!({"error": "unauthorized"})),
                    );
                }
                (
                    AxumStatusCode::OK,
                    Json(json!({
                        "opened_case": {"id": id, "item_type": "case", "name": "Knife Case", "status": "opened"},
                        "drop": {"id": 99, "item_type": "skin", "name": "AWP | Wildfire", "rarity": "covert", "status": "available"}
                    })),
                )
            }),
        );
        let (base_url, handle) = serve_router(router).await;

        let anonymous = Client::new(&base_url).unwrap();
        let err = anonymous.open_case(5).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));

        let client = Client::new(&base_url).unwrap().with_token("jwt");
        let opened = client.open_case(5).await.unwrap();
        assert_eq!(opened.drop.name, "AWP | Wildfire");
        assert_eq!(opened.opened_case.unwrap().id, 5);

        handle.abort();
    }

    #[tokio::test]
    async fn test_rejections_are_classified() {
        let router = Router::new()
            .route(
                "/api/inventory/open/:id",
                post(|| async {
                    (
                        AxumStatusCode::FORBIDDEN,
                        Json(json!({"error": "viewer role required"})),
                    )
                }),
            )
            .route(
                "/api/cases/:id/contribute",
                post(|| async {
                    (
                        AxumStatusCode::BAD_REQUEST,
                        Json(json!({"error": "insufficient balance"})),
                    )
                }),
            )
            .route(
                "/api/inventory/sell/:id",
                post(|| async { (AxumStatusCode::BAD_REQUEST, "plain text failure") }),
            );
        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url).unwrap().with_token("jwt");

        let err = client.open_case(1).await.unwrap_err();
        let Error::Forbidden { message } = &err else {
            panic!("expected Forbidden, got {err:?}");
        };
        assert_eq!(message, "viewer role required");
        assert!(!err.is_transport());

        let err = client.contribute(1, 500).await.unwrap_err();
        assert_eq!(err.to_string(), "insufficient balance");

        let err = client.sell_item(1).await.unwrap_err();
        assert_eq!(err.to_string(), "plain text failure");

        handle.abort();
    }

    #[tokio::test]
    async fn test_contribute_sends_cents_and_dollars() {
        let seen = Arc::new(Mutex::new(None::<Value>));
        let router = Router::new()
            .route(
                "/api/cases/:id/contribute",
                post(
                    |AxumState(seen): AxumState<Arc<Mutex<Option<Value>>>>,
                     Path(id): Path<i64>,
                     Json(body): Json<Value>| async move {
                        *seen.lock().unwrap() = Some(body);
                        Json(json!({
                            "case": {"id": id, "status": "fulfilled", "target_amount_cents": 1000},
                            "reward_item": {"name": "Knife Case", "item_type": "case", "status": "unopened"}
                        }))
                    },
                ),
            )
            .with_state(seen.clone());
        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url).unwrap().with_token("jwt");

        let response = client.contribute(12, 1_250).await.unwrap();
        assert_eq!(response.case.unwrap().id, 12);
        assert_eq!(response.reward_item.unwrap().name, "Knife Case");
        assert_eq!(
            seen.lock().unwrap().clone().unwrap(),
            json!({"amount_cents": 1250, "amount_dollars": 12.5})
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_campaign_by_invite() {
        let router = Router::new().route(
            "/api/crowdfunding/invite/:invite",
            get(|Path(invite): Path<String>| async move {
                if invite != "room 7" {
                    return Json(json!({"campaign": null}));
                }
                Json(json!({"campaign": {
                    "case": {"id": 3, "title": "Knife drop", "status": "open",
                             "reward_item_name": "Knife Case", "reward_item_type": "case",
                             "target_amount_cents": 10000},
                    "total_raised_cents": 2500,
                    "total_contributors": 3,
                    "my_contribution_cents": 500
                }}))
            }),
        );
        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url).unwrap().with_token("jwt");

        let view = client.campaign("room 7").await.unwrap().unwrap();
        assert_eq!(view.case.id, 3);
        assert_eq!(view.figures().left_cents, 7_500);

        assert!(client.campaign("other").await.unwrap().is_none());

        handle.abort();
    }

    #[tokio::test]
    async fn test_login_and_logout_manage_token() {
        let router = Router::new()
            .route(
                "/api/auth/login",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["identity"], "viewer");
                    Json(json!({"token": "fresh", "user": {"id": 1, "username": "viewer", "role": "viewer"}}))
                }),
            )
            .route(
                "/api/auth/logout",
                post(|| async { AxumStatusCode::BAD_GATEWAY }),
            );
        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url)
            .unwrap()
            .with_retry_policy(no_backoff(false));

        let auth = client.login("viewer", "hunter2").await.unwrap();
        assert_eq!(auth.user.username, "viewer");
        assert_eq!(client.token().as_deref(), Some("fresh"));

        // The credential is dropped locally even when the authority fails
        assert!(client.logout().await.is_err());
        assert!(!client.is_authenticated());

        handle.abort();
    }

    #[tokio::test]
    async fn test_fetch_catalog() {
        let router = Router::new()
            .route(
                "/cases.json",
                get(|| async {
                    Json(json!([
                        {"name": "Gamma Case", "image": "https://img/gamma.png"},
                        {"image": "https://img/nameless.png"}
                    ]))
                }),
            )
            .route(
                "/skins.json",
                get(|| async {
                    Json(json!([
                        {"name": "AK-47 | Slate", "image": "https://img/ak.png", "rarity": {"name": "Restricted"}}
                    ]))
                }),
            );
        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url).unwrap();

        let feeds = client
            .fetch_catalog(&format!("{base_url}/cases.json"), &format!("{base_url}/skins.json"))
            .await
            .unwrap();
        assert_eq!(feeds.cases.len(), 1);
        assert_eq!(feeds.skins.len(), 1);
        assert_eq!(feeds.skins[0].rarity.as_str(), "Restricted");

        let err = client
            .fetch_catalog(&format!("{base_url}/missing.json"), &format!("{base_url}/skins.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));

        handle.abort();
    }
}
