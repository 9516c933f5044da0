//! Remote commands over HTTP.

use std::future::Future;

use homesync_app::base_url::join;
use homesync_app::ports::{BaseUrlProvider, CommandRequest, Method, RemoteCommand, RemoteResponse};
use homesync_domain::error::{CommandError, SyncError};

use crate::error::ReqwestError;

/// [`RemoteCommand`] sending each request to the current base URL.
///
/// Any status is returned as a [`RemoteResponse`]; deciding what counts as
/// failure is left to the caller. A `204` or an empty body yields no body.
/// A body that is not JSON is an error on a 2xx and ignored otherwise.
#[derive(Debug, Clone)]
pub struct HttpCommandClient<B> {
    http: reqwest::Client,
    base_url: B,
}

impl<B: BaseUrlProvider> HttpCommandClient<B> {
    pub fn new(http: reqwest::Client, base_url: B) -> Self {
        Self { http, base_url }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl<B: BaseUrlProvider> RemoteCommand for HttpCommandClient<B> {
    fn execute(
        &self,
        request: CommandRequest,
    ) -> impl Future<Output = Result<RemoteResponse, SyncError>> + Send {
        let url = join(&self.base_url.base_url(), &request.path);
        let mut builder = self.http.request(method(request.method), &url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        async move {
            let response = builder.send().await.map_err(ReqwestError::from)?;
            let status = response.status();
            let bytes = response.bytes().await.map_err(ReqwestError::from)?;
            tracing::debug!(%url, status = status.as_u16(), "remote command answered");

            let body = if status == reqwest::StatusCode::NO_CONTENT || bytes.is_empty() {
                None
            } else {
                match serde_json::from_slice(&bytes) {
                    Ok(value) => Some(value),
                    Err(err) if status.is_success() => {
                        return Err(CommandError::from(ReqwestError::from(err)).into());
                    }
                    Err(_) => None,
                }
            };
            Ok(RemoteResponse::new(status.as_u16(), body))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::routing::{get, put};

    use super::*;
    use crate::test_server::{self, Fixed};

    async fn client(router: Router) -> HttpCommandClient<Fixed> {
        let base = test_server::spawn(router).await;
        HttpCommandClient::new(reqwest::Client::new(), Fixed(base))
    }

    #[tokio::test]
    async fn should_return_no_body_when_no_content() {
        let client = client(Router::new().route(
            "/api/devices/457",
            put(|| async { StatusCode::NO_CONTENT }),
        ))
        .await;

        let response = client
            .execute(
                CommandRequest::new(Method::Put, "/api/devices/457")
                    .with_body(serde_json::json!({"switch": "on"})),
            )
            .await
            .unwrap();

        assert!(response.is_no_content());
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn should_forward_bearer_and_decode_json() {
        let client = client(Router::new().route(
            "/api/me",
            get(|headers: HeaderMap| async move {
                let auth = headers[header::AUTHORIZATION].to_str().unwrap().to_string();
                axum::Json(serde_json::json!({ "auth": auth }))
            }),
        ))
        .await;

        let response = client
            .execute(CommandRequest::new(Method::Get, "api/me").with_bearer("abc"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.unwrap()["auth"], "Bearer abc");
    }

    #[tokio::test]
    async fn should_pass_error_status_through_with_text_body() {
        let client = client(Router::new().route(
            "/api/devices/457",
            put(|| async { (StatusCode::BAD_GATEWAY, "<html>oops</html>") }),
        ))
        .await;

        let response = client
            .execute(CommandRequest::new(Method::Put, "/api/devices/457"))
            .await
            .unwrap();

        assert_eq!(response.status, 502);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn should_fail_with_network_error_when_unreachable() {
        let client = HttpCommandClient::new(
            reqwest::Client::new(),
            Fixed("http://127.0.0.1:1".to_string()),
        );

        let result = client
            .execute(CommandRequest::new(Method::Get, "/api/me"))
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Command(CommandError::Network(_)))
        ));
    }
}
