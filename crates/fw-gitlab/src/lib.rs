//! GitLab REST client (API v4).
//!
//! Bearer-token JSON client with a small retry envelope: up to three
//! attempts with linear backoff on 429/5xx responses and transport errors.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub mod error;

pub use error::ClientError;

const MAX_ATTEMPTS: u32 = 3;

/// Maintainer access, used for protected-branch push/merge levels.
pub const ACCESS_LEVEL_MAINTAINER: u64 = 40;
/// Developer access, the default when adding project members.
pub const ACCESS_LEVEL_DEVELOPER: u64 = 30;

pub struct GitLabClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
    retry_backoff: Duration,
}

impl GitLabClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            retry_backoff: Duration::from_secs(1),
        })
    }

    /// Override the retry backoff base (tests use zero).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}/api/v4{}", self.base_url, endpoint);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.token);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text().await?;
                        if text.is_empty() {
                            return Ok(Value::Null);
                        }
                        return serde_json::from_str(&text)
                            .map_err(|e| ClientError::Decode(e.to_string()));
                    }
                    if is_retryable(status) && attempt < MAX_ATTEMPTS {
                        warn!(%url, status = status.as_u16(), attempt, "GitLab request failed, retrying");
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    error!(%url, status = status.as_u16(), "GitLab API request failed");
                    return Err(ClientError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(%url, error = %e, attempt, "GitLab request error, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    error!(%url, error = %e, "GitLab API request failed");
                    return Err(e.into());
                }
            }
        }
    }

    /// Fork a project into a new project.
    ///
    /// After a successful fork, the fork relationship is removed and the
    /// `test` and `main` branches are protected at maintainer level. Both
    /// follow-ups are best-effort: their failures are logged and never fail
    /// the fork itself.
    pub async fn fork_project(
        &self,
        project_id: u64,
        namespace_id: Option<u64>,
        name: Option<&str>,
        path: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut body = serde_json::Map::new();
        if let Some(namespace_id) = namespace_id {
            body.insert("namespace_id".to_string(), json!(namespace_id));
        }
        if let Some(name) = name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(path) = path {
            body.insert("path".to_string(), json!(path));
        }

        info!(project_id, params = %serde_json::Value::Object(body.clone()), "Forking project");
        let result = self
            .request(
                Method::POST,
                &format!("/projects/{project_id}/fork"),
                Some(&Value::Object(body)),
            )
            .await?;

        match result.get("id").and_then(Value::as_u64) {
            Some(forked_id) => {
                info!(forked_project_id = forked_id, "Project forked successfully");
                if let Err(e) = self.delete_fork_relationship(forked_id).await {
                    warn!(project_id = forked_id, error = %e, "Failed to delete fork relationship");
                }
                for branch in ["test", "main"] {
                    match self
                        .protect_branch(
                            forked_id,
                            branch,
                            ACCESS_LEVEL_MAINTAINER,
                            ACCESS_LEVEL_MAINTAINER,
                        )
                        .await
                    {
                        Ok(_) => info!(project_id = forked_id, branch, "Branch protected"),
                        Err(e) => warn!(
                            project_id = forked_id,
                            branch,
                            error = %e,
                            "Failed to protect branch"
                        ),
                    }
                }
            }
            None => warn!(project_id, "Fork response carried no project id"),
        }

        Ok(result)
    }

    pub async fn add_project_member(
        &self,
        project_id: u64,
        user_id: u64,
        access_level: u64,
    ) -> Result<Value, ClientError> {
        info!(project_id, user_id, access_level, "Adding user to project");
        self.request(
            Method::POST,
            &format!("/projects/{project_id}/members"),
            Some(&json!({ "user_id": user_id, "access_level": access_level })),
        )
        .await
    }

    pub async fn get_project(&self, project_id: u64) -> Result<Value, ClientError> {
        self.request(Method::GET, &format!("/projects/{project_id}"), None)
            .await
    }

    pub async fn get_user(&self, user_id: u64) -> Result<Value, ClientError> {
        self.request(Method::GET, &format!("/users/{user_id}"), None)
            .await
    }

    pub async fn delete_fork_relationship(&self, project_id: u64) -> Result<(), ClientError> {
        self.request(Method::DELETE, &format!("/projects/{project_id}/fork"), None)
            .await?;
        Ok(())
    }

    pub async fn protect_branch(
        &self,
        project_id: u64,
        branch: &str,
        push_access_level: u64,
        merge_access_level: u64,
    ) -> Result<Value, ClientError> {
        self.request(
            Method::POST,
            &format!("/projects/{project_id}/protected_branches"),
            Some(&json!({
                "name": branch,
                "push_access_levels": [{ "access_level": push_access_level }],
                "merge_access_levels": [{ "access_level": merge_access_level }],
            })),
        )
        .await
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> GitLabClient {
        GitLabClient::new(server.uri(), "secret-token", Duration::from_secs(5))
            .unwrap()
            .with_retry_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn add_member_posts_expected_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/projects/42/members"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(serde_json::json!({"user_id": 7, "access_level": 30})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .await
            .add_project_member(42, 7, ACCESS_LEVEL_DEVELOPER)
            .await
            .unwrap();
        assert_eq!(result["id"], 7);
    }

    #[tokio::test]
    async fn fork_runs_best_effort_follow_ups() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/projects/42/fork"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 99})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v4/projects/99/fork"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v4/projects/99/protected_branches"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .expect(2)
            .mount(&server)
            .await;

        let result = client(&server)
            .await
            .fork_project(42, Some(5), Some("copy"), None)
            .await
            .unwrap();
        assert_eq!(result["id"], 99);
    }

    #[tokio::test]
    async fn fork_succeeds_even_when_follow_ups_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/projects/42/fork"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 99})))
            .mount(&server)
            .await;
        // Delete/protect endpoints are unmocked and return 404: the fork
        // must still report success.

        let result = client(&server).await.fork_project(42, None, None, None).await.unwrap();
        assert_eq!(result["id"], 99);
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects/42"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).await.get_project(42).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).await.get_user(1).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
