//! Jenkins REST client.
//!
//! Basic-auth client with redirects disabled: Jenkins signals a successful
//! `createItem` copy with a 302 to the new job, which must not be followed.
//! Folder paths map onto the `/job/<segment>` URL scheme
//! (`a/b` -> `/job/a/job/b`).

use std::time::Duration;

use reqwest::{redirect, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub mod error;

pub use error::ClientError;

const MAX_ATTEMPTS: u32 = 3;

pub struct JenkinsClient {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
    retry_backoff: Duration,
}

impl JenkinsClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            client,
            retry_backoff: Duration::from_secs(1),
        })
    }

    /// Override the retry backoff base (tests use zero).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Send with the retry envelope: up to [`MAX_ATTEMPTS`] with linear
    /// backoff on 429/5xx and transport errors. Returns the terminal
    /// response; the caller interprets its status.
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        query: Option<&[(&str, &str)]>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self
                .client
                .request(method.clone(), url)
                .basic_auth(&self.username, Some(&self.password));
            if let Some(query) = query {
                request = request.query(query);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if is_retryable(status) && attempt < MAX_ATTEMPTS {
                        warn!(%url, status = status.as_u16(), attempt, "Jenkins request failed, retrying");
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(%url, error = %e, attempt, "Jenkins request error, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    error!(%url, error = %e, "Jenkins API request failed");
                    return Err(e.into());
                }
            }
        }
    }

    async fn request(&self, method: Method, endpoint: &str) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.send_with_retry(method, &url, None).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%url, status = status.as_u16(), "Jenkins API request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        // Some Jenkins endpoints answer with plain text.
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "content": text })))
    }

    /// Copy an existing job into a target folder under a new name, then
    /// fetch and return the new job's info.
    pub async fn copy_job(
        &self,
        source_job: &str,
        target_folder: &str,
        new_job_name: &str,
    ) -> Result<Value, ClientError> {
        let source_path = source_job.trim_start_matches('/');
        let folder = folder_endpoint(target_folder);
        let url = format!("{}{}/createItem", self.base_url, folder);

        info!(
            source = source_job,
            target_folder,
            new_job_name,
            "Copying Jenkins job"
        );

        let response = self
            .send_with_retry(
                Method::POST,
                &url,
                Some(&[
                    ("name", new_job_name),
                    ("mode", "copy"),
                    ("from", source_path),
                ]),
            )
            .await?;

        let status = response.status();
        // Jenkins reports copy success with 200 or a 302 to the new job.
        if status != StatusCode::OK && status != StatusCode::FOUND {
            let body = response.text().await.unwrap_or_default();
            error!(
                source = source_job,
                target_folder,
                new_job_name,
                status = status.as_u16(),
                "Failed to copy Jenkins job"
            );
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let final_path = format!(
            "{}/{}",
            target_folder.trim_end_matches('/'),
            new_job_name
        );
        let final_path = final_path.trim_start_matches('/').to_string();
        info!(source = source_job, new_job = %final_path, "Jenkins job copied successfully");
        self.get_job(&final_path).await
    }

    pub async fn get_job(&self, job_path: &str) -> Result<Value, ClientError> {
        let endpoint = format!("{}/api/json", job_endpoint(job_path));
        self.request(Method::GET, &endpoint).await
    }

    pub async fn job_exists(&self, job_path: &str) -> Result<bool, ClientError> {
        match self.get_job(job_path).await {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Map a folder path like `/new/era/` to `/job/new/job/era`; empty paths
/// map to the Jenkins root (empty endpoint).
fn folder_endpoint(folder_path: &str) -> String {
    job_endpoint(folder_path)
}

fn job_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return String::new();
    }
    let mut endpoint = String::new();
    for segment in segments {
        endpoint.push_str("/job/");
        endpoint.push_str(segment);
    }
    endpoint
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
