//! Lazily constructed, long-lived API client handles.
//!
//! Clients are cached by configuration key; missing configuration or a
//! failed construction surfaces as a lookup miss, never as a failure in
//! the middle of dispatch.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::{info, warn};

use fw_config::WorkerConfig;
use fw_gitlab::GitLabClient;
use fw_jenkins::JenkinsClient;

pub struct MessageService {
    config: Arc<WorkerConfig>,
    gitlab_clients: DashMap<String, Arc<GitLabClient>>,
    jenkins_client: OnceLock<Option<Arc<JenkinsClient>>>,
}

impl MessageService {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self {
            config,
            gitlab_clients: DashMap::new(),
            jenkins_client: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// GitLab client for the given `gitType`, cached after first use.
    pub fn gitlab_client(&self, git_type: &str) -> Option<Arc<GitLabClient>> {
        if let Some(client) = self.gitlab_clients.get(git_type) {
            return Some(client.clone());
        }

        let Some(instance) = self.config.gitlab(git_type) else {
            warn!(git_type, "GitLab config not found for gitType");
            return None;
        };

        match GitLabClient::new(&instance.url, &instance.token, instance.timeout) {
            Ok(client) => {
                let client = Arc::new(client);
                self.gitlab_clients
                    .insert(git_type.to_string(), client.clone());
                info!(git_type, url = %instance.url, "GitLab client created");
                Some(client)
            }
            Err(e) => {
                warn!(git_type, error = %e, "Failed to build GitLab client");
                None
            }
        }
    }

    /// The single Jenkins client, built once on first use.
    pub fn jenkins_client(&self) -> Option<Arc<JenkinsClient>> {
        self.jenkins_client
            .get_or_init(|| {
                let jenkins = self.config.jenkins()?;
                match JenkinsClient::new(
                    &jenkins.url,
                    &jenkins.username,
                    &jenkins.password,
                    jenkins.timeout,
                ) {
                    Ok(client) => {
                        info!(url = %jenkins.url, "Jenkins client created");
                        Some(Arc::new(client))
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to build Jenkins client");
                        None
                    }
                }
            })
            .clone()
    }
}
