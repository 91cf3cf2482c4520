//! Handlers for the known message types.
//!
//! Validation failures (missing payload fields, unknown gitType, absent
//! client configuration) are logged and acknowledged: a malformed
//! instruction never becomes valid on retry and must not block the queue.
//! Only downstream API failures reject the delivery.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use fw_common::{HandlerContext, HandlerError, Message, MessageHandler};
use fw_gitlab::ACCESS_LEVEL_DEVELOPER;

use crate::service::MessageService;

/// Numeric field that may arrive as a JSON number or a numeric string.
fn value_as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn field_u64(payload: &Map<String, Value>, key: &str) -> Option<u64> {
    payload.get(key).and_then(value_as_u64)
}

fn field_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Forks a GitLab project (`GL_PROJECT_FORK`).
pub struct ProjectForkHandler {
    service: Arc<MessageService>,
}

impl ProjectForkHandler {
    pub fn new(service: Arc<MessageService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for ProjectForkHandler {
    async fn handle(&self, ctx: &HandlerContext, message: &Message) -> Result<(), HandlerError> {
        let Some(payload) = message.body.payload.as_object() else {
            warn!(message_id = %ctx.message_id, "Invalid payload format for project fork");
            return Ok(());
        };

        let Some(git_type) = field_str(payload, "gitType") else {
            warn!(message_id = %ctx.message_id, "Missing gitType in payload");
            return Ok(());
        };
        let Some(client) = self.service.gitlab_client(git_type) else {
            error!(
                message_id = %ctx.message_id,
                git_type,
                "GitLab client not available for gitType"
            );
            return Ok(());
        };

        let Some(project_id) = field_u64(payload, "project_id") else {
            warn!(message_id = %ctx.message_id, "Missing project_id in payload");
            return Ok(());
        };
        let Some(name) = field_str(payload, "name") else {
            warn!(message_id = %ctx.message_id, "Missing name in payload");
            return Ok(());
        };
        let namespace_id = field_u64(payload, "namespace");
        let path = field_str(payload, "path");

        let result = client
            .fork_project(project_id, namespace_id, Some(name), path)
            .await
            .map_err(HandlerError::downstream)?;

        info!(
            message_id = %ctx.message_id,
            git_type,
            forked_project_id = ?result.get("id"),
            "Processed project fork"
        );
        Ok(())
    }
}

/// Adds one or more members to a GitLab project (`GL_PROJECT_ADD_MEMBER`).
///
/// A list of user ids is processed independently per user: per-item
/// failures are logged and partial success still acknowledges the message.
pub struct ProjectAddMemberHandler {
    service: Arc<MessageService>,
}

impl ProjectAddMemberHandler {
    pub fn new(service: Arc<MessageService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for ProjectAddMemberHandler {
    async fn handle(&self, ctx: &HandlerContext, message: &Message) -> Result<(), HandlerError> {
        let Some(payload) = message.body.payload.as_object() else {
            warn!(message_id = %ctx.message_id, "Invalid payload format for add member");
            return Ok(());
        };

        let Some(git_type) = field_str(payload, "gitType") else {
            warn!(message_id = %ctx.message_id, "Missing gitType in payload");
            return Ok(());
        };
        let Some(client) = self.service.gitlab_client(git_type) else {
            error!(
                message_id = %ctx.message_id,
                git_type,
                "GitLab client not available for gitType"
            );
            return Ok(());
        };

        let (Some(project_id), Some(user_id)) =
            (field_u64(payload, "project_id"), payload.get("user_id"))
        else {
            warn!(
                message_id = %ctx.message_id,
                "Missing project_id or user_id in payload"
            );
            return Ok(());
        };
        let access_level = field_u64(payload, "access_level").unwrap_or(ACCESS_LEVEL_DEVELOPER);

        match user_id {
            Value::Array(user_ids) => {
                let mut added = 0usize;
                for value in user_ids {
                    let Some(uid) = value_as_u64(value) else {
                        warn!(
                            message_id = %ctx.message_id,
                            user_id = %value,
                            "Skipping non-numeric user id"
                        );
                        continue;
                    };
                    match client.add_project_member(project_id, uid, access_level).await {
                        Ok(result) => {
                            added += 1;
                            info!(
                                message_id = %ctx.message_id,
                                git_type,
                                project_id,
                                user_id = uid,
                                member_id = ?result.get("id"),
                                "Member added"
                            );
                        }
                        Err(e) => error!(
                            message_id = %ctx.message_id,
                            git_type,
                            project_id,
                            user_id = uid,
                            error = %e,
                            "Failed to add member"
                        ),
                    }
                }
                info!(
                    message_id = %ctx.message_id,
                    git_type,
                    project_id,
                    total_users = user_ids.len(),
                    success_count = added,
                    "Processed add member list"
                );
                Ok(())
            }
            value => {
                let Some(uid) = value_as_u64(value) else {
                    warn!(
                        message_id = %ctx.message_id,
                        user_id = %value,
                        "Invalid user_id in payload"
                    );
                    return Ok(());
                };
                let result = client
                    .add_project_member(project_id, uid, access_level)
                    .await
                    .map_err(HandlerError::downstream)?;
                info!(
                    message_id = %ctx.message_id,
                    git_type,
                    project_id,
                    user_id = uid,
                    member_id = ?result.get("id"),
                    "Processed add member"
                );
                Ok(())
            }
        }
    }
}

/// Copies a Jenkins job into a target folder (`JENKINS_PROJECT_COPY`).
pub struct JenkinsJobCopyHandler {
    service: Arc<MessageService>,
}

impl JenkinsJobCopyHandler {
    pub fn new(service: Arc<MessageService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for JenkinsJobCopyHandler {
    async fn handle(&self, ctx: &HandlerContext, message: &Message) -> Result<(), HandlerError> {
        let Some(payload) = message.body.payload.as_object() else {
            warn!(message_id = %ctx.message_id, "Invalid payload format for job copy");
            return Ok(());
        };

        let Some(client) = self.service.jenkins_client() else {
            error!(message_id = %ctx.message_id, "Jenkins client not available");
            return Ok(());
        };

        let (Some(source), Some(target_folder), Some(new_job_name)) = (
            field_str(payload, "source_job_name"),
            field_str(payload, "target_folder_path"),
            field_str(payload, "new_job_name"),
        ) else {
            warn!(
                message_id = %ctx.message_id,
                "Missing source_job_name, target_folder_path or new_job_name in payload"
            );
            return Ok(());
        };

        let result = client
            .copy_job(source, target_folder, new_job_name)
            .await
            .map_err(HandlerError::downstream)?;

        info!(
            message_id = %ctx.message_id,
            source_job_name = source,
            target_folder,
            new_job_name,
            job_url = ?result.get("url"),
            "Processed Jenkins job copy"
        );
        Ok(())
    }
}
