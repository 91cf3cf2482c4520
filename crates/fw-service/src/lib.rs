//! Message-type dispatch and the production handlers.
//!
//! The set of handled message types is closed: [`MessageKind`] enumerates
//! them, and anything else falls through to the registry's "unregistered"
//! path in the subscriber (acknowledged and dropped).

pub mod handlers;
pub mod kind;
pub mod service;

use std::sync::Arc;

use fw_common::HandlerRegistry;

pub use handlers::{JenkinsJobCopyHandler, ProjectAddMemberHandler, ProjectForkHandler};
pub use kind::MessageKind;
pub use service::MessageService;

/// Wire every known message type to its handler.
pub fn build_registry(service: Arc<MessageService>) -> HandlerRegistry {
    HandlerRegistry::new()
        .with_handler(
            MessageKind::ProjectFork.tag(),
            Arc::new(ProjectForkHandler::new(service.clone())),
        )
        .with_handler(
            MessageKind::ProjectAddMember.tag(),
            Arc::new(ProjectAddMemberHandler::new(service.clone())),
        )
        .with_handler(
            MessageKind::JenkinsJobCopy.tag(),
            Arc::new(JenkinsJobCopyHandler::new(service)),
        )
}
