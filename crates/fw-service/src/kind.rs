/// The closed set of message types this worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Fork a GitLab project.
    ProjectFork,
    /// Add one or more members to a GitLab project.
    ProjectAddMember,
    /// Copy a Jenkins job into a target folder.
    JenkinsJobCopy,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [
        MessageKind::ProjectFork,
        MessageKind::ProjectAddMember,
        MessageKind::JenkinsJobCopy,
    ];

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "GL_PROJECT_FORK" => Some(MessageKind::ProjectFork),
            "GL_PROJECT_ADD_MEMBER" => Some(MessageKind::ProjectAddMember),
            "JENKINS_PROJECT_COPY" => Some(MessageKind::JenkinsJobCopy),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            MessageKind::ProjectFork => "GL_PROJECT_FORK",
            MessageKind::ProjectAddMember => "GL_PROJECT_ADD_MEMBER",
            MessageKind::JenkinsJobCopy => "JENKINS_PROJECT_COPY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::parse(kind.tag()), Some(kind));
        }
        assert_eq!(MessageKind::parse("X_UNKNOWN"), None);
    }
}
