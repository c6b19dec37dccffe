//! User-visible notices produced by editor operations.

use shared::{error::ErrorCode, schema::EntityKind};

use crate::{commands::Operation, EditorContext, EditorError, ImpactOwner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    Success,
    Validation,
    NotFound,
    Conflict,
    Auth,
    Transport,
    Remote,
    /// Caller bug: unknown field, wrong state, missing context.
    Defect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    category: NoticeCategory,
    message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            category: NoticeCategory::Success,
            message: message.into(),
        }
    }

    pub fn from_error(error: &EditorError) -> Self {
        let category = match error {
            EditorError::Validation(_) => NoticeCategory::Validation,
            EditorError::NotFound(_) => NoticeCategory::NotFound,
            EditorError::Conflict(_) | EditorError::Busy => NoticeCategory::Conflict,
            EditorError::Remote(remote) => match remote.code {
                ErrorCode::Unauthorized | ErrorCode::Forbidden => NoticeCategory::Auth,
                ErrorCode::Transport => NoticeCategory::Transport,
                _ => NoticeCategory::Remote,
            },
            EditorError::InvalidField { .. }
            | EditorError::InvalidState { .. }
            | EditorError::MissingContext(_)
            | EditorError::Unsupported { .. } => NoticeCategory::Defect,
        };
        let message = match error {
            EditorError::Remote(remote) => remote.reason.clone(),
            other => other.to_string(),
        };
        Self { category, message }
    }

    pub fn severity(&self) -> NoticeSeverity {
        match self.category {
            NoticeCategory::Success => NoticeSeverity::Success,
            _ => NoticeSeverity::Error,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == NoticeCategory::Auth
    }

    pub fn category(&self) -> NoticeCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn success_notice(kind: EntityKind, operation: Operation, context: &EditorContext) -> Notice {
    let message = match (kind, operation) {
        (EntityKind::Project, Operation::Add) => "New Project Created Successfully.",
        (EntityKind::Project, _) => "Project Updated Successfully.",
        (EntityKind::Activity, Operation::Add) => "Activity Added Successfully.",
        (EntityKind::Activity, Operation::Update) => "Activity Updated Successfully.",
        (EntityKind::Activity, Operation::Delete) => "Activity Deleted Successfully.",
        (EntityKind::Impact, _) => match context.impact_owner {
            ImpactOwner::Project => "Project Updated Successfully.",
            ImpactOwner::Template => "Template Updated Successfully.",
        },
        (EntityKind::CompanyMember | EntityKind::ProjectMember, Operation::Add) => {
            "User Invited Successfully."
        }
        (EntityKind::CompanyMember | EntityKind::ProjectMember, Operation::Update) => {
            "Role Updated Successfully."
        }
        (EntityKind::CompanyMember | EntityKind::ProjectMember, Operation::Delete) => {
            "User Removed Successfully."
        }
    };
    Notice::success(message)
}

#[cfg(test)]
#[path = "tests/notice_tests.rs"]
mod tests;
