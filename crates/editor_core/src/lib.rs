//! Client-side editing core: the unsaved-changes guarded draft editor and the
//! optimistic row-collection editor, plus the seams they need (remote command
//! executor, reactive store) and the notices they produce for the UI shell.

use shared::domain::{CompanyId, ProjectId, TemplateId};

pub mod commands;
pub mod controller;
pub mod draft;
pub mod error;
pub mod executor;
pub mod membership;
pub mod notice;
pub mod rows;
pub mod store;
pub mod transport;

pub use controller::SharedRowEditor;
pub use draft::{CloseRequest, DraftEditor, DraftState, PendingCommit};
pub use error::{EditorError, EditorResult};
pub use executor::CommandExecutor;
pub use notice::{Notice, NoticeCategory, NoticeSeverity};
pub use rows::{PendingRow, RowCollectionEditor, RowOutcome};
pub use store::{Criteria, MemoryStore, ReactiveStore, Subscription, Topic};
pub use transport::RemoteClient;

/// Which parent record an impact belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImpactOwner {
    #[default]
    Project,
    Template,
}

/// Selection the surrounding screen has made (current company, project or
/// template). Every editor receives it at construction and reads parent ids
/// for command payloads from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorContext {
    pub company_id: Option<CompanyId>,
    pub project_id: Option<ProjectId>,
    pub template_id: Option<TemplateId>,
    pub impact_owner: ImpactOwner,
}

impl EditorContext {
    pub fn for_company(company_id: impl Into<CompanyId>) -> Self {
        Self {
            company_id: Some(company_id.into()),
            ..Self::default()
        }
    }

    pub fn for_project(company_id: impl Into<CompanyId>, project_id: impl Into<ProjectId>) -> Self {
        Self {
            company_id: Some(company_id.into()),
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn for_template(template_id: impl Into<TemplateId>) -> Self {
        Self {
            template_id: Some(template_id.into()),
            impact_owner: ImpactOwner::Template,
            ..Self::default()
        }
    }

    pub fn company_id(&self) -> EditorResult<&CompanyId> {
        self.company_id
            .as_ref()
            .ok_or(EditorError::MissingContext("company id"))
    }

    pub fn project_id(&self) -> EditorResult<&ProjectId> {
        self.project_id
            .as_ref()
            .ok_or(EditorError::MissingContext("project id"))
    }

    pub fn template_id(&self) -> EditorResult<&TemplateId> {
        self.template_id
            .as_ref()
            .ok_or(EditorError::MissingContext("template id"))
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
