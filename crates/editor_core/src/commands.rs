//! Translation of a local change into the backend method call that persists it.

use serde_json::{json, Map, Value};
use shared::{
    domain::{EntityId, FieldMap, FieldValue},
    protocol::{methods, Command},
    schema::{EntityKind, NO_ROLE},
};

use crate::{EditorContext, EditorError, EditorResult, ImpactOwner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Update,
    Delete,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A change ready to be sent. `Update` carries the full record after the
/// change, not just the edited fields.
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    Add(&'a FieldMap),
    Update(&'a EntityId, &'a FieldMap),
    Delete(&'a EntityId),
}

impl Change<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Add(_) => Operation::Add,
            Self::Update(..) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
        }
    }
}

pub fn build_command(
    context: &EditorContext,
    kind: EntityKind,
    change: Change<'_>,
) -> EditorResult<Command> {
    match (kind, change) {
        (EntityKind::Project, Change::Add(fields)) => {
            let mut project = record(None, fields);
            project.insert("companyId".into(), json!(context.company_id()?));
            Ok(Command::new(
                methods::PROJECTS_INSERT,
                json!({ "project": project }),
            ))
        }
        (EntityKind::Project, Change::Update(id, fields)) => Ok(Command::new(
            methods::PROJECTS_UPDATE,
            json!({ "project": record(Some(id), fields) }),
        )),
        (EntityKind::Activity, Change::Add(fields)) => {
            activity_command(context, methods::ACTIVITIES_INSERT, None, fields)
        }
        (EntityKind::Activity, Change::Update(id, fields)) => {
            activity_command(context, methods::ACTIVITIES_UPDATE, Some(id), fields)
        }
        (EntityKind::Impact, Change::Add(fields)) => impact_command(context, None, fields),
        (EntityKind::Impact, Change::Update(id, fields)) => {
            impact_command(context, Some(id), fields)
        }
        (EntityKind::CompanyMember, Change::Add(fields)) => {
            let mut company = Map::new();
            company.insert("_id".into(), json!(context.company_id()?));
            if text(fields, "role") == "admin" {
                company.insert("role".into(), json!("admin"));
            }
            Ok(Command::new(
                methods::USERS_INVITE_NEW_USER,
                json!({
                    "profile": profile(fields),
                    "email": text(fields, "email"),
                    "company": company,
                }),
            ))
        }
        (EntityKind::CompanyMember, Change::Update(id, fields)) => Ok(Command::new(
            methods::USERS_UPDATE_ROLE,
            json!({
                "companyId": context.company_id()?,
                "userId": id,
                "role": text(fields, "role"),
            }),
        )),
        (EntityKind::CompanyMember, Change::Delete(id)) => Ok(Command::new(
            methods::USERS_REMOVE_COMPANY,
            json!({ "companyId": context.company_id()?, "userId": id }),
        )),
        (EntityKind::ProjectMember, Change::Add(fields)) => {
            let mut project = Map::new();
            project.insert("_id".into(), json!(context.project_id()?));
            let role = text(fields, "role");
            if !role.is_empty() && role != NO_ROLE {
                project.insert("role".into(), json!(role));
            }
            Ok(Command::new(
                methods::USERS_INVITE_NEW_PROJECT_USER,
                json!({
                    "profile": profile(fields),
                    "email": text(fields, "email"),
                    "company": { "_id": context.company_id()? },
                    "project": project,
                }),
            ))
        }
        (EntityKind::ProjectMember, Change::Update(id, fields)) => Ok(Command::new(
            methods::USERS_UPDATE_PROJECT_ROLE,
            json!({
                "projectId": context.project_id()?,
                "userId": id,
                "role": text(fields, "role"),
            }),
        )),
        (EntityKind::ProjectMember, Change::Delete(id)) => Ok(Command::new(
            methods::USERS_REMOVE_COMPANY,
            json!({ "projectId": context.project_id()?, "userId": id }),
        )),
        (kind, change) => Err(EditorError::Unsupported {
            kind,
            operation: change.operation().label(),
        }),
    }
}

fn activity_command(
    context: &EditorContext,
    method: &str,
    id: Option<&EntityId>,
    fields: &FieldMap,
) -> EditorResult<Command> {
    let mut activity = record(id, fields);
    activity.insert("projectId".into(), json!(context.project_id()?));
    Ok(Command::new(method, json!({ "activity": activity })))
}

fn impact_command(
    context: &EditorContext,
    id: Option<&EntityId>,
    fields: &FieldMap,
) -> EditorResult<Command> {
    let impact = record(id, fields);
    match context.impact_owner {
        ImpactOwner::Project => Ok(Command::new(
            methods::PROJECTS_UPDATE_IMPACT,
            json!({ "projectId": context.project_id()?, "impact": impact }),
        )),
        ImpactOwner::Template => Ok(Command::new(
            methods::TEMPLATES_UPDATE_IMPACT,
            json!({ "templateId": context.template_id()?, "impact": impact }),
        )),
    }
}

fn record(id: Option<&EntityId>, fields: &FieldMap) -> Map<String, Value> {
    let mut out: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value)))
        .collect();
    if let Some(id) = id {
        out.insert("_id".into(), json!(id));
    }
    out
}

fn profile(fields: &FieldMap) -> Value {
    json!({
        "firstName": text(fields, "firstName"),
        "lastName": text(fields, "lastName"),
    })
}

fn text(fields: &FieldMap, name: &str) -> String {
    fields
        .get(name)
        .map(FieldValue::to_string)
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
