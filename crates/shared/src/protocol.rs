use serde::{Deserialize, Serialize};

use crate::domain::{CompanyId, EntityId, ProjectId, UserId};

pub mod methods {
    pub const PROJECTS_INSERT: &str = "projects.insert";
    pub const PROJECTS_UPDATE: &str = "projects.update";
    pub const PROJECTS_UPDATE_IMPACT: &str = "projects.updateImpact";
    pub const TEMPLATES_UPDATE_IMPACT: &str = "templates.updateImpact";
    pub const ACTIVITIES_INSERT: &str = "activities.insert";
    pub const ACTIVITIES_UPDATE: &str = "activities.update";
    pub const USERS_INVITE_NEW_USER: &str = "users.inviteNewUser";
    pub const USERS_INVITE_NEW_PROJECT_USER: &str = "users.inviteNewProjectUser";
    pub const USERS_UPDATE_ROLE: &str = "users.updateRole";
    pub const USERS_UPDATE_PROJECT_ROLE: &str = "users.updateProjectRole";
    pub const USERS_REMOVE_COMPANY: &str = "users.removeCompany";
}

pub mod publications {
    pub const COMPANIES: &str = "companies";
    pub const PROJECTS: &str = "projects";
    pub const PEOPLES: &str = "peoples";
}

/// One remote method call: a method name plus its JSON argument object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub payload: serde_json::Value,
}

impl Command {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Extracts the identifier a method returned for a newly created record.
///
/// Methods answer either with the bare id string or with an object carrying
/// `_id` (or `id`).
pub fn reply_identifier(reply: &serde_json::Value) -> Option<EntityId> {
    let raw = match reply {
        serde_json::Value::String(id) => Some(id.as_str()),
        serde_json::Value::Object(map) => map
            .get("_id")
            .or_else(|| map.get("id"))
            .and_then(serde_json::Value::as_str),
        _ => None,
    }?;
    let raw = raw.trim();
    (!raw.is_empty()).then(|| EntityId::new(raw))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonProfile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub profile: PersonProfile,
    #[serde(default)]
    pub emails: Vec<EmailAddress>,
}

impl PersonRecord {
    pub fn primary_email(&self) -> &str {
        self.emails
            .first()
            .map(|email| email.address.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    #[serde(rename = "_id")]
    pub id: CompanyId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub admins: Vec<UserId>,
    #[serde(default)]
    pub peoples: Vec<UserId>,
    #[serde(default)]
    pub peoples_details: Vec<PersonRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub managers: Vec<UserId>,
    #[serde(default)]
    pub change_managers: Vec<UserId>,
    #[serde(default)]
    pub peoples_details: Vec<PersonRecord>,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
