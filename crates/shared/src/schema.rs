//! Field schemas for every record kind the dialogs and control-panel tables edit.
//!
//! A schema decides which field names exist, which of them must be filled in
//! before anything is sent to the backend, which values a lookup column
//! accepts, and when a column may be edited.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{FieldMap, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Activity,
    Impact,
    CompanyMember,
    ProjectMember,
}

impl EntityKind {
    pub fn schema(self) -> &'static EntitySchema {
        match self {
            Self::Project => &PROJECT,
            Self::Activity => &ACTIVITY,
            Self::Impact => &IMPACT,
            Self::CompanyMember => &COMPANY_MEMBER,
            Self::ProjectMember => &PROJECT_MEMBER,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Activity => "Activity",
            Self::Impact => "Impact",
            Self::CompanyMember => "Company member",
            Self::ProjectMember => "Project member",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Date,
    Number,
    List,
    Choice,
}

/// When a grid column accepts edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editable {
    Always,
    OnAdd,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Empty,
    Text(&'static str),
    Number(i64),
    Today,
    EmptyList,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub editable: Editable,
    pub choices: &'static [&'static str],
    /// Field whose confirmed value this one reflects.
    pub mirrors: Option<&'static str>,
    pub default: FieldDefault,
}

impl FieldSpec {
    const fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            editable: Editable::Always,
            choices: &[],
            mirrors: None,
            default: FieldDefault::Empty,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn editable(mut self, editable: Editable) -> Self {
        self.editable = editable;
        self
    }

    const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.ty = FieldType::Choice;
        self.choices = choices;
        self
    }

    const fn mirrors(mut self, source: &'static str) -> Self {
        self.mirrors = Some(source);
        self
    }

    const fn default_to(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    fn shape_problem(&self, value: &FieldValue) -> Option<String> {
        if matches!(value, FieldValue::Null) {
            return None;
        }
        match (self.ty, value) {
            (FieldType::Text, FieldValue::Text(_) | FieldValue::Date(_)) => None,
            (FieldType::Date, FieldValue::Date(_)) => None,
            (FieldType::Number, FieldValue::Number(_)) => None,
            (FieldType::List, FieldValue::List(_)) => None,
            (FieldType::Choice, FieldValue::Text(choice)) => {
                if self.choices.contains(&choice.as_str()) {
                    None
                } else {
                    Some(format!(
                        "'{choice}' is not one of {}",
                        self.choices.join(", ")
                    ))
                }
            }
            (expected, _) => Some(format!("expected a {expected:?} value").to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// `end` must not precede `start` when both are set.
    DateOrder {
        start: &'static str,
        end: &'static str,
    },
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub fields: &'static [FieldSpec],
    pub rules: &'static [Rule],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub missing: Vec<String>,
    pub invalid: Vec<InvalidValue>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn invalid(&mut self, field: &str, problem: impl Into<String>) {
        self.invalid.push(InvalidValue {
            field: field.to_string(),
            problem: problem.into(),
        });
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "Please fill the required fields: {}",
                self.missing.join(", ")
            ));
        }
        for invalid in &self.invalid {
            parts.push(format!("{}: {}", invalid.field, invalid.problem));
        }
        f.write_str(&parts.join("; "))
    }
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// First field name in `fields` that the schema does not define.
    pub fn first_unknown<'a>(&self, fields: &'a FieldMap) -> Option<&'a str> {
        fields
            .keys()
            .map(String::as_str)
            .find(|name| !self.is_known(name))
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|spec| spec.required)
    }

    /// A blank record with every field set to its schema default.
    pub fn blank(&self, today: NaiveDate) -> FieldMap {
        self.fields
            .iter()
            .map(|spec| {
                let value = match spec.default {
                    FieldDefault::Empty => FieldValue::Null,
                    FieldDefault::Text(text) => FieldValue::text(text),
                    FieldDefault::Number(number) => FieldValue::Number(number),
                    FieldDefault::Today => FieldValue::Date(today),
                    FieldDefault::EmptyList => FieldValue::List(Vec::new()),
                };
                (spec.name.to_string(), value)
            })
            .collect()
    }

    /// Full check before a record is created or committed: every required
    /// field present and non-empty, every value of the right shape, every
    /// cross-field rule satisfied.
    pub fn validate_complete(&self, fields: &FieldMap) -> Result<(), ValidationError> {
        let mut error = ValidationError::default();
        for spec in self.required_fields() {
            if fields.get(spec.name).map_or(true, FieldValue::is_empty) {
                error.missing.push(spec.name.to_string());
            }
        }
        self.check_shapes(fields, &mut error);
        self.check_rules(fields, &mut error);
        error.into_result()
    }

    /// Check for a partial change set: only the given fields are inspected,
    /// and a required field may not be cleared.
    pub fn validate_partial(&self, fields: &FieldMap) -> Result<(), ValidationError> {
        let mut error = ValidationError::default();
        for (name, value) in fields {
            if let Some(spec) = self.field(name) {
                if spec.required && value.is_empty() {
                    error.missing.push(name.clone());
                }
            }
        }
        self.check_shapes(fields, &mut error);
        error.into_result()
    }

    fn check_shapes(&self, fields: &FieldMap, error: &mut ValidationError) {
        for (name, value) in fields {
            let Some(spec) = self.field(name) else {
                continue;
            };
            if let Some(problem) = spec.shape_problem(value) {
                error.invalid(name, problem);
            }
        }
    }

    fn check_rules(&self, fields: &FieldMap, error: &mut ValidationError) {
        for rule in self.rules {
            match *rule {
                Rule::DateOrder { start, end } => {
                    let start_date = fields.get(start).and_then(FieldValue::as_date);
                    let end_date = fields.get(end).and_then(FieldValue::as_date);
                    if let (Some(start_date), Some(end_date)) = (start_date, end_date) {
                        if end_date < start_date {
                            error.invalid(end, format!("must not be before {start}"));
                        }
                    }
                }
            }
        }
    }
}

pub const IMPACT_TYPES: &[&str] = &["process", "technology", "people", "organization"];
pub const IMPACT_LEVELS: &[&str] = &["high", "medium", "low"];
pub const COMPANY_ROLES: &[&str] = &["admin", "noRole"];
pub const PROJECT_ROLES: &[&str] = &["changeManager", "manager", "noRole"];
pub const NO_ROLE: &str = "noRole";

static PROJECT: EntitySchema = EntitySchema {
    kind: EntityKind::Project,
    fields: &[
        FieldSpec::new("name", FieldType::Text).required(),
        FieldSpec::new("startingDate", FieldType::Date)
            .required()
            .default_to(FieldDefault::Today),
        FieldSpec::new("endingDate", FieldType::Date)
            .required()
            .default_to(FieldDefault::Today),
        FieldSpec::new("managers", FieldType::List).default_to(FieldDefault::EmptyList),
    ],
    rules: &[Rule::DateOrder {
        start: "startingDate",
        end: "endingDate",
    }],
};

static ACTIVITY: EntitySchema = EntitySchema {
    kind: EntityKind::Activity,
    fields: &[
        FieldSpec::new("type", FieldType::Text).required(),
        FieldSpec::new("name", FieldType::Text),
        FieldSpec::new("description", FieldType::Text).required(),
        FieldSpec::new("owner", FieldType::Text).required(),
        FieldSpec::new("dueDate", FieldType::Date)
            .required()
            .default_to(FieldDefault::Today),
        FieldSpec::new("stakeHolders", FieldType::List).default_to(FieldDefault::EmptyList),
        FieldSpec::new("time", FieldType::Number)
            .required()
            .default_to(FieldDefault::Number(5)),
        FieldSpec::new("step", FieldType::Number).default_to(FieldDefault::Number(1)),
    ],
    rules: &[],
};

static IMPACT: EntitySchema = EntitySchema {
    kind: EntityKind::Impact,
    fields: &[
        FieldSpec::new("description", FieldType::Text).required(),
        FieldSpec::new("type", FieldType::Text)
            .required()
            .choices(IMPACT_TYPES),
        FieldSpec::new("level", FieldType::Text)
            .required()
            .choices(IMPACT_LEVELS),
        FieldSpec::new("expectedDate", FieldType::Date),
        FieldSpec::new("stakeholders", FieldType::List).default_to(FieldDefault::EmptyList),
    ],
    rules: &[],
};

static COMPANY_MEMBER: EntitySchema = EntitySchema {
    kind: EntityKind::CompanyMember,
    fields: &[
        FieldSpec::new("firstName", FieldType::Text)
            .required()
            .editable(Editable::OnAdd),
        FieldSpec::new("lastName", FieldType::Text)
            .required()
            .editable(Editable::OnAdd),
        FieldSpec::new("email", FieldType::Text)
            .required()
            .editable(Editable::OnAdd),
        FieldSpec::new("currentRole", FieldType::Text)
            .editable(Editable::Never)
            .mirrors("role"),
        FieldSpec::new("role", FieldType::Text)
            .required()
            .choices(COMPANY_ROLES)
            .default_to(FieldDefault::Text(NO_ROLE)),
    ],
    rules: &[],
};

static PROJECT_MEMBER: EntitySchema = EntitySchema {
    kind: EntityKind::ProjectMember,
    fields: &[
        FieldSpec::new("firstName", FieldType::Text)
            .required()
            .editable(Editable::OnAdd),
        FieldSpec::new("lastName", FieldType::Text)
            .required()
            .editable(Editable::OnAdd),
        FieldSpec::new("email", FieldType::Text)
            .required()
            .editable(Editable::OnAdd),
        FieldSpec::new("currentRole", FieldType::Text)
            .editable(Editable::Never)
            .mirrors("role"),
        FieldSpec::new("role", FieldType::Text)
            .required()
            .choices(PROJECT_ROLES)
            .default_to(FieldDefault::Text(NO_ROLE)),
    ],
    rules: &[],
};

#[cfg(test)]
#[path = "tests/schema_tests.rs"]
mod tests;
