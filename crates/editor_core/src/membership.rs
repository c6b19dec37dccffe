//! Projection of company and project records into the member tables.

use shared::{
    domain::{fields, EntityId, Row, UserId},
    protocol::{CompanyRecord, PersonRecord, ProjectRecord},
    schema::NO_ROLE,
};

pub fn company_rows(company: &CompanyRecord) -> Vec<Row> {
    company
        .peoples_details
        .iter()
        .map(|person| {
            let role = if company.admins.contains(&person.id) {
                "admin"
            } else {
                NO_ROLE
            };
            member_row(person, role)
        })
        .collect()
}

pub fn project_rows(project: &ProjectRecord) -> Vec<Row> {
    project
        .peoples_details
        .iter()
        .map(|person| {
            let role = if project.change_managers.contains(&person.id) {
                "changeManager"
            } else if project.managers.contains(&person.id) {
                "manager"
            } else {
                NO_ROLE
            };
            member_row(person, role)
        })
        .collect()
}

/// Companies the signed-in user may manage. Super admins see every company.
pub fn visible_companies<'a>(
    companies: &'a [CompanyRecord],
    user: &UserId,
    is_super_admin: bool,
) -> Vec<&'a CompanyRecord> {
    companies
        .iter()
        .filter(|company| is_super_admin || company.peoples.contains(user))
        .collect()
}

fn member_row(person: &PersonRecord, role: &str) -> Row {
    Row::new(
        EntityId::new(person.id.as_str()),
        fields([
            ("firstName", person.profile.first_name.as_str()),
            ("lastName", person.profile.last_name.as_str()),
            ("email", person.primary_email()),
            ("role", role),
            ("currentRole", role),
        ]),
    )
}

#[cfg(test)]
#[path = "tests/membership_tests.rs"]
mod tests;
