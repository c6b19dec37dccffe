use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use editor_core::{
    commands::Operation,
    membership::{company_rows, project_rows},
    notice::success_notice,
    CommandExecutor, DraftEditor, EditorContext, EditorResult, Notice, RemoteClient,
    RowCollectionEditor, RowOutcome, SharedRowEditor, Topic,
};
use shared::{
    domain::{fields, Entity, EntityId, FieldValue, Row},
    protocol::{publications, CompanyRecord, ProjectRecord},
    schema::EntityKind,
};
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, normalize_server_url};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    company_id: Option<String>,
    #[arg(long)]
    project_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List company members, or project members with --project.
    Members {
        #[arg(long)]
        project: bool,
    },
    SetRole {
        user_id: String,
        role: String,
        #[arg(long)]
        project: bool,
    },
    Invite {
        first_name: String,
        last_name: String,
        email: String,
        #[arg(long, default_value = "noRole")]
        role: String,
        #[arg(long)]
        project: bool,
    },
    Remove {
        user_id: String,
        #[arg(long)]
        project: bool,
    },
    CreateProject {
        name: String,
        starting_date: NaiveDate,
        ending_date: NaiveDate,
        #[arg(long = "manager")]
        managers: Vec<String>,
    },
    AddImpact {
        description: String,
        #[arg(value_name = "TYPE")]
        impact_type: String,
        level: String,
        #[arg(long)]
        expected_date: Option<NaiveDate>,
        /// Attach the impact to a template instead of the current project.
        #[arg(long)]
        template: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(v) = cli.server_url.clone() {
        settings.server_url = v;
    }
    if let Some(v) = cli.company_id.clone() {
        settings.company_id = Some(v);
    }
    if let Some(v) = cli.project_id.clone() {
        settings.project_id = Some(v);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .init();

    let server_url = normalize_server_url(&settings.server_url)?;
    let client = Arc::new(RemoteClient::new(&server_url)?);
    let context = EditorContext {
        company_id: settings.company_id.as_deref().map(Into::into),
        project_id: settings.project_id.as_deref().map(Into::into),
        ..EditorContext::default()
    };
    debug!(%server_url, ?context, "console configured");

    match cli.command {
        Command::Members { project } => {
            let table = load_members(&client, &context, project).await?;
            for row in table.rows().await {
                println!("{}", describe_member(&row));
            }
        }
        Command::SetRole {
            user_id,
            role,
            project,
        } => {
            let table = load_members(&client, &context, project).await?;
            let mut notices = table.subscribe_notices();
            let result = table
                .update_row(&EntityId::new(user_id), fields([("role", role)]))
                .await;
            report_row_change(&table, &mut notices, result).await?;
        }
        Command::Invite {
            first_name,
            last_name,
            email,
            role,
            project,
        } => {
            let table = load_members(&client, &context, project).await?;
            let mut notices = table.subscribe_notices();
            let result = table
                .add_row(fields([
                    ("firstName", first_name),
                    ("lastName", last_name),
                    ("email", email),
                    ("role", role),
                ]))
                .await;
            report_row_change(&table, &mut notices, result).await?;
        }
        Command::Remove { user_id, project } => {
            let table = load_members(&client, &context, project).await?;
            let mut notices = table.subscribe_notices();
            let result = table.delete_row(&EntityId::new(user_id)).await;
            report_row_change(&table, &mut notices, result).await?;
        }
        Command::CreateProject {
            name,
            starting_date,
            ending_date,
            managers,
        } => {
            let mut editor = DraftEditor::new(EntityKind::Project, context);
            editor.open(None)?;
            editor.set_field("name", name)?;
            editor.set_field("startingDate", starting_date)?;
            editor.set_field("endingDate", ending_date)?;
            editor.set_field("managers", managers)?;
            commit_draft(editor, client.as_ref()).await?;
        }
        Command::AddImpact {
            description,
            impact_type,
            level,
            expected_date,
            template,
        } => {
            let context = match template {
                Some(template_id) => EditorContext::for_template(template_id.as_str()),
                None => context,
            };
            let mut editor = DraftEditor::new(EntityKind::Impact, context);
            editor.open(None)?;
            editor.set_field("description", description)?;
            editor.set_field("type", impact_type)?;
            editor.set_field("level", level)?;
            if let Some(date) = expected_date {
                editor.set_field("expectedDate", date)?;
            }
            commit_draft(editor, client.as_ref()).await?;
        }
    }

    Ok(())
}

async fn load_members(
    client: &Arc<RemoteClient>,
    context: &EditorContext,
    project: bool,
) -> Result<SharedRowEditor> {
    let (kind, rows) = if project {
        let project_id = context.project_id.as_ref().ok_or_else(|| {
            anyhow!("no project selected; pass --project-id or set APP__PROJECT_ID")
        })?;
        let topic = Topic::new(publications::PROJECTS).with_param("projectId", project_id.as_str());
        let projects: Vec<ProjectRecord> = client.fetch_publication(&topic).await?;
        let project = projects
            .iter()
            .find(|project| &project.id == project_id)
            .with_context(|| format!("project {project_id} not found"))?;
        (EntityKind::ProjectMember, project_rows(project))
    } else {
        let company_id = context.company_id.as_ref().ok_or_else(|| {
            anyhow!("no company selected; pass --company-id or set APP__COMPANY_ID")
        })?;
        let topic = Topic::new(publications::COMPANIES).with_param("companyId", company_id.as_str());
        let companies: Vec<CompanyRecord> = client.fetch_publication(&topic).await?;
        let company = companies
            .iter()
            .find(|company| &company.id == company_id)
            .with_context(|| format!("company {company_id} not found"))?;
        (EntityKind::CompanyMember, company_rows(company))
    };
    info!(kind = %kind, rows = rows.len(), "member table loaded");

    let executor: Arc<dyn CommandExecutor> = client.clone();
    Ok(SharedRowEditor::new(
        RowCollectionEditor::with_rows(kind, context.clone(), rows),
        executor,
    ))
}

async fn report_row_change(
    table: &SharedRowEditor,
    notices: &mut broadcast::Receiver<Notice>,
    result: EditorResult<RowOutcome>,
) -> Result<()> {
    let notice = notices.try_recv().ok();
    match result {
        Ok(outcome) => {
            debug!(?outcome, "row change settled");
            if let Some(notice) = notice {
                println!("{}", notice.message());
            }
            for row in table.rows().await {
                println!("{}", describe_member(&row));
            }
            Ok(())
        }
        Err(error) => {
            let message = notice
                .map(|notice| notice.message().to_string())
                .unwrap_or_else(|| error.to_string());
            Err(anyhow!(message))
        }
    }
}

async fn commit_draft(mut editor: DraftEditor, executor: &RemoteClient) -> Result<()> {
    let kind = editor.kind();
    let context = editor.context().clone();
    match editor.commit(executor).await {
        Ok(entity) => {
            println!("{}", success_notice(kind, Operation::Add, &context).message());
            print_entity(&entity)
        }
        Err(error) => Err(anyhow!(Notice::from_error(&error).message().to_string())),
    }
}

fn print_entity(entity: &Entity) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(entity)?);
    Ok(())
}

fn describe_member(row: &Row) -> String {
    let text = |name: &str| {
        row.field(name)
            .map(FieldValue::to_string)
            .unwrap_or_default()
    };
    format!(
        "{}\t{} {}\t{}\t{}",
        row.id,
        text("firstName"),
        text("lastName"),
        text("email"),
        text("role")
    )
}
