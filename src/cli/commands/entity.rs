use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_record, output_records, output_success, parse_assignments};
use crate::cli::OutputFormat;
use crate::controller::{EditorError, RecordEditor};
use crate::entity::registry;
use crate::filter::PageRequest;
use crate::services::system_actor;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum EntityCommands {
    #[command(about = "List registered entities")]
    Entities,

    #[command(about = "List one page of records")]
    List {
        #[arg(help = "Entity table name")]
        entity: String,
        #[arg(long, default_value_t = 0, help = "Zero-based page")]
        page: i64,
        #[arg(long, help = "Rows per page")]
        page_size: Option<i64>,
        #[arg(long, help = "Substring match on the entity's search column")]
        search: Option<String>,
        #[arg(long, help = "Sort spec, e.g. \"name\" or \"created_at desc\"")]
        sort: Option<String>,
        #[arg(long, help = "Field filters, e.g. \"status:eq:pending;city_id:is:null\"")]
        filter: Option<String>,
    },

    #[command(about = "Show one record")]
    Get {
        entity: String,
        id: String,
    },

    #[command(about = "Create a record from field=value pairs")]
    Create {
        entity: String,
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    #[command(about = "Change fields of an existing record")]
    Edit {
        entity: String,
        id: String,
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },

    #[command(about = "Flip a lifecycle flag")]
    Toggle {
        entity: String,
        id: String,
        #[arg(long, help = "Flag to flip (defaults to the entity's first flag)")]
        field: Option<String>,
    },

    #[command(about = "Delete a record")]
    Delete {
        entity: String,
        id: String,
    },
}

pub async fn handle(state: AppState, cmd: EntityCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = state.entities();
    let actor = system_actor();

    match cmd {
        EntityCommands::Entities => {
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(registry::all())?),
                OutputFormat::Text => {
                    for entity in registry::all() {
                        println!("{:<16} {}", entity.table, entity.label);
                    }
                }
            }
            Ok(())
        }
        EntityCommands::List { entity, page, page_size, search, sort, filter } => {
            let definition = service.entity(&entity)?;
            let mut request = PageRequest::new(page, page_size.unwrap_or(state.config.list.default_page_size));
            request.search = search;
            request.sort = sort;
            request.filter = filter;
            let result = service.list(&actor, &entity, &request).await?;
            output_records(&output_format, definition, &result.records, result.total_count)
        }
        EntityCommands::Get { entity, id } => {
            let record = service.get(&actor, &entity, &id).await?;
            output_record(&output_format, &record)
        }
        EntityCommands::Create { entity, set } => {
            let definition = service.entity(&entity)?;
            let mut editor = RecordEditor::create(definition);
            editor.set_all(parse_assignments(definition, &set)?)?;
            let record = submit(&mut editor, &service, &actor).await?;
            output_success(
                &output_format,
                &format!("Created {} {}", entity, record.id),
                Some(json!({ "record": record })),
            )
        }
        EntityCommands::Edit { entity, id, set } => {
            let definition = service.entity(&entity)?;
            let current = service.get(&actor, &entity, &id).await?;
            let mut editor = RecordEditor::edit(definition, &current);
            editor.set_all(parse_assignments(definition, &set)?)?;
            let record = submit(&mut editor, &service, &actor).await?;
            output_success(
                &output_format,
                &format!("Updated {} {}", entity, record.id),
                Some(json!({ "record": record })),
            )
        }
        EntityCommands::Toggle { entity, id, field } => {
            let field = match field {
                Some(field) => field,
                None => service
                    .entity(&entity)?
                    .toggles
                    .first()
                    .map(|f| f.to_string())
                    .ok_or_else(|| anyhow::anyhow!("{} has no lifecycle flags", entity))?,
            };
            let record = service.toggle(&actor, &entity, &id, &field).await?;
            let state = record.flag(&field).unwrap_or(false);
            output_success(
                &output_format,
                &format!("{} {} {} is now {}", entity, id, field, if state { "on" } else { "off" }),
                Some(json!({ "record": record })),
            )
        }
        EntityCommands::Delete { entity, id } => {
            service.delete(&actor, &entity, &id).await?;
            output_success(
                &output_format,
                &format!("Deleted {} {}", entity, id),
                Some(json!({ "id": id, "deleted": true })),
            )
        }
    }
}

/// Field errors are listed one per line instead of as a map dump
async fn submit(
    editor: &mut RecordEditor,
    service: &crate::services::EntityService,
    actor: &crate::permission::Actor,
) -> anyhow::Result<crate::database::Record> {
    match editor.submit(service, actor).await {
        Ok(record) => Ok(record),
        Err(EditorError::Invalid(errors)) => {
            let lines: Vec<String> = errors.0.iter().map(|(f, m)| format!("  {}: {}", f, m)).collect();
            Err(anyhow::anyhow!("Validation failed:\n{}", lines.join("\n")))
        }
        Err(other) => Err(other.into()),
    }
}
