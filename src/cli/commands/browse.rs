use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::utils::{parse_assignments, record_line};
use crate::controller::{ListController, ListState, RecordEditor};
use crate::services::system_actor;
use crate::state::AppState;

const HELP: &str = "\
Type to search. Commands:
  :next | :prev | :page N | :size N
  :sort SPEC         e.g. :sort name or :sort created_at desc (empty for default)
  :new F=V ...       create a record
  :edit ID F=V ...   change a record
  :toggle ID FIELD   flip a lifecycle flag
  :refresh | :help | :quit";

/// Interactive list view: search input is debounced, every query change
/// re-fetches, and only the latest response is rendered.
pub async fn handle(state: AppState, entity: &str, page_size: Option<i64>) -> anyhow::Result<()> {
    let service = state.entities();
    let definition = service.entity(entity)?;
    let actor = system_actor();

    let list = ListController::new(
        state.store.clone(),
        definition,
        page_size.unwrap_or(state.config.list.default_page_size),
        state.config.list.max_page_size,
    );
    let search = list.search_debouncer(Duration::from_millis(state.config.list.search_debounce_ms));

    let mut updates = list.subscribe();
    let view = list.clone();
    let render = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let current = updates.borrow_and_update().clone();
            match current {
                ListState::Loaded { records, total_count } => {
                    let query = view.query();
                    println!(
                        "-- {} page {} ({} per page, {} total{}) --",
                        view.entity().table,
                        query.page + 1,
                        query.page_size,
                        total_count,
                        query.search_term().map(|s| format!(", search '{}'", s)).unwrap_or_default()
                    );
                    for record in &records {
                        println!("{}", record_line(view.entity(), record));
                    }
                }
                ListState::Error(message) => eprintln!("Error: {}", message),
                ListState::Idle | ListState::Loading => {}
            }
        }
    });

    println!("{}", HELP);
    list.mount().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let Some(command) = line.strip_prefix(':') else {
            search.push(line.to_string());
            continue;
        };
        let mut words = command.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let args: Vec<String> = words.map(str::to_string).collect();
        let query = list.query();

        match (verb, args.as_slice()) {
            ("quit" | "q", _) => break,
            ("help", _) => println!("{}", HELP),
            ("next", _) => list.set_page(query.page + 1).await,
            ("prev", _) => list.set_page((query.page - 1).max(0)).await,
            ("page", [n]) => match n.parse::<i64>() {
                Ok(n) if n >= 1 => list.set_page(n - 1).await,
                _ => eprintln!("Page numbers start at 1"),
            },
            ("size", [n]) => match n.parse::<i64>() {
                Ok(n) => list.set_page_size(n).await,
                Err(_) => eprintln!("Page size must be a number"),
            },
            ("sort", spec) => list.set_sort(Some(spec.join(" "))).await,
            ("refresh", _) => list.refresh().await,
            ("new", assignments) => {
                let outcome = async {
                    let mut editor =
                        RecordEditor::create(definition).with_refresh(list.refresh_handle());
                    editor.set_all(parse_assignments(definition, assignments)?)?;
                    Ok::<_, anyhow::Error>(editor.submit(&service, &actor).await?)
                }
                .await;
                report(outcome.map(|r| format!("Created {}", r.id)));
            }
            ("edit", [id, assignments @ ..]) => {
                let outcome = async {
                    let current = service.get(&actor, definition.table, id).await?;
                    let mut editor =
                        RecordEditor::edit(definition, &current)
                            .with_refresh(list.refresh_handle());
                    editor.set_all(parse_assignments(definition, assignments)?)?;
                    Ok::<_, anyhow::Error>(editor.submit(&service, &actor).await?)
                }
                .await;
                report(outcome.map(|r| format!("Updated {}", r.id)));
            }
            ("toggle", [id, field]) => {
                let outcome = service.toggle(&actor, definition.table, id, field).await;
                if outcome.is_ok() {
                    list.refresh().await;
                }
                let message = outcome.map(|r| {
                    let state = r.flag(field).unwrap_or(false);
                    format!("{} {} is now {}", r.id, field, state)
                });
                report(message.map_err(Into::into));
            }
            _ => eprintln!("Unknown command ':{}' (try :help)", command),
        }
    }

    list.close();
    drop(search);
    render.abort();
    Ok(())
}

fn report(outcome: anyhow::Result<String>) {
    match outcome {
        Ok(message) => println!("✓ {}", message),
        Err(e) => eprintln!("Error: {}", e),
    }
}
