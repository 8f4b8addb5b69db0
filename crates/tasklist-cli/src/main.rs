#![forbid(unsafe_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tasklist_core::domain::{SearchOptions, SortOrder};
use tasklist_core::impls::{HttpTaskApi, InMemoryTaskApi};
use tasklist_core::ports::SearchApi;
use tasklist_core::{
    ClientConfig, SearchSession, SubmitOutcome, Task, TaskClient, TaskClientBuilder, TaskComposer,
    TaskId, View,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tasklist: command-line client for the task list backend",
    long_about = None
)]
struct Cli {
    /// Backend base URL (overrides config file and TASKLIST_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// TOML config file (default: $TASKLIST_CONFIG, if set).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the create / toggle / delete scenario against the in-memory store.
    Demo,
    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Commands that talk to the backend; these need a valid config.
#[derive(Subcommand, Debug)]
enum RemoteCommand {
    /// Print the tasks of a view.
    List {
        /// Show completed tasks (history) instead of active ones.
        #[arg(long)]
        completed: bool,
    },
    /// Create a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Mark a task complete.
    Done { id: String },
    /// Move a completed task back to the active view.
    Restore { id: String },
    /// Delete a task.
    Rm {
        id: String,
        /// The task is in the history view.
        #[arg(long)]
        completed: bool,
    },
    /// Print one task as JSON.
    Show { id: String },
    /// Full-text search.
    Search {
        query: String,
        #[arg(long)]
        completed: Option<bool>,
        /// relevance, date_desc or date_asc
        #[arg(long)]
        sort: Option<SortOrder>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Ask the backend to rebuild its search index.
    Reindex,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TASKLIST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "tasklist=debug,info"
        } else {
            "tasklist=info,warn"
        })
    });

    let format = env::var("TASKLIST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// defaults -> TOML file -> environment -> `--api-url`
fn load_config(path: Option<&Path>, api_url: Option<&str>) -> anyhow::Result<ClientConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env::var_os("TASKLIST_CONFIG").map(PathBuf::from));

    let mut config = match path.as_deref() {
        Some(path) => load_file(path)?,
        None => ClientConfig::default(),
    }
    .with_env()
    .context("applying TASKLIST_* environment overrides")?;

    if let Some(url) = api_url {
        config.api_url = url.to_string();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_file(path: &Path) -> anyhow::Result<ClientConfig> {
    ClientConfig::load(path).with_context(|| format!("loading config from {}", path.display()))
}

fn print_task(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    println!("[{mark}] {}  {}", task.id, task.text);
}

async fn print_view(client: &TaskClient, view: View) -> anyhow::Result<()> {
    let tasks = client
        .list_tasks(view)
        .await
        .with_context(|| format!("listing {view} tasks"))?;
    if tasks.is_empty() {
        println!("(no {view} tasks)");
    }
    for task in tasks.iter() {
        print_task(task);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Demo => run_demo().await,
        Commands::Remote(command) => {
            let config = load_config(cli.config.as_deref(), cli.api_url.as_deref())?;
            run_remote(&config, command).await
        }
    }
}

async fn run_remote(config: &ClientConfig, command: RemoteCommand) -> anyhow::Result<()> {
    let api = Arc::new(HttpTaskApi::from_config(config).context("building http client")?);
    let client = Arc::new(
        TaskClientBuilder::new()
            .config(config)
            .api(api.clone())
            .build()?,
    );
    info!(api_url = %config.api_url, "client ready");

    match command {
        RemoteCommand::List { completed } => print_view(&client, View::from_completed(completed)).await?,
        RemoteCommand::Add { text } => {
            let composer = TaskComposer::new(Arc::clone(&client));
            composer.set_text(text.join(" "));
            match composer.submit().await.context("creating task")? {
                SubmitOutcome::Created(task) => print_task(&task),
                SubmitOutcome::Ignored => bail!("task text must not be blank"),
                SubmitOutcome::Busy => bail!("a create is already in flight"),
            }
        }
        RemoteCommand::Done { id } => {
            let task = client
                .complete_task(&TaskId::from(id))
                .await
                .context("completing task")?;
            print_task(&task);
        }
        RemoteCommand::Restore { id } => {
            let task = client
                .restore_task(&TaskId::from(id))
                .await
                .context("restoring task")?;
            print_task(&task);
        }
        RemoteCommand::Rm { id, completed } => {
            let id = TaskId::from(id);
            match client.delete_task(&id, View::from_completed(completed)).await {
                Ok(()) => println!("deleted {id}"),
                Err(e) if e.is_not_found() => warn!(task_id = %id, "task not found, nothing to delete"),
                Err(e) => return Err(e).context("deleting task"),
            }
        }
        RemoteCommand::Show { id } => {
            let task = client
                .get_task(&TaskId::from(id))
                .await
                .context("fetching task")?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        RemoteCommand::Search {
            query,
            completed,
            sort,
            limit,
            offset,
        } => {
            let options = SearchOptions {
                completed,
                sort,
                limit,
                offset,
            };
            let session = SearchSession::with_config(api, options, config);
            let response = session.search_now(query).await.context("searching")?;
            println!(
                "{} result(s), page {}/{}",
                response.total, response.page, response.total_pages
            );
            for hit in &response.results {
                let mark = if hit.completed { "x" } else { " " };
                println!("[{mark}] {}  {:.2}  {}", hit.id, hit.score, hit.text);
            }
        }
        RemoteCommand::Reindex => {
            let message = api.reindex().await.context("reindexing")?;
            println!("{message}");
        }
    }
    Ok(())
}

async fn run_demo() -> anyhow::Result<()> {
    let api = Arc::new(InMemoryTaskApi::new());
    let client = TaskClientBuilder::new().api(api.clone()).build()?;

    let milk = client.create_task("Buy milk").await?;
    client.create_task("Walk the dog").await?;
    println!("== after create");
    print_view(&client, View::Active).await?;

    client.complete_task(&milk.id).await?;
    println!("== after completing '{}'", milk.text);
    print_view(&client, View::Active).await?;
    print_view(&client, View::History).await?;

    client.restore_task(&milk.id).await?;
    client.delete_task(&milk.id, View::Active).await?;
    println!("== after restore + delete");
    print_view(&client, View::Active).await?;

    if let Err(e) = client.delete_task(&milk.id, View::Active).await {
        println!("second delete: {e}");
    }
    println!(
        "api calls: {}",
        serde_json::to_string(&api.call_counts().await)?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).await
}
