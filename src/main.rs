use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use task_tracker_lib::logging::init_logging;
use task_tracker_lib::models::{validate_task_text, SettingsFile};
use task_tracker_lib::storage::SCHEMA_VERSION;
use task_tracker_lib::{
    HttpTaskApi, Settings, SortKey, Storage, StorageError, StoreSnapshot, TaskApi, TaskFilter,
    TaskId, TaskStore, TransportError, ValidationError,
};

const ENV_HOME: &str = "TASK_TRACKER_HOME";
const DEFAULT_DATA_DIR: &str = ".task-tracker";

#[derive(Parser)]
#[command(name = "task-tracker")]
#[command(about = "Track tasks stored on a remote task server", long_about = None)]
struct Cli {
    /// Base URL of the task server (overrides settings and environment)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Directory holding settings, the task cache and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one page of tasks
    List {
        /// all, active or done
        #[arg(long, default_value = "all")]
        filter: TaskFilter,
        /// Case-insensitive substring match on the task text
        #[arg(long, default_value = "")]
        search: String,
        /// newest, oldest, completed or pending
        #[arg(long)]
        sort: Option<SortKey>,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Add a new task
    Add { text: String },
    /// Flip the completed flag of a task
    Toggle { id: TaskId },
    /// Delete a task
    Delete { id: TaskId },
    /// Reload the task list from the server
    Refresh,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("logging: {0}")]
    Logging(#[from] flexi_logger::FlexiLoggerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let data_dir = resolve_data_dir(cli.data_dir.clone());
    let storage = Arc::new(Storage::new(data_dir));
    storage.ensure_dirs()?;

    let _logger = init_logging(storage.root())?;
    let settings = load_settings(&storage, cli.api_url.as_deref())?;
    log::info!(
        "starting task-tracker api_url={} data_dir={}",
        settings.api_url,
        storage.root().display()
    );

    let api = Arc::new(HttpTaskApi::new(&settings)?);
    let mut store = TaskStore::new(api).with_page_size(settings.page_size);
    if settings.cache_enabled {
        store = store.with_cache(storage.clone());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(execute(&store, cli.command));

    print_snapshot(&store.snapshot());
    outcome
}

async fn execute<A: TaskApi>(store: &TaskStore<A>, command: Commands) -> Result<(), CliError> {
    store.hydrate_from_cache();
    if let Commands::Refresh = command {
        store.load(true).await?;
        return Ok(());
    }
    // A failed load only fills the error slot, which gets printed with the snapshot.
    let _ = store.load(false).await;

    match command {
        Commands::List {
            filter,
            search,
            sort,
            page,
            per_page,
        } => {
            store.set_filter(filter);
            store.set_search(search);
            store.set_sort(sort);
            if let Some(per_page) = per_page {
                store.set_page_size(per_page);
            }
            store.set_page(page);
        }
        Commands::Add { text } => {
            let text = validate_task_text(&text)?;
            store.add_task(text).await?;
        }
        Commands::Toggle { id } => store.toggle_task(id).await?,
        Commands::Delete { id } => store.delete_task(id).await?,
        Commands::Refresh => {}
    }
    Ok(())
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| {
        std::env::var(ENV_HOME)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// File settings, then environment overrides, then `--api-url`. Writes defaults on first run.
fn load_settings(storage: &Storage, api_url: Option<&str>) -> Result<Settings, CliError> {
    let settings = match storage.load_settings() {
        Ok(file) => file.settings,
        Err(StorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            let settings = Settings::default();
            storage.save_settings(&SettingsFile {
                schema_version: SCHEMA_VERSION,
                settings: settings.clone(),
            })?;
            settings
        }
        Err(err) => return Err(err.into()),
    };

    let mut settings = settings.apply_overrides(|key| std::env::var(key).ok());
    if let Some(url) = api_url.map(str::trim).filter(|url| !url.is_empty()) {
        settings.api_url = url.to_string();
    }
    Ok(settings)
}

fn print_snapshot(snapshot: &StoreSnapshot) {
    if let Some(notification) = snapshot.feedback.active_notification() {
        println!("[{:?}] {}", notification.severity, notification.message);
    }
    if let Some(error) = &snapshot.feedback.error {
        println!("error: {error} (run `task-tracker refresh` to retry)");
    }

    let view = &snapshot.view;
    if view.tasks.is_empty() {
        println!("No tasks.");
    }
    for task in &view.tasks {
        let mark = if task.completed { "x" } else { " " };
        println!("  [{mark}] {:>6}  {}", task.id, task.text);
    }
    println!(
        "Page {} of {} ({} matching)",
        view.page, view.total_pages, view.filtered_count
    );
    println!("Completed: {} / {}", view.completed_count, view.total_count);
}
