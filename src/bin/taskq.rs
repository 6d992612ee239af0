//! taskq CLI: operator interface to the task queue.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use taskq::config::Config;
use taskq::db::Db;
use taskq::model::{NewTask, Status, Task, TaskFilter, TaskId, TaskUpdate};
use taskq::service::TaskService;
use taskq::telemetry::{TelemetryConfig, init_telemetry};
use taskq::worker::{PoolConfig, SimulatedWork, WorkerPool};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "taskq", about = "Postgres-backed task queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker pool until interrupted
    Serve {
        /// Number of worker loops (defaults to WORKER_COUNT)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Task operations
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Show counts by status and mean processing time
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Create a task
    Create {
        #[arg(long)]
        title: String,
        /// 1 (lowest) to 10 (highest)
        #[arg(long)]
        priority: i32,
        /// Client dedup key; repeated creates with the same key return the same task
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// List tasks, newest first
    List {
        /// Filter by status (pending, processing, completed)
        #[arg(long)]
        status: Option<String>,
        /// Maximum tasks to show (default 20, max 100)
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show a task
    Show {
        id: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a task; fails if VERSION is stale
    Update {
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        priority: i32,
        /// Version the edit was based on
        #[arg(long)]
        version: i32,
    },
    /// Delete a task
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "taskq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let db = Db::connect_with(config.database_url.expose_secret(), config.max_connections).await?;
    db.migrate().await?;
    let db = Arc::new(db);

    match cli.command {
        Command::Serve { workers } => cmd_serve(&config, db, workers).await,
        Command::Stats { json } => cmd_stats(&TaskService::new(db), json).await,
        Command::Task { action } => {
            let service = TaskService::new(db);
            match action {
                TaskAction::Create {
                    title,
                    priority,
                    idempotency_key,
                } => cmd_task_create(&service, title, priority, idempotency_key).await,
                TaskAction::List { status, limit } => cmd_task_list(&service, status, limit).await,
                TaskAction::Show { id, json } => cmd_task_show(&service, &id, json).await,
                TaskAction::Update {
                    id,
                    title,
                    priority,
                    version,
                } => {
                    let id: TaskId = id.parse()?;
                    let task = service
                        .update(id, TaskUpdate::new(title, priority, version))
                        .await?;
                    println!("Updated: {} (version {})", task.id, task.version);
                    Ok(())
                }
                TaskAction::Delete { id } => {
                    let id: TaskId = id.parse()?;
                    service.delete(id).await?;
                    println!("Deleted: {id}");
                    Ok(())
                }
            }
        }
    }
}

async fn cmd_serve(config: &Config, db: Arc<Db>, workers: Option<usize>) -> anyhow::Result<()> {
    let handler = SimulatedWork::new(config.work_min, config.work_max)?;
    let pool = WorkerPool::new(
        db,
        Arc::new(handler),
        PoolConfig {
            poll_interval: config.poll_interval,
        },
    );

    pool.start(workers.unwrap_or(config.workers))?;

    tokio::signal::ctrl_c().await?;
    info!("interrupt received");

    if tokio::time::timeout(config.shutdown_grace, pool.stop())
        .await
        .is_err()
    {
        warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            active = pool.active_workers(),
            "worker pool did not stop within grace period"
        );
    }
    Ok(())
}

async fn cmd_task_create(
    service: &TaskService,
    title: String,
    priority: i32,
    idempotency_key: Option<String>,
) -> anyhow::Result<()> {
    let resolution = service
        .create(NewTask::new(title, priority), idempotency_key.as_deref())
        .await?;

    let label = if resolution.is_existing() {
        "Existing"
    } else {
        "Created"
    };
    let task = resolution.into_task();
    println!("{label}: {} (status: {}, version: {})", task.id, task.status, task.version);
    Ok(())
}

async fn cmd_task_list(
    service: &TaskService,
    status: Option<String>,
    limit: Option<i64>,
) -> anyhow::Result<()> {
    let filter = match status {
        Some(s) => TaskFilter::status(s.parse::<Status>()?),
        None => TaskFilter::default(),
    };

    let tasks = service.list(filter, limit).await?;

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<11}  {:<3}  {:<4}  {:<40}  CREATED",
        "ID", "STATUS", "PRI", "VER", "TITLE"
    );
    println!("{}", "-".repeat(100));

    for task in &tasks {
        println!(
            "{:<8}  {:<11}  {:<3}  {:<4}  {:<40}  {}",
            task.id,
            task.status,
            task.priority,
            task.version,
            truncate(&task.title, 40),
            task.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    println!("\n{} task(s)", tasks.len());
    Ok(())
}

async fn cmd_task_show(service: &TaskService, id: &str, json: bool) -> anyhow::Result<()> {
    let task = service.get(id.parse()?).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }
    print_task(&task);
    Ok(())
}

async fn cmd_stats(service: &TaskService, json: bool) -> anyhow::Result<()> {
    let stats = service.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    for (status, count) in &stats.by_status {
        println!("{:<11} {count}", format!("{status}:"));
    }
    println!("{:<11} {}", "total:", stats.total_tasks);
    match stats.avg_processing {
        Some(secs) => println!("{:<11} {secs:.2}s", "avg time:"),
        None => println!("{:<11} -", "avg time:"),
    }
    Ok(())
}

fn print_task(task: &Task) {
    println!("ID:         {}", task.id);
    println!("Title:      {}", task.title);
    println!("Status:     {}", task.status);
    println!("Priority:   {}", task.priority);
    println!("Version:    {}", task.version);
    println!("Created:    {}", task.created_at);
    println!("Updated:    {}", task.updated_at);
    if let Some(started) = task.started_at {
        println!("Started:    {started}");
    }
    if let Some(completed) = task.completed_at {
        println!("Completed:  {completed}");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}
