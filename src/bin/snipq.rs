//! snipq CLI — operator interface to the job stream and audit trail.

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use snipq::audit::AuditTrail;
use snipq::config::Config;
use snipq::db::Db;
use snipq::model::audit::AuditTag;
use snipq::model::job::{JobKind, TestId};
use snipq::producer::JobProducer;
use snipq::telemetry::{TelemetryConfig, init_telemetry};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "snipq", about = "Durable job dispatch and audit trail for code snippets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prepare the database: run migrations, seed the tag vocabulary,
    /// create the stream topics
    Init,
    /// Publish a job request to its kind's topic
    Publish {
        /// Job kind: format, lint, or test_execution
        kind: String,
        /// Snippet to process
        snippet_id: String,
        /// Requesting user (required for format and test_execution)
        #[arg(long)]
        user: Option<String>,
    },
    /// List audit logs for an entity
    Logs {
        /// Snippet or test ID
        entity: String,
        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show the latest status for a snippet and tag
    Status {
        snippet_id: String,
        /// Tag: validation, lint, format, test_execution, or snippet_execution
        tag: String,
    },
    /// Show all recorded runs of one test
    History {
        test_id: String,
    },
    /// Show the most recently formatted version of a snippet
    Formatted {
        snippet_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "snipq".to_string(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;

    match cli.command {
        Command::Init => cmd_init(&db, &config).await,
        Command::Publish {
            kind,
            snippet_id,
            user,
        } => cmd_publish(db, &config, kind, snippet_id, user).await,
        Command::Logs { entity, tag } => cmd_logs(&db, entity, tag).await,
        Command::Status { snippet_id, tag } => cmd_status(&db, snippet_id, tag).await,
        Command::History { test_id } => cmd_history(&db, test_id).await,
        Command::Formatted { snippet_id } => cmd_formatted(&db, snippet_id).await,
    }
}

async fn cmd_init(db: &Db, config: &Config) -> anyhow::Result<()> {
    db.migrate().await?;
    db.seed_tags().await?;
    for topic in config.stream.topics() {
        db.create_topic(topic).await?;
        println!("Topic ready: {topic}");
    }
    println!("Database migrated, tags seeded.");
    Ok(())
}

async fn cmd_publish(
    db: Db,
    config: &Config,
    kind: String,
    snippet_id: String,
    user: Option<String>,
) -> anyhow::Result<()> {
    let kind: JobKind = kind
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid job kind: {kind}"))?;

    let producer = JobProducer::new(Arc::new(db), config.stream.clone());
    producer.publish(kind, &snippet_id, user.as_deref()).await?;

    println!("Published: {kind} for {snippet_id}");
    Ok(())
}

async fn cmd_logs(db: &Db, entity: String, tag: Option<String>) -> anyhow::Result<()> {
    let tag_filter: Option<AuditTag> = match tag {
        Some(t) => Some(t.parse().map_err(|_| anyhow::anyhow!("invalid tag: {t}"))?),
        None => None,
    };

    let entries = db.entries(&entity, tag_filter).await?;

    if entries.is_empty() {
        println!("No audit logs found.");
        return Ok(());
    }

    // Header
    println!(
        "{:<8}  {:<18}  {:<10}  RECORDED",
        "ID", "TAG", "STATUS"
    );
    println!("{}", "-".repeat(60));

    for entry in &entries {
        let short_id = &entry.id.to_string()[..8];
        println!(
            "{:<8}  {:<18}  {:<10}  {}",
            short_id,
            entry.tag.as_str(),
            entry.details.status().as_str(),
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\n{} log(s)", entries.len());
    Ok(())
}

async fn cmd_status(db: &Db, snippet_id: String, tag: String) -> anyhow::Result<()> {
    let tag: AuditTag = tag
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid tag: {tag}"))?;

    let view = db.latest_status(&snippet_id, tag).await?;

    println!("Status:     {}", view.status);
    match view.recorded_at {
        Some(at) => println!("Recorded:   {at}"),
        None => println!("Recorded:   -"),
    }
    if !view.issues.is_empty() {
        println!("Issues:");
        for issue in &view.issues {
            let place = match (issue.line, issue.column) {
                (Some(line), Some(column)) => format!("{line}:{column}"),
                (Some(line), None) => format!("{line}"),
                _ => "-".to_string(),
            };
            let rule = issue.rule.as_deref().unwrap_or("-");
            println!("  [{place}] {rule}: {}", issue.message);
        }
    }
    Ok(())
}

async fn cmd_history(db: &Db, test_id: String) -> anyhow::Result<()> {
    let results = db.execution_history(&TestId::new(&test_id)).await?;

    if results.is_empty() {
        println!("No runs recorded for test {test_id}.");
        return Ok(());
    }

    for result in &results {
        println!(
            "{}  {:<8}  {} failure(s)",
            result.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            result.status.as_str(),
            result.failures.len()
        );
        for failure in &result.failures {
            println!("    {failure}");
        }
    }

    println!("\n{} run(s)", results.len());
    Ok(())
}

async fn cmd_formatted(db: &Db, snippet_id: String) -> anyhow::Result<()> {
    let snippet = snipq::model::job::SnippetId::parse(snippet_id)?;
    match db.formatted_version(&snippet).await? {
        Some(code) => println!("{code}"),
        None => println!("No formatted version recorded."),
    }
    Ok(())
}
