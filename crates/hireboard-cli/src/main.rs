//! CLI binary for inspecting and managing an applicant pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;

use hireboard_engine::{EngineConfig, Notification, PipelineBoard, Projection};
use hireboard_remote::{DynBackend, HttpBackend, InMemoryBackend};
use hireboard_types::{Application, ApplicationId, JobId, PipelineSnapshot, SearchCriteria, Status};

#[derive(Parser)]
#[command(name = "hireboard", version, about = "Applicant pipeline board for the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Work offline against a pipeline snapshot file; changes are written back
    #[arg(long, global = true, conflicts_with = "api_url")]
    snapshot: Option<PathBuf>,

    /// Base URL of the applications API (default: $HIREBOARD_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the API (default: $HIREBOARD_API_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Job posting to open. Defaults to the snapshot's job in offline mode
    #[arg(short, long, global = true)]
    job: Option<String>,

    /// Engine config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Revert applications whose remote update fails
    #[arg(long, global = true)]
    rollback_on_failure: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the pipeline, or one stage of it
    Show {
        /// Only show this stage, with its metrics
        #[arg(short, long)]
        stage: Option<Status>,

        /// Print the visible applications as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move applications to another stage
    Move {
        /// Application ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Target stage
        #[arg(short, long)]
        to: Status,
    },

    /// Search applications on the server
    Search {
        /// Free text matched against candidate details
        #[arg(short, long)]
        text: Option<String>,

        /// Required skill (repeatable)
        #[arg(long = "skill")]
        skills: Vec<String>,

        #[arg(long)]
        institution: Option<String>,

        /// Applied on or after (YYYY-MM-DD)
        #[arg(long)]
        from: Option<chrono::NaiveDate>,

        /// Applied on or before (YYYY-MM-DD)
        #[arg(long)]
        to: Option<chrono::NaiveDate>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete applications
    Delete {
        /// Application ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Confirm the deletion; without it only a preview is printed
        #[arg(short, long)]
        yes: bool,
    },
}

/// Where the board's data lives for this invocation.
struct Session {
    board: PipelineBoard,
    notifications: broadcast::Receiver<Notification>,
    offline: Option<(PathBuf, Arc<InMemoryBackend>)>,
}

impl Session {
    /// Print everything the board reported since the last call.
    fn report(&mut self) -> bool {
        let mut failed = false;
        while let Ok(notification) = self.notifications.try_recv() {
            if notification.is_error() {
                failed = true;
                eprintln!("{}", notification.message());
            } else if !matches!(notification, Notification::BatchPending { .. }) {
                println!("{}", notification.message());
            }
        }
        failed
    }

    fn write_back(&self) -> anyhow::Result<()> {
        if let Some((path, backend)) = &self.offline {
            backend.snapshot().save(path)?;
            tracing::debug!(path = %path.display(), "Snapshot written back");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut session = open_session(&cli).await?;

    match cli.command {
        Commands::Show { stage, json } => {
            cmd_show(&mut session, stage, json)?;
        }
        Commands::Move { ids, to } => {
            cmd_move(&mut session, &ids, to).await?;
        }
        Commands::Search {
            text,
            skills,
            institution,
            from,
            to,
            json,
        } => {
            let criteria = SearchCriteria {
                text,
                skills,
                applied_from: from,
                applied_to: to,
                institution,
            };
            cmd_search(&mut session, criteria, json).await?;
        }
        Commands::Delete { ids, yes } => {
            cmd_delete(&mut session, &ids, yes).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.rollback_on_failure {
        config.rollback_on_failure = true;
    }
    Ok(config)
}

async fn open_session(cli: &Cli) -> anyhow::Result<Session> {
    let config = load_config(cli)?;

    let (job_id, backend, offline) = match &cli.snapshot {
        Some(path) => {
            let snapshot = PipelineSnapshot::load(path)?;
            let job_id = match &cli.job {
                Some(job) => JobId::new(job.as_str()),
                None => snapshot.job_id.clone(),
            };
            let memory = Arc::new(InMemoryBackend::new(snapshot));
            let backend = DynBackend::from_arc(memory.clone());
            (job_id, backend, Some((path.clone(), memory)))
        }
        None => {
            let Some(job) = &cli.job else {
                anyhow::bail!("--job is required when talking to the API");
            };
            let http = match &cli.api_url {
                Some(url) => {
                    let token = cli
                        .token
                        .clone()
                        .or_else(|| std::env::var("HIREBOARD_API_TOKEN").ok());
                    let backend = HttpBackend::new(url.as_str());
                    match token {
                        Some(token) if !token.is_empty() => backend.with_token(token),
                        _ => backend,
                    }
                }
                None => {
                    let backend = HttpBackend::from_env()?;
                    match &cli.token {
                        Some(token) => backend.with_token(token.clone()),
                        None => backend,
                    }
                }
            };
            (JobId::new(job.as_str()), DynBackend::new(http), None)
        }
    };

    let board = PipelineBoard::open(job_id, backend, config).await?;
    let notifications = board.subscribe();
    Ok(Session {
        board,
        notifications,
        offline,
    })
}

fn to_ids(raw: &[String]) -> Vec<ApplicationId> {
    raw.iter().map(|s| ApplicationId::new(s.trim())).collect()
}

/// A short human label for an application, from its payload when present.
fn display_name(app: &Application) -> &str {
    ["name", "candidate_name", "candidate"]
        .iter()
        .find_map(|key| app.payload.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("")
}

fn print_rows(applications: &[&Application]) {
    for app in applications {
        println!("  {:<16} {}", app.id, display_name(app));
    }
}

fn cmd_show(session: &mut Session, stage: Option<Status>, json: bool) -> anyhow::Result<()> {
    let board = &mut session.board;
    if let Some(stage) = stage {
        board.focus_stage(stage)?;
    }

    if json {
        let visible = board.visible_ids();
        let applications: Vec<&Application> = visible
            .iter()
            .filter_map(|id| board.store().get(id))
            .collect();
        println!("{}", serde_json::to_string_pretty(&applications)?);
        return Ok(());
    }

    println!("Job: {}", board.job_id());
    match board.projection() {
        Projection::Canonical(columns) => {
            for column in columns {
                println!("\n{} ({})", column.stage.label(), column.applications.len());
                print_rows(&column.applications);
            }
        }
        Projection::Focused(focused) => {
            println!(
                "\n{} ({})",
                focused.column.stage.label(),
                focused.column.applications.len()
            );
            if let Some(metrics) = focused.metrics {
                println!("Average time in stage: {:.1} days", metrics.avg_days_in_stage);
            }
            print_rows(&focused.column.applications);
        }
        Projection::Filtered { .. } => {
            anyhow::bail!("unexpected filtered view");
        }
    }
    Ok(())
}

async fn cmd_move(session: &mut Session, raw_ids: &[String], to: Status) -> anyhow::Result<()> {
    if !to.is_column() {
        anyhow::bail!("{to} is not a pipeline stage");
    }
    let ids = to_ids(raw_ids);
    let board = &mut session.board;
    board.select_exactly(&ids);
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !board.selection().contains(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        eprintln!("Skipping unknown or hidden applications: {}", missing.join(", "));
    }

    let Some(pending) = board.move_selection(to) else {
        println!("Nothing to move");
        return Ok(());
    };
    let report = pending.await;
    let summary = board.settle_commit(report);
    tracing::debug!(
        confirmed = summary.confirmed.len(),
        kept = summary.kept.len(),
        rolled_back = summary.rolled_back.len(),
        "Move settled"
    );

    let failed = session.report();
    session.write_back()?;
    if failed {
        anyhow::bail!("some applications could not be moved");
    }
    Ok(())
}

async fn cmd_search(
    session: &mut Session,
    criteria: SearchCriteria,
    json: bool,
) -> anyhow::Result<()> {
    let Some(pending) = session.board.apply_filters(criteria) else {
        anyhow::bail!("no search criteria given");
    };
    let outcome = pending.await;
    session.board.receive_query(outcome);
    let failed = session.report();

    if let Projection::Filtered { applications, .. } = session.board.projection() {
        if json {
            println!("{}", serde_json::to_string_pretty(applications)?);
        } else {
            println!("{} matching applications", applications.len());
            for app in applications {
                println!("  {:<16} {:<10} {}", app.id, app.status.label(), display_name(app));
            }
        }
    }

    if failed {
        anyhow::bail!("search failed");
    }
    Ok(())
}

async fn cmd_delete(session: &mut Session, raw_ids: &[String], yes: bool) -> anyhow::Result<()> {
    let count = session.board.request_delete(Some(to_ids(raw_ids)));
    if count == 0 {
        println!("Nothing to delete");
        return Ok(());
    }
    if !yes {
        println!("Would delete {count} applications; rerun with --yes to confirm");
        session.board.cancel_delete();
        return Ok(());
    }

    let Some(pending) = session.board.confirm_delete() else {
        return Ok(());
    };
    let report = pending.await;
    session.board.settle_delete(report);

    let failed = session.report();
    session.write_back()?;
    if failed {
        anyhow::bail!("some applications could not be deleted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_move_with_stage_alias() {
        let cli = Cli::try_parse_from([
            "hireboard", "--snapshot", "p.json", "move", "a-1", "a-2", "--to", "review",
        ])
        .unwrap();
        match cli.command {
            Commands::Move { ids, to } => {
                assert_eq!(ids, vec!["a-1", "a-2"]);
                assert_eq!(to, Status::Reviewing);
            }
            _ => panic!("expected move"),
        }
        assert_eq!(cli.snapshot, Some(PathBuf::from("p.json")));
    }

    #[test]
    fn rejects_unknown_stage() {
        assert!(Cli::try_parse_from(["hireboard", "move", "a-1", "--to", "hired"]).is_err());
    }

    #[test]
    fn parses_search_dates_and_skills() {
        let cli = Cli::try_parse_from([
            "hireboard", "search", "--skill", "rust", "--skill", "sql", "--from", "2024-01-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { skills, from, to, .. } => {
                assert_eq!(skills, vec!["rust", "sql"]);
                assert_eq!(from, chrono::NaiveDate::from_ymd_opt(2024, 1, 1));
                assert!(to.is_none());
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn snapshot_and_api_url_conflict() {
        let parsed = Cli::try_parse_from([
            "hireboard", "--snapshot", "p.json", "--api-url", "http://x", "show",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn display_name_prefers_name_field() {
        let app = Application::new("a", Status::Applied)
            .with_field("candidate", serde_json::json!("fallback"))
            .with_field("name", serde_json::json!("Ada"));
        assert_eq!(display_name(&app), "Ada");
        assert_eq!(display_name(&Application::new("b", Status::Offer)), "");
    }

    #[tokio::test]
    async fn offline_move_writes_snapshot_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        PipelineSnapshot::new(
            JobId::new("job"),
            vec![
                Application::new("a", Status::Applied),
                Application::new("b", Status::Applied),
            ],
        )
        .save(&path)
        .unwrap();

        let cli = Cli::try_parse_from([
            "hireboard",
            "--snapshot",
            path.to_str().unwrap(),
            "move",
            "a",
            "--to",
            "offer",
        ])
        .unwrap();
        let mut session = open_session(&cli).await.unwrap();
        cmd_move(&mut session, &["a".to_string()], Status::Offer)
            .await
            .unwrap();

        let saved = PipelineSnapshot::load(&path).unwrap();
        assert_eq!(saved.applications[0].status, Status::Offer);
        assert_eq!(saved.applications[1].status, Status::Applied);
    }

    #[tokio::test]
    async fn delete_without_yes_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        PipelineSnapshot::new(JobId::new("job"), vec![Application::new("a", Status::Applied)])
            .save(&path)
            .unwrap();

        let cli = Cli::try_parse_from([
            "hireboard",
            "--snapshot",
            path.to_str().unwrap(),
            "delete",
            "a",
        ])
        .unwrap();
        let mut session = open_session(&cli).await.unwrap();
        cmd_delete(&mut session, &["a".to_string()], false)
            .await
            .unwrap();
        assert!(session.board.pending_delete().is_none());
        assert_eq!(PipelineSnapshot::load(&path).unwrap().applications.len(), 1);
    }
}
