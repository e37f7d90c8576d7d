//! lms-progress - administrative command line for the progress engine
//!
//! Operators use it to inspect and repair learner progress and to manage
//! certificates without going through the web application.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use lms_common::config::{resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use lms_common::db::{init_database, CertificateUpdate, NewCertificate};
use lms_progress::{Player, ELIGIBILITY_THRESHOLD};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Parser, Debug)]
#[command(name = "lms-progress", version, about = "Learning progress and certificate administration")]
struct Cli {
    /// Data root folder (holds lms.db)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, env = "LMS_CONFIG")]
    config: Option<PathBuf>,

    /// Database file; overrides root folder and configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct LessonArgs {
    #[arg(long)]
    learner: String,
    #[arg(long)]
    lesson: String,
}

#[derive(Args, Debug)]
struct CourseArgs {
    #[arg(long)]
    learner: String,
    #[arg(long)]
    course: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mark a lesson completed
    Complete(LessonArgs),
    /// Mark a lesson not completed
    Incomplete(LessonArgs),
    /// Show one lesson's completion record
    LessonStatus(LessonArgs),
    /// Recompute a learner's course percentage
    Recompute(CourseArgs),
    /// Recompute, then check certificate eligibility
    Eligible(CourseArgs),
    /// Recompute, then issue the certificate if eligible
    Issue {
        #[command(flatten)]
        target: CourseArgs,
        /// Issue regardless of progress
        #[arg(long)]
        force: bool,
    },
    /// Certificate administration
    #[command(subcommand)]
    Certificates(CertificateCommand),
}

#[derive(Subcommand, Debug)]
enum CertificateCommand {
    /// List certificates, optionally for one learner
    List {
        #[arg(long)]
        learner: Option<String>,
    },
    /// Show one certificate
    Show { id: String },
    /// Create a certificate; fails if the learner already has one for the course
    Create {
        #[arg(long)]
        learner: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        title: String,
        /// RFC 3339 issue date (defaults to now)
        #[arg(long)]
        issue_date: Option<DateTime<Utc>>,
    },
    /// Update display metadata
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        issue_date: Option<DateTime<Utc>>,
        #[arg(long, conflicts_with = "clear_expiry")]
        expiry_date: Option<DateTime<Utc>>,
        #[arg(long)]
        clear_expiry: bool,
        #[arg(long, conflicts_with = "clear_url")]
        url: Option<String>,
        #[arg(long)]
        clear_url: bool,
    },
    /// Delete a certificate
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TomlConfig::load(path)?,
        None => match lms_common::config::default_config_file() {
            Some(path) => TomlConfig::load_or_default(&path)?,
            None => TomlConfig::default(),
        },
    };

    let log_file = config
        .logging
        .open_log_file()
        .context("Failed to open log file")?;
    let to_file = log_file.is_some();
    let writer = match log_file {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(writer)
        .with_ansi(!to_file)
        .init();

    info!("lms-progress v{}", env!("CARGO_PKG_VERSION"));

    let db_path = match &cli.database {
        Some(path) => path.clone(),
        None => {
            let root = resolve_root_folder(
                cli.root_folder.as_deref(),
                ROOT_FOLDER_ENV,
                config.root_folder.as_deref(),
            );
            config.database_file(&root)
        }
    };
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let player = Player::from_sqlite(pool, config.store_timeout());

    run(&player, cli.command).await
}

async fn run(player: &Player, command: Command) -> Result<()> {
    match command {
        Command::Complete(args) => {
            let progress = player
                .lessons()
                .mark_completed(&args.learner, &args.lesson)
                .await?;
            println!(
                "lesson {} completed at {}",
                progress.lesson_id,
                progress
                    .completed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default()
            );
        }
        Command::Incomplete(args) => {
            player
                .lessons()
                .mark_incomplete(&args.learner, &args.lesson)
                .await?;
            println!("lesson {} marked incomplete", args.lesson);
        }
        Command::LessonStatus(args) => {
            match player
                .lessons()
                .get_progress(&args.learner, &args.lesson)
                .await?
            {
                Some(p) if p.completed => println!(
                    "lesson {}: completed at {}",
                    p.lesson_id,
                    p.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default()
                ),
                Some(p) => println!("lesson {}: not completed", p.lesson_id),
                None => println!("lesson {}: no progress recorded", args.lesson),
            }
        }
        Command::Recompute(args) => {
            let progress = player
                .aggregator()
                .recompute_detailed(&args.learner, &args.course)
                .await?;
            println!(
                "{}% ({} of {} lessons){}",
                progress.percent,
                progress.completed_lessons,
                progress.total_lessons,
                if progress.enrollment_updated {
                    ""
                } else {
                    " - not enrolled, nothing stored"
                }
            );
        }
        Command::Eligible(args) => {
            let (percent, eligible) = player
                .check_eligibility(&args.learner, &args.course)
                .await?;
            println!(
                "{} ({}%, threshold {}%)",
                if eligible { "eligible" } else { "not eligible" },
                percent,
                ELIGIBILITY_THRESHOLD
            );
        }
        Command::Issue { target, force } => {
            let (percent, eligible) = player
                .check_eligibility(&target.learner, &target.course)
                .await?;
            if !eligible && !force {
                anyhow::bail!(
                    "learner {} is not eligible for course {} ({}%, needs {}%)",
                    target.learner,
                    target.course,
                    percent,
                    ELIGIBILITY_THRESHOLD
                );
            }
            let certificate = player
                .certificates()
                .issue(&target.learner, &target.course)
                .await?;
            print_json(&certificate)?;
        }
        Command::Certificates(command) => run_certificates(player, command).await?,
    }
    Ok(())
}

async fn run_certificates(player: &Player, command: CertificateCommand) -> Result<()> {
    let certificates = player.certificates();
    match command {
        CertificateCommand::List { learner } => {
            print_json(&certificates.list_certificates(learner.as_deref()).await?)?;
        }
        CertificateCommand::Show { id } => {
            print_json(&certificates.get_certificate(&id).await?)?;
        }
        CertificateCommand::Create {
            learner,
            course,
            name,
            title,
            issue_date,
        } => {
            let certificate = certificates
                .create_certificate(NewCertificate {
                    learner_id: learner,
                    course_id: course,
                    learner_display_name: name,
                    course_title: title,
                    issue_date,
                })
                .await?;
            print_json(&certificate)?;
        }
        CertificateCommand::Update {
            id,
            name,
            title,
            issue_date,
            expiry_date,
            clear_expiry,
            url,
            clear_url,
        } => {
            let update = CertificateUpdate {
                learner_display_name: name,
                course_title: title,
                issue_date,
                expiry_date: if clear_expiry { Some(None) } else { expiry_date.map(Some) },
                certificate_url: if clear_url { Some(None) } else { url.map(Some) },
            };
            print_json(&certificates.update_certificate(&id, update).await?)?;
        }
        CertificateCommand::Delete { id } => {
            certificates.delete_certificate(&id).await?;
            println!("certificate {} deleted", id);
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
