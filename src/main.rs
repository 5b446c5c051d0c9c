use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lab_coach::app::session::LabSession;
use lab_coach::app::show::{ShowOptions, render_step};
use lab_coach::app::{collaborators_from_config, session_options};
use lab_coach::exercise::tier::Tier;
use lab_coach::lab::{lint_lab, load_lab};
use lab_coach::{App, Config};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lab-coach")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work through a lab in the terminal UI
    Run {
        /// Path to the lab JSON file
        lab: PathBuf,
    },
    /// Check that every hint lands on a blank in its skeleton
    Lint {
        /// Path to the lab JSON file
        lab: PathBuf,
    },
    /// Print one step as plain text
    Show {
        /// Path to the lab JSON file
        lab: PathBuf,
        /// Step number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        step: usize,
        /// Skeleton tier: guided, challenge or expert
        #[arg(short, long, default_value = "guided")]
        tier: Tier,
        /// Print the full solution instead of the skeleton
        #[arg(long)]
        solution: bool,
        /// Fill every blank with its answer
        #[arg(long)]
        answers: bool,
    },
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "lab_coach=info".into())
}

/// The terminal UI owns stdout, so logs go to a file
fn init_file_logging() -> Result<()> {
    let path = Config::log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { lab } => {
            init_file_logging()?;
            let config = Config::load()?;
            let lab = load_lab(&lab)?;
            tracing::info!(lab = %lab.id, "starting session");

            let collaborators = collaborators_from_config(&config)?;
            let session = LabSession::open(lab, collaborators, session_options(&config));
            let mut app = App::new(&config, session)?;
            app.run().await?;
        }
        Commands::Lint { lab } => {
            init_stderr_logging();
            let lab = load_lab(&lab)?;
            let findings = lint_lab(&lab);
            if findings.is_empty() {
                println!("{}: no issues", lab.id);
                return Ok(());
            }
            for finding in &findings {
                println!("{finding}");
            }
            eprintln!("{} issue(s) found", findings.len());
            std::process::exit(1);
        }
        Commands::Show { lab, step, tier, solution, answers } => {
            init_stderr_logging();
            let lab = load_lab(&lab)?;
            let index = step.checked_sub(1).context("Step numbers start at 1")?;
            let options = ShowOptions { tier, solution, answers };
            print!("{}", render_step(&lab, index, &options)?);
        }
    }

    Ok(())
}
