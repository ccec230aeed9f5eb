pub mod report;

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use report::process_report_command;
use tracing::level_filters::LevelFilter;

use crate::{
    error::TrackError,
    remote::{local::LocalRemote, EnvCredentials, TOKEN_ENV_VAR},
    report::window::ReportWindow,
    store::{history::HistoryStoreImpl, state::StateStoreImpl},
    tracker::Tracker,
    utils::{
        clock::DefaultClock, dir::create_application_default_path, logging::enable_logging,
    },
};

const STATE_FILE: &str = "state.json";
const HISTORY_FILE: &str = "history.jsonl";
const TASKS_FILE: &str = "tasks.json";
const REPORT_FILE: &str = "report.md";

#[derive(Parser, Debug)]
#[command(name = "Taskhours", version, long_about = None)]
#[command(about = "Track time spent on remote tasks", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start a timer for a task")]
    Start {
        #[arg(help = "Task identifier")]
        task: String,
        #[arg(
            long,
            help = "Identifier of the remote numeric field holding spent hours"
        )]
        field: String,
    },
    #[command(
        about = "Stop the running timer, sync spent hours to the remote and record the interval"
    )]
    Stop {
        #[arg(help = "Task identifier")]
        task: String,
    },
    #[command(about = "Discard the running timer without recording anything")]
    Cancel {
        #[arg(help = "Task identifier")]
        task: String,
    },
    #[command(about = "Show tracked tasks and running timers")]
    Status {},
    #[command(about = "Render a time allocation report over a trailing window")]
    Report {
        #[arg(help = "Trailing window. Examples are \"2 weeks\", \"3 days\", \"hour\"")]
        window: ReportWindow,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    let app_dir = match &args.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => create_application_default_path()?,
    };
    enable_logging(&app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Start { task, field } => {
            create_tracker(&app_dir).start(&task, &field).await?;
            println!("Started timer for {task}");
            Ok(())
        }
        Commands::Stop { task } => match create_tracker(&app_dir).stop(&task).await {
            Ok(elapsed) => {
                println!("Tracked {elapsed:.1}h on {task}");
                Ok(())
            }
            Err(TrackError::AuthenticationRequired) => {
                println!(
                    "Not authenticated. Export {TOKEN_ENV_VAR} with your personal access token and retry."
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Commands::Cancel { task } => {
            create_tracker(&app_dir).cancel(&task).await?;
            println!("Discarded timer for {task}");
            Ok(())
        }
        Commands::Status {} => {
            let entries = create_tracker(&app_dir).status().await?;
            if entries.is_empty() {
                println!("No tracked tasks");
            }
            for (task_id, state) in entries {
                match state.started_at {
                    Some(started_at) => println!(
                        "{task_id}\trunning since {}\t{:.1}h tracked",
                        started_at.with_timezone(&Local).format("%x %H:%M:%S"),
                        state.accumulated_hours
                    ),
                    None => println!("{task_id}\tidle\t{:.1}h tracked", state.accumulated_hours),
                }
            }
            Ok(())
        }
        Commands::Report { window } => process_report_command(&app_dir, window).await,
    }
}

fn create_tracker(
    app_dir: &Path,
) -> Tracker<EnvCredentials, LocalRemote, StateStoreImpl, HistoryStoreImpl> {
    Tracker::new(
        EnvCredentials,
        LocalRemote::new(app_dir.join(TASKS_FILE)),
        StateStoreImpl::new(app_dir.join(STATE_FILE)),
        HistoryStoreImpl::new(app_dir.join(HISTORY_FILE)),
        Box::new(DefaultClock),
    )
}
