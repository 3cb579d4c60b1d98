use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stepsync_cli::cli::{Cli, Commands, ConfigAction, SourceArgs};
use stepsync_cli::config::{Config, default_config_path};
use stepsync_cli::logging;
use stepsync_cli::output::{self, Style};
use stepsync_cli::session::{Session, SessionEvent, resolve_source};
use stepsync_core::{ActivityLog, AdbBridge, Dispatcher, SyncOutcome};
use stepsync_store::{AggregationEngine, Dataset};
use time::Month;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logging = logging::init(cli.verbose, cli.quiet)?;

    // Handle config commands before loading, so a broken file can be replaced
    if let Commands::Config { action } = &cli.command {
        return config_command(action, cli.config.as_deref());
    }

    let config =
        Config::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    let engine = AggregationEngine::new(config.offset_source()?);

    let style = Style {
        json: cli.json,
        color: !cli.no_color && !cli.json,
    };

    let (activity, activity_rx) = ActivityLog::channel();
    let dispatcher = Arc::new(Dispatcher::new(
        config.adb_bridge(),
        config.dispatcher_config(),
        activity,
    ));

    let quiet = cli.quiet || cli.json;
    let mut session = Session::<AdbBridge>::new(engine, dispatcher, Some(activity_rx))
        .with_observer(move |event| report(event, quiet, style));

    let local_path = config.data.local_path.as_path();

    match cli.command {
        Commands::Load(SourceArgs { path }) => {
            let dataset = session.load(resolve_source(path.as_deref(), local_path)).await?;
            print!("{}", output::summary(dataset, style)?);
        }
        Commands::Day { source, date } => {
            let dataset = session.load(resolve_source(source.path.as_deref(), local_path)).await?;
            let Some(date) = date.or_else(|| dataset.latest_date()) else {
                return no_data();
            };
            print!("{}", output::day(dataset, date, style)?);
        }
        Commands::Month {
            source,
            year,
            month,
        } => {
            let dataset = session.load(resolve_source(source.path.as_deref(), local_path)).await?;
            let Some(latest) = dataset.latest_date() else {
                return no_data();
            };
            let year = year.unwrap_or(latest.year());
            let month = match month {
                Some(m) => Month::try_from(m).context("Invalid month")?,
                None => latest.month(),
            };
            print!("{}", output::month(dataset, year, month, style)?);
        }
        Commands::Year { source, year } => {
            let dataset = session.load(resolve_source(source.path.as_deref(), local_path)).await?;
            let Some(year) = year.or_else(|| most_recent_year(dataset)) else {
                return no_data();
            };
            print!("{}", output::year(dataset, year, style)?);
        }
        Commands::Devices => {
            let ids = session.refresh().await?;
            print!("{}", output::devices(&ids, style)?);
        }
        Commands::Connect { address } => {
            let ids = session.connect(&address).await?;
            print!("{}", output::devices(&ids, style)?);
        }
        Commands::Sync { connect, device } => {
            let dataset = session.sync(connect.as_deref(), device.as_deref()).await?;
            print!("{}", output::summary(dataset, style)?);
        }
        Commands::Config { .. } => {
            // Already handled above
        }
    }

    Ok(())
}

fn config_command(action: &ConfigAction, path: Option<&Path>) -> Result<()> {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);
    match action {
        ConfigAction::Show => {
            let config = if path.exists() {
                Config::load_validated(&path).context("Failed to load configuration")?
            } else {
                Config::default()
            };
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            Config::init(&path, *force)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

fn most_recent_year(dataset: &Dataset) -> Option<i32> {
    dataset.years().last().copied()
}

fn no_data() -> Result<()> {
    eprintln!("No step data to show.");
    Ok(())
}

/// Progress goes to stderr so stdout carries only the requested view.
fn report(event: &SessionEvent, quiet: bool, style: Style) {
    match event {
        SessionEvent::Outcome(SyncOutcome::Failed { .. }) => {}
        _ if quiet => {}
        SessionEvent::Status(text) => eprintln!("{}", output::status(text, style)),
        SessionEvent::Activity(activity) => eprintln!("{activity}"),
        SessionEvent::Outcome(SyncOutcome::Connected { address }) => {
            eprintln!("{}", output::status(&format!("Connected to {address}"), style));
        }
        SessionEvent::Outcome(SyncOutcome::SyncComplete { local_path }) => {
            eprintln!(
                "{}",
                output::status(&format!("Database saved to {}", local_path.display()), style)
            );
        }
        SessionEvent::Outcome(SyncOutcome::DevicesListed { .. }) => {}
    }
}
