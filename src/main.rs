use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    time::Instant,
};

use querytrail::cli::{self, Cli, Commands, InternalCommands, SinkArg};
use querytrail::db::{Database, SessionInfo};
use querytrail::replay;
use querytrail::sink::{BeaconSink, DbSink, LogSink, RecordingSink};
use querytrail::{SearchSession, Tracker, TrackerConfig};

fn setup_logger(log_file: &Path) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                jiff::Timestamp::now().strftime("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(fern::log_file(log_file).context("Failed to open log file")?)
        .chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Warn)
                .chain(io::stderr()),
        )
        .apply()
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Random 64-bit session ID
fn new_session_id() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hash, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    Instant::now().hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    hasher.finish().to_string()
}

fn open_event_log(file: &Path) -> Result<Box<dyn BufRead>> {
    if file == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let f = File::open(file).with_context(|| format!("Failed to open event log {:?}", file))?;
    Ok(Box::new(BufReader::new(f)))
}

fn run_replay(
    data_dir: &Path,
    file: &Path,
    config: TrackerConfig,
    sink_arg: SinkArg,
    no_unload: bool,
) -> Result<()> {
    let session_id = new_session_id();
    let reader = open_event_log(file)?;

    let recording = RecordingSink::new();
    let sink: Box<dyn BeaconSink> = match sink_arg {
        SinkArg::Db => {
            let db = Database::new(&Database::get_db_path(data_dir))?;
            db.log_session(&SessionInfo {
                session_id: session_id.clone(),
                source: file.display().to_string(),
                raw_field: config.raw_field.clone(),
                completed_field: config.completed_field.clone(),
            })?;
            Box::new(DbSink::new(db, session_id.clone()))
        }
        SinkArg::Log => Box::new(LogSink),
        SinkArg::Stdout => Box::new(recording.clone()),
    };

    log::info!(
        "Replaying {} as session {} (fields {:?}/{:?})",
        file.display(),
        session_id,
        config.raw_field,
        config.completed_field
    );

    let mut session = SearchSession::new();
    session.attach(Box::new(Tracker::new(config, sink)));

    let summary = replay::replay(reader, &mut session)?;
    if !no_unload && !session.is_unloaded() {
        session.unload();
    }

    match sink_arg {
        SinkArg::Stdout => {
            for beacon in recording.take() {
                println!("{}", serde_json::to_string(&beacon)?);
            }
        }
        _ => {
            println!(
                "Replayed {} events for session {} ({} ignored after unload)",
                summary.events, session_id, summary.skipped_after_unload
            );
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let log_path = cli::get_log_path(&data_dir);
    setup_logger(&log_path)?;

    match cli.command {
        Commands::Replay {
            file,
            raw_field,
            completed_field,
            sink,
            no_unload,
        } => {
            let config = TrackerConfig::new(raw_field, completed_field);
            run_replay(&data_dir, &file, config, sink, no_unload)?;
        }
        Commands::Recent { limit } => {
            let db = Database::new(&Database::get_db_path(&data_dir))?;
            for stored in db.recent_beacons(limit)? {
                let when = jiff::Timestamp::from_second(stored.timestamp)
                    .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|_| stored.timestamp.to_string());
                println!(
                    "{}  {:<14} {:<20} {}",
                    when,
                    stored.beacon.kind.as_ref(),
                    stored.session_id,
                    stored.beacon.text
                );
            }
        }
        Commands::Internal { command } => match command {
            InternalCommands::SummarizeBeacons => {
                let db = Database::new(&Database::get_db_path(&data_dir))?;
                for (kind, count) in db.summarize_beacons()? {
                    println!("{:<14} {}", kind, count);
                }
            }
            InternalCommands::PrintLog => {
                let contents = std::fs::read_to_string(&log_path)
                    .with_context(|| format!("Failed to read log file {:?}", log_path))?;
                print!("{}", contents);
            }
            InternalCommands::ClearLog => {
                std::fs::remove_file(&log_path)
                    .with_context(|| format!("Failed to delete log file {:?}", log_path))?;
                println!("Deleted {:?}", log_path);
            }
        },
    }

    Ok(())
}
