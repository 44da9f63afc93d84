//! `hearrec` - CLI for hearingrecorder
//!
//! This binary signs users in, records hearing tests and shows recent
//! test history.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use hearingrecorder::cli::{
    Cli, Command, ConfigCommand, HistoryCommand, LoginCommand, RecordCommand, StatusCommand,
};
use hearingrecorder::{
    init_logging, Config, HistoryEntry, ResultReader, ResultRecorder, Session, Storage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let storage = Arc::new(
        Storage::open(config.database_path()).with_context(|| {
            format!(
                "failed to open database {}",
                config.database_path().display()
            )
        })?,
    );
    let session = resolve_session(cli.session.as_deref(), &config)?;

    match cli.command {
        Command::Login(cmd) => handle_login(&storage, &config, &cmd),
        Command::Logout => handle_logout(&storage, &config, &session),
        Command::Record(cmd) => handle_record(storage, &session, &cmd).await,
        Command::History(cmd) => handle_history(storage, &config, &session, &cmd).await,
        Command::Status(cmd) => handle_status(&storage, &config, &session, &cmd),
        Command::Config(_) => Ok(()),
    }
}

/// `--session` wins over the saved session file.
fn resolve_session(flag: Option<&str>, config: &Config) -> anyhow::Result<Session> {
    if let Some(token) = flag {
        return Ok(Session::new(token));
    }
    let saved = Session::load(&config.session_file_path())?;
    Ok(saved.unwrap_or_default())
}

fn handle_login(storage: &Storage, config: &Config, cmd: &LoginCommand) -> anyhow::Result<()> {
    storage.prune_expired_sessions()?;

    let user = match storage.find_user_by_email(&cmd.email)? {
        Some(user) => user,
        None => storage.create_user(&cmd.email)?,
    };
    let session = storage.sign_in(&cmd.email, config.session_ttl())?;
    session.save(&config.session_file_path())?;

    println!(
        "Signed in as {} (session valid for {} hours)",
        user.email.as_deref().unwrap_or(user.id.as_str()),
        config.session.ttl_hours
    );
    Ok(())
}

fn handle_logout(storage: &Storage, config: &Config, session: &Session) -> anyhow::Result<()> {
    if !session.is_empty() {
        storage.sign_out(session)?;
    }
    Session::forget(&config.session_file_path())?;
    println!("Signed out.");
    Ok(())
}

async fn handle_record(
    storage: Arc<Storage>,
    session: &Session,
    cmd: &RecordCommand,
) -> anyhow::Result<()> {
    let recorder = ResultRecorder::new(storage);
    let record = recorder.record(session, cmd.to_outcome()).await?;

    println!(
        "Saved {} test {} at {}",
        record.test_type,
        record.id,
        record.test_date.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

async fn handle_history(
    storage: Arc<Storage>,
    config: &Config,
    session: &Session,
    cmd: &HistoryCommand,
) -> anyhow::Result<()> {
    let limit = cmd.limit.unwrap_or(config.history.default_limit);
    let entries = ResultReader::new(storage)
        .history(session, Some(limit))
        .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No test history available.");
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry, cmd.detailed);
    }
    Ok(())
}

fn print_entry(entry: &HistoryEntry, detailed: bool) {
    println!("{}", entry.heading());
    println!("  Type:      {}", entry.test_type);
    for (label, ear) in [("Left ear", &entry.left_ear), ("Right ear", &entry.right_ear)] {
        println!("  {label:<9}: {}", ear.summary());
        if detailed {
            for line in ear.detail_lines() {
                println!("      {line}");
            }
        }
    }
    println!();
}

fn handle_status(
    storage: &Storage,
    config: &Config,
    session: &Session,
    cmd: &StatusCommand,
) -> anyhow::Result<()> {
    let stats = storage.stats()?;
    let schema_version = storage.schema_version()?;
    let user = storage.user_for_session(session)?;

    if cmd.json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "schema_version": schema_version,
            "total_tests": stats.total_tests,
            "total_users": stats.total_users,
            "active_sessions": stats.active_sessions,
            "newest_test": stats.newest_test,
            "db_size_bytes": stats.db_size_bytes,
            "signed_in_as": user.as_ref().and_then(|u| u.email.clone()),
            "session_file": config.session_file_path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("hearrec status");
        println!("--------------");
        println!("Database:        {}", storage.path().display());
        println!("Schema version:  {schema_version}");
        println!("Hearing tests:   {}", stats.total_tests);
        println!("Users:           {}", stats.total_users);
        println!("Active sessions: {}", stats.active_sessions);
        println!(
            "Newest test:     {}",
            stats.newest_test.map_or_else(
                || "none".to_string(),
                |date| date.format("%Y-%m-%d %H:%M UTC").to_string()
            )
        );
        println!("Database size:   {} bytes", stats.db_size_bytes);
        println!(
            "Signed in as:    {}",
            user.and_then(|u| u.email)
                .unwrap_or_else(|| "not signed in".to_string())
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:  {}", config.database_path().display());
                println!();
                println!("[History]");
                println!("  Default limit:  {}", config.history.default_limit);
                println!();
                println!("[Session]");
                println!("  TTL (hours):    {}", config.session.ttl_hours);
                println!("  Session file:   {}", config.session_file_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
