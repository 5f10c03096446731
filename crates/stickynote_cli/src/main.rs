//! Terminal front end for the sticky-note board.
//!
//! # Responsibility
//! - Load store configuration from the environment and fail fast.
//! - Forward one user intent per invocation to `NoteRepository`.
//! - Render snapshots; never mutate repository state directly.

mod cli;
mod render;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use log::info;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use stickynote_core::{
    default_log_level, init_logging, FeedUpdate, NoteDraft, NoteId, NoteRepository, StoreClient,
    StoreConfig, StoreNoteGateway, SyncMode,
};

type Repository = NoteRepository<StoreNoteGateway>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = StoreConfig::from_env().context("cannot load store configuration")?;
    start_logging(&cli, &config)?;

    let client = Arc::new(StoreClient::connect(&config).context("cannot open document store")?);
    let gateway = Arc::new(StoreNoteGateway::new(Arc::clone(&client)));
    info!(
        "event=cli_start module=cli status=ok project_id={}",
        client.project_id()
    );

    let outcome = match cli.command {
        Commands::Add { text, x, y } => add(gateway, text, x.zip(y)).await,
        Commands::List => list(gateway).await,
        Commands::Move { id, dx, dy } => drag(gateway, NoteId::new(id), dx, dy).await,
        Commands::Delete { id } => delete(gateway, NoteId::new(id)).await,
        Commands::Watch => watch(gateway).await,
    };

    client.close();
    outcome
}

fn start_logging(cli: &Cli, config: &StoreConfig) -> Result<()> {
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let dir = match &cli.log_dir {
        Some(dir) if dir.is_relative() => std::env::current_dir()?.join(dir),
        Some(dir) => dir.clone(),
        None => config.data_dir.join("logs"),
    };
    init_logging(level, &path_str(&dir)).context("cannot start logging")
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn add(gateway: Arc<StoreNoteGateway>, text: String, at: Option<(f64, f64)>) -> Result<()> {
    if text.trim().is_empty() {
        bail!("note text must not be empty");
    }
    let draft = match at {
        Some((x, y)) => NoteDraft::at(text, x, y),
        None => NoteDraft::text(text),
    };

    let mut repo = Repository::new(gateway, SyncMode::ManualFetch);
    repo.start().await?;
    let created = repo.add_note(draft).await.context("note was not saved")?;
    println!("{}", created.id);
    Ok(())
}

async fn list(gateway: Arc<StoreNoteGateway>) -> Result<()> {
    let mut repo = Repository::new(gateway, SyncMode::ManualFetch);
    repo.start().await?;
    println!("{}", render::render_board(repo.notes()));
    Ok(())
}

async fn drag(gateway: Arc<StoreNoteGateway>, id: NoteId, dx: f64, dy: f64) -> Result<()> {
    let mut repo = Repository::new(gateway, SyncMode::LiveFeedWithDrag);
    repo.start().await?;
    first_snapshot(&mut repo).await?;

    let Some(write) = repo.move_note(&id, dx, dy)? else {
        bail!("no note with id `{id}`");
    };
    println!("{}", render::render_position(write.id.as_str(), write.x, write.y));
    write.settled().await;
    repo.shutdown();
    Ok(())
}

async fn delete(gateway: Arc<StoreNoteGateway>, id: NoteId) -> Result<()> {
    let mut repo = Repository::new(gateway, SyncMode::ManualFetch);
    repo.start().await?;
    if !repo.delete_note(&id).await.context("note was not deleted")? {
        bail!("no note with id `{id}`");
    }
    println!("deleted {id}");
    Ok(())
}

async fn watch(gateway: Arc<StoreNoteGateway>) -> Result<()> {
    let mut repo = Repository::new(gateway, SyncMode::LiveFeed);
    repo.start().await?;
    let mut rendered = false;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            update = repo.next_feed_update() => match update {
                Some(FeedUpdate::Snapshot { changed, .. }) if changed || !rendered => {
                    println!("{}\n", render::render_board(repo.notes()));
                    rendered = true;
                }
                Some(FeedUpdate::Snapshot { .. }) => {}
                Some(FeedUpdate::Error(err)) => eprintln!("feed error: {err}"),
                None => break,
            },
            signal = &mut interrupted => {
                signal.context("cannot listen for Ctrl-C")?;
                break;
            }
        }
    }

    repo.shutdown();
    Ok(())
}

/// Waits until the live feed has populated memory once.
async fn first_snapshot(repo: &mut Repository) -> Result<()> {
    match repo.next_feed_update().await {
        Some(FeedUpdate::Snapshot { .. }) => Ok(()),
        Some(FeedUpdate::Error(err)) => Err(err).context("initial read failed"),
        None => bail!("live feed ended before the first snapshot"),
    }
}
