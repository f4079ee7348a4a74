use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use arboard::Clipboard;
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, select_share_sink,
    share::MemoryClipboard,
    store::is_image_name,
    ClipboardWriter, Control, GestureEvent, GithubStore, InputAdapter, ModeController,
    Settings, ShareError, UploadSource, WorkflowEngine, WorkflowError, WorkflowReport,
};
use shared::{domain::OperationStatus, error::FailureException};
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
    task::JoinHandle,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gallery", about = "Photo gallery stored in a GitHub repository")]
struct Cli {
    /// Settings file; defaults to ./gallery.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Address the gallery is opened at. `?mode=view` makes the session read-only.
    #[arg(long, global = true)]
    location: Option<String>,
    #[arg(long, global = true)]
    owner: Option<String>,
    #[arg(long, global = true)]
    repo: Option<String>,
    #[arg(long, global = true)]
    branch: Option<String>,
    #[arg(long, global = true)]
    token: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    share_webhook: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every photo in gallery order.
    List,
    /// Upload one or more photos, one workflow each.
    Upload { paths: Vec<PathBuf> },
    /// Delete the photo at a 1-based position.
    Delete {
        position: usize,
        #[arg(long)]
        yes: bool,
    },
    /// Look up the published address and remember it.
    Publish,
    /// Share the published gallery as a view-only link.
    Share,
    /// Print the view-only form of --location.
    ShareLink,
    /// Page through the gallery interactively.
    Browse,
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        let overrides = [
            (&self.owner, &mut settings.owner),
            (&self.repo, &mut settings.repo),
            (&self.branch, &mut settings.branch),
            (&self.token, &mut settings.token),
            (&self.database_url, &mut settings.database_url),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        if self.location.is_some() {
            settings.location = self.location.clone();
        }
        if self.share_webhook.is_some() {
            settings.share_webhook = self.share_webhook.clone();
        }
    }
}

/// System clipboard, with an in-memory fallback when no display is reachable.
#[derive(Default)]
struct DesktopClipboard {
    fallback: MemoryClipboard,
}

impl ClipboardWriter for DesktopClipboard {
    fn write_text(&self, text: &str) -> Result<(), ShareError> {
        match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_string())) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "desktop: system clipboard unavailable; printing link instead");
                self.fallback.write_text(text)?;
                println!("{text}");
                Ok(())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref());
    cli.apply_overrides(&mut settings);

    let store_config = settings
        .store_config()
        .context("gallery store is not configured")?;
    let engine_config = settings.engine_config()?;
    let mut mode = ModeController::from_location(engine_config.location.as_ref());
    info!(mode = ?mode.mode(), repo = %store_config.repo, "desktop: starting");

    let slots = Arc::new(Storage::new(&settings.database_url).await?);
    let share_sink = select_share_sink(settings.share_webhook_url()?, DesktopClipboard::default());
    let engine = WorkflowEngine::new(
        Arc::new(GithubStore::new(store_config)?),
        slots,
        share_sink,
        engine_config,
    );

    if let Err(err) = engine.reload().await {
        warn!(error = %err, "desktop: initial gallery load failed");
    }

    let renderer = spawn_status_renderer(engine.subscribe_status());
    let result = run(cli.command, &engine, &mut mode).await;
    renderer.abort();
    result
}

async fn run(command: Command, engine: &WorkflowEngine, mode: &mut ModeController) -> Result<()> {
    let capabilities = mode.capabilities();
    match command {
        Command::List => print_listing(engine).await,
        Command::Upload { paths } => {
            require(capabilities.upload, "upload")?;
            if paths.is_empty() {
                bail!("no files given");
            }
            for path in paths {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if !is_image_name(&name) {
                    bail!("{} is not a jpg, png or gif image", path.display());
                }
                let source = UploadSource::from_path(&path)
                    .await
                    .with_context(|| format!("cannot open {}", path.display()))?;
                report(engine.upload(source).await)?;
            }
            print_listing(engine).await
        }
        Command::Delete { position, yes } => {
            require(capabilities.delete, "delete")?;
            let index = position
                .checked_sub(1)
                .context("positions start at 1")?;
            if yes {
                report(engine.delete(index, &|_: &str| true).await)
            } else {
                report(engine.delete(index, &prompt_yes_no).await)
            }
        }
        Command::Publish => {
            require(capabilities.publish, "publish")?;
            report(engine.publish().await)?;
            if let Some(url) = engine.publish_state().await.published_url {
                println!("{url}");
            }
            Ok(())
        }
        Command::Share => {
            require(capabilities.share, "share")?;
            report(engine.share().await)
        }
        Command::ShareLink => {
            let link = engine
                .share_link()
                .context("no --location configured to build a link from")?;
            println!("{link}");
            Ok(())
        }
        Command::Browse => browse(engine, mode).await,
    }
}

fn require(allowed: bool, action: &str) -> Result<()> {
    if !allowed {
        bail!("{action} is not available in view mode");
    }
    Ok(())
}

fn report(outcome: Result<WorkflowReport, WorkflowError>) -> Result<()> {
    let report = match outcome {
        Ok(report) => report,
        Err(WorkflowError::Declined) => {
            println!("Cancelled");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    println!("{}", report.status.message);
    match report.failure {
        Some(failure) => Err(FailureException::new(failure.code, failure.message).into()),
        None => Ok(()),
    }
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn spawn_status_renderer(mut rx: watch::Receiver<OperationStatus>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            if !status.visible || status.is_terminal() {
                continue;
            }
            let filled = usize::from(status.progress_percent) / 5;
            eprintln!(
                "[{}{}] {:>3}% {}",
                "#".repeat(filled),
                " ".repeat(20 - filled),
                status.progress_percent,
                status.message
            );
        }
    })
}

async fn print_listing(engine: &WorkflowEngine) -> Result<()> {
    let gallery = engine.gallery().await;
    if gallery.is_empty() {
        println!("(no photos)");
        return Ok(());
    }
    for photo in gallery.photos() {
        println!("{:>3}. {}  {}", photo.position + 1, photo.id, photo.url);
    }
    Ok(())
}

async fn print_page(engine: &WorkflowEngine, mode: &ModeController) {
    let gallery = engine.gallery().await;
    let pages = gallery.pages(mode.delete_visible());
    match pages.get(gallery.current_index()) {
        Some(page) => {
            let marker = if page.deletable { "  [d]elete" } else { "" };
            println!(
                "{}  {}  {}{}",
                gallery.position_label(),
                page.alt,
                page.photo.url,
                marker
            );
        }
        None => println!("{}  (no photos)", gallery.position_label()),
    }
}

const BROWSE_HELP: &str =
    "n: next  p: previous  drag <from> <to>: swipe  e: edit mode  d: delete  r: reload  q: quit";

async fn browse(engine: &WorkflowEngine, mode: &mut ModeController) -> Result<()> {
    let mut input = InputAdapter::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{BROWSE_HELP}");
    print_page(engine, mode).await;
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["q"] | ["quit"] => break,
            ["n"] | ["next"] => {
                input.control(Control::Next, &mut *engine.gallery().await);
            }
            ["p"] | ["prev"] => {
                input.control(Control::Previous, &mut *engine.gallery().await);
            }
            ["drag", from, to] => {
                let (Some(from), Some(to)) = (parse_coordinate(from), parse_coordinate(to)) else {
                    println!("drag takes two x coordinates");
                    continue;
                };
                let mut gallery = engine.gallery().await;
                for event in [GestureEvent::Start(from), GestureEvent::Move(to), GestureEvent::End] {
                    input.gesture(event, &mut gallery);
                }
            }
            ["e"] => {
                if mode.capabilities().edit_toggle {
                    mode.toggle_edit_mode();
                    println!("{}", mode.edit_toggle_label());
                } else {
                    println!("edit mode is not available in view mode");
                }
            }
            ["d"] if mode.delete_visible() => {
                // stdin belongs to the line reader here, so the answer is read from it.
                eprint!("Delete this photo? [y/N] ");
                let answer = lines.next_line().await?.unwrap_or_default();
                let confirmed = is_yes(&answer);
                let index = engine.gallery().await.current_index();
                if let Err(err) = report(engine.delete(index, &move |_: &str| confirmed).await) {
                    warn!(error = %err, "desktop: delete did not complete");
                }
            }
            ["r"] => {
                if let Err(err) = engine.reload().await {
                    warn!(error = %err, "desktop: reload failed");
                }
            }
            _ => println!("{BROWSE_HELP}"),
        }
        print_page(engine, mode).await;
    }
    Ok(())
}

fn parse_coordinate(raw: &str) -> Option<f32> {
    raw.parse::<f32>().ok().filter(|x| x.is_finite())
}
