use std::io::Write;
use std::sync::Arc;

use chatline::channel::LiveChannel;
use chatline::channel::ws::WsChannel;
use chatline::config::{ChatTuning, ConfigError, DEFAULT_BASE_URL, socket_url};
use chatline::history::{HistoryError, HistoryFetcher, HttpHistory};
use chatline::identity::Identity;
use chatline::render;
use chatline::session::ChatSession;
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatline", about = "Terminal client for a single-room chat")]
struct Cli {
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Live socket URL; derived from the base URL when absent.
    #[arg(long, env = "CHAT_SOCKET_URL")]
    socket_url: Option<String>,

    #[arg(long, env = "CHAT_USER_ID")]
    user_id: Option<String>,

    #[arg(long, env = "CHAT_DISPLAY_NAME")]
    display_name: Option<String>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Join the room (default).
    Chat,
    /// Print the stored history and exit.
    History,
    /// Check that the content API is reachable.
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let tuning = ChatTuning::from_env();
    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(&cli, tuning).await,
        Command::History => run_history(&cli, tuning).await,
        Command::Ping => run_ping(&cli).await,
    }
}

async fn run_ping(cli: &Cli) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/_health", cli.base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_history(cli: &Cli, tuning: ChatTuning) -> Result<(), CliError> {
    let history = HttpHistory::new(&cli.base_url, tuning.history_timeout)?;
    let rows = history.fetch_history().await?;
    let identity = identity(cli);

    let mut out = std::io::stdout().lock();
    for row in rows {
        let message = row.into_message();
        writeln!(out, "{}", render::message_line(&message, identity.owns(&message), &Local))?;
    }
    Ok(())
}

async fn run_chat(cli: &Cli, tuning: ChatTuning) -> Result<(), CliError> {
    let url = match &cli.socket_url {
        Some(url) => url.clone(),
        None => socket_url(&cli.base_url)?,
    };
    let history = HttpHistory::new(&cli.base_url, tuning.history_timeout)?;

    let channel = Arc::new(WsChannel::new(url, tuning.reconnect));
    let mut session = ChatSession::new(identity(cli), Arc::clone(&channel), tuning.typing_decay);
    let mut events = session.subscribe();
    channel.connect();

    if let Err(e) = session.load_history(&history).await {
        tracing::warn!(error = %e, "initial history load failed");
    }
    redraw(&session)?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "/quit" => break,
                    "/retry" => {
                        if let Err(e) = session.retry_last_failed() {
                            tracing::warn!(error = %e, "retry failed");
                        }
                    }
                    "/reload" => {
                        if let Err(e) = session.load_history(&history).await {
                            tracing::warn!(error = %e, "history reload failed");
                        }
                    }
                    "/dismiss" => session.dismiss_error(),
                    "" => {}
                    text => {
                        session.notify_typing();
                        if let Err(e) = session.submit(text) {
                            tracing::warn!(error = %e, "submit failed");
                        }
                    }
                }
                redraw(&session)?;
            }
            update = session.step(&mut events) => {
                if update.is_none() {
                    break;
                }
                redraw(&session)?;
            }
        }
    }

    events.unsubscribe();
    channel.disconnect();
    Ok(())
}

fn identity(cli: &Cli) -> Identity {
    let user_id = cli
        .user_id
        .clone()
        .unwrap_or_else(|| format!("user_{}", Uuid::new_v4().simple()));
    Identity::new(user_id, cli.display_name.as_deref())
}

fn redraw<C: LiveChannel>(session: &ChatSession<C>) -> std::io::Result<()> {
    let view = session.view();
    let today = Local::now().date_naive();

    let mut out = std::io::stdout().lock();
    write!(out, "\x1b[2J\x1b[H")?;
    writeln!(out, "{}", render::header(&view))?;
    for line in render::render_view(&view, &Local, today) {
        writeln!(out, "{line}")?;
    }
    write!(out, "> ")?;
    out.flush()
}
