use clap::Parser;
use client::api::ApiClient;
use client::game::NotificationKind;
use client::input::{UserCommand, HELP};
use client::network::{ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState};
use client::rendering::{connection_badge, render_board, render_log, render_players};
use client::session::{generate_player_id, GameSession, SessionIdentity, SubmitOutcome};
use client::storage::{validate_name, NameStore};
use client::transport::WsConnector;
use log::{debug, info, warn};
use shared::IncomingMessage;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal client for Word Bash", long_about = None)]
struct Args {
    /// Base URL of the game allocation API
    #[arg(long, env = "WORDBASH_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Display name; the last one used is remembered
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Join an existing game instead of creating a new one
    #[arg(short = 'j', long, value_name = "GAME_ID")]
    join: Option<String>,

    /// File holding the remembered display name
    #[arg(long, env = "WORDBASH_NAME_FILE", default_value = ".wordbash_player_name")]
    name_file: PathBuf,

    /// Seconds between heartbeats
    #[arg(long, default_value = "20")]
    heartbeat_secs: u64,

    /// First reconnect delay in milliseconds, doubled on each attempt
    #[arg(long, default_value = "1000")]
    reconnect_base_ms: u64,

    /// Reconnect attempts before giving up
    #[arg(long, default_value = "5")]
    max_reconnect_attempts: u32,

    /// Skip the state request sent after each (re)connect
    #[arg(long)]
    no_resync: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let names = NameStore::new(args.name_file.clone());
    debug!("Display name file: {}", names.path().display());
    let name = validate_name(&args.name.clone().unwrap_or_else(|| names.get()))?;

    let api = ApiClient::new(&args.api_url);
    let (game_id, endpoint) = match args.join.as_deref().map(str::trim) {
        Some("") => return Err("Game ID is required".into()),
        Some(game_id) => (game_id.to_string(), api.join_game(game_id).await?.ws_url),
        None => {
            let created = api.create_game(&name).await?;
            (created.game_id, created.ws_url)
        }
    };
    names.set(&name)?;
    println!("Game ID: {}", game_id);
    info!("Session endpoint: {}", endpoint);

    let identity = SessionIdentity::new(endpoint, game_id, generate_player_id(), name);
    let config = ConnectionConfig {
        heartbeat_interval: Duration::from_secs(args.heartbeat_secs.max(1)),
        reconnect_base_delay: Duration::from_millis(args.reconnect_base_ms),
        max_reconnect_attempts: args.max_reconnect_attempts,
        request_state_on_connect: !args.no_resync,
    };

    let (handle, mut events) = ConnectionManager::spawn(WsConnector, identity, config);
    let mut session = GameSession::new(handle);
    session.connect();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_line(&mut session, &line) {
                        break;
                    }
                }
                None => break,
            },

            event = events.recv() => match event {
                Some(event) => {
                    let redraw = matches!(
                        event,
                        ConnectionEvent::Message(IncomingMessage::StateUpdated(_))
                    );
                    let status_changed = matches!(event, ConnectionEvent::Status(_));
                    session.handle_event(event);

                    if status_changed {
                        println!("{}", connection_badge(session.store()));
                    }
                    if redraw {
                        print!("{}", render_board(session.store()));
                    }
                    if session.store().connection_lost() {
                        show_notification(&mut session);
                        break;
                    }
                }
                None => break,
            },
        }
        show_notification(&mut session);
    }

    let was_connected = session.store().connection_status() == ConnectionState::Connected;
    session.leave();
    if was_connected {
        let drained = timeout(Duration::from_secs(1), async {
            while let Some(event) = events.recv().await {
                if event == ConnectionEvent::Status(ConnectionState::Disconnected) {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("Timed out waiting for the connection to close");
        }
    }

    Ok(())
}

/// Applies one typed line. Returns false when the user leaves.
fn handle_line(session: &mut GameSession, line: &str) -> bool {
    let command = match UserCommand::parse(line) {
        Ok(command) => command,
        Err(client::input::ParseError::Empty) => return true,
        Err(e) => {
            println!("{}", e);
            return true;
        }
    };

    match command {
        UserCommand::Place { row, col, letter } => match session.stage(row, col, letter) {
            Ok(()) => print!("{}", render_board(session.store())),
            Err(e) => println!("{}", e),
        },
        UserCommand::Submit => {
            if let SubmitOutcome::Sent(count) = session.submit() {
                info!("Submitted {} tile(s)", count);
            }
        }
        UserCommand::RequestState => session.request_state(),
        UserCommand::ShowBoard => print!("{}", render_board(session.store())),
        UserCommand::ShowLog => print!("{}", render_log(session.store())),
        UserCommand::ShowPlayers => print!("{}", render_players(session.store())),
        UserCommand::Leave => return false,
        UserCommand::Help => println!("{}", HELP),
    }
    true
}

fn show_notification(session: &mut GameSession) {
    if let Some(notification) = session.store_mut().take_notification() {
        match notification.kind {
            NotificationKind::Error => println!("! {}", notification.message),
            NotificationKind::Info => println!("* {}", notification.message),
        }
    }
}
