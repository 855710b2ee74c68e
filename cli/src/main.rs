//! DESIGN
//! ======
//!
//! Terminal client for the bitgrid server. Every subcommand opens its own
//! websocket connection, does one job, and exits — except `watch`, which
//! keeps a [`ReplicaStore`] synchronized and re-renders the canvas as peer
//! edits arrive. Rendering is the classic dump: `#` for lit cells, space for
//! blank, one row per line.

use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use grid::PixelGrid;
use protocol::{CANVAS_HEIGHT, CANVAS_WIDTH, ClientEvent, ServerEvent, is_room_key};
use replica::{Cue, ReplicaStore};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("unknown room key `{0}` (valid keys: a, b, c, d)")]
    UnknownRoom(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check returned HTTP {0}")]
    Unhealthy(u16),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("event decode failed: {0}")]
    Codec(#[from] protocol::CodecError),
    #[error("timed out waiting for a server event")]
    Timeout,
    #[error("edit rejected: {0}")]
    Grid(#[from] grid::GridError),
}

#[derive(Parser, Debug)]
#[command(name = "bitgrid", about = "Shared pixel canvas terminal client")]
struct Cli {
    /// Server base URL; the websocket endpoint is derived from it.
    #[arg(long, env = "BITGRID_URL", default_value = "http://127.0.0.1:3333")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is up.
    Ping,
    /// Print the live member count of every room.
    Rooms,
    /// Fetch a room's canvas and render it once.
    Show { room: String },
    /// Stay connected to a room and re-render as peer edits arrive.
    Watch { room: String },
    /// Write one pixel into a room's canvas.
    Set {
        room: String,
        x: i64,
        y: i64,
        value: u8,
    },
    /// Blank a room's canvas.
    Clear { room: String },
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Rooms => run_rooms(&cli.base_url).await,
        Command::Show { room } => run_show(&cli.base_url, &room).await,
        Command::Watch { room } => run_watch(&cli.base_url, &room).await,
        Command::Set { room, x, y, value } => run_set(&cli.base_url, &room, x, y, value).await,
        Command::Clear { room } => run_clear(&cli.base_url, &room).await,
    }
}

// =============================================================================
// SUBCOMMANDS
// =============================================================================

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_rooms(base_url: &str) -> Result<(), CliError> {
    let mut ws = connect(base_url, None).await?;
    // The first event after a lobby connect is the room-count broadcast.
    let counts = loop {
        if let ServerEvent::RoomCounts { counts } = recv_event(&mut ws).await? {
            break counts;
        }
    };
    for (room, count) in &counts {
        println!("{room}: {count} member(s)");
    }
    Ok(())
}

async fn run_show(base_url: &str, room: &str) -> Result<(), CliError> {
    let mut ws = connect(base_url, Some(room)).await?;
    send_event(&mut ws, &ClientEvent::FetchState).await?;

    let (grid, members) = loop {
        if let ServerEvent::StateSnapshot { grid, members } = recv_event(&mut ws).await? {
            break (grid, members);
        }
    };
    println!("{}", render(&grid));
    println!("room {room}: {} member(s)", members.len());
    Ok(())
}

async fn run_watch(base_url: &str, room: &str) -> Result<(), CliError> {
    let mut ws = connect(base_url, Some(room)).await?;
    send_event(&mut ws, &ClientEvent::FetchState).await?;

    let mut store = ReplicaStore::new(CANVAS_WIDTH, CANVAS_HEIGHT);
    loop {
        let Some(message) = ws.next().await else {
            return Ok(());
        };
        let message = message.map_err(|error| CliError::WsConnect(Box::new(error)))?;
        let event = match message {
            Message::Text(text) => protocol::decode_server_event(text.as_str())?,
            Message::Close(_) => return Ok(()),
            _ => continue,
        };

        let canvas_changed = matches!(
            event,
            ServerEvent::StateSnapshot { .. }
                | ServerEvent::UpdateFullGrid { .. }
                | ServerEvent::UpdatePixel { .. }
                | ServerEvent::UpdateChunk { .. }
        );
        let cue = store.apply_server_event(event);

        if canvas_changed {
            println!("{}", render(store.mirror()));
            println!(
                "room {room}: {} member(s)",
                store.members().len()
            );
        }
        if let Some(Cue::Sound(key)) = cue {
            println!("* sfx: {key}");
        }
    }
}

async fn run_set(base_url: &str, room: &str, x: i64, y: i64, value: u8) -> Result<(), CliError> {
    let mut store = ReplicaStore::new(CANVAS_WIDTH, CANVAS_HEIGHT);
    // Validate locally first so a bad coordinate never opens a connection.
    let event = store.set_pixel(x, y, value)?;

    let mut ws = connect(base_url, Some(room)).await?;
    send_event(&mut ws, &event).await?;
    close(ws).await;
    println!("set ({x}, {y}) = {value} in room {room}");
    Ok(())
}

async fn run_clear(base_url: &str, room: &str) -> Result<(), CliError> {
    let mut ws = connect(base_url, Some(room)).await?;
    send_event(&mut ws, &ClientEvent::ClearCanvas).await?;
    close(ws).await;
    println!("cleared room {room}");
    Ok(())
}

// =============================================================================
// TRANSPORT
// =============================================================================

async fn connect(base_url: &str, room: Option<&str>) -> Result<WsStream, CliError> {
    if let Some(room) = room {
        if !is_room_key(room) {
            return Err(CliError::UnknownRoom(room.to_owned()));
        }
    }
    let url = ws_url(base_url, room)?;
    let (stream, _) = connect_async(url)
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;
    Ok(stream)
}

fn ws_url(base_url: &str, room: Option<&str>) -> Result<String, CliError> {
    let base_url = base_url.trim_end_matches('/');
    let authority = if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        return Err(CliError::InvalidBaseUrl(base_url.to_owned()));
    };
    Ok(match room {
        Some(room) => format!("{authority}/socket?room={room}"),
        None => format!("{authority}/socket"),
    })
}

async fn send_event(ws: &mut WsStream, event: &ClientEvent) -> Result<(), CliError> {
    let json = protocol::encode_client_event(event)?;
    ws.send(Message::Text(json.into()))
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))
}

async fn recv_event(ws: &mut WsStream) -> Result<ServerEvent, CliError> {
    let fut = async {
        loop {
            let Some(message) = ws.next().await else {
                return Err(CliError::WsClosed);
            };
            match message.map_err(|error| CliError::WsConnect(Box::new(error)))? {
                Message::Text(text) => {
                    return protocol::decode_server_event(text.as_str()).map_err(CliError::from);
                }
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .map_err(|_| CliError::Timeout)?
}

async fn close(mut ws: WsStream) {
    // Best effort: the edit is already flushed, the close handshake is polish.
    let _ = ws.close(None).await;
}

// =============================================================================
// RENDERING
// =============================================================================

fn render(grid: &PixelGrid) -> String {
    let mut out = String::with_capacity((grid.width() + 1) * grid.height());
    for row in grid.rows() {
        for &cell in row {
            out.push(if cell == 0 { ' ' } else { '#' });
        }
        out.push('\n');
    }
    // Drop the trailing newline; println! supplies it.
    out.pop();
    out
}
