//! TCP listener and per-connection chat loop

use super::commands::{self, Command};
use super::connection::{client_writer_task, ClientConnection};
use crate::banner::{Renderer, GLOBAL_GROUP};
use crate::config::{Config, ModerationConfig};
use crate::group::{Admission, MAX_MEMBERS};
use crate::router::{self, JoinOutcome, RenameOutcome};
use crate::state::{ChatState, SharedState};
use crate::storage::ChatStore;
use crate::style;
use crate::textpipe;
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

type LineReader = BufReader<OwnedReadHalf>;

/// The chat server: one accept loop, one task per connection, everything
/// else behind the shared-state lock.
pub struct ChatServer {
    port: u16,
    state: SharedState,
    banners: Arc<Renderer>,
    moderation: Arc<ModerationConfig>,
}

impl ChatServer {
    /// Build a server from configuration, applying the startup log
    /// retention policy.
    pub fn new(port: u16, config: &Config) -> Self {
        let store = ChatStore::open(config.log_dir(), config.storage.purge_logs_on_start);
        Self {
            port,
            state: ChatState::shared(store),
            banners: Arc::new(Renderer::from_font_path(config.banner.font_path.as_deref())),
            moderation: Arc::new(config.moderation.clone()),
        }
    }

    /// Bind and run the accept loop. Listen and accept failures are fatal;
    /// anything that goes wrong on an individual connection stays on that
    /// connection.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;
        tracing::info!("Server listening on port {}...", self.port);
        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            tracing::info!("Client connected from {}", addr);

            let state = Arc::clone(&self.state);
            let banners = Arc::clone(&self.banners);
            let moderation = Arc::clone(&self.moderation);
            tokio::spawn(async move {
                if let Err(e) = handle_client(stream, state, banners, moderation).await {
                    tracing::error!("Client error: {}", e);
                }
            });
        }
    }
}

/// Handle a single client connection from greeting to teardown.
async fn handle_client(
    stream: TcpStream,
    state: SharedState,
    banners: Arc<Renderer>,
    moderation: Arc<ModerationConfig>,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (tx, rx) = mpsc::channel::<String>(256);
    let conn = ClientConnection::new(tx);
    let writer_handle = tokio::spawn(client_writer_task(write_half, rx));

    send_help(&conn).await?;

    // Everyone lands in the global room first.
    let result = match join_group(GLOBAL_GROUP, &conn, &mut reader, &state, &banners).await {
        Ok(()) => chat_loop(&conn, &mut reader, &state, &banners, &moderation).await,
        Err(e) => Err(e),
    };

    // Covers abrupt disconnects; a clean `:exit:` has already cleared the
    // session and this is a no-op.
    {
        let mut chat = state.lock().await;
        router::disconnect_cleanup(&mut chat, conn.id()).await;
    }

    drop(conn);
    writer_handle.abort();

    tracing::info!("Client handler finished");
    result
}

/// Read and dispatch lines until the client exits or the connection drops.
async fn chat_loop(
    conn: &ClientConnection,
    reader: &mut LineReader,
    state: &SharedState,
    banners: &Renderer,
    moderation: &ModerationConfig,
) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            tracing::info!("Connection closed by peer");
            return Ok(());
        }

        match commands::parse(line.trim()) {
            Command::Empty => {}
            Command::JoinChat(group) => {
                if group.len() < 2 {
                    conn.send(format!(
                        "{}Invalid chat name, 1 character isn't descriptive enough.\n{}",
                        style::RED,
                        style::RESET
                    ))
                    .await?;
                } else {
                    join_group(group, conn, reader, state, banners).await?;
                }
            }
            Command::Rename(new_name) => handle_rename(new_name, conn, state).await?,
            Command::Exit => {
                if handle_exit(conn, state, banners).await? == ExitFlow::Terminal {
                    return Ok(());
                }
            }
            Command::Chat(text) => handle_chat(text, conn, state, moderation).await?,
        }
    }
}

/// The full join orchestration: admission gate, banner, name resolution,
/// then the locked registration/membership/announce step, transcript replay
/// on first membership and pending-buffer flush.
async fn join_group(
    group: &str,
    conn: &ClientConnection,
    reader: &mut LineReader,
    state: &SharedState,
    banners: &Renderer,
) -> Result<()> {
    let admission = {
        let chat = state.lock().await;
        match chat.registry.find_by_conn(conn.id()) {
            Some(id) => {
                let active = chat
                    .registry
                    .get(id)
                    .and_then(|s| s.active_group.clone());
                chat.groups.check_admission(group, id, active.as_deref())
            }
            // No session yet: only capacity can stand in the way
            None if chat.groups.members_of(group).len() >= MAX_MEMBERS => Admission::Full,
            None => Admission::Allowed,
        }
    };
    match admission {
        Admission::AlreadyMember => {
            conn.send(format!("YOU'RE ALREADY IN {group}\n")).await?;
            return Ok(());
        }
        Admission::Full => {
            send_full_rejection(conn, group).await?;
            return Ok(());
        }
        Admission::Allowed => {}
    }

    conn.send(format!("Welcome to {group} Chat!\n")).await?;
    conn.send(banners.banner_for(group)).await?;

    // Prompt for a name only if this connection has no session yet.
    let name = {
        let chat = state.lock().await;
        chat.registry
            .find_by_conn(conn.id())
            .and_then(|id| chat.registry.get(id))
            .map(|s| s.name.clone())
    };
    let name = match name {
        Some(name) => name,
        None => prompt_name(conn, reader, state).await?,
    };

    let mut chat = state.lock().await;
    match router::complete_join(&mut chat, conn, &name, group).await {
        JoinOutcome::Full => {
            drop(chat);
            send_full_rejection(conn, group).await?;
        }
        JoinOutcome::Joined { id, first_time } => {
            if first_time {
                let transcript = chat.store.replay(group);
                if !transcript.is_empty() {
                    conn.send(transcript).await?;
                }
            }
            router::flush_pending(&mut chat, id, group).await;
        }
    }
    Ok(())
}

/// Prompt until the client supplies a non-empty, unused name.
async fn prompt_name(
    conn: &ClientConnection,
    reader: &mut LineReader,
    state: &SharedState,
) -> Result<String> {
    conn.send("[ENTER YOUR NAME]: ").await?;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            bail!("connection closed during name prompt");
        }
        let name = line.trim();
        if name.is_empty() {
            conn.send("[ENTER YOUR NAME]: ").await?;
            continue;
        }

        let taken = state.lock().await.registry.is_name_taken(name);
        if taken {
            conn.send(format!("{}NAME IS TAKEN\n{}", style::RED, style::RESET))
                .await?;
            conn.send("[ENTER ANOTHER NAME]: ").await?;
            continue;
        }
        return Ok(name.to_string());
    }
}

async fn handle_rename(new_name: &str, conn: &ClientConnection, state: &SharedState) -> Result<()> {
    if new_name.is_empty() {
        return Ok(());
    }
    let outcome = {
        let mut chat = state.lock().await;
        match chat.registry.find_by_conn(conn.id()) {
            Some(id) => router::rename(&mut chat, id, new_name).await,
            None => RenameOutcome::NotRegistered,
        }
    };
    match outcome {
        RenameOutcome::Renamed => {
            conn.send(format!(
                "{}You've successfully changed your name\n{}",
                style::GREEN,
                style::RESET
            ))
            .await?;
        }
        RenameOutcome::SameName => {
            conn.send(format!(
                "{}You're already using that name, aren't you{} :)\n",
                style::GREEN,
                style::RESET
            ))
            .await?;
        }
        RenameOutcome::Taken => {
            conn.send(format!("{}NAME IS TAKEN\n{}", style::RED, style::RESET))
                .await?;
        }
        RenameOutcome::NotRegistered => {}
    }
    Ok(())
}

#[derive(PartialEq, Eq)]
enum ExitFlow {
    Terminal,
    Continue,
}

/// `:exit:` — leave the active group. The session lands in another group it
/// still holds a seat in, or the connection is done.
async fn handle_exit(
    conn: &ClientConnection,
    state: &SharedState,
    banners: &Renderer,
) -> Result<ExitFlow> {
    let mut chat = state.lock().await;
    let Some(id) = chat.registry.find_by_conn(conn.id()) else {
        return Ok(ExitFlow::Continue);
    };
    match router::leave_active(&mut chat, id).await {
        Some(group) => {
            conn.send(format!("Welcome back to {group}\n")).await?;
            conn.send(banners.banner_for(&group)).await?;
            router::flush_pending(&mut chat, id, &group).await;
            Ok(ExitFlow::Continue)
        }
        None => Ok(ExitFlow::Terminal),
    }
}

/// Ordinary chat text: sanitize, run the pipeline, timestamp, persist,
/// broadcast. Ignored when the connection has no active session.
async fn handle_chat(
    text: &str,
    conn: &ClientConnection,
    state: &SharedState,
    moderation: &ModerationConfig,
) -> Result<()> {
    let mut chat = state.lock().await;
    let Some(id) = chat.registry.find_by_conn(conn.id()) else {
        return Ok(());
    };
    let Some((name, group)) = chat
        .registry
        .get(id)
        .and_then(|s| Some((s.name.clone(), s.active_group.clone()?)))
    else {
        return Ok(());
    };

    let refined = textpipe::refine(
        &textpipe::sanitize(text),
        &moderation.denylist,
        moderation.mask_char,
    );
    if refined.is_empty() {
        return Ok(());
    }

    let formatted = commands::format_message(&name, &refined);
    tracing::info!("Message in {} from {}: {}", group, name, refined);
    chat.store.append(&group, &formatted);
    router::broadcast(&mut chat, &group, Some(id), &formatted).await;
    Ok(())
}

async fn send_full_rejection(conn: &ClientConnection, group: &str) -> Result<()> {
    conn.send(format!(
        "{}Oops, {} chat is packed right now! Try again in a bit {}:)\n",
        style::BOLD_MAGENTA,
        group,
        style::RESET
    ))
    .await
}

async fn send_help(conn: &ClientConnection) -> Result<()> {
    conn.send(format!(
        "{}\nTo add/join a group chat:\n{}:chat: <name of group chat>\n",
        style::BOLD_YELLOW,
        style::RESET
    ))
    .await?;
    conn.send(format!(
        "{}To change your name:\n{}:name: <new name>\n",
        style::BOLD_YELLOW,
        style::RESET
    ))
    .await?;
    conn.send(format!(
        "{}To exit the current group chat:\n{}:exit:\n",
        style::BOLD_YELLOW,
        style::RESET
    ))
    .await?;
    conn.send(format!(
        "{}By default, you'll be added to the global chat unless it's full.\n\n{}",
        style::BOLD_MAGENTA,
        style::RESET
    ))
    .await
}
