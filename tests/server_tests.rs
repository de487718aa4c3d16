//! End-to-end tests over a live TCP connection

use netchat::config::Config;
use netchat::server::ChatServer;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Start a server on an ephemeral port with logs in a temp directory.
async fn start_server(dir: &tempfile::TempDir) -> SocketAddr {
    let mut config = Config::default();
    config.storage.log_dir = Some(dir.path().to_path_buf());
    config.storage.purge_logs_on_start = false;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ChatServer::new(0, &config);
    tokio::spawn(server.serve(listener));
    addr
}

/// Read until the accumulated output contains `needle` (or time out).
async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut collected = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = timeout(Duration::from_secs(2), stream.read(&mut chunk))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}"))
            .expect("read failed");
        if n == 0 {
            panic!("connection closed while waiting for {needle:?}");
        }
        collected.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&collected);
        if text.contains(needle) {
            return text.into_owned();
        }
    }
}

async fn send_line(stream: &mut TcpStream, line: &str) {
    stream.write_all(line.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
    stream.flush().await.unwrap();
}

/// Connect and complete the name prompt, landing in the global room.
async fn connect_as(addr: SocketAddr, name: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, "[ENTER YOUR NAME]: ").await;
    send_line(&mut stream, name).await;
    read_until(&mut stream, &format!("{name} has joined global")).await;
    stream
}

#[tokio::test]
async fn greeting_name_prompt_and_global_join() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let greeting = read_until(&mut stream, "[ENTER YOUR NAME]: ").await;
    assert!(greeting.contains(":chat: <name of group chat>"));
    assert!(greeting.contains("WELCOME TO GLOBAL"));

    send_line(&mut stream, "alice").await;
    read_until(&mut stream, "alice has joined global").await;
}

#[tokio::test]
async fn duplicate_name_is_reprompted() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let _alice = connect_as(addr, "alice").await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    read_until(&mut stream, "[ENTER YOUR NAME]: ").await;
    send_line(&mut stream, "alice").await;
    read_until(&mut stream, "NAME IS TAKEN").await;
    read_until(&mut stream, "[ENTER ANOTHER NAME]: ").await;
    send_line(&mut stream, "alina").await;
    read_until(&mut stream, "alina has joined global").await;
}

#[tokio::test]
async fn chat_text_runs_the_pipeline_and_reaches_peers() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let mut alice = connect_as(addr, "alice").await;
    let mut bob = connect_as(addr, "bob").await;
    read_until(&mut alice, "bob has joined global").await;

    send_line(&mut alice, "hello (up)").await;
    let received = read_until(&mut bob, "HELLO").await;
    assert!(received.contains("[alice]:HELLO"));
}

#[tokio::test]
async fn group_switch_buffers_and_exit_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let mut alice = connect_as(addr, "alice").await;
    let mut bob = connect_as(addr, "bob").await;
    read_until(&mut alice, "bob has joined global").await;

    send_line(&mut alice, ":chat: news").await;
    read_until(&mut alice, "alice has joined news").await;

    // Bob chats in global while alice is tuned to news.
    send_line(&mut bob, "anyone here?").await;

    // Alice leaves news: back in global, pending global traffic arrives.
    send_line(&mut alice, ":exit:").await;
    let flushed = read_until(&mut alice, "anyone here?").await;
    assert!(flushed.contains("Welcome back to global"));
    assert!(flushed.contains("[bob]:anyone here?"));
}

#[tokio::test]
async fn rename_is_announced_to_the_group() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let mut bob = connect_as(addr, "Bob").await;
    let mut carol = connect_as(addr, "carol").await;
    read_until(&mut bob, "carol has joined global").await;

    send_line(&mut bob, ":name: Bobby").await;
    read_until(&mut bob, "You've successfully changed your name").await;
    read_until(&mut carol, "Heads up! [Bob] is now going by [Bobby].").await;
}

#[tokio::test]
async fn one_character_group_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let mut alice = connect_as(addr, "alice").await;
    send_line(&mut alice, ":chat: x").await;
    read_until(&mut alice, "Invalid chat name").await;
}

#[tokio::test]
async fn full_group_rejects_newcomer_who_stays_put() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let mut members = Vec::new();
    for i in 0..10 {
        let mut stream = connect_as(addr, &format!("user{i}")).await;
        send_line(&mut stream, ":chat: packed").await;
        read_until(&mut stream, &format!("user{i} has joined packed")).await;
        members.push(stream);
    }

    // Global is also at capacity now, so the eleventh client is turned
    // away at the door and names itself on its first group join instead.
    let mut late = TcpStream::connect(addr).await.unwrap();
    read_until(&mut late, "Oops, global chat is packed right now!").await;
    send_line(&mut late, ":chat: packed").await;
    read_until(&mut late, "Oops, packed chat is packed right now!").await;

    // A room that still has seats admits them fine.
    send_line(&mut late, ":chat: spillover").await;
    read_until(&mut late, "[ENTER YOUR NAME]: ").await;
    send_line(&mut late, "latecomer").await;
    read_until(&mut late, "latecomer has joined spillover").await;
}

#[tokio::test]
async fn transcript_replays_on_first_join_only() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let mut alice = connect_as(addr, "alice").await;
    send_line(&mut alice, "for the record").await;

    // Bob's first join of global replays the persisted transcript.
    let mut bob = TcpStream::connect(addr).await.unwrap();
    read_until(&mut bob, "[ENTER YOUR NAME]: ").await;
    send_line(&mut bob, "bob").await;
    read_until(&mut bob, "[alice]:for the record").await;
}

#[tokio::test]
async fn abrupt_disconnect_announces_departure() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let alice = connect_as(addr, "alice").await;
    let mut bob = connect_as(addr, "bob").await;

    drop(alice);
    read_until(&mut bob, "alice has left our chat...").await;
}
