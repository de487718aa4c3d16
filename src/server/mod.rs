//! TCP server - listener, client connections, and the command loop

pub mod commands;
mod connection;
mod listener;

pub use connection::{client_writer_task, ClientConnection};
pub use listener::ChatServer;
