//! Client connection handling

use anyhow::{anyhow, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Represents a connected client
#[derive(Clone)]
pub struct ClientConnection {
    /// Unique client identifier
    id: Uuid,

    /// Channel to send text to this client
    sender: mpsc::Sender<String>,
}

impl ClientConnection {
    /// Create a new client connection
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Get client ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue text for delivery to the client
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.sender
            .send(text.into())
            .await
            .map_err(|_| anyhow!("Failed to send text to client"))
    }
}

/// Task to write outgoing text to the client socket
pub async fn client_writer_task(mut writer: OwnedWriteHalf, mut receiver: mpsc::Receiver<String>) {
    while let Some(text) = receiver.recv().await {
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            tracing::error!("Failed to write to client: {}", e);
            break;
        }
    }

    tracing::debug!("Client writer task finished");
}
