//! # Document hub
//!
//! Async front end for many documents. Each document gets its own tokio
//! task that owns its [`DocumentState`] and handles commands one at a time,
//! so submissions to one document are applied strictly in arrival order
//! while different documents proceed in parallel.
//!
//! ```text
//!  connect / apply_change / ...        per-document worker
//! ┌──────────┐   mpsc::Sender    ┌──────────────────────────┐
//! │   hub    │ ────────────────▶ │ DocumentState            │
//! └──────────┘                   │ clients: [(author, tx)]  │
//!       ▲        oneshot reply   └────────────┬─────────────┘
//!       └─────────────────────────────────────┤ broadcast
//!                                             ▼
//!                                ReceiverStream<BroadcastUpdate>
//! ```
//!
//! Workers are created lazily and live until [`DocumentHub::evict`].

use crate::errors::{ServerError, ServerResult};
use crate::state::DocumentState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use verso_ot::{AuthorId, Change};

/// Queue sizes for workers and clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubConfig {
    /// Pending commands per document worker
    pub command_buffer: usize,

    /// Undelivered broadcasts per connected client
    pub client_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_buffer: 64,
            client_buffer: 256,
        }
    }
}

/// Proof of a previously issued author id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub author: AuthorId,
    pub token: String,
}

/// Sent to a client on connect
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Welcome {
    pub doc: String,
    pub author: AuthorId,
    pub token: String,
    pub history: Change,
}

/// An accepted change, fanned out to every client of a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastUpdate {
    pub doc: String,
    pub author: AuthorId,
    pub change: Change,

    /// Milliseconds since the epoch
    pub timestamp: i64,
}

type ConnectReply = (Welcome, ReceiverStream<BroadcastUpdate>);

enum Command {
    Connect {
        credentials: Option<Credentials>,
        reply: oneshot::Sender<ConnectReply>,
    },
    ApplyChange {
        author: AuthorId,
        backtrack: usize,
        change: Change,
        reply: oneshot::Sender<ServerResult<Change>>,
    },
    Disconnect {
        author: AuthorId,
    },
    RemoveAuthor {
        author: AuthorId,
    },
    SetAuthorName {
        author: AuthorId,
        name: String,
    },
    History {
        reply: oneshot::Sender<Change>,
    },
}

struct Client {
    author: AuthorId,
    sender: mpsc::Sender<BroadcastUpdate>,
}

/// Owns one document's state; runs on its own task
struct DocumentWorker {
    doc: String,
    state: DocumentState,
    clients: Vec<Client>,
    client_buffer: usize,
}

impl DocumentWorker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(doc = %self.doc, "Document worker started");
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        info!(doc = %self.doc, summary = %self.state.history_summary(), "Document worker stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { credentials, reply } => {
                let credentials = credentials.as_ref().map(|c| (c.author, c.token.as_str()));
                let (author, token) = self.state.register_author(credentials);
                let (sender, receiver) = mpsc::channel(self.client_buffer.max(1));
                self.clients.push(Client { author, sender });

                let welcome = Welcome {
                    doc: self.doc.clone(),
                    author,
                    token,
                    history: self.state.history().clone(),
                };
                let _ = reply.send((welcome, ReceiverStream::new(receiver)));
            }
            Command::ApplyChange {
                author,
                backtrack,
                change,
                reply,
            } => {
                let result = self.state.apply_change(author, backtrack, &change);
                if let Ok(accepted) = &result {
                    if !accepted.is_empty() {
                        self.broadcast(author, accepted);
                    }
                }
                if let Err(error) = &result {
                    warn!(doc = %self.doc, author, %error, "Submission refused");
                }
                let _ = reply.send(result);
            }
            Command::Disconnect { author } => {
                self.state.set_author_active(author, false);
                self.clients.retain(|client| client.author != author);
                debug!(doc = %self.doc, author, "Author disconnected");
            }
            Command::RemoveAuthor { author } => {
                self.state.remove_author(author);
                self.clients.retain(|client| client.author != author);
            }
            Command::SetAuthorName { author, name } => {
                self.state.set_author_name(author, name);
            }
            Command::History { reply } => {
                let _ = reply.send(self.state.history().clone());
            }
        }
    }

    /// Send to every client, dropping those that are gone or too far behind
    fn broadcast(&mut self, author: AuthorId, change: &Change) {
        let update = BroadcastUpdate {
            doc: self.doc.clone(),
            author,
            change: change.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let doc = &self.doc;
        self.clients.retain(|client| match client.sender.try_send(update.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(doc = %doc, author = client.author, "Client fell behind, disconnecting it");
                false
            }
        });
    }
}

/// Entry point for all documents
pub struct DocumentHub {
    config: HubConfig,
    workers: RwLock<HashMap<String, mpsc::Sender<Command>>>,
}

impl DocumentHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            workers: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> HubConfig {
        self.config
    }

    /// Get or spawn the worker for `doc`
    fn worker(&self, doc: &str) -> mpsc::Sender<Command> {
        // Try read lock first
        {
            let workers = self.workers.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(worker) = workers.get(doc) {
                return worker.clone();
            }
        }

        let mut workers = self.workers.write().unwrap_or_else(PoisonError::into_inner);

        // Double-check (another task may have spawned it)
        if let Some(worker) = workers.get(doc) {
            return worker.clone();
        }

        let (sender, receiver) = mpsc::channel(self.config.command_buffer.max(1));
        let worker = DocumentWorker {
            doc: doc.to_string(),
            state: DocumentState::new(),
            clients: Vec::new(),
            client_buffer: self.config.client_buffer,
        };
        tokio::spawn(worker.run(receiver));

        workers.insert(doc.to_string(), sender.clone());
        sender
    }

    async fn send(&self, doc: &str, command: Command) -> ServerResult<()> {
        self.worker(doc)
            .send(command)
            .await
            .map_err(|_| ServerError::DocumentClosed(doc.to_string()))
    }

    async fn request<T>(
        &self,
        doc: &str,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ServerResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(doc, command(reply)).await?;
        response
            .await
            .map_err(|_| ServerError::DocumentClosed(doc.to_string()))
    }

    /// Join `doc` as a new author, or as a returning one with valid
    /// credentials
    pub async fn connect(
        &self,
        doc: &str,
        credentials: Option<Credentials>,
    ) -> ServerResult<(Welcome, ReceiverStream<BroadcastUpdate>)> {
        self.request(doc, |reply| Command::Connect { credentials, reply }).await
    }

    /// Submit a change. Non-empty results are also broadcast to every
    /// connected client of `doc`, including the submitter.
    pub async fn apply_change(
        &self,
        doc: &str,
        author: AuthorId,
        backtrack: usize,
        change: Change,
    ) -> ServerResult<Change> {
        self.request(doc, |reply| Command::ApplyChange {
            author,
            backtrack,
            change,
            reply,
        })
        .await?
    }

    pub async fn disconnect(&self, doc: &str, author: AuthorId) -> ServerResult<()> {
        self.send(doc, Command::Disconnect { author }).await
    }

    pub async fn remove_author(&self, doc: &str, author: AuthorId) -> ServerResult<()> {
        self.send(doc, Command::RemoveAuthor { author }).await
    }

    pub async fn set_author_name(&self, doc: &str, author: AuthorId, name: impl Into<String>) -> ServerResult<()> {
        self.send(doc, Command::SetAuthorName { author, name: name.into() }).await
    }

    pub async fn history(&self, doc: &str) -> ServerResult<Change> {
        self.request(doc, |reply| Command::History { reply }).await
    }

    /// Drop the worker for `doc`. Its task ends once queued commands drain.
    pub fn evict(&self, doc: &str) -> bool {
        let mut workers = self.workers.write().unwrap_or_else(PoisonError::into_inner);
        workers.remove(doc).is_some()
    }

    /// Names of documents with a live worker
    pub fn documents(&self) -> Vec<String> {
        let workers = self.workers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = workers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for DocumentHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
