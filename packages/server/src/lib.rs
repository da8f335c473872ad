//! # Verso Server
//!
//! Server side of the rebase protocol: one canonical history per document,
//! and per-author bookkeeping that decides how much of each submission is
//! accepted.
//!
//! - [`DocumentState`]: the protocol state machine for a single document
//! - [`RebaseServer`]: synchronous map of documents, for embedding and tests
//! - [`DocumentHub`]: async front end with one serialized worker per
//!   document and broadcast fan-out to connected clients

mod errors;
mod hub;
mod rebase_server;
mod state;

pub use errors::{ServerError, ServerResult};
pub use hub::{BroadcastUpdate, Credentials, DocumentHub, HubConfig, Welcome};
pub use rebase_server::RebaseServer;
pub use state::{AuthorState, DocumentState};
