//! Keeps a [`catalog::SnapshotStore`] in step with the PSI server.

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod sync;
pub mod transport;
pub mod ws;

pub use config::{Endpoints, SyncConfig};
pub use error::{MalformedMessage, TransportError};
pub use http::HttpSnapshotSource;
pub use protocol::{CountryDetail, CountryRecord, LiveMessage, parse_live_message};
pub use sync::{LiveSyncController, SyncHandle, SyncReport, SyncState};
pub use transport::{BoxFuture, LiveChannel, LiveConnector, SnapshotSource};
pub use ws::WsLiveConnector;
