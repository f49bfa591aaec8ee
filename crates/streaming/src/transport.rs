//! Seams between the sync loop and the network.
//!
//! Methods return boxed futures so the traits stay object-safe and the
//! controller can hold `Arc<dyn ..>` regardless of backend.

use std::future::Future;
use std::pin::Pin;

use catalog::{CountryRisk, UpcomingElection};
use foundation::CountryId;

use crate::error::TransportError;
use crate::protocol::CountryDetail;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Full-snapshot endpoints.
pub trait SnapshotSource: Send + Sync {
    /// Every country with its current score, already validated.
    fn fetch_countries(&self) -> BoxFuture<'_, Result<Vec<CountryRisk>, TransportError>>;

    fn fetch_upcoming_elections(
        &self,
    ) -> BoxFuture<'_, Result<Vec<UpcomingElection>, TransportError>>;

    fn fetch_country(&self, id: CountryId)
    -> BoxFuture<'_, Result<CountryDetail, TransportError>>;
}

/// Opens the server-push channel.
pub trait LiveConnector: Send + Sync {
    /// `Err(TransportError::Unsupported)` means push will never be available
    /// and the session should poll instead of retrying.
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn LiveChannel>, TransportError>>;
}

/// An open, receive-only push channel.
pub trait LiveChannel: Send {
    /// Next text frame. `Ok(None)` when the peer closed the channel.
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<String>, TransportError>>;

    fn close(&mut self) -> BoxFuture<'_, ()>;
}
