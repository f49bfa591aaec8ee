use catalog::{CountryRisk, UpcomingElection};
use foundation::CountryId;
use serde::de::DeserializeOwned;

use crate::config::Endpoints;
use crate::error::TransportError;
use crate::protocol::{CountryDetail, CountryRecord, decode_snapshot};
use crate::transport::{BoxFuture, SnapshotSource};

/// [`SnapshotSource`] backed by the REST API.
pub struct HttpSnapshotSource {
    endpoints: Endpoints,
    client: reqwest::Client,
}

impl HttpSnapshotSource {
    pub fn new(endpoints: Endpoints) -> Self {
        Self::with_client(endpoints, reqwest::Client::new())
    }

    pub fn with_client(endpoints: Endpoints, client: reqwest::Client) -> Self {
        Self { endpoints, client }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.endpoints.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TransportError::Http {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| TransportError::Http {
            url: url.clone(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| TransportError::Decode { url, source })
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch_countries(&self) -> BoxFuture<'_, Result<Vec<CountryRisk>, TransportError>> {
        Box::pin(async move {
            let records: Vec<CountryRecord> = self.get_json("/countries").await?;
            Ok(decode_snapshot(records))
        })
    }

    fn fetch_upcoming_elections(
        &self,
    ) -> BoxFuture<'_, Result<Vec<UpcomingElection>, TransportError>> {
        Box::pin(async move { self.get_json("/elections/upcoming").await })
    }

    fn fetch_country(
        &self,
        id: CountryId,
    ) -> BoxFuture<'_, Result<CountryDetail, TransportError>> {
        Box::pin(async move { self.get_json(&format!("/country/{id}")).await })
    }
}
