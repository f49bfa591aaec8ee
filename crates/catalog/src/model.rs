use foundation::CountryId;
use foundation::math::GeoPoint;
use layers::RiskTier;
use serde::{Deserialize, Serialize};

/// Authoritative per-country risk record.
///
/// Metadata and coordinates never change within a session; `psi_score` and
/// `risk_level` move together through [`CountryPatch`] or a full refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRisk {
    pub id: CountryId,
    pub name: String,
    pub iso_code: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub psi_score: f64,
    pub risk_level: RiskTier,
}

impl CountryRisk {
    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Partial update addressed by id. Only `Some` fields are merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountryPatch {
    pub id: CountryId,
    pub psi_score: Option<f64>,
    pub risk_level: Option<RiskTier>,
}

impl CountryPatch {
    pub fn new(id: CountryId) -> Self {
        Self {
            id,
            psi_score: None,
            risk_level: None,
        }
    }

    pub fn score(id: CountryId, psi_score: f64) -> Self {
        Self {
            psi_score: Some(psi_score),
            ..Self::new(id)
        }
    }

    pub fn with_risk_level(mut self, tier: RiskTier) -> Self {
        self.risk_level = Some(tier);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.psi_score.is_none() && self.risk_level.is_none()
    }
}

/// Election within the server's look-ahead window (`/elections/upcoming`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingElection {
    pub country_id: CountryId,
    pub country_name: String,
    pub iso_code: String,
    pub days_remaining: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub psi_score: f64,
    pub risk_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub country_id: CountryId,
    pub country_name: String,
    pub iso_code: String,
    pub psi_score: f64,
    pub risk_level: RiskTier,
}
