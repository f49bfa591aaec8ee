//! Wire format of the PSI API and its live channel.
//!
//! Snapshot endpoints return plain JSON arrays of [`CountryRecord`]. The live
//! channel carries text frames shaped `{"type": .., "data": ..}`; only
//! `psi_update` frames change state, everything else is acknowledged and
//! skipped.

use catalog::{CountryPatch, CountryRisk};
use foundation::CountryId;
use layers::{RiskTier, is_valid_psi};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedMessage;

pub const PSI_UPDATE: &str = "psi_update";
const PSI_UPDATE_ALIAS: &str = "update";

/// One element of `GET /countries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub id: CountryId,
    pub name: String,
    pub iso_code: String,
    #[serde(default)]
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub psi_score: f64,
    #[serde(default)]
    pub risk_level: Option<String>,
}

impl CountryRecord {
    pub fn into_risk(self) -> Result<CountryRisk, MalformedMessage> {
        if !is_valid_psi(self.psi_score) {
            return Err(MalformedMessage::ScoreOutOfRange {
                id: self.id,
                score: self.psi_score,
            });
        }
        let risk_level = resolve_tier(self.id, self.risk_level.as_deref(), self.psi_score);
        Ok(CountryRisk {
            id: self.id,
            name: self.name,
            iso_code: self.iso_code,
            region: self.region,
            latitude: self.latitude,
            longitude: self.longitude,
            psi_score: self.psi_score,
            risk_level,
        })
    }
}

/// Convert a full snapshot, dropping records whose score is unusable.
pub fn decode_snapshot(records: Vec<CountryRecord>) -> Vec<CountryRisk> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        match record.into_risk() {
            Ok(country) => out.push(country),
            Err(e) => tracing::warn!(error = %e, "dropping snapshot record"),
        }
    }
    out
}

/// Server tier wins when it names a known tier; otherwise derive from score.
fn resolve_tier(id: CountryId, level: Option<&str>, psi_score: f64) -> RiskTier {
    match level.map(str::parse::<RiskTier>) {
        Some(Ok(tier)) => tier,
        Some(Err(e)) => {
            tracing::debug!(%id, error = %e, "re-deriving tier from score");
            RiskTier::classify(psi_score)
        }
        None => RiskTier::classify(psi_score),
    }
}

/// One element of a `psi_update` frame's `data` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsiUpdateEntry {
    pub country_id: CountryId,
    #[serde(default)]
    pub psi_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl PsiUpdateEntry {
    fn into_patch(self) -> Result<CountryPatch, MalformedMessage> {
        if let Some(score) = self.psi_score {
            if !is_valid_psi(score) {
                return Err(MalformedMessage::ScoreOutOfRange {
                    id: self.country_id,
                    score,
                });
            }
        }
        let risk_level = match (self.risk_level.as_deref(), self.psi_score) {
            (Some(level), Some(score)) => Some(resolve_tier(self.country_id, Some(level), score)),
            (Some(level), None) => level.parse::<RiskTier>().ok(),
            (None, _) => None,
        };
        Ok(CountryPatch {
            id: self.country_id,
            psi_score: self.psi_score,
            risk_level,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveMessage {
    PsiUpdate(Vec<CountryPatch>),
    /// Well-formed frame of a type this client does not act on.
    Ignored { kind: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Decode one live text frame. A single bad entry rejects the whole frame.
pub fn parse_live_message(text: &str) -> Result<LiveMessage, MalformedMessage> {
    let envelope: RawEnvelope = serde_json::from_str(text)?;
    if envelope.kind != PSI_UPDATE && envelope.kind != PSI_UPDATE_ALIAS {
        return Ok(LiveMessage::Ignored {
            kind: envelope.kind,
        });
    }

    let entries: Vec<PsiUpdateEntry> =
        serde_json::from_value(envelope.data).map_err(|e| MalformedMessage::Schema {
            kind: envelope.kind.clone(),
            detail: e.to_string(),
        })?;
    let patches = entries
        .into_iter()
        .map(PsiUpdateEntry::into_patch)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LiveMessage::PsiUpdate(patches))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub id: u64,
    pub country_id: CountryId,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtestRecord {
    pub id: u64,
    pub country_id: CountryId,
    pub severity_score: f64,
    pub location: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub score: f64,
    pub volatility_index: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub currency_volatility: f64,
    pub bond_yield_change: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `GET /country/{id}`: the base record plus the drill-down breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDetail {
    #[serde(flatten)]
    pub country: CountryRecord,
    #[serde(default)]
    pub escalation_probability: f64,
    #[serde(default)]
    pub elections: Vec<ElectionRecord>,
    #[serde(default)]
    pub protests: Vec<ProtestRecord>,
    #[serde(default)]
    pub sentiment: Option<SentimentRecord>,
    #[serde(default)]
    pub market_indicator: Option<MarketRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn psi_update_frame_becomes_patches() {
        let frame = r#"{"type":"psi_update","data":[
            {"country_id":1,"psi_score":85.0,"risk_level":"Crisis","timestamp":"2024-05-01T00:00:00"},
            {"country_id":2,"psi_score":40.0}
        ]}"#;
        let msg = parse_live_message(frame).unwrap();
        assert_eq!(
            msg,
            LiveMessage::PsiUpdate(vec![
                CountryPatch::score(CountryId(1), 85.0).with_risk_level(RiskTier::Crisis),
                CountryPatch::score(CountryId(2), 40.0),
            ])
        );
    }

    #[test]
    fn update_alias_is_accepted() {
        let msg = parse_live_message(r#"{"type":"update","data":[]}"#).unwrap();
        assert_eq!(msg, LiveMessage::PsiUpdate(Vec::new()));
    }

    #[test]
    fn other_types_are_ignored() {
        let msg = parse_live_message(r#"{"type":"breaking_event","message":"x"}"#).unwrap();
        assert_eq!(
            msg,
            LiveMessage::Ignored {
                kind: "breaking_event".into()
            }
        );
    }

    #[test]
    fn malformed_frames_are_classified() {
        assert!(matches!(
            parse_live_message("not json"),
            Err(MalformedMessage::Json(_))
        ));
        assert!(matches!(
            parse_live_message(r#"{"data":[]}"#),
            Err(MalformedMessage::Json(_))
        ));
        assert!(matches!(
            parse_live_message(r#"{"type":"psi_update","data":{"country_id":1}}"#),
            Err(MalformedMessage::Schema { .. })
        ));
        assert!(matches!(
            parse_live_message(r#"{"type":"psi_update"}"#),
            Err(MalformedMessage::Schema { .. })
        ));
        assert!(matches!(
            parse_live_message(r#"{"type":"psi_update","data":[{"country_id":3,"psi_score":140}]}"#),
            Err(MalformedMessage::ScoreOutOfRange { id: CountryId(3), .. })
        ));
    }

    #[test]
    fn unknown_tier_string_is_re_derived() {
        let msg = parse_live_message(
            r#"{"type":"psi_update","data":[{"country_id":5,"psi_score":72,"risk_level":"Severe"}]}"#,
        )
        .unwrap();
        let LiveMessage::PsiUpdate(patches) = msg else {
            panic!("expected update");
        };
        assert_eq!(patches[0].risk_level, Some(RiskTier::High));
    }

    #[test]
    fn snapshot_records_convert_and_bad_scores_drop() {
        let json = r#"[
            {"id":1,"name":"Alpha","iso_code":"ALP","region":"North","latitude":10,"longitude":20,"psi_score":12.5,"risk_level":"Stable"},
            {"id":2,"name":"Bravo","iso_code":"BRV","latitude":0,"longitude":0,"psi_score":-4}
        ]"#;
        let records: Vec<CountryRecord> = serde_json::from_str(json).unwrap();
        let countries = decode_snapshot(records);
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].id, CountryId(1));
        assert_eq!(countries[0].risk_level, RiskTier::Stable);
    }

    #[test]
    fn detail_decodes_nested_breakdown() {
        let json = r#"{
            "id":7,"name":"Golf","iso_code":"GLF","region":"East","latitude":1.5,"longitude":2.5,
            "psi_score":66.0,"risk_level":"Elevated","escalation_probability":0.31,
            "elections":[{"id":1,"country_id":7,"date":"2024-09-01T00:00:00","type":"general","days_remaining":40}],
            "protests":[{"id":9,"country_id":7,"severity_score":6.5,"location":"Capital","date":"2024-05-01T00:00:00"}],
            "sentiment":{"id":3,"country_id":7,"score":-0.4,"volatility_index":0.7,"timestamp":"2024-05-02T00:00:00"},
            "market_indicator":null
        }"#;
        let detail: CountryDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.country.id, CountryId(7));
        assert_eq!(detail.elections[0].kind, "general");
        assert_eq!(detail.protests.len(), 1);
        assert_eq!(detail.sentiment.as_ref().map(|s| s.score), Some(-0.4));
        assert!(detail.market_indicator.is_none());
    }
}
