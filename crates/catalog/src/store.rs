use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use foundation::CountryId;
use foundation::math::stable_total_cmp_f64;
use layers::{RiskTier, is_valid_psi};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::model::{CountryPatch, CountryRisk, LeaderboardEntry, UpcomingElection};

/// What the most recent mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Initial,
    Replaced { countries: usize },
    Patched { applied: usize },
    ElectionsReplaced { count: usize },
}

/// Monotonic revision published after every mutation that changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRevision {
    pub seq: u64,
    pub change: StoreChange,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PatchOutcome {
    /// `None` when nothing was merged.
    pub revision: Option<StoreRevision>,
    pub applied: Vec<CountryId>,
    pub unknown: Vec<CountryId>,
    pub rejected: Vec<CountryId>,
}

impl PatchOutcome {
    pub fn changed(&self) -> bool {
        self.revision.is_some()
    }
}

#[derive(Default)]
struct StoreState {
    countries: BTreeMap<CountryId, CountryRisk>,
    elections: Vec<UpcomingElection>,
    bootstrapped: bool,
    seq: u64,
}

struct Shared {
    state: RwLock<StoreState>,
    notify: watch::Sender<StoreRevision>,
}

/// Single authoritative keyed collection of country records.
///
/// Clones share the same state. Readers always get owned copies, so nothing
/// handed out can alias the stored records. Every mutation publishes a
/// [`StoreRevision`] while still holding the write lock, which keeps
/// revision order identical to mutation order.
#[derive(Clone)]
pub struct SnapshotStore {
    shared: Arc<Shared>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("SnapshotStore")
            .field("countries", &state.countries.len())
            .field("elections", &state.elections.len())
            .field("bootstrapped", &state.bootstrapped)
            .field("seq", &state.seq)
            .finish()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(StoreRevision {
            seq: 0,
            change: StoreChange::Initial,
        });
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(StoreState::default()),
                notify,
            }),
        }
    }

    /// Swap the whole collection. Duplicate ids keep the last record.
    pub fn replace_all(&self, entities: Vec<CountryRisk>) -> StoreRevision {
        let incoming = entities.len();
        let mut next = BTreeMap::new();
        for country in entities {
            next.insert(country.id, country);
        }
        if next.len() != incoming {
            tracing::warn!(
                incoming,
                unique = next.len(),
                "snapshot contained duplicate country ids; last record kept"
            );
        }

        let countries = next.len();
        let mut state = self.shared.state.write();
        state.countries = next;
        state.bootstrapped = true;
        self.publish(&mut state, StoreChange::Replaced { countries })
    }

    /// Merge partial updates into existing records.
    ///
    /// Unknown ids are skipped. A score outside `[0, 100]` rejects that
    /// update only. When a score arrives without a tier the tier is
    /// re-derived so the pair stays consistent.
    pub fn patch(&self, updates: &[CountryPatch]) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();
        let mut state = self.shared.state.write();

        for update in updates {
            if update.psi_score.is_some_and(|s| !is_valid_psi(s)) {
                outcome.rejected.push(update.id);
                continue;
            }
            let Some(country) = state.countries.get_mut(&update.id) else {
                outcome.unknown.push(update.id);
                continue;
            };
            match (update.psi_score, update.risk_level) {
                (None, None) => continue,
                (Some(score), tier) => {
                    country.psi_score = score;
                    country.risk_level = tier.unwrap_or_else(|| RiskTier::classify(score));
                }
                (None, Some(tier)) => country.risk_level = tier,
            }
            outcome.applied.push(update.id);
        }

        if !outcome.unknown.is_empty() {
            tracing::debug!(ids = ?outcome.unknown, "ignored updates for unknown countries");
        }
        if !outcome.rejected.is_empty() {
            tracing::warn!(ids = ?outcome.rejected, "rejected updates with out-of-range scores");
        }
        if !outcome.applied.is_empty() {
            let applied = outcome.applied.len();
            outcome.revision = Some(self.publish(&mut state, StoreChange::Patched { applied }));
        }
        outcome
    }

    pub fn replace_elections(&self, elections: Vec<UpcomingElection>) -> StoreRevision {
        let count = elections.len();
        let mut state = self.shared.state.write();
        state.elections = elections;
        self.publish(&mut state, StoreChange::ElectionsReplaced { count })
    }

    /// All records in ascending id order.
    pub fn get_all(&self) -> Vec<CountryRisk> {
        self.shared.state.read().countries.values().cloned().collect()
    }

    /// All records together with the revision that produced them.
    pub fn get_all_with_revision(&self) -> (StoreRevision, Vec<CountryRisk>) {
        let state = self.shared.state.read();
        let revision = *self.shared.notify.borrow();
        (revision, state.countries.values().cloned().collect())
    }

    pub fn get(&self, id: CountryId) -> Option<CountryRisk> {
        self.shared.state.read().countries.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.state.read().countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.read().countries.is_empty()
    }

    /// True once the first full snapshot has been installed.
    pub fn is_bootstrapped(&self) -> bool {
        self.shared.state.read().bootstrapped
    }

    pub fn revision(&self) -> StoreRevision {
        *self.shared.notify.borrow()
    }

    /// Receiver that wakes on every published revision after this call.
    pub fn subscribe(&self) -> watch::Receiver<StoreRevision> {
        self.shared.notify.subscribe()
    }

    /// Top `limit` countries by score (descending, ties by id), ranked from 1.
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let state = self.shared.state.read();
        let mut ranked: Vec<&CountryRisk> = state.countries.values().collect();
        ranked.sort_by(|a, b| {
            stable_total_cmp_f64(b.psi_score, a.psi_score).then_with(|| a.id.cmp(&b.id))
        });
        ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, c)| LeaderboardEntry {
                rank: i as u32 + 1,
                country_id: c.id,
                country_name: c.name.clone(),
                iso_code: c.iso_code.clone(),
                psi_score: c.psi_score,
                risk_level: c.risk_level,
            })
            .collect()
    }

    pub fn upcoming_elections(&self) -> Vec<UpcomingElection> {
        self.shared.state.read().elections.clone()
    }

    fn publish(&self, state: &mut StoreState, change: StoreChange) -> StoreRevision {
        state.seq += 1;
        let revision = StoreRevision {
            seq: state.seq,
            change,
        };
        self.shared.notify.send_replace(revision);
        revision
    }
}

#[cfg(test)]
mod tests {
    use super::{SnapshotStore, StoreChange};
    use crate::model::{CountryPatch, CountryRisk, UpcomingElection};
    use foundation::CountryId;
    use layers::RiskTier;
    use pretty_assertions::assert_eq;

    fn country(id: u64, name: &str, psi: f64) -> CountryRisk {
        CountryRisk {
            id: CountryId(id),
            name: name.to_string(),
            iso_code: name[..3].to_uppercase(),
            region: "Test".to_string(),
            latitude: 10.0,
            longitude: 20.0,
            psi_score: psi,
            risk_level: RiskTier::classify(psi),
        }
    }

    fn seeded() -> SnapshotStore {
        let store = SnapshotStore::new();
        store.replace_all(vec![country(1, "Alpha", 20.0), country(2, "Bravo", 60.0)]);
        store
    }

    #[test]
    fn starts_empty_and_unbootstrapped() {
        let store = SnapshotStore::new();
        assert!(store.is_empty());
        assert!(!store.is_bootstrapped());
        assert_eq!(store.revision().seq, 0);
        assert_eq!(store.revision().change, StoreChange::Initial);
    }

    #[test]
    fn patch_merges_only_the_addressed_record() {
        let store = seeded();
        let outcome = store.patch(&[CountryPatch::score(CountryId(1), 90.0)]);
        assert_eq!(outcome.applied, vec![CountryId(1)]);

        let all = store.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].psi_score, 90.0);
        assert_eq!(all[0].risk_level, RiskTier::Crisis);
        assert_eq!(all[1], country(2, "Bravo", 60.0));
    }

    #[test]
    fn unknown_ids_leave_the_store_untouched() {
        let store = seeded();
        let before = store.get_all();
        let seq = store.revision().seq;

        let outcome = store.patch(&[CountryPatch::score(CountryId(99), 50.0)]);
        assert_eq!(outcome.unknown, vec![CountryId(99)]);
        assert!(!outcome.changed());
        assert_eq!(store.get_all(), before);
        assert_eq!(store.revision().seq, seq);
    }

    #[test]
    fn explicit_tier_is_kept_when_supplied() {
        let store = seeded();
        store.patch(&[CountryPatch::score(CountryId(2), 70.5).with_risk_level(RiskTier::High)]);
        let c = store.get(CountryId(2)).unwrap();
        assert_eq!((c.psi_score, c.risk_level), (70.5, RiskTier::High));

        store.patch(&[CountryPatch::new(CountryId(2)).with_risk_level(RiskTier::Crisis)]);
        let c = store.get(CountryId(2)).unwrap();
        assert_eq!((c.psi_score, c.risk_level), (70.5, RiskTier::Crisis));
    }

    #[test]
    fn out_of_range_scores_are_rejected_individually() {
        let store = seeded();
        let outcome = store.patch(&[
            CountryPatch::score(CountryId(1), 101.0),
            CountryPatch::score(CountryId(2), f64::NAN),
            CountryPatch::score(CountryId(2), 45.0),
        ]);
        assert_eq!(outcome.rejected, vec![CountryId(1), CountryId(2)]);
        assert_eq!(outcome.applied, vec![CountryId(2)]);
        assert_eq!(store.get(CountryId(1)).unwrap().psi_score, 20.0);
        assert_eq!(store.get(CountryId(2)).unwrap().risk_level, RiskTier::Moderate);
    }

    #[test]
    fn empty_patch_entries_do_not_bump_revision() {
        let store = seeded();
        let seq = store.revision().seq;
        let outcome = store.patch(&[CountryPatch::new(CountryId(1))]);
        assert!(outcome.applied.is_empty());
        assert_eq!(store.revision().seq, seq);
    }

    #[test]
    fn replace_all_keeps_last_duplicate_and_drops_missing() {
        let store = seeded();
        store.replace_all(vec![country(2, "Bravo", 10.0), country(2, "Bravo", 77.0)]);
        let all = store.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].psi_score, 77.0);
        assert!(store.get(CountryId(1)).is_none());
        assert_eq!(store.revision().change, StoreChange::Replaced { countries: 1 });
    }

    #[test]
    fn get_all_is_ordered_by_id() {
        let store = SnapshotStore::new();
        store.replace_all(vec![
            country(30, "Charlie", 1.0),
            country(4, "Delta", 2.0),
            country(17, "Echo", 3.0),
        ]);
        let ids: Vec<u64> = store.get_all().iter().map(|c| c.id.get()).collect();
        assert_eq!(ids, vec![4, 17, 30]);
    }

    #[test]
    fn revision_travels_with_its_records() {
        let store = SnapshotStore::new();
        store.replace_all(vec![country(1, "Alpha", 10.0)]);
        store.patch(&[CountryPatch::score(CountryId(1), 90.0)]);

        let (revision, countries) = store.get_all_with_revision();
        assert_eq!(revision, store.revision());
        assert_eq!(revision.change, StoreChange::Patched { applied: 1 });
        assert_eq!(countries[0].psi_score, 90.0);
    }

    #[test]
    fn returned_records_are_copies() {
        let store = seeded();
        let mut all = store.get_all();
        all[0].psi_score = 99.0;
        all[0].name.push_str(" (edited)");
        assert_eq!(store.get(CountryId(1)).unwrap(), country(1, "Alpha", 20.0));
    }

    #[test]
    fn leaderboard_orders_by_score_then_id() {
        let store = SnapshotStore::new();
        store.replace_all(vec![
            country(5, "Foxtrot", 40.0),
            country(2, "Golf", 88.0),
            country(9, "Hotel", 40.0),
            country(1, "India", 12.0),
        ]);
        let board = store.leaderboard(3);
        let rows: Vec<(u32, u64)> = board.iter().map(|e| (e.rank, e.country_id.get())).collect();
        assert_eq!(rows, vec![(1, 2), (2, 5), (3, 9)]);
        assert_eq!(board[0].risk_level, RiskTier::Crisis);
    }

    #[test]
    fn elections_are_replaced_wholesale() {
        let store = seeded();
        let election = UpcomingElection {
            country_id: CountryId(2),
            country_name: "Bravo".into(),
            iso_code: "BRA".into(),
            days_remaining: 30,
            kind: "general".into(),
            psi_score: 60.0,
            risk_level: "Elevated".into(),
        };
        store.replace_elections(vec![election.clone()]);
        assert_eq!(store.upcoming_elections(), vec![election]);
        store.replace_elections(Vec::new());
        assert!(store.upcoming_elections().is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_each_mutation() {
        let store = seeded();
        let mut rx = store.subscribe();
        let writer = store.clone();

        writer.patch(&[CountryPatch::score(CountryId(1), 33.0)]);
        rx.changed().await.unwrap();
        let rev = *rx.borrow_and_update();
        assert_eq!(rev.change, StoreChange::Patched { applied: 1 });
        assert_eq!(rev, store.revision());
        assert_eq!(store.get(CountryId(1)).unwrap().risk_level, RiskTier::Moderate);
    }
}
