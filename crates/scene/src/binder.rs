//! Keeps the render-side hotspot set in step with the store.

use catalog::{SnapshotStore, StoreRevision};
use foundation::CountryId;
use runtime::{Event, EventBus, Metrics};
use tokio::sync::watch;
use tracing::debug;

use crate::hotspot::{BinderConfig, HotspotSet};
use crate::picking::{self, PickOptions, Ray};
use crate::selection::SelectionEvent;

/// Projection of the store into renderable, pickable hotspots.
///
/// The binder never writes to the store. Every store revision rebuilds the
/// whole hotspot set; picks always resolve against the store itself, so a
/// selection reflects the latest data even between rebuilds.
pub struct SceneBinder {
    store: SnapshotStore,
    config: BinderConfig,
    updates: watch::Receiver<StoreRevision>,
    hotspots: HotspotSet,
    selected: Option<CountryId>,
    events: EventBus<SelectionEvent>,
    metrics: Metrics,
}

impl SceneBinder {
    pub fn new(store: SnapshotStore, config: BinderConfig) -> Self {
        let updates = store.subscribe();
        let mut binder = Self {
            store,
            config,
            updates,
            hotspots: HotspotSet::default(),
            selected: None,
            events: EventBus::new(),
            metrics: Metrics::new(),
        };
        binder.rebuild();
        binder
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    pub fn hotspots(&self) -> &HotspotSet {
        &self.hotspots
    }

    /// Frame-driven hosts call this once per frame. Returns true when the
    /// hotspot set was rebuilt.
    pub fn sync(&mut self) -> bool {
        match self.updates.has_changed() {
            Ok(true) => {
                self.rebuild();
                true
            }
            _ => false,
        }
    }

    /// Wait for the next store revision and rebuild.
    pub async fn changed(&mut self) -> &HotspotSet {
        if self.updates.changed().await.is_ok() {
            self.rebuild();
        }
        &self.hotspots
    }

    fn rebuild(&mut self) {
        self.updates.mark_unchanged();
        let (revision, countries) = self.store.get_all_with_revision();
        self.hotspots = HotspotSet::build(&countries, &self.config, revision.seq);

        for (id, err) in &self.hotspots.excluded {
            debug!(%id, error = %err, "country excluded from globe");
        }
        self.metrics.inc("scene.rebuilds");
        self.metrics
            .set_gauge("scene.hotspots", self.hotspots.len() as i64);
        self.metrics
            .set_gauge("scene.excluded", self.hotspots.excluded.len() as i64);

        if let Some(id) = self.selected {
            if self.store.get(id).is_none() {
                debug!(%id, "selected country left the snapshot");
                self.emit(SelectionEvent::deselected(Some(id)));
            }
        }
    }

    /// Select by id. Unknown ids resolve to a deselect rather than an error.
    pub fn pick(&mut self, id: CountryId) -> SelectionEvent {
        let event = match self.store.get(id) {
            Some(country) => SelectionEvent::selected(country),
            None => {
                self.metrics.inc("scene.pick_misses");
                debug!(%id, "pick target not in store");
                SelectionEvent::deselected(Some(id))
            }
        };
        self.emit(event.clone());
        event
    }

    pub fn deselect(&mut self) -> SelectionEvent {
        let event = SelectionEvent::deselected(None);
        self.emit(event.clone());
        event
    }

    /// Pick the nearest hotspot along `ray`. A ray that hits nothing emits
    /// no event.
    pub fn pick_ray(&mut self, ray: Ray) -> Option<SelectionEvent> {
        let hit = picking::pick_ray(&self.hotspots, &self.config, ray, PickOptions::default())?;
        Some(self.pick(hit.id))
    }

    /// Current selection, read from the store.
    pub fn selected(&self) -> Option<catalog::CountryRisk> {
        self.selected.and_then(|id| self.store.get(id))
    }

    pub fn events(&self) -> &EventBus<SelectionEvent> {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event<SelectionEvent>> {
        self.events.drain()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn emit(&mut self, event: SelectionEvent) {
        self.selected = event.country.as_ref().map(|c| c.id);
        self.events.emit(event.kind(), event);
    }
}
