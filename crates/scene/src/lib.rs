pub mod binder;
pub mod hotspot;
pub mod picking;
pub mod selection;

pub use binder::SceneBinder;
pub use hotspot::{BinderConfig, HotspotSet, RenderHotspot};
pub use picking::{PickHit, PickOptions, Ray};
pub use selection::SelectionEvent;
