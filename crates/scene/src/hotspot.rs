use catalog::CountryRisk;
use foundation::CountryId;
use foundation::math::{InvalidCoordinate, Vec3};
use layers::{HotspotStyle, RiskTier};

/// Globe-space layout parameters for hotspots.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BinderConfig {
    pub globe_radius: f64,
    /// Fraction of the radius hotspots float above the surface.
    pub lift: f64,
    /// Pick/draw radius of a hotspot at scale 1.0, in globe units.
    pub base_size: f64,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            globe_radius: 1.0,
            lift: 0.02,
            base_size: 0.02,
        }
    }
}

impl BinderConfig {
    pub fn hotspot_radius(&self) -> f64 {
        self.globe_radius * (1.0 + self.lift)
    }
}

/// Render-ready view of one country. Rebuilt from the store, never edited.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderHotspot {
    pub id: CountryId,
    pub position: Vec3,
    pub color: [f32; 4],
    pub scale: f32,
    pub pulsing: bool,
    pub halo_scale: f32,
    pub risk_level: RiskTier,
    pub psi_score: f64,
}

impl RenderHotspot {
    pub fn from_country(country: &CountryRisk, config: &BinderConfig) -> Result<Self, InvalidCoordinate> {
        let position = country.geo().project(config.hotspot_radius())?;
        let style = HotspotStyle::for_risk(country.risk_level, country.psi_score);
        Ok(Self {
            id: country.id,
            position,
            color: style.color,
            scale: style.scale,
            pulsing: style.pulsing,
            halo_scale: style.halo_scale,
            risk_level: country.risk_level,
            psi_score: country.psi_score,
        })
    }

    pub fn pick_radius(&self, config: &BinderConfig) -> f64 {
        config.base_size * self.scale as f64
    }
}

/// Hotspots in ascending id order plus the countries left out of the frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotspotSet {
    pub hotspots: Vec<RenderHotspot>,
    pub excluded: Vec<(CountryId, InvalidCoordinate)>,
    /// Store revision the set was built from.
    pub revision: u64,
}

impl HotspotSet {
    pub fn build(countries: &[CountryRisk], config: &BinderConfig, revision: u64) -> Self {
        let mut set = Self {
            hotspots: Vec::with_capacity(countries.len()),
            excluded: Vec::new(),
            revision,
        };
        for country in countries {
            match RenderHotspot::from_country(country, config) {
                Ok(h) => set.hotspots.push(h),
                Err(e) => set.excluded.push((country.id, e)),
            }
        }
        set.hotspots.sort_by_key(|h| h.id);
        set
    }

    pub fn get(&self, id: CountryId) -> Option<&RenderHotspot> {
        self.hotspots
            .binary_search_by_key(&id, |h| h.id)
            .ok()
            .map(|i| &self.hotspots[i])
    }

    pub fn len(&self) -> usize {
        self.hotspots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hotspots.is_empty()
    }

    pub fn pulsing(&self) -> impl Iterator<Item = &RenderHotspot> + '_ {
        self.hotspots.iter().filter(|h| h.pulsing)
    }
}
