use crate::risk::{PSI_MAX, PSI_MIN, RiskTier};

/// Hotspot weight at a PSI of 0; weight grows linearly to 1.0 at 100.
pub const MIN_HOTSPOT_SCALE: f32 = 0.5;

/// Halo radius relative to the hotspot core.
pub const HALO_SCALE: f32 = 1.25;

/// Tier palette as linear RGBA, matching the dashboard's risk legend.
pub fn tier_color(tier: RiskTier) -> [f32; 4] {
    match tier {
        RiskTier::Stable => rgb_hex(0x22c55e),
        RiskTier::Moderate => rgb_hex(0xeab308),
        RiskTier::Elevated => rgb_hex(0xf97316),
        RiskTier::High => rgb_hex(0xef4444),
        RiskTier::Crisis => rgb_hex(0xdc2626),
    }
}

fn rgb_hex(hex: u32) -> [f32; 4] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
        1.0,
    ]
}

/// Visual weight for a PSI score: 0.5 at 0, 1.0 at 100.
///
/// Out-of-range scores are clamped here (weight only, the score itself is
/// never rewritten) so a bad value cannot blow a hotspot up.
pub fn hotspot_scale(psi_score: f64) -> f32 {
    let t = if psi_score.is_nan() {
        0.0
    } else {
        ((psi_score - PSI_MIN) / (PSI_MAX - PSI_MIN)).clamp(0.0, 1.0)
    };
    MIN_HOTSPOT_SCALE + (t as f32) * (1.0 - MIN_HOTSPOT_SCALE)
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HotspotStyle {
    pub color: [f32; 4],
    pub scale: f32,
    /// Most severe tier only: draw the pulsing halo.
    pub pulsing: bool,
    pub halo_scale: f32,
}

impl HotspotStyle {
    pub fn for_risk(tier: RiskTier, psi_score: f64) -> Self {
        let pulsing = tier.is_most_severe();
        Self {
            color: tier_color(tier),
            scale: hotspot_scale(psi_score),
            pulsing,
            halo_scale: if pulsing { HALO_SCALE } else { 0.0 },
        }
    }
}
