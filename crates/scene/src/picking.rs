use foundation::CountryId;
use foundation::math::Vec3;
use foundation::math::precision::stable_total_cmp_f64;

use crate::hotspot::{BinderConfig, HotspotSet};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub id: CountryId,
    pub distance: f64,
    pub point: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    pub max_distance: f64,
    /// Ignore hotspots hidden behind the opaque globe.
    pub occlude_by_globe: bool,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            max_distance: 1.0e30,
            occlude_by_globe: true,
        }
    }
}

/// Ray picking against hotspot spheres.
///
/// Each hotspot is a sphere of radius `base_size * scale` around its
/// position. The closest hit along the normalized ray wins; equal distances
/// go to the lower id.
pub fn pick_ray(
    set: &HotspotSet,
    config: &BinderConfig,
    ray: Ray,
    opts: PickOptions,
) -> Option<PickHit> {
    let dir = ray.dir.normalized()?;
    let ray = Ray::new(ray.origin, dir);

    let mut t_max = opts.max_distance;
    if opts.occlude_by_globe {
        if let Some(t_globe) = ray_sphere_hit_t(ray, Vec3::ZERO, config.globe_radius, t_max) {
            t_max = t_globe;
        }
    }

    let mut best: Option<(f64, CountryId)> = None;
    for hotspot in &set.hotspots {
        let radius = hotspot.pick_radius(config);
        let Some(t) = ray_sphere_hit_t(ray, hotspot.position, radius, t_max) else {
            continue;
        };
        best = match best {
            None => Some((t, hotspot.id)),
            Some((bt, bid)) => {
                let ord = stable_total_cmp_f64(t, bt).then_with(|| hotspot.id.cmp(&bid));
                if ord.is_lt() {
                    Some((t, hotspot.id))
                } else {
                    Some((bt, bid))
                }
            }
        };
    }

    let (t, id) = best?;
    Some(PickHit {
        id,
        distance: t,
        point: ray.at(t),
    })
}

/// Screen picking wrapper. The caller maps pixels to a world ray.
pub fn pick_screen<F>(
    set: &HotspotSet,
    config: &BinderConfig,
    x_px: f64,
    y_px: f64,
    mut make_ray: F,
    opts: PickOptions,
) -> Option<PickHit>
where
    F: FnMut(f64, f64) -> Option<Ray>,
{
    let ray = make_ray(x_px, y_px)?;
    pick_ray(set, config, ray, opts)
}

/// Entry distance of a unit-direction ray into a sphere, clamped to 0 when
/// the origin is inside.
fn ray_sphere_hit_t(ray: Ray, center: Vec3, radius: f64, t_max: f64) -> Option<f64> {
    if radius.is_nan() || radius <= 0.0 {
        return None;
    }
    let oc = ray.origin - center;
    let b = oc.dot(ray.dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let far = -b + sq;
    if far < 0.0 {
        return None;
    }
    let t = (-b - sq).max(0.0);
    (t <= t_max).then_some(t)
}
