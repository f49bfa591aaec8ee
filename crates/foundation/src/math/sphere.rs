//! Geographic → globe-space projection for the render sphere.
//!
//! The globe texture is equirectangular with its seam on the antimeridian, so
//! longitude is offset by +180° before it becomes the azimuth. Changing that
//! offset rotates every hotspot away from the landmass it belongs to.

use std::f64::consts::PI;

use thiserror::Error;

use super::Vec3;

pub const LAT_RANGE_DEG: (f64, f64) = (-90.0, 90.0);
pub const LON_RANGE_DEG: (f64, f64) = (-180.0, 180.0);

/// Longitude offset aligning the texture seam with the antimeridian.
pub const TEXTURE_SEAM_OFFSET_DEG: f64 = 180.0;

#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum InvalidCoordinate {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
    #[error("radius {0} must be finite and non-negative")]
    Radius(f64),
}

/// Geographic coordinates in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    pub fn validate(self) -> Result<Self, InvalidCoordinate> {
        let (lat_min, lat_max) = LAT_RANGE_DEG;
        let (lon_min, lon_max) = LON_RANGE_DEG;
        // NaN fails both range checks.
        if !(lat_min..=lat_max).contains(&self.lat_deg) {
            return Err(InvalidCoordinate::Latitude(self.lat_deg));
        }
        if !(lon_min..=lon_max).contains(&self.lon_deg) {
            return Err(InvalidCoordinate::Longitude(self.lon_deg));
        }
        Ok(self)
    }

    pub fn project(self, radius: f64) -> Result<Vec3, InvalidCoordinate> {
        project(self.lat_deg, self.lon_deg, radius)
    }
}

/// Project `(lat, lon)` in degrees onto a sphere of `radius` centered at the origin.
///
/// `y` is the polar axis. Inputs outside the geographic domain are rejected,
/// never clamped.
pub fn project(lat_deg: f64, lon_deg: f64, radius: f64) -> Result<Vec3, InvalidCoordinate> {
    GeoPoint::new(lat_deg, lon_deg).validate()?;
    if !radius.is_finite() || radius < 0.0 {
        return Err(InvalidCoordinate::Radius(radius));
    }

    let phi = (90.0 - lat_deg) * (PI / 180.0);
    let theta = (lon_deg + TEXTURE_SEAM_OFFSET_DEG) * (PI / 180.0);

    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();

    Ok(Vec3::new(
        radius * sin_phi * cos_theta,
        radius * cos_phi,
        radius * sin_phi * sin_theta,
    ))
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, InvalidCoordinate, project};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn north_pole_is_on_polar_axis() {
        let p = project(90.0, 0.0, 1.0).unwrap();
        assert_close(p.x, 0.0, 1e-12);
        assert_close(p.y, 1.0, 1e-12);
        assert_close(p.z, 0.0, 1e-12);
    }

    #[test]
    fn prime_meridian_faces_negative_x() {
        // theta = 180° for lon 0, so the Greenwich meridian sits on -X.
        let p = project(0.0, 0.0, 2.0).unwrap();
        assert_close(p.x, -2.0, 1e-12);
        assert_close(p.y, 0.0, 1e-12);
        assert_close(p.z, 0.0, 1e-12);
    }

    #[test]
    fn antimeridian_sides_coincide() {
        let east = project(12.5, 180.0, 1.0).unwrap();
        let west = project(12.5, -180.0, 1.0).unwrap();
        assert_close(east.x, west.x, 1e-12);
        assert_close(east.y, west.y, 1e-12);
        assert_close(east.z, west.z, 1e-12);
    }

    #[test]
    fn points_lie_on_the_sphere() {
        let radius = 1.02;
        let mut lat = -90.0;
        while lat <= 90.0 {
            let mut lon = -180.0;
            while lon <= 180.0 {
                let p = project(lat, lon, radius).unwrap();
                assert_close(p.length(), radius, 1e-12);
                lon += 7.5;
            }
            lat += 7.5;
        }
    }

    #[test]
    fn out_of_domain_inputs_are_rejected() {
        assert_eq!(
            project(90.5, 0.0, 1.0),
            Err(InvalidCoordinate::Latitude(90.5))
        );
        assert_eq!(
            project(0.0, -180.25, 1.0),
            Err(InvalidCoordinate::Longitude(-180.25))
        );
        assert!(matches!(
            project(f64::NAN, 0.0, 1.0),
            Err(InvalidCoordinate::Latitude(_))
        ));
        assert_eq!(project(0.0, 0.0, -1.0), Err(InvalidCoordinate::Radius(-1.0)));
    }

    #[test]
    fn geo_point_projects_like_free_function() {
        let p = GeoPoint::new(48.85, 2.35).project(1.0).unwrap();
        assert_eq!(p, project(48.85, 2.35, 1.0).unwrap());
    }
}
