// This file is part of Terrella.
//
// Terrella is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Terrella is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Terrella.  If not, see <http://www.gnu.org/licenses/>.
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

pub const WGS84_RADIUS_EQUATOR: f64 = 6_378_137.0;
pub const WGS84_RADIUS_POLAR: f64 = 6_356_752.314_245_179;

/// The geodetic shape of the planet: the transform between (latitude,
/// longitude, height) and earth-centered earth-fixed cartesian space, plus
/// the local east-north-up frame used to place objects on the surface.
///
/// Degrees at this boundary; radians internally. Latitudes outside
/// [-90, 90] are a programmer error and fail fast.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LandModel {
    Sphere { radius: f64 },
    Ellipsoid { equator: f64, polar: f64 },
}

impl LandModel {
    pub fn wgs84() -> Self {
        LandModel::Ellipsoid {
            equator: WGS84_RADIUS_EQUATOR,
            polar: WGS84_RADIUS_POLAR,
        }
    }

    pub fn sphere(radius: f64) -> Self {
        LandModel::Sphere { radius }
    }

    pub fn radius_equator(&self) -> f64 {
        match self {
            LandModel::Sphere { radius } => *radius,
            LandModel::Ellipsoid { equator, .. } => *equator,
        }
    }

    pub fn radius_polar(&self) -> f64 {
        match self {
            LandModel::Sphere { radius } => *radius,
            LandModel::Ellipsoid { polar, .. } => *polar,
        }
    }

    fn eccentricity_squared(&self) -> f64 {
        let a = self.radius_equator();
        let b = self.radius_polar();
        (a * a - b * b) / (a * a)
    }

    /// Geodetic (degrees, meters above the datum) to cartesian.
    pub fn lat_lon_height_to_xyz(&self, lat: f64, lon: f64, height: f64) -> Point3<f64> {
        assert!((-90. ..=90.).contains(&lat), "latitude out of range: {}", lat);
        let phi = lat.to_radians();
        let lambda = lon.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_lambda, cos_lambda) = lambda.sin_cos();

        let e2 = self.eccentricity_squared();
        let a = self.radius_equator();
        // Prime-vertical radius of curvature.
        let n = a / (1. - e2 * sin_phi * sin_phi).sqrt();

        Point3::new(
            (n + height) * cos_phi * cos_lambda,
            (n + height) * cos_phi * sin_lambda,
            (n * (1. - e2) + height) * sin_phi,
        )
    }

    /// Cartesian to geodetic (degrees, meters). Uses the closed-form
    /// Bowring approximation; sub-centimeter everywhere we care about.
    pub fn xyz_to_lat_lon_height(&self, point: &Point3<f64>) -> (f64, f64, f64) {
        let (x, y, z) = (point.x, point.y, point.z);
        let a = self.radius_equator();
        let b = self.radius_polar();
        let p = (x * x + y * y).sqrt();

        if let LandModel::Sphere { radius } = self {
            let r = (p * p + z * z).sqrt();
            let lat = (z / r).asin().to_degrees();
            let lon = y.atan2(x).to_degrees();
            return (lat, lon, r - radius);
        }

        let e2 = self.eccentricity_squared();
        let ep2 = (a * a - b * b) / (b * b);
        let theta = (z * a).atan2(p * b);
        let (sin_theta, cos_theta) = theta.sin_cos();
        let phi = (z + ep2 * b * sin_theta.powi(3)).atan2(p - e2 * a * cos_theta.powi(3));
        let lambda = y.atan2(x);
        let sin_phi = phi.sin();
        let n = a / (1. - e2 * sin_phi * sin_phi).sqrt();
        let height = p / phi.cos() - n;

        (phi.to_degrees(), lambda.to_degrees(), height)
    }

    /// Matrix taking local coordinates at (lat, lon, height) into world
    /// coordinates: columns are the heading-rotated east and north axes and
    /// local up, translation is the surface point.
    pub fn planet_rotation_matrix(
        &self,
        lat: f64,
        lon: f64,
        height: f64,
        heading: f64,
    ) -> Matrix4<f64> {
        let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon.to_radians().sin_cos();

        let east = Vector3::new(-sin_lon, cos_lon, 0.);
        let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);

        let (sin_azim, cos_azim) = heading.to_radians().sin_cos();
        let x = east * cos_azim - north * sin_azim;
        let y = east * sin_azim + north * cos_azim;
        let z = x.cross(&y);

        let p = self.lat_lon_height_to_xyz(lat, lon, height);

        Matrix4::new(
            x[0], y[0], z[0], p[0], //
            x[1], y[1], z[1], p[1], //
            x[2], y[2], z[2], p[2], //
            0., 0., 0., 1.,
        )
    }

    /// Geodetic surface normal (local up) in world coordinates.
    pub fn up(&self, lat: f64, lon: f64) -> Vector3<f64> {
        let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
        Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::{assert_relative_eq, relative_eq};

    #[test]
    fn test_equator_points_along_x() {
        let land = LandModel::wgs84();
        let p = land.lat_lon_height_to_xyz(0., 0., 0.);
        assert_relative_eq!(p.x, WGS84_RADIUS_EQUATOR, max_relative = 1e-12);
        assert_relative_eq!(p.y, 0.);
        assert_relative_eq!(p.z, 0.);

        let pole = land.lat_lon_height_to_xyz(90., 0., 0.);
        assert_relative_eq!(pole.z, WGS84_RADIUS_POLAR, max_relative = 1e-12);
        assert!(pole.x.abs() < 1e-6);
    }

    fn roundtrip(land: &LandModel, lat: f64, lon: f64, height: f64) -> bool {
        let p = land.lat_lon_height_to_xyz(lat, lon, height);
        let (lat1, lon1, h1) = land.xyz_to_lat_lon_height(&p);
        let p1 = land.lat_lon_height_to_xyz(lat1, lon1, h1);
        // Positional error is the meaningful measure; longitude is
        // degenerate at the poles.
        (p1 - p).norm() < 0.01 && relative_eq!(h1, height, epsilon = 0.01)
    }

    #[test]
    fn test_roundtrip_below_eighty_degrees() {
        let land = LandModel::wgs84();
        for lat in (-80..=80).step_by(4) {
            for lon in (-180..180).step_by(12) {
                assert!(
                    roundtrip(&land, lat as f64, lon as f64, 123.),
                    "roundtrip failed at ({}, {})",
                    lat,
                    lon
                );
            }
        }
    }

    #[test]
    fn test_roundtrip_sphere() {
        let land = LandModel::sphere(6_378_137.);
        for lat in (-88..=88).step_by(8) {
            assert!(roundtrip(&land, lat as f64, 45., 1000.));
        }
    }

    #[test]
    fn test_rotation_frame_at_origin() {
        let land = LandModel::wgs84();
        let m = land.planet_rotation_matrix(0., 0., 0., 0.);
        // At (0, 0): east is +y, north is +z, up is +x.
        assert_relative_eq!(m[(0, 0)], 0., epsilon = 1e-12);
        assert_relative_eq!(m[(1, 0)], 1., epsilon = 1e-12);
        assert_relative_eq!(m[(2, 1)], 1., epsilon = 1e-12);
        assert_relative_eq!(m[(0, 2)], 1., epsilon = 1e-12);
        assert_relative_eq!(m[(0, 3)], WGS84_RADIUS_EQUATOR, max_relative = 1e-12);
    }

    #[test]
    fn test_heading_rotates_about_up() {
        let land = LandModel::wgs84();
        let m = land.planet_rotation_matrix(0., 0., 0., 90.);
        // With a 90 degree heading the x axis becomes -north.
        assert_relative_eq!(m[(2, 0)], -1., epsilon = 1e-12);
        assert_relative_eq!(m[(1, 1)], 1., epsilon = 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_latitude_out_of_range_fails_fast() {
        LandModel::wgs84().lat_lon_height_to_xyz(90.5, 0., 0.);
    }
}
