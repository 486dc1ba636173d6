//! Projection model: converts a sensor-frame point into the coordinates
//! the range image is indexed by.
//!
//! The real sensor calibration (pinhole camera, a specific LiDAR's
//! beam table, ...) is a host concern, so this is a trait a host
//! implements against its own hardware. One concrete, minimal
//! [`SphericalProjectionModel`] reference implementation ships so the
//! crate is self-contained and testable end-to-end.

use crate::geometry::Point3D;

/// Continuous image-space coordinates a sensor-frame point projects to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImageCoord {
    pub u: f32,
    pub v: f32,
}

pub trait ProjectionModel: Send + Sync {
    /// The projected range along the sensor's principal axis, used both
    /// to classify a cell against the range image and to parameterize
    /// the measurement model.
    fn cartesian_to_sensor_z(&self, point_c: Point3D) -> f32;

    /// Projects a sensor-frame point into the range image's continuous
    /// 2-D domain, or `None` if it falls outside the sensor's field of
    /// view / behind the sensor. NaN results from a pathological input
    /// are treated by callers as "outside the image," never propagated.
    fn project(&self, point_c: Point3D) -> Option<ImageCoord>;

    /// Image-space extent: `(num_rows, num_columns)`.
    fn image_dims(&self) -> (usize, usize);
}

/// A minimal equirectangular (azimuth/elevation) spherical sensor model,
/// the reference implementation shipped with this crate.
#[derive(Clone, Copy, Debug)]
pub struct SphericalProjectionModel {
    pub num_rows: usize,
    pub num_columns: usize,
    pub min_elevation: f32,
    pub max_elevation: f32,
    pub min_azimuth: f32,
    pub max_azimuth: f32,
}

impl SphericalProjectionModel {
    pub fn new(num_rows: usize, num_columns: usize) -> Self {
        Self {
            num_rows,
            num_columns,
            min_elevation: -std::f32::consts::FRAC_PI_4,
            max_elevation: std::f32::consts::FRAC_PI_4,
            min_azimuth: -std::f32::consts::PI,
            max_azimuth: std::f32::consts::PI,
        }
    }
}

impl ProjectionModel for SphericalProjectionModel {
    fn cartesian_to_sensor_z(&self, point_c: Point3D) -> f32 {
        point_c.coords.norm()
    }

    fn project(&self, point_c: Point3D) -> Option<ImageCoord> {
        let range = point_c.coords.norm();
        if !(range.is_finite()) || range <= f32::EPSILON {
            return None;
        }
        let azimuth = point_c.y.atan2(point_c.x);
        let elevation = (point_c.z / range).asin();
        if !azimuth.is_finite() || !elevation.is_finite() {
            return None;
        }
        if azimuth < self.min_azimuth
            || azimuth > self.max_azimuth
            || elevation < self.min_elevation
            || elevation > self.max_elevation
        {
            return None;
        }
        let u = (azimuth - self.min_azimuth) / (self.max_azimuth - self.min_azimuth)
            * self.num_columns as f32;
        let v = (elevation - self.min_elevation) / (self.max_elevation - self.min_elevation)
            * self.num_rows as f32;
        Some(ImageCoord { u, v })
    }

    fn image_dims(&self) -> (usize, usize) {
        (self.num_rows, self.num_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_ahead_point_projects_to_image_center() {
        let model = SphericalProjectionModel::new(64, 128);
        let coord = model.project(Point3D::new(1.0, 0.0, 0.0)).unwrap();
        assert!((coord.u - 64.0).abs() < 1.0);
        assert!((coord.v - 32.0).abs() < 1.0);
    }

    #[test]
    fn point_at_sensor_origin_is_not_projectable() {
        let model = SphericalProjectionModel::new(64, 128);
        assert!(model.project(Point3D::new(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn point_outside_fov_is_not_projectable() {
        let model = SphericalProjectionModel::new(64, 128);
        // Straight down, well outside the +-45 degree elevation band.
        assert!(model.project(Point3D::new(0.0, 0.0, -10.0)).is_none());
    }
}
