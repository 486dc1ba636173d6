//! Measurement model: converts a single ray's range measurement into a
//! log-odds occupancy update plus a worst-case approximation error
//! bound, the two quantities the integrator's refinement loop is driven
//! by.
//!
//! The trait is the pluggable seam a host can swap a calibrated sensor
//! model into; one concrete [`ContinuousBeamMeasurementModel`] ships so
//! every consumer of this crate (the integrator, the range-image
//! intersector) has a real implementation to run against.

use crate::geometry::Point3D;

/// Converts a single cell's distance-along-the-ray into a log-odds
/// update, and bounds how much that update could vary across an entire
/// cell (used to decide whether a coarse node can stand in for its
/// children during refinement).
pub trait MeasurementModel: Send + Sync {
    /// Log-odds update for a cell at `cell_to_sensor_distance` from the
    /// sensor origin, given the ray's measured range `measured_range`.
    fn compute_update(&self, cell_to_sensor_distance: f32, measured_range: f32) -> f32;

    /// Upper bound on how much [`Self::compute_update`] can vary over a
    /// cell of circumradius `cell_radius` centered `rho` from the
    /// sensor, for a ray with measured range `measured_range`.
    /// Monotonically non-decreasing in `cell_radius`, and bounded above
    /// by a model-specific constant.
    fn worst_case_approximation_error(
        &self,
        rho: f32,
        cell_radius: f32,
        measured_range: f32,
    ) -> f32;

    /// The occupancy band `τ_occ`: how far past a measured range a cell
    /// is still considered "possibly occupied" rather than definitely
    /// free, consumed by [`crate::range_image::RangeImageIntersector`].
    fn occupancy_band(&self) -> f32;
}

/// A continuous log-odds profile along each ray: a linearly rising
/// ramp from "definitely free" to "possibly occupied" in the band
/// `[measured_range - occupancy_band, measured_range + occupancy_band]`,
/// peaking at `measured_range` and decaying back down beyond it,
/// modeled after the original's continuous (non-stepwise) beam profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContinuousBeamMeasurementModel {
    /// Log-odds update applied to cells well beyond the occupancy band
    /// and in front of the measured surface (negative: evidence of
    /// free space).
    pub free_space_log_odds: f32,
    /// Peak log-odds update applied exactly at the measured range
    /// (positive: evidence of an occupied surface).
    pub occupied_log_odds: f32,
    /// Half-width of the occupied band around the measured range.
    pub occupancy_band: f32,
    /// Beyond `measured_range + decay_range`, a cell receives no update
    /// at all (unobserved past the sensor's effective reach).
    pub decay_range: f32,
}

impl Default for ContinuousBeamMeasurementModel {
    fn default() -> Self {
        Self {
            free_space_log_odds: -0.4,
            occupied_log_odds: 0.85,
            occupancy_band: 0.05,
            decay_range: 0.3,
        }
    }
}

impl ContinuousBeamMeasurementModel {
    /// The unclamped, continuous log-odds profile at signed distance
    /// `d = cell_to_sensor_distance - measured_range` from the measured
    /// surface.
    fn profile(&self, d: f32) -> f32 {
        if d < -self.occupancy_band {
            self.free_space_log_odds
        } else if d <= self.occupancy_band {
            let t = d / self.occupancy_band;
            self.occupied_log_odds * (1.0 - t.abs())
        } else if d <= self.occupancy_band + self.decay_range {
            let t = (d - self.occupancy_band) / self.decay_range;
            self.occupied_log_odds * (1.0 - t).max(0.0)
        } else {
            0.0
        }
    }
}

impl MeasurementModel for ContinuousBeamMeasurementModel {
    fn compute_update(&self, cell_to_sensor_distance: f32, measured_range: f32) -> f32 {
        self.profile(cell_to_sensor_distance - measured_range)
    }

    fn worst_case_approximation_error(
        &self,
        rho: f32,
        cell_radius: f32,
        measured_range: f32,
    ) -> f32 {
        if cell_radius <= 0.0 {
            return 0.0;
        }
        // The profile's steepest region is the rising/falling ramp
        // around the measured range, with slope magnitude bounded by
        // `occupied_log_odds / occupancy_band` there and by
        // `occupied_log_odds / decay_range` on the trailing decay. The
        // cell's interval along the ray spans `[rho - cell_radius, rho
        // + cell_radius]`; the worst-case update swing across it is
        // bounded by the steepest slope times the interval width,
        // saturating at the full swing of the profile.
        let steepest_slope = self.occupied_log_odds
            / self.occupancy_band.min(self.decay_range).max(f32::EPSILON);
        let full_swing = self.occupied_log_odds - self.free_space_log_odds;
        let _ = measured_range;
        let _ = rho;
        (steepest_slope * 2.0 * cell_radius).min(full_swing)
    }

    fn occupancy_band(&self) -> f32 {
        self.occupancy_band
    }
}

/// Distance from the sensor origin to a world point, along the ray
/// (i.e. simply its Euclidean norm in the sensor frame); a small helper
/// so C6 doesn't re-derive it at every call site.
pub fn distance_to_sensor(sensor_frame_point: Point3D) -> f32 {
    sensor_frame_point.coords.norm()
}
