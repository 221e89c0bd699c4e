use serde::Serialize;

use crate::consts::EPSILON;

use super::components::{ComponentStats, Moments};

/// Shape of one retained streak, derived from the second central moments of
/// its pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StreakGeometry {
    /// Centroid row.
    pub centroid_row: f64,
    /// Centroid column.
    pub centroid_col: f64,
    /// Full major axis length in pixels (4 * sqrt of the larger eigenvalue).
    pub major_axis: f64,
    /// Full minor axis length in pixels.
    pub minor_axis: f64,
    /// Angle of the major axis in radians, measured from the column axis
    /// towards increasing rows. Range (-pi/2, pi/2].
    pub orientation: f64,
    /// major / minor.
    pub aspect_ratio: f64,
    pub pixel_count: usize,
}

impl StreakGeometry {
    pub fn from_component(component: &ComponentStats) -> Self {
        Self::from_moments(&component.moments)
    }

    pub fn from_moments(moments: &Moments) -> Self {
        let (centroid_row, centroid_col) = moments.centroid();
        let (mu_rr, mu_cc, mu_rc) = moments.central();

        let half_trace = 0.5 * (mu_rr + mu_cc);
        let disc = (0.25 * (mu_cc - mu_rr).powi(2) + mu_rc * mu_rc).sqrt();
        let lambda1 = (half_trace + disc).max(0.0);
        let lambda2 = (half_trace - disc).max(0.0);

        let major_axis = 4.0 * lambda1.sqrt();
        let minor_axis = 4.0 * lambda2.sqrt();
        let aspect_ratio = if minor_axis > EPSILON {
            major_axis / minor_axis
        } else {
            f64::INFINITY
        };

        Self {
            centroid_row,
            centroid_col,
            major_axis,
            minor_axis,
            orientation: 0.5 * (2.0 * mu_rc).atan2(mu_cc - mu_rr),
            aspect_ratio,
            pixel_count: moments.n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::components::label_components;
    use ndarray::Array2;

    #[test]
    fn horizontal_bar_geometry() {
        let mut mask = Array2::from_elem((10, 60), false);
        for c in 5..55 {
            for r in 4..7 {
                mask[[r, c]] = true;
            }
        }
        let labeling = label_components(&mask);
        let g = StreakGeometry::from_component(&labeling.components[0]);
        assert_eq!(g.pixel_count, 150);
        assert!((g.centroid_row - 5.0).abs() < 1e-9);
        assert!((g.centroid_col - 29.5).abs() < 1e-9);
        // A 50x3 rectangle: variance 50^2/12 along the bar, 3^2/12 across.
        assert!((g.major_axis - 4.0 * (2500.0f64 / 12.0).sqrt()).abs() < 1e-6);
        assert!((g.minor_axis - 4.0 * (9.0f64 / 12.0).sqrt()).abs() < 1e-6);
        assert!(g.orientation.abs() < 1e-9);
        assert!(g.aspect_ratio > 10.0);
    }

    #[test]
    fn single_pixel_is_round() {
        let mut mask = Array2::from_elem((3, 3), false);
        mask[[1, 1]] = true;
        let labeling = label_components(&mask);
        let g = StreakGeometry::from_component(&labeling.components[0]);
        assert!((g.aspect_ratio - 1.0).abs() < 1e-9);
    }
}
