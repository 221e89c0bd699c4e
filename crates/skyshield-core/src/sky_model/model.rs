//! Natural sky brightness: dark sky + scattered moonlight + twilight.
//!
//! Moonlight follows Krisciunas & Schaefer (1991, PASP 103, 1033). All
//! components are summed in nanoLamberts and converted to V mag/arcsec^2 at
//! the end.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consts::{
    ATMOSPHERE_SCALE_HEIGHT_M, DEFAULT_DARKNESS_THRESHOLD_DEG, DEFAULT_DARK_SKY_MAG,
    DEFAULT_EXTINCTION,
};
use crate::frame::{Pointing, SiteMetadata};

use super::ephemeris::{angular_separation_deg, sky_geometry, Horizontal, SkyGeometry};

/// Sun altitudes bounding nautical and civil twilight.
const NAUTICAL_TWILIGHT_DEG: f64 = -12.0;
const CIVIL_TWILIGHT_DEG: f64 = -6.0;

/// Twilight sky brightness steps, V mag/arcsec^2.
const ASTRONOMICAL_TWILIGHT_MAG: f64 = 19.0;
const NAUTICAL_TWILIGHT_MAG: f64 = 16.0;
const CIVIL_TWILIGHT_MAG: f64 = 10.0;

/// Zenith distances are capped here so airmass stays finite.
const MAX_ZENITH_DISTANCE_DEG: f64 = 87.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyModelConfig {
    /// Use the physical model when metadata allows it.
    pub enabled: bool,
    /// Natural zenith dark-sky brightness, V mag/arcsec^2.
    pub dark_sky_mag: f64,
    /// Sea-level V-band extinction, mag/airmass.
    pub extinction: f64,
    /// Sun altitude below which there is no twilight, degrees.
    pub darkness_threshold_deg: f64,
}

impl Default for SkyModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dark_sky_mag: DEFAULT_DARK_SKY_MAG,
            extinction: DEFAULT_EXTINCTION,
            darkness_threshold_deg: DEFAULT_DARKNESS_THRESHOLD_DEG,
        }
    }
}

/// Predicted natural sky brightness for one pointing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SkyPrediction {
    /// Total brightness, V mag/arcsec^2.
    pub total_mag: f64,
    /// Total brightness as linear flux, 10^(-0.4 mag).
    pub flux: f64,
    pub dark_sky_nl: f64,
    pub moon_nl: f64,
    pub twilight_nl: f64,
    pub sun_altitude_deg: f64,
    pub moon_altitude_deg: f64,
    pub moon_phase_angle_deg: f64,
    pub moon_illumination: f64,
    pub moon_separation_deg: f64,
}

/// Outcome of a prediction request: either a prediction, or the reason one
/// could not be made.
#[derive(Clone, Debug, PartialEq)]
pub enum SkyBrightness {
    Available(SkyPrediction),
    Unavailable { reason: String },
}

impl SkyBrightness {
    pub fn prediction(&self) -> Option<&SkyPrediction> {
        match self {
            Self::Available(p) => Some(p),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Predict the natural sky brightness toward `pointing` (zenith if absent).
pub fn predict_sky_brightness(
    site: Option<&SiteMetadata>,
    time: Option<&DateTime<Utc>>,
    pointing: Option<&Pointing>,
    config: &SkyModelConfig,
) -> SkyBrightness {
    match check_inputs(site, time) {
        Ok((site, time)) => {
            let geometry = sky_geometry(site, time);
            SkyBrightness::Available(brightness(&geometry, site, pointing, config))
        }
        Err(reason) => SkyBrightness::Unavailable { reason },
    }
}

fn check_inputs<'a>(
    site: Option<&'a SiteMetadata>,
    time: Option<&'a DateTime<Utc>>,
) -> Result<(&'a SiteMetadata, &'a DateTime<Utc>), String> {
    let time = time.ok_or_else(|| "missing observation timestamp".to_string())?;
    let site = site.ok_or_else(|| "missing site metadata".to_string())?;
    if !(-90.0..=90.0).contains(&site.latitude_deg) || !site.longitude_deg.is_finite() {
        return Err(format!(
            "invalid site coordinates ({}, {})",
            site.latitude_deg, site.longitude_deg
        ));
    }
    Ok((site, time))
}

/// Memoises the sun/moon geometry per (site, time) for the lifetime of one
/// estimation call.
#[derive(Debug, Default)]
pub struct SkyModelCache {
    geometry: HashMap<(u64, u64, i64, u32), SkyGeometry>,
}

impl SkyModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predict(
        &mut self,
        site: Option<&SiteMetadata>,
        time: Option<&DateTime<Utc>>,
        pointing: Option<&Pointing>,
        config: &SkyModelConfig,
    ) -> SkyBrightness {
        let (site, time) = match check_inputs(site, time) {
            Ok(v) => v,
            Err(reason) => return SkyBrightness::Unavailable { reason },
        };
        let key = (
            site.latitude_deg.to_bits(),
            site.longitude_deg.to_bits(),
            time.timestamp(),
            time.timestamp_subsec_nanos(),
        );
        let geometry = *self
            .geometry
            .entry(key)
            .or_insert_with(|| sky_geometry(site, time));
        SkyBrightness::Available(brightness(&geometry, site, pointing, config))
    }

    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }
}

fn brightness(
    geometry: &SkyGeometry,
    site: &SiteMetadata,
    pointing: Option<&Pointing>,
    config: &SkyModelConfig,
) -> SkyPrediction {
    let pointing = pointing.copied().unwrap_or_else(Pointing::zenith);
    let target = Horizontal {
        altitude_deg: pointing.altitude_deg,
        azimuth_deg: pointing.azimuth_deg,
    };
    let k = config.extinction * (-site.altitude_m.max(0.0) / ATMOSPHERE_SCALE_HEIGHT_M).exp();
    let x_target = airmass(pointing.zenith_distance_deg());

    let b_zenith = mag_to_nanolamberts(config.dark_sky_mag);
    let dark_sky_nl = b_zenith * 10f64.powf(-0.4 * k * (x_target - 1.0)) * x_target;

    let moon_separation_deg = angular_separation_deg(&target, &geometry.moon);
    let moon_nl = if geometry.moon.altitude_deg > 0.0 {
        moonlight_nanolamberts(
            geometry.moon_phase_angle_deg,
            moon_separation_deg,
            90.0 - geometry.moon.altitude_deg,
            pointing.zenith_distance_deg(),
            k,
        )
    } else {
        0.0
    };

    let twilight_nl = twilight_mag(geometry.sun.altitude_deg, config.darkness_threshold_deg)
        .map(mag_to_nanolamberts)
        .unwrap_or(0.0);

    let total_nl = dark_sky_nl + moon_nl + twilight_nl;
    let total_mag = nanolamberts_to_mag(total_nl);

    SkyPrediction {
        total_mag,
        flux: 10f64.powf(-0.4 * total_mag),
        dark_sky_nl,
        moon_nl,
        twilight_nl,
        sun_altitude_deg: geometry.sun.altitude_deg,
        moon_altitude_deg: geometry.moon.altitude_deg,
        moon_phase_angle_deg: geometry.moon_phase_angle_deg,
        moon_illumination: geometry.moon_illumination,
        moon_separation_deg,
    }
}

/// Scattered moonlight, nanoLamberts.
///
/// `phase_deg` is the lunar phase angle (0 = full), `rho_deg` the moon-target
/// separation, `z_moon_deg` / `z_target_deg` zenith distances, `k` the
/// extinction coefficient.
pub fn moonlight_nanolamberts(phase_deg: f64, rho_deg: f64, z_moon_deg: f64, z_target_deg: f64, k: f64) -> f64 {
    let alpha = phase_deg.abs();
    let i_star = 10f64.powf(-0.4 * (3.84 + 0.026 * alpha + 4e-9 * alpha.powi(4)));
    let cos_rho = rho_deg.to_radians().cos();
    let scattering = 10f64.powf(5.36) * (1.06 + cos_rho * cos_rho) + 10f64.powf(6.15 - rho_deg / 40.0);
    scattering
        * i_star
        * 10f64.powf(-0.4 * k * airmass(z_moon_deg))
        * (1.0 - 10f64.powf(-0.4 * k * airmass(z_target_deg)))
}

/// Krisciunas & Schaefer airmass, X(z) = (1 - 0.96 sin^2 z)^-1/2.
pub fn airmass(zenith_distance_deg: f64) -> f64 {
    let z = zenith_distance_deg.clamp(0.0, MAX_ZENITH_DISTANCE_DEG).to_radians();
    (1.0 - 0.96 * z.sin().powi(2)).powf(-0.5)
}

/// Twilight step brightness, or `None` when the sun is below the darkness
/// threshold.
fn twilight_mag(sun_altitude_deg: f64, darkness_threshold_deg: f64) -> Option<f64> {
    if sun_altitude_deg <= darkness_threshold_deg {
        None
    } else if sun_altitude_deg <= NAUTICAL_TWILIGHT_DEG {
        Some(ASTRONOMICAL_TWILIGHT_MAG)
    } else if sun_altitude_deg <= CIVIL_TWILIGHT_DEG {
        Some(NAUTICAL_TWILIGHT_MAG)
    } else {
        Some(CIVIL_TWILIGHT_MAG)
    }
}

pub fn mag_to_nanolamberts(mag: f64) -> f64 {
    34.08 * (20.7233 - 0.92104 * mag).exp()
}

pub fn nanolamberts_to_mag(nl: f64) -> f64 {
    (20.7233 - (nl / 34.08).ln()) / 0.92104
}
