//! Low-precision solar and lunar ephemeris.
//!
//! Solar position follows the Astronomical Almanac low-precision formulae
//! (about 0.01 deg over 1950-2050). Lunar position uses the leading terms of
//! the Meeus series (a few tenths of a degree), with a horizontal-parallax
//! correction applied to the altitude. Both are ample for sky brightness.

use chrono::{DateTime, Utc};

use crate::frame::SiteMetadata;

const AU_KM: f64 = 149_597_870.7;
const EARTH_RADIUS_KM: f64 = 6378.14;
const J2000: f64 = 2_451_545.0;

/// Equatorial coordinates, degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Equatorial {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

/// Horizontal coordinates, degrees. Azimuth from north through east.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Horizontal {
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
}

/// Sun and moon as seen from a site at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkyGeometry {
    pub sun: Horizontal,
    pub moon: Horizontal,
    /// Sun-moon elongation, degrees.
    pub elongation_deg: f64,
    /// Lunar phase angle, degrees: 0 = full, 180 = new.
    pub moon_phase_angle_deg: f64,
    /// Illuminated fraction of the lunar disk.
    pub moon_illumination: f64,
}

pub fn julian_date(time: &DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + time.timestamp_subsec_nanos() as f64 * 1e-9;
    seconds / 86_400.0 + 2_440_587.5
}

/// Greenwich mean sidereal time, degrees in [0, 360).
pub fn gmst_deg(jd: f64) -> f64 {
    let d = jd - J2000;
    let t = d / 36_525.0;
    normalize_deg(280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t - t * t * t / 38_710_000.0)
}

/// Apparent solar position and Earth-Sun distance in AU.
pub fn sun_position(jd: f64) -> (Equatorial, f64) {
    let d = jd - J2000;
    let mean_long = 280.460 + 0.985_647_4 * d;
    let g = (357.528 + 0.985_600_3 * d).to_radians();
    let lambda = (mean_long + 1.915 * g.sin() + 0.020 * (2.0 * g).sin()).to_radians();
    let eps = (23.439 - 0.000_000_4 * d).to_radians();

    let ra = (eps.cos() * lambda.sin()).atan2(lambda.cos());
    let dec = (eps.sin() * lambda.sin()).asin();
    let distance_au = 1.000_14 - 0.016_71 * g.cos() - 0.000_14 * (2.0 * g).cos();

    (
        Equatorial {
            ra_deg: normalize_deg(ra.to_degrees()),
            dec_deg: dec.to_degrees(),
        },
        distance_au,
    )
}

/// Geocentric lunar position and Earth-Moon distance in km.
pub fn moon_position(jd: f64) -> (Equatorial, f64) {
    let t = (jd - J2000) / 36_525.0;
    let l = 218.316_447_7 + 481_267.881_234_21 * t;
    let d = (297.850_192_1 + 445_267.111_403_4 * t).to_radians();
    let m = (357.529_109_2 + 35_999.050_290_9 * t).to_radians();
    let mp = (134.963_396_4 + 477_198.867_505_5 * t).to_radians();
    let f = (93.272_095_0 + 483_202.017_523_3 * t).to_radians();

    let lambda = (l + 6.289 * mp.sin() + 1.274 * (2.0 * d - mp).sin() + 0.658 * (2.0 * d).sin()
        + 0.214 * (2.0 * mp).sin()
        - 0.186 * m.sin()
        - 0.114 * (2.0 * f).sin())
    .to_radians();
    let beta = (5.128 * f.sin()
        + 0.281 * (mp + f).sin()
        + 0.278 * (mp - f).sin()
        + 0.173 * (2.0 * d - f).sin())
    .to_radians();
    let distance_km = 385_000.56
        - 20_905.355 * mp.cos()
        - 3_699.111 * (2.0 * d - mp).cos()
        - 2_955.968 * (2.0 * d).cos()
        - 569.925 * (2.0 * mp).cos();

    let eps = (23.439_291 - 0.013_004_2 * t).to_radians();
    let ra = (lambda.sin() * eps.cos() - beta.tan() * eps.sin()).atan2(lambda.cos());
    let dec = (beta.sin() * eps.cos() + beta.cos() * eps.sin() * lambda.sin()).asin();

    (
        Equatorial {
            ra_deg: normalize_deg(ra.to_degrees()),
            dec_deg: dec.to_degrees(),
        },
        distance_km,
    )
}

/// Convert equatorial coordinates to horizontal ones for a site at `jd`.
pub fn to_horizontal(eq: &Equatorial, site: &SiteMetadata, jd: f64) -> Horizontal {
    let lst = gmst_deg(jd) + site.longitude_deg;
    let h = (lst - eq.ra_deg).to_radians();
    let phi = site.latitude_deg.to_radians();
    let dec = eq.dec_deg.to_radians();

    let sin_alt = phi.sin() * dec.sin() + phi.cos() * dec.cos() * h.cos();
    let alt = sin_alt.clamp(-1.0, 1.0).asin();
    let az = (-dec.cos() * h.sin()).atan2(dec.sin() * phi.cos() - dec.cos() * phi.sin() * h.cos());

    Horizontal {
        altitude_deg: alt.to_degrees(),
        azimuth_deg: normalize_deg(az.to_degrees()),
    }
}

/// Great-circle separation between two horizontal positions, degrees.
pub fn angular_separation_deg(a: &Horizontal, b: &Horizontal) -> f64 {
    let (a1, a2) = (a.altitude_deg.to_radians(), b.altitude_deg.to_radians());
    let daz = (a.azimuth_deg - b.azimuth_deg).to_radians();
    let cos_sep = a1.sin() * a2.sin() + a1.cos() * a2.cos() * daz.cos();
    cos_sep.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Sun and moon geometry for a site at one instant.
pub fn sky_geometry(site: &SiteMetadata, time: &DateTime<Utc>) -> SkyGeometry {
    let jd = julian_date(time);
    let (sun_eq, sun_au) = sun_position(jd);
    let (moon_eq, moon_km) = moon_position(jd);

    let sun = to_horizontal(&sun_eq, site, jd);
    let mut moon = to_horizontal(&moon_eq, site, jd);
    // Topocentric correction: parallax lowers the moon by up to ~1 deg.
    let parallax = (EARTH_RADIUS_KM / moon_km).asin();
    moon.altitude_deg -= (parallax * moon.altitude_deg.to_radians().cos()).to_degrees();

    let (ds, dm) = (sun_eq.dec_deg.to_radians(), moon_eq.dec_deg.to_radians());
    let dra = (sun_eq.ra_deg - moon_eq.ra_deg).to_radians();
    let cos_psi = ds.sin() * dm.sin() + ds.cos() * dm.cos() * dra.cos();
    let psi = cos_psi.clamp(-1.0, 1.0).acos();

    let sun_km = sun_au * AU_KM;
    let phase = (sun_km * psi.sin()).atan2(moon_km - sun_km * psi.cos());

    SkyGeometry {
        sun,
        moon,
        elongation_deg: psi.to_degrees(),
        moon_phase_angle_deg: phase.to_degrees(),
        moon_illumination: (1.0 + phase.cos()) / 2.0,
    }
}

fn normalize_deg(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}
