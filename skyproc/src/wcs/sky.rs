//! Sky positions, angular separations and sexagesimal formatting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An angle stored in degrees.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub fn from_degrees(degrees: f64) -> Self {
        Self(degrees)
    }

    pub fn from_radians(radians: f64) -> Self {
        Self(radians.to_degrees())
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }

    pub fn radians(&self) -> f64 {
        self.0.to_radians()
    }

    pub fn arcminutes(&self) -> f64 {
        self.0 * 60.0
    }

    pub fn arcseconds(&self) -> f64 {
        self.0 * 3600.0
    }
}

/// Split a non-negative value into whole units, minutes and seconds, with
/// seconds rounded to `decimals` places and carried upward.
fn sexagesimal(value: f64, decimals: usize) -> (u64, u64, f64) {
    let scale = 10f64.powi(decimals as i32);
    let total_seconds = (value * 3600.0 * scale).round() / scale;

    let whole = (total_seconds / 3600.0).floor();
    let remainder = total_seconds - whole * 3600.0;
    let minutes = (remainder / 60.0).floor();
    let seconds = remainder - minutes * 60.0;

    (whole as u64, minutes as u64, seconds.max(0.0))
}

/// Equatorial position in degrees, RA in [0, 360) and Dec in [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self {
            ra: ra.rem_euclid(360.0),
            dec,
        }
    }

    /// Great-circle distance using the Vincenty formula, stable for both
    /// tiny and antipodal separations.
    pub fn separation(&self, other: &SkyCoord) -> Angle {
        let (sin_d1, cos_d1) = self.dec.to_radians().sin_cos();
        let (sin_d2, cos_d2) = other.dec.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (other.ra - self.ra).to_radians().sin_cos();

        let num1 = cos_d2 * sin_dra;
        let num2 = cos_d1 * sin_d2 - sin_d1 * cos_d2 * cos_dra;
        let denominator = sin_d1 * sin_d2 + cos_d1 * cos_d2 * cos_dra;

        Angle::from_radians(num1.hypot(num2).atan2(denominator))
    }

    /// Right ascension as `HHhMMmSS.SSSSs`.
    pub fn ra_hms(&self) -> String {
        let (mut h, m, s) = sexagesimal(self.ra / 15.0, 4);
        if h >= 24 {
            h -= 24;
        }
        format!("{h:02}h{m:02}m{s:07.4}s")
    }

    /// Declination as `+DDdMMmSS.SSSs`.
    pub fn dec_dms(&self) -> String {
        let sign = if self.dec < 0.0 { '-' } else { '+' };
        let (d, m, s) = sexagesimal(self.dec.abs(), 3);
        format!("{sign}{d:02}d{m:02}m{s:06.3}s")
    }

    /// Both axes in sexagesimal form separated by a space.
    pub fn to_hmsdms(&self) -> String {
        format!("{} {}", self.ra_hms(), self.dec_dms())
    }
}

impl fmt::Display for SkyCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ra, dec) in deg ({:.6}, {:.6})", self.ra, self.dec)
    }
}
