//! Zenithal projections and the native/celestial spherical rotation.
//!
//! All angles are in degrees. Projection-plane coordinates `(x, y)` are the
//! intermediate world coordinates produced by the linear transform.

use super::CoordinateError;

/// Zenithal projection codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Gnomonic
    Tan,
    /// Orthographic
    Sin,
    /// Zenithal equidistant
    Arc,
    /// Stereographic
    Stg,
}

impl Projection {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "TAN" => Some(Projection::Tan),
            "SIN" => Some(Projection::Sin),
            "ARC" => Some(Projection::Arc),
            "STG" => Some(Projection::Stg),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Projection::Tan => "TAN",
            Projection::Sin => "SIN",
            Projection::Arc => "ARC",
            Projection::Stg => "STG",
        }
    }

    /// Projection plane to native spherical `(phi, theta)`.
    pub fn deproject(&self, x: f64, y: f64) -> Result<(f64, f64), CoordinateError> {
        let r = x.hypot(y);
        let phi = if r == 0.0 {
            0.0
        } else {
            x.atan2(-y).to_degrees()
        };

        let theta = match self {
            Projection::Tan => (180.0 / std::f64::consts::PI).atan2(r).to_degrees(),
            Projection::Sin => {
                let cos_theta = r.to_radians();
                if cos_theta > 1.0 {
                    return Err(CoordinateError::OutOfDomain { x, y });
                }
                cos_theta.acos().to_degrees()
            }
            Projection::Arc => 90.0 - r,
            Projection::Stg => 90.0 - 2.0 * (r.to_radians() / 2.0).atan().to_degrees(),
        };

        Ok((phi, theta))
    }

    /// Native spherical `(phi, theta)` to the projection plane.
    pub fn project(&self, phi: f64, theta: f64) -> Result<(f64, f64), CoordinateError> {
        let r = match self {
            Projection::Tan => {
                if theta <= 0.0 {
                    return Err(CoordinateError::OutOfDomain { x: phi, y: theta });
                }
                (90.0 - theta).to_radians().tan().to_degrees()
            }
            Projection::Sin => {
                if theta < 0.0 {
                    return Err(CoordinateError::OutOfDomain { x: phi, y: theta });
                }
                theta.to_radians().cos().to_degrees()
            }
            Projection::Arc => 90.0 - theta,
            Projection::Stg => {
                if theta <= -90.0 {
                    return Err(CoordinateError::OutOfDomain { x: phi, y: theta });
                }
                2.0 * ((90.0 - theta).to_radians() / 2.0).tan().to_degrees()
            }
        };

        let (sin_phi, cos_phi) = phi.to_radians().sin_cos();
        Ok((r * sin_phi, -r * cos_phi))
    }
}

/// Native spherical to celestial coordinates.
///
/// `(alpha_p, delta_p)` are the celestial coordinates of the native pole
/// (equal to the reference point for zenithal projections) and `phi_p` is
/// the native longitude of the celestial pole (LONPOLE).
pub fn native_to_celestial(
    phi: f64,
    theta: f64,
    alpha_p: f64,
    delta_p: f64,
    phi_p: f64,
) -> (f64, f64) {
    let (sin_t, cos_t) = theta.to_radians().sin_cos();
    let (sin_dp, cos_dp) = delta_p.to_radians().sin_cos();
    let (sin_dphi, cos_dphi) = (phi - phi_p).to_radians().sin_cos();

    let sin_delta = (sin_t * sin_dp + cos_t * cos_dp * cos_dphi).clamp(-1.0, 1.0);
    let delta = sin_delta.asin().to_degrees();

    let y = -cos_t * sin_dphi;
    let x = sin_t * cos_dp - cos_t * sin_dp * cos_dphi;
    let alpha = alpha_p + y.atan2(x).to_degrees();

    (alpha.rem_euclid(360.0), delta)
}

/// Celestial to native spherical coordinates, inverse of [`native_to_celestial`].
pub fn celestial_to_native(
    alpha: f64,
    delta: f64,
    alpha_p: f64,
    delta_p: f64,
    phi_p: f64,
) -> (f64, f64) {
    let (sin_d, cos_d) = delta.to_radians().sin_cos();
    let (sin_dp, cos_dp) = delta_p.to_radians().sin_cos();
    let (sin_da, cos_da) = (alpha - alpha_p).to_radians().sin_cos();

    let sin_theta = (sin_d * sin_dp + cos_d * cos_dp * cos_da).clamp(-1.0, 1.0);
    let theta = sin_theta.asin().to_degrees();

    let y = -cos_d * sin_da;
    let x = sin_d * cos_dp - cos_d * sin_dp * cos_da;
    let phi = phi_p + y.atan2(x).to_degrees();

    (phi, theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [Projection; 4] = [
        Projection::Tan,
        Projection::Sin,
        Projection::Arc,
        Projection::Stg,
    ];

    #[test]
    fn test_origin_is_native_pole() {
        for projection in ALL {
            let (_, theta) = projection.deproject(0.0, 0.0).unwrap();
            assert_relative_eq!(theta, 90.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_project_inverts_deproject() {
        for projection in ALL {
            for &(x, y) in &[(0.3, -0.2), (-1.5, 0.7), (2.0, 2.0)] {
                let (phi, theta) = projection.deproject(x, y).unwrap();
                let (x2, y2) = projection.project(phi, theta).unwrap();
                assert_relative_eq!(x, x2, epsilon = 1e-10);
                assert_relative_eq!(y, y2, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_small_offsets_agree_across_projections() {
        // Near the reference point all zenithal projections are nearly equal
        let tan = Projection::Tan.deproject(0.01, 0.0).unwrap();
        let arc = Projection::Arc.deproject(0.01, 0.0).unwrap();
        assert_relative_eq!(tan.1, arc.1, epsilon = 1e-8);
        assert_relative_eq!(tan.0, 90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sin_out_of_domain() {
        assert!(matches!(
            Projection::Sin.deproject(60.0, 0.0),
            Err(CoordinateError::OutOfDomain { .. })
        ));
        assert!(Projection::Tan.project(0.0, -10.0).is_err());
    }

    #[test]
    fn test_rotation_round_trip() {
        let (alpha_p, delta_p, phi_p) = (150.0, 2.2, 180.0);
        for &(phi, theta) in &[(0.0, 89.5), (45.0, 88.0), (-120.0, 85.0)] {
            let (alpha, delta) = native_to_celestial(phi, theta, alpha_p, delta_p, phi_p);
            let (phi2, theta2) = celestial_to_native(alpha, delta, alpha_p, delta_p, phi_p);
            assert_relative_eq!(theta, theta2, epsilon = 1e-9);
            let dphi = (phi - phi2).rem_euclid(360.0);
            assert!(dphi < 1e-9 || dphi > 360.0 - 1e-9, "phi {phi} vs {phi2}");
        }
    }

    #[test]
    fn test_native_pole_maps_to_reference() {
        let (alpha, delta) = native_to_celestial(0.0, 90.0, 83.6, -5.4, 180.0);
        assert_relative_eq!(alpha, 83.6, epsilon = 1e-9);
        assert_relative_eq!(delta, -5.4, epsilon = 1e-9);
    }
}
