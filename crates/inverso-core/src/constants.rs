//! Physical constants in SI units.

/// Speed of light in vacuum (m/s).
pub const C_0: f64 = 299_792_458.0;

/// Vacuum permeability (H/m).
pub const MU_0: f64 = 1.256_637_062_12e-6;

/// Vacuum permittivity (F/m), from $\epsilon_0 = 1 / (\mu_0 c^2)$.
pub const EPSILON_0: f64 = 1.0 / (MU_0 * C_0 * C_0);

/// Impedance of free space (Ω), $\eta_0 = \mu_0 c$.
pub const ETA_0: f64 = MU_0 * C_0;

/// Convert a free-space wavelength in nanometres to an angular frequency (rad/s).
pub fn wavelength_nm_to_omega(wavelength_nm: f64) -> f64 {
    2.0 * std::f64::consts::PI * C_0 * 1e9 / wavelength_nm
}
