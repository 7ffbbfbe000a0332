//! WMAP9 flat-LCDM distances and the unit constants needed to turn stored
//! mass-per-area pixels into dimensionless convergence.

/// WMAP9 Hubble constant, km/s/Mpc.
pub const H0_KM_S_MPC: f64 = 69.32;
/// WMAP9 matter density parameter.
pub const OMEGA_M: f64 = 0.2865;

const C_KM_S: f64 = 299_792.458;
const MSUN_G: f64 = 1.98892e33;
const KPC_CM: f64 = 3.085_677_581_491_367e21;

/// Msun/kpc^2 -> g/cm^2.
pub const MSUN_PER_KPC2_TO_G_PER_CM2: f64 = MSUN_G / (KPC_CM * KPC_CM);

fn efunc(z: f64) -> f64 {
    (OMEGA_M * (1.0 + z).powi(3) + (1.0 - OMEGA_M)).sqrt()
}

/// Angular diameter distance in Mpc, comoving distance by Simpson's rule.
pub fn angular_diameter_distance_mpc(z: f64) -> f64 {
    if z <= 0.0 {
        return 0.0;
    }
    const STEPS: usize = 1024;
    let h = z / STEPS as f64;
    let integrand = |z: f64| 1.0 / efunc(z);
    let mut sum = integrand(0.0) + integrand(z);
    for i in 1..STEPS {
        let weight = if i % 2 == 0 { 2.0 } else { 4.0 };
        sum += weight * integrand(h * i as f64);
    }
    let comoving = (C_KM_S / H0_KM_S_MPC) * sum * h / 3.0;
    comoving / (1.0 + z)
}

/// Critical-surface-density normalization used for the simulated maps,
/// expressed against the lens angular diameter distance in Gpc.
pub fn critical_density_scale(z_lens: f64) -> f64 {
    0.35 / (angular_diameter_distance_mpc(z_lens) / 1000.0)
}
