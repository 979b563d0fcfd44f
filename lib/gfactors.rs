//! Landé g-factors and related constants.

/// Bohr magneton [MHz / G]
pub const MU_B: f64 = 1.3996245168425658;

/// Electron spin g-factor [dimensionless]
pub const G_S: f64 = 2.00231930436256;

/// Electron orbital g-factor [dimensionless]
pub const G_L: f64 = 1.0;

/// Fine-structure Landé factor for a state `|L S J>`.
///
/// Returns zero for `J = 0`, where the factor is undefined but irrelevant.
pub fn g_j(L: f64, S: f64, J: f64) -> f64 {
    if J == 0.0 { return 0.0; }
    let jj = J * (J + 1.0);
    let ll = L * (L + 1.0);
    let ss = S * (S + 1.0);
    G_L * (jj - ss + ll) / (2.0 * jj) + G_S * (jj + ss - ll) / (2.0 * jj)
}

/// Hyperfine Landé factor for a state `|J I F>`, given the fine-structure
/// factor `gj` and the nuclear factor `gi` (both in units of the Bohr
/// magneton).
pub fn g_f(J: f64, I: f64, F: f64, gj: f64, gi: f64) -> f64 {
    if F == 0.0 { return 0.0; }
    let ff = F * (F + 1.0);
    let jj = J * (J + 1.0);
    let ii = I * (I + 1.0);
    gj * (ff - ii + jj) / (2.0 * ff) + gi * (ff + ii - jj) / (2.0 * ff)
}

// tabulated hyperfine g-factors for 171Yb [dimensionless]
pub const G_1S0_F12: f64 = -0.0005357942257405903;
pub const G_3P1_F12: f64 = 2.0017245980752465;
pub const G_3P1_F32: f64 = 1.000594401924753;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn lande_limits() {
        // pure spin state
        assert_abs_diff_eq!(g_j(0.0, 0.5, 0.5), G_S, epsilon = 1e-12);
        // pure orbital state
        assert_abs_diff_eq!(g_j(1.0, 0.0, 1.0), G_L, epsilon = 1e-12);
        assert_eq!(g_j(1.0, 1.0, 0.0), 0.0);
    }

    #[test]
    fn hyperfine_ground_alkali() {
        // 87Rb 5S1/2, I = 3/2, ignoring the nuclear moment
        let gj = g_j(0.0, 0.5, 0.5);
        assert_abs_diff_eq!(g_f(0.5, 1.5, 2.0, gj, 0.0), gj / 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g_f(0.5, 1.5, 1.0, gj, 0.0), -gj / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn ytterbium_intercombination_table() {
        // 3P1 with I = 1/2 and the nuclear moment neglected
        let gj = g_j(1.0, 1.0, 1.0);
        assert_abs_diff_eq!(g_f(1.0, 0.5, 1.5, gj, 0.0), G_3P1_F32, epsilon = 2e-3);
        assert_abs_diff_eq!(g_f(1.0, 0.5, 0.5, gj, 0.0), G_3P1_F12, epsilon = 2e-3);
        assert!(G_1S0_F12.abs() < 1e-3);
    }
}
