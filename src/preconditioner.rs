//! Preconditioner Hook (spec.md §4.7): diagonal of the demag operator
//! at zero offset, for external nonlinear solvers.

use crate::{
    config::Config,
    kernel,
    mesh::{Axis, MeshSpec},
    periodic::PeriodicTensorSummer,
    Error, MagnetizationField,
};

const MU0: f64 = 4.0 * std::f64::consts::PI * 1e-7;

/// Computes the diagonal preconditioner hook of spec.md §4.7.
pub struct Preconditioner;

impl Preconditioner {
    /// Accumulates `mu0 * Ms_i * ((Nyy+Nzz), (Nxx+Nzz), (Nxx+Nyy))` into
    /// `out_diag`, one 3-vector per mesh cell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `out_diag.len()` does not match the
    /// mesh's cell count, or if a periodic axis has a non-positive
    /// period.
    pub fn increment(
        mesh: &MeshSpec,
        field: &MagnetizationField,
        config: &Config,
        out_diag: &mut [[f64; 3]],
    ) -> Result<(), Error> {
        if out_diag.len() != mesh.cell_count() {
            return Err(Error::Config {
                reason: format!(
                    "preconditioner output length {} does not match cell count {}",
                    out_diag.len(),
                    mesh.cell_count()
                ),
            });
        }

        let (nxx, nyy, nzz) = origin_diagonal(mesh, config)?;
        let (dyy_zz, dxx_zz, dxx_yy) = (nyy + nzz, nxx + nzz, nxx + nyy);

        for (i, ms) in field.ms().iter().enumerate() {
            out_diag[i][0] += MU0 * ms * dyy_zz;
            out_diag[i][1] += MU0 * ms * dxx_zz;
            out_diag[i][2] += MU0 * ms * dxx_yy;
        }
        Ok(())
    }
}

/// `(Nxx, Nyy, Nzz)` at zero offset: the self-demag closed form, plus
/// the periodic-image remainder along any periodic axis.
fn origin_diagonal(mesh: &MeshSpec, config: &Config) -> Result<(f64, f64, f64), Error> {
    let [dx, dy, dz] = mesh.cell_size();
    let mut nxx = kernel::self_demag_nx(dx, dy, dz);
    let mut nyy = kernel::self_demag_ny(dx, dy, dz);
    let mut nzz = kernel::self_demag_nz(dx, dy, dz);

    let periodic = mesh.periodic();
    for axis in Axis::ALL {
        if !periodic[axis.index()] {
            continue;
        }
        let summer = PeriodicTensorSummer::new(
            axis,
            mesh.dims()[axis.index()],
            mesh.cell_size(),
            config.asymptotic_radius_value(),
        )?;
        let hole = summer.compute_periodic_hole_tensor(0, 0, 0);
        nxx += hole.a00;
        nyy += hole.a11;
        nzz += hole.a22;
    }

    Ok((nxx, nyy, nzz))
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_output_length() {
        let mesh = MeshSpec::new([2, 2, 2], [1e-9; 3], [false; 3]).unwrap();
        let field = MagnetizationField::zeros(&mesh);
        let config = Config::default();
        let mut out = vec![[0.0; 3]; 1];
        assert!(Preconditioner::increment(&mesh, &field, &config, &mut out).is_err());
    }

    #[test]
    fn cube_diagonal_is_uniform_across_cells() {
        let mesh = MeshSpec::new([2, 2, 2], [1e-9; 3], [false; 3]).unwrap();
        let mut field = MagnetizationField::zeros(&mesh);
        field.ms_mut().iter_mut().for_each(|ms| *ms = 8e5);
        let config = Config::default();
        let mut out = vec![[0.0; 3]; mesh.cell_count()];
        Preconditioner::increment(&mesh, &field, &config, &mut out).unwrap();
        for entry in &out {
            assert!(entry.iter().all(|v| v.is_finite()));
            assert!((entry[0] - out[0][0]).abs() < 1e-30);
        }
    }

    #[test]
    fn periodic_axis_still_produces_finite_diagonal() {
        let mesh = MeshSpec::new([4, 2, 2], [1e-9; 3], [true, false, false]).unwrap();
        let field = MagnetizationField::zeros(&mesh);
        let config = Config::default();
        let mut out = vec![[0.0; 3]; mesh.cell_count()];
        Preconditioner::increment(&mesh, &field, &config, &mut out).unwrap();
        assert!(out.iter().all(|e| e.iter().all(|v| v.is_finite())));
    }
}
