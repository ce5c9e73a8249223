//! Deterministic test fixtures (SPEC_FULL §10.4): small-mesh
//! magnetization generators and a brute-force O(n^2) real-space
//! reference convolution, used to check reciprocity and round-trip
//! identity on meshes small enough for exhaustive comparison.

use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

use crate::{kernel, mesh::MeshSpec, MagnetizationField};

/// Builds a field of `ms`-magnitude vectors pointing in uniform-random
/// directions, deterministically seeded from `seed`.
pub(crate) fn random_field(mesh: &MeshSpec, ms: f64, seed: u64) -> MagnetizationField {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut field = MagnetizationField::zeros(mesh);
    for i in 0..field.len() {
        let dir = random_unit_vector(&mut rng);
        field.spin_mut()[i] = [dir[0] * ms, dir[1] * ms, dir[2] * ms];
        field.ms_mut()[i] = ms;
    }
    field
}

fn random_unit_vector(rng: &mut impl Rng) -> [f64; 3] {
    loop {
        let v = [
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ];
        let norm2 = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
        if norm2 > 1e-6 && norm2 <= 1.0 {
            let norm = norm2.sqrt();
            return [v[0] / norm, v[1] / norm, v[2] / norm];
        }
    }
}

/// Brute-force `H_a = -sum_b N(a-b) . M_b` over a non-periodic mesh,
/// evaluating the real-space Newell tensor directly (no FFT). Only
/// practical for meshes small enough to exhaust pairwise (<= 4x4x4 or
/// so); used as a reference to check the FFT convolution engine.
pub(crate) fn reference_convolution(mesh: &MeshSpec, field: &MagnetizationField) -> Vec<[f64; 3]> {
    let [rx, ry, rz] = mesh.dims();
    let [dx, dy, dz] = mesh.cell_size();
    let mut h = vec![[0.0; 3]; mesh.cell_count()];

    for az in 0..rz {
        for ay in 0..ry {
            for ax in 0..rx {
                let a = mesh.index(ax, ay, az);
                let mut acc = [0.0; 3];
                for bz in 0..rz {
                    for by in 0..ry {
                        for bx in 0..rx {
                            let b = mesh.index(bx, by, bz);
                            let spin_b = field.spin()[b];
                            if field.ms()[b] == 0.0 {
                                continue;
                            }
                            let same_cell = ax == bx && ay == by && az == bz;
                            let [nxx, nxy, nxz, nyy, nyz, nzz] = if same_cell {
                                [
                                    kernel::self_demag_nx(dx, dy, dz),
                                    0.0,
                                    0.0,
                                    kernel::self_demag_ny(dx, dy, dz),
                                    0.0,
                                    kernel::self_demag_nz(dx, dy, dz),
                                ]
                            } else {
                                let ox = (ax as i64 - bx as i64) as f64 * dx;
                                let oy = (ay as i64 - by as i64) as f64 * dy;
                                let oz = (az as i64 - bz as i64) as f64 * dz;
                                [
                                    kernel::cell_averaged(kernel::newell_f, ox, oy, oz, dx, dy, dz),
                                    kernel::cell_averaged(kernel::newell_g_xy, ox, oy, oz, dx, dy, dz),
                                    kernel::cell_averaged(kernel::newell_g_xz, ox, oy, oz, dx, dy, dz),
                                    kernel::cell_averaged(kernel::newell_f_yy, ox, oy, oz, dx, dy, dz),
                                    kernel::cell_averaged(kernel::newell_g_yz, ox, oy, oz, dx, dy, dz),
                                    kernel::cell_averaged(kernel::newell_f_zz, ox, oy, oz, dx, dy, dz),
                                ]
                            };
                            acc[0] -= nxx * spin_b[0] + nxy * spin_b[1] + nxz * spin_b[2];
                            acc[1] -= nxy * spin_b[0] + nyy * spin_b[1] + nyz * spin_b[2];
                            acc[2] -= nxz * spin_b[0] + nyz * spin_b[1] + nzz * spin_b[2];
                        }
                    }
                }
                h[a] = acc;
            }
        }
    }
    h
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_field_vectors_have_requested_magnitude() {
        let mesh = MeshSpec::new([2, 2, 2], [1e-9; 3], [false; 3]).unwrap();
        let field = random_field(&mesh, 8e5, 7);
        for spin in field.spin() {
            let norm = (spin[0] * spin[0] + spin[1] * spin[1] + spin[2] * spin[2]).sqrt();
            assert!((norm - 8e5).abs() / 8e5 < 1e-9);
        }
    }

    #[test]
    fn reference_convolution_is_finite() {
        let mesh = MeshSpec::new([2, 2, 2], [1e-9; 3], [false; 3]).unwrap();
        let field = random_field(&mesh, 8e5, 11);
        let h = reference_convolution(&mesh, &field);
        assert!(h.iter().all(|v| v.iter().all(|x| x.is_finite())));
    }
}
