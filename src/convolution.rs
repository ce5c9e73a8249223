//! Convolution Engine (spec.md §4.6): per-step pipeline computing
//! `H = Â ⊛ M`, energy density, `m×H`, and their accumulated variants
//! in one fused reduction.
//!
//! Implemented as a zero-padded linear convolution: forward x
//! real-to-complex FFT of `Ms*m`, forward y and z FFTs of the
//! resulting half-spectrum, a pointwise multiply against the
//! frequency-domain tensor (reconstructed from its stored octant using
//! the parity rules of spec.md §3 — only `y` and `z` need reflecting,
//! since `x` is already half-spectrum on both sides), then inverse z,
//! y, x. Each stage parallelizes over lines/planes pulled from a
//! [`JobDispatcher`] inside a `rayon::scope`, matching the three-stage
//! thread team of spec.md §5; each worker owns its own
//! [`FftWorkspace`] for the stage's lifetime (spec.md §4.4 — no
//! cross-thread sharing of FFT state).

use std::f64::consts::PI;
use std::mem::size_of;
use std::sync::Mutex;

use rustfft::num_complex::Complex64;

use crate::{
    dispatcher::JobDispatcher,
    mesh::{FftDims, MagnetizationField, MeshSpec},
    tensor::DemagTensor,
    workspace::{FftWorkspace, Vector3c},
};

const MU0: f64 = 4.0 * PI * 1e-7;

/// Which outputs a [`ConvolutionEngine::run`] call should populate.
#[derive(Default)]
pub struct OutputRequest<'a> {
    /// Overwrite per-cell energy density.
    pub energy: Option<&'a mut [f64]>,
    /// Accumulate (add into) per-cell energy density.
    pub energy_accum: Option<&'a mut [f64]>,
    /// Overwrite per-cell field.
    pub h: Option<&'a mut [[f64; 3]]>,
    /// Accumulate per-cell field.
    pub h_accum: Option<&'a mut [[f64; 3]]>,
    /// Overwrite per-cell `m x H`.
    pub mxh: Option<&'a mut [[f64; 3]]>,
    /// Accumulate per-cell `m x H`.
    pub mxh_accum: Option<&'a mut [[f64; 3]]>,
}

/// Runs one convolution step against a built tensor.
pub struct ConvolutionEngine<'a> {
    tensor: &'a DemagTensor,
    fft_dims: FftDims,
    nthreads: usize,
    cache_size_kb: usize,
}

impl<'a> ConvolutionEngine<'a> {
    /// Borrows `tensor` (already built for `fft_dims`) for one step.
    /// `cache_size_kb` sizes the y/z embedding block of
    /// [`Self::embedded_yz_stage`] (spec.md §6).
    pub fn new(tensor: &'a DemagTensor, fft_dims: FftDims, nthreads: usize, cache_size_kb: usize) -> Self {
        Self {
            tensor,
            fft_dims,
            nthreads: nthreads.max(1),
            cache_size_kb: cache_size_kb.max(1),
        }
    }

    /// Computes `H`, energy density, and `m x H` for `mesh`/`field`,
    /// writing into whichever buffers `out` requests, and returns the
    /// total energy (`sum_i energy_i * cell_volume`).
    pub fn run(&self, mesh: &MeshSpec, field: &MagnetizationField, out: &mut OutputRequest) -> f64 {
        let [lx, ly, lz] = self.fft_dims.logical;
        let cx = self.fft_dims.complex[0];
        let [rx, ry, rz] = mesh.dims();

        let spectrum = Mutex::new(vec![[Complex64::default(); 3]; cx * ly * lz]);

        self.forward_x_stage(mesh, field, lx, cx, ry, rz, &spectrum);
        self.embedded_yz_stage(cx, ly, lz, &spectrum);
        self.inverse_x_stage(mesh, field, lx, cx, rx, ry, rz, &spectrum, out)
    }

    fn forward_x_stage(
        &self,
        mesh: &MeshSpec,
        field: &MagnetizationField,
        lx: usize,
        cx: usize,
        ry: usize,
        rz: usize,
        spectrum: &Mutex<Vec<Vector3c>>,
    ) {
        let rx = mesh.dims()[0];
        let ly = self.fft_dims.logical[1];
        let dispatcher = JobDispatcher::new(ry * rz, self.nthreads, 4);
        rayon::scope(|scope| {
            for _ in 0..self.nthreads {
                let dispatcher = &dispatcher;
                scope.spawn(move |_| {
                    let mut workspace = FftWorkspace::new(self.fft_dims.logical);
                    loop {
                        let (start, stop) = dispatcher.claim_job();
                        if start == stop {
                            break;
                        }
                        for line in start..stop {
                            let j = line % ry;
                            let k = line / ry;
                            let mut buf = vec![[Complex64::default(); 3]; lx];
                            for i in 0..rx {
                                let idx = mesh.index(i, j, k);
                                let ms = field.ms()[idx];
                                let spin = field.spin()[idx];
                                buf[i] = [
                                    Complex64::new(ms * spin[0], 0.0),
                                    Complex64::new(ms * spin[1], 0.0),
                                    Complex64::new(ms * spin[2], 0.0),
                                ];
                            }
                            workspace.fft_x_forward(&mut buf);
                            let mut spectrum = spectrum.lock().unwrap();
                            for i in 0..cx {
                                spectrum[spectrum_index(cx, ly, i, j, k)] = buf[i];
                            }
                        }
                    }
                });
            }
        });
    }

    fn embedded_yz_stage(&self, cx: usize, ly: usize, lz: usize, spectrum: &Mutex<Vec<Vector3c>>) {
        let block = yz_block_size(self.cache_size_kb, ly, lz);
        let dispatcher = JobDispatcher::new(cx, self.nthreads, block);
        let tensor = self.tensor;
        rayon::scope(|scope| {
            for _ in 0..self.nthreads {
                let dispatcher = &dispatcher;
                scope.spawn(move |_| {
                    let mut workspace = FftWorkspace::new(self.fft_dims.logical);
                    loop {
                        let (start, stop) = dispatcher.claim_job();
                        if start == stop {
                            break;
                        }
                        for i in start..stop {
                            let mut plane = {
                                let spectrum = spectrum.lock().unwrap();
                                let mut plane = vec![[Complex64::default(); 3]; ly * lz];
                                for j in 0..ly {
                                    for k in 0..lz {
                                        plane[j * lz + k] = spectrum[spectrum_index(cx, ly, i, j, k)];
                                    }
                                }
                                plane
                            };

                            for k in 0..lz {
                                let mut column = vec![[Complex64::default(); 3]; ly];
                                for j in 0..ly {
                                    column[j] = plane[j * lz + k];
                                }
                                workspace.fft_y_forward(&mut column);
                                for j in 0..ly {
                                    plane[j * lz + k] = column[j];
                                }
                            }
                            for j in 0..ly {
                                let row = &mut plane[j * lz..j * lz + lz];
                                workspace.fft_z_forward(row);
                            }

                            for j in 0..ly {
                                for k in 0..lz {
                                    let matrix = tensor_matrix_at(tensor, i, j, k, ly, lz);
                                    plane[j * lz + k] = matvec(matrix, plane[j * lz + k]);
                                }
                            }

                            for j in 0..ly {
                                let row = &mut plane[j * lz..j * lz + lz];
                                workspace.fft_z_inverse(row);
                            }
                            for k in 0..lz {
                                let mut column = vec![[Complex64::default(); 3]; ly];
                                for j in 0..ly {
                                    column[j] = plane[j * lz + k];
                                }
                                workspace.fft_y_inverse(&mut column);
                                for j in 0..ly {
                                    plane[j * lz + k] = column[j];
                                }
                            }

                            let mut spectrum = spectrum.lock().unwrap();
                            for j in 0..ly {
                                for k in 0..lz {
                                    spectrum[spectrum_index(cx, ly, i, j, k)] = plane[j * lz + k];
                                }
                            }
                        }
                    }
                });
            }
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn inverse_x_stage(
        &self,
        mesh: &MeshSpec,
        field: &MagnetizationField,
        lx: usize,
        cx: usize,
        rx: usize,
        ry: usize,
        rz: usize,
        spectrum: &Mutex<Vec<Vector3c>>,
        out: &mut OutputRequest,
    ) -> f64 {
        let ly = self.fft_dims.logical[1];
        let n = (lx * self.fft_dims.logical[1] * self.fft_dims.logical[2]) as f64;
        let cell_volume = mesh.cell_volume();
        let dispatcher = JobDispatcher::new(ry * rz, self.nthreads, 4);

        let h = Mutex::new(out.h.take());
        let h_accum = Mutex::new(out.h_accum.take());
        let energy = Mutex::new(out.energy.take());
        let energy_accum = Mutex::new(out.energy_accum.take());
        let mxh = Mutex::new(out.mxh.take());
        let mxh_accum = Mutex::new(out.mxh_accum.take());
        let partial_sums = Mutex::new(Vec::with_capacity(self.nthreads));

        rayon::scope(|scope| {
            for _ in 0..self.nthreads {
                let dispatcher = &dispatcher;
                scope.spawn(|_| {
                    let mut workspace = FftWorkspace::new(self.fft_dims.logical);
                    let mut local_sum = CompensatedSum::default();
                    loop {
                        let (start, stop) = dispatcher.claim_job();
                        if start == stop {
                            break;
                        }
                        for line in start..stop {
                            let j = line % ry;
                            let k = line / ry;
                            let mut buf = vec![[Complex64::default(); 3]; lx];
                            {
                                let spectrum = spectrum.lock().unwrap();
                                for i in 0..cx {
                                    buf[i] = spectrum[spectrum_index(cx, ly, i, j, k)];
                                }
                            }
                            hermitian_extend_x(&mut buf, cx, lx);
                            workspace.fft_x_inverse(&mut buf);

                            for i in 0..rx {
                                let idx = mesh.index(i, j, k);
                                let ms = field.ms()[idx];
                                let spin = field.spin()[idx];
                                let h_cell = if ms > 0.0 {
                                    [buf[i][0].re / n, buf[i][1].re / n, buf[i][2].re / n]
                                } else {
                                    [0.0; 3]
                                };

                                if let Some(dst) = h.lock().unwrap().as_deref_mut() {
                                    dst[idx] = h_cell;
                                }
                                if let Some(dst) = h_accum.lock().unwrap().as_deref_mut() {
                                    dst[idx][0] += h_cell[0];
                                    dst[idx][1] += h_cell[1];
                                    dst[idx][2] += h_cell[2];
                                }

                                let energy_cell = if ms > 0.0 {
                                    -0.5 * MU0 * ms * dot(spin, h_cell)
                                } else {
                                    0.0
                                };
                                if let Some(dst) = energy.lock().unwrap().as_deref_mut() {
                                    dst[idx] = energy_cell;
                                }
                                if let Some(dst) = energy_accum.lock().unwrap().as_deref_mut() {
                                    dst[idx] += energy_cell;
                                }

                                let mxh_cell = cross(spin, h_cell);
                                if let Some(dst) = mxh.lock().unwrap().as_deref_mut() {
                                    dst[idx] = mxh_cell;
                                }
                                if let Some(dst) = mxh_accum.lock().unwrap().as_deref_mut() {
                                    dst[idx][0] += mxh_cell[0];
                                    dst[idx][1] += mxh_cell[1];
                                    dst[idx][2] += mxh_cell[2];
                                }

                                local_sum.add(energy_cell);
                            }
                        }
                    }
                    partial_sums.lock().unwrap().push(local_sum.value());
                });
            }
        });

        out.h = h.into_inner().unwrap();
        out.h_accum = h_accum.into_inner().unwrap();
        out.energy = energy.into_inner().unwrap();
        out.energy_accum = energy_accum.into_inner().unwrap();
        out.mxh = mxh.into_inner().unwrap();
        out.mxh_accum = mxh_accum.into_inner().unwrap();

        partial_sums.into_inner().unwrap().iter().sum::<f64>() * cell_volume
    }
}

/// Block size (number of whole `ly*lz` planes) the y/z embedding stage
/// claims per job, so that one job's working set fits in
/// `cache_size_kb` kilobytes (spec.md §6). Rounds up to one plane, with
/// a warning, if even a single plane does not fit the budget.
fn yz_block_size(cache_size_kb: usize, ly: usize, lz: usize) -> usize {
    let bytes_per_plane = (ly * lz * size_of::<Vector3c>()).max(1);
    let budget_bytes = cache_size_kb.saturating_mul(1024);
    let block = budget_bytes / bytes_per_plane;
    if block == 0 {
        log::warn!(
            "cache_size_kb={cache_size_kb} cannot fit one y/z plane ({bytes_per_plane} bytes); rounding up to block size 1"
        );
        1
    } else {
        block
    }
}

/// Flat index into a `Cx*Ly*Lz` spectrum buffer, `x` fastest.
fn spectrum_index(cx: usize, ly: usize, i: usize, j: usize, k: usize) -> usize {
    (k * ly + j) * cx + i
}

fn hermitian_extend_x(buf: &mut [Vector3c], cx: usize, lx: usize) {
    for i in cx..lx {
        let mirror = lx - i;
        if mirror < cx {
            let v = buf[mirror];
            buf[i] = [v[0].conj(), v[1].conj(), v[2].conj()];
        }
    }
}

/// Returns `(mirrored_index, reflected)` for folding a full-spectrum
/// index `idx` in `0..full` back into the stored octant of length
/// `octant` (the tensor is only stored for the non-negative half of
/// each axis beyond `x`, which is already half-spectrum both ways).
fn reflect(full: usize, octant: usize, idx: usize) -> (usize, bool) {
    if idx < octant {
        (idx, false)
    } else {
        (full - idx, true)
    }
}

/// Reconstructs the full symmetric 3x3 tensor matrix at full-spectrum
/// index `(i, j_full, k_full)` from the stored octant, applying the
/// sign flips implied by the parity rules of spec.md §3.
fn tensor_matrix_at(tensor: &DemagTensor, i: usize, j_full: usize, k_full: usize, ly: usize, lz: usize) -> [[f64; 3]; 3] {
    let octant = tensor.dims();
    let (jo, refl_y) = reflect(ly, octant[1], j_full);
    let (ko, refl_z) = reflect(lz, octant[2], k_full);
    let record = tensor.get(i, jo, ko);

    let a01 = if refl_y { -record.a01 } else { record.a01 };
    let a02 = if refl_z { -record.a02 } else { record.a02 };
    let a12 = if refl_y != refl_z { -record.a12 } else { record.a12 };

    [
        [record.a00, a01, a02],
        [a01, record.a11, a12],
        [a02, a12, record.a22],
    ]
}

fn matvec(m: [[f64; 3]; 3], v: Vector3c) -> Vector3c {
    let mut out = [Complex64::default(); 3];
    for (row, slot) in m.iter().zip(out.iter_mut()) {
        *slot = Complex64::new(row[0], 0.0) * v[0]
            + Complex64::new(row[1], 0.0) * v[1]
            + Complex64::new(row[2], 0.0) * v[2];
    }
    out
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Double-double-style compensated running sum (spec.md §5).
#[derive(Default)]
struct CompensatedSum {
    sum: f64,
    correction: f64,
}

impl CompensatedSum {
    fn add(&mut self, value: f64) {
        let y = value - self.correction;
        let t = self.sum + y;
        self.correction = (t - self.sum) - y;
        self.sum = t;
    }

    fn value(&self) -> f64 {
        self.sum
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensated_sum_matches_plain_sum_for_well_scaled_values() {
        let mut sum = CompensatedSum::default();
        let mut plain = 0.0;
        for i in 0..1000 {
            let v = (i as f64).sin();
            sum.add(v);
            plain += v;
        }
        assert!((sum.value() - plain).abs() < 1e-6);
    }

    #[test]
    fn cross_product_is_antisymmetric() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        let ab = cross(a, b);
        let ba = cross(b, a);
        for i in 0..3 {
            assert!((ab[i] + ba[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn reflect_identity_inside_octant() {
        assert_eq!(reflect(8, 5, 3), (3, false));
        assert_eq!(reflect(8, 5, 6), (2, true));
    }

    #[test]
    fn yz_block_size_fits_several_planes_for_a_generous_budget() {
        let block = yz_block_size(1024, 4, 4);
        let bytes_per_plane = 4 * 4 * size_of::<Vector3c>();
        assert_eq!(block, 1024 * 1024 / bytes_per_plane);
    }

    #[test]
    fn yz_block_size_rounds_up_to_one_plane_when_budget_is_too_small() {
        let block = yz_block_size(1, 256, 256);
        assert_eq!(block, 1);
    }
}
