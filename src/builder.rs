//! Tensor Builder (spec.md §4.3): one-time construction of the
//! frequency-domain demag tensor `Â`.
//!
//! Runs the eight-step algorithm: edge-ratio reduction, analytic/
//! asymptotic window fill, periodic folding, self-demag diagonal
//! correction, optional `1/3` shift, FFT-scale absorption, and three
//! forward one-dimensional transforms exploiting per-axis parity.

use crate::{
    config::Config,
    kernel::{self, AsymptoticFamily},
    mesh::{Axis, FftDims, MeshSpec},
    periodic::PeriodicTensorSummer,
    tensor::{DemagTensor, TensorRecord},
    workspace::FftWorkspace,
    Error,
};
use rustfft::num_complex::Complex64;

// ======================================================================
// TensorBuilder - PUBLIC

/// Builds the octant-stored, frequency-domain demag tensor for one
/// mesh and configuration.
pub struct TensorBuilder;

impl TensorBuilder {
    /// Runs the full build (spec.md §4.3 steps 1-9).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the mesh's FFT dimensions overflow,
    /// or [`Error::Resource`] if the tensor allocation would exceed
    /// addressable memory.
    pub fn build(mesh: &MeshSpec, config: &Config) -> Result<DemagTensor, Error> {
        config.validate(mesh.periodic())?;
        let fft_dims = FftDims::from_mesh(mesh)?;
        let reduced_cell_size = reduce_edge_ratios(mesh.cell_size());

        log::debug!(
            "building demag tensor: dims={:?} cell_size={:?} asymptotic_radius={} octant={:?}",
            mesh.dims(),
            mesh.cell_size(),
            config.asymptotic_radius_value(),
            fft_dims.octant,
        );

        let mut tensor = DemagTensor::zeros(fft_dims.octant);
        fill_window(&mut tensor, mesh, &reduced_cell_size, config)?;
        fold_periodic_images(&mut tensor, mesh, &reduced_cell_size, config)?;
        apply_self_demag_correction(&mut tensor, &reduced_cell_size, config);

        let mut workspace = FftWorkspace::new(fft_dims.logical);
        forward_transform_axes(&mut tensor, fft_dims, &mut workspace)?;

        Ok(tensor)
    }
}

/// Step 1: only the ratios `dx:dy:dz` matter to the tensor. Reduce the
/// triple to the smallest integer ratio via a continued-fraction
/// rational approximation (spec.md §4.3 step 1), which turns a
/// nanometer-scale triple like `(1e-9, 1e-9, 3e-9)` into a
/// small-magnitude one like `(1,1,3)` without changing the geometry
/// the kernels see. Falls back to rescaling to unit maximum when the
/// edge ratios are not close to any small rational.
fn reduce_edge_ratios(cell_size: [f64; 3]) -> [f64; 3] {
    if let Some(reduced) = continued_fraction_reduce(cell_size) {
        return reduced;
    }
    let max_edge = cell_size.iter().cloned().fold(f64::MIN, f64::max).max(f64::EPSILON);
    [
        cell_size[0] / max_edge,
        cell_size[1] / max_edge,
        cell_size[2] / max_edge,
    ]
}

/// Largest denominator accepted as a "good" rational approximation in
/// [`continued_fraction_ratio`]; ratios needing a larger denominator
/// are treated as not usefully rational.
const MAX_CONTINUED_FRACTION_DENOMINATOR: u64 = 1000;

/// Relative tolerance for accepting a continued-fraction convergent as
/// equal to the ratio it approximates.
const CONTINUED_FRACTION_TOLERANCE: f64 = 1e-9;

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Attempts to reduce `cell_size`'s ratios to a small integer triple by
/// finding continued-fraction rational approximants of `dy/dx` and
/// `dz/dx`, then combining numerators and denominators into a common
/// integer triple and dividing out their GCD.
fn continued_fraction_reduce(cell_size: [f64; 3]) -> Option<[f64; 3]> {
    let [dx, dy, dz] = cell_size;
    let (py, qy) = continued_fraction_ratio(dy / dx)?;
    let (pz, qz) = continued_fraction_ratio(dz / dx)?;

    let nx = qy.checked_mul(qz)?;
    let ny = py.checked_mul(qz)?;
    let nz = pz.checked_mul(qy)?;
    let divisor = gcd(gcd(nx, ny), nz);
    if divisor == 0 {
        return None;
    }
    Some([
        (nx / divisor) as f64,
        (ny / divisor) as f64,
        (nz / divisor) as f64,
    ])
}

/// Best rational approximant `p/q` of `x` via the standard
/// continued-fraction convergent recurrence (`h_{-2}=0, h_{-1}=1`,
/// `k_{-2}=1, k_{-1}=0`, `h_n = a_n h_{n-1} + h_{n-2}`, likewise for
/// `k`), accepted once within [`CONTINUED_FRACTION_TOLERANCE`] of `x`
/// or `None` if no convergent within
/// [`MAX_CONTINUED_FRACTION_DENOMINATOR`] gets there.
fn continued_fraction_ratio(x: f64) -> Option<(u64, u64)> {
    if !x.is_finite() || x <= 0.0 {
        return None;
    }

    let (mut h_prev2, mut h_prev1) = (0u64, 1u64);
    let (mut k_prev2, mut k_prev1) = (1u64, 0u64);
    let mut remainder = x;

    for _ in 0..32 {
        let a = remainder.floor();
        if !(0.0..=(u64::MAX as f64)).contains(&a) {
            return None;
        }
        let a = a as u64;

        let h = a.checked_mul(h_prev1)?.checked_add(h_prev2)?;
        let k = a.checked_mul(k_prev1)?.checked_add(k_prev2)?;
        if k > MAX_CONTINUED_FRACTION_DENOMINATOR {
            return None;
        }
        h_prev2 = h_prev1;
        h_prev1 = h;
        k_prev2 = k_prev1;
        k_prev1 = k;

        if k_prev1 > 0 && ((h_prev1 as f64 / k_prev1 as f64) - x).abs() < CONTINUED_FRACTION_TOLERANCE * x {
            return Some((h_prev1, k_prev1));
        }

        let frac = remainder - a as f64;
        if frac.abs() < 1e-15 {
            return None;
        }
        remainder = 1.0 / frac;
    }

    None
}

/// Step 2-3: analytic window fill inside the asymptotic radius,
/// asymptotic form outside it.
fn fill_window(
    tensor: &mut DemagTensor,
    mesh: &MeshSpec,
    cell_size: &[f64; 3],
    config: &Config,
) -> Result<(), Error> {
    let [dx, dy, dz] = *cell_size;
    let octant = tensor.dims();
    let arad = config.asymptotic_radius_value();

    let window = if arad < 0.0 {
        octant
    } else {
        [
            window_extent(arad, dx, mesh.dims()[0]),
            window_extent(arad, dy, mesh.dims()[1]),
            window_extent(arad, dz, mesh.dims()[2]),
        ]
    };

    let error = config.demag_tensor_error_value();
    let order = config.asymptotic_order_value();
    let xx = AsymptoticFamily::xx(dx, dy, dz, error, order);
    let yy = AsymptoticFamily::yy(dx, dy, dz, error, order);
    let zz = AsymptoticFamily::zz(dx, dy, dz, error, order);
    let xy = AsymptoticFamily::xy(dx, dy, dz, error, order);
    let xz = AsymptoticFamily::xz(dx, dy, dz, error, order);
    let yz = AsymptoticFamily::yz(dx, dy, dz, error, order);

    for k in 0..octant[2] {
        for j in 0..octant[1] {
            for i in 0..octant[0] {
                let (x, y, z) = (i as f64 * dx, j as f64 * dy, k as f64 * dz);
                let analytic = i < window[0] && j < window[1] && k < window[2];
                let record = if analytic {
                    TensorRecord {
                        a00: kernel::cell_averaged(kernel::newell_f, x, y, z, dx, dy, dz),
                        a01: kernel::cell_averaged(kernel::newell_g_xy, x, y, z, dx, dy, dz),
                        a02: kernel::cell_averaged(kernel::newell_g_xz, x, y, z, dx, dy, dz),
                        a11: kernel::cell_averaged(kernel::newell_f_yy, x, y, z, dx, dy, dz),
                        a12: kernel::cell_averaged(kernel::newell_g_yz, x, y, z, dx, dy, dz),
                        a22: kernel::cell_averaged(kernel::newell_f_zz, x, y, z, dx, dy, dz),
                    }
                } else {
                    TensorRecord {
                        a00: xx.asymptotic(x, y, z),
                        a01: xy.asymptotic(x, y, z),
                        a02: xz.asymptotic(x, y, z),
                        a11: yy.asymptotic(x, y, z),
                        a12: yz.asymptotic(x, y, z),
                        a22: zz.asymptotic(x, y, z),
                    }
                };
                tensor.set(i, j, k, record);
            }
        }
    }
    Ok(())
}

fn window_extent(asymptotic_radius: f64, edge: f64, cell_count: usize) -> usize {
    let w = (0.5 + asymptotic_radius / edge).ceil().max(0.0) as usize;
    w.min(cell_count)
}

/// Step 4: for each periodic axis, add the remainder the window fill
/// did not already account for.
fn fold_periodic_images(
    tensor: &mut DemagTensor,
    mesh: &MeshSpec,
    reduced_cell_size: &[f64; 3],
    config: &Config,
) -> Result<(), Error> {
    let octant = tensor.dims();
    let periodic = mesh.periodic();
    for axis in Axis::ALL {
        if !periodic[axis.index()] {
            continue;
        }
        let period_cells = mesh.dims()[axis.index()];
        let summer = PeriodicTensorSummer::new(
            axis,
            period_cells,
            *reduced_cell_size,
            config.asymptotic_radius_value(),
        )?;
        for k in 0..octant[2] {
            for j in 0..octant[1] {
                for i in 0..octant[0] {
                    let hole = summer.compute_periodic_hole_tensor(i as i64, j as i64, k as i64);
                    let mut record = tensor.get(i, j, k);
                    record.a00 += hole.a00;
                    record.a01 += hole.a01;
                    record.a02 += hole.a02;
                    record.a11 += hole.a11;
                    record.a12 += hole.a12;
                    record.a22 += hole.a22;
                    tensor.set(i, j, k, record);
                }
            }
        }
    }
    Ok(())
}

/// Steps 5-6: replace the origin diagonal with the dedicated
/// self-demag closed forms, zero its off-diagonals, and optionally
/// subtract `1/3` from each diagonal entry.
fn apply_self_demag_correction(tensor: &mut DemagTensor, reduced_cell_size: &[f64; 3], config: &Config) {
    let [dx, dy, dz] = *reduced_cell_size;
    let mut nxx = kernel::self_demag_nx(dx, dy, dz);
    let mut nyy = kernel::self_demag_ny(dx, dy, dz);
    let mut nzz = kernel::self_demag_nz(dx, dy, dz);
    if config.zero_self_demag_value() {
        nxx -= 1.0 / 3.0;
        nyy -= 1.0 / 3.0;
        nzz -= 1.0 / 3.0;
    }
    tensor.set(
        0,
        0,
        0,
        TensorRecord {
            a00: nxx,
            a01: 0.0,
            a02: 0.0,
            a11: nyy,
            a12: 0.0,
            a22: nzz,
        },
    );
}

/// Parity (even/odd) of each of the six tensor components along each
/// of the three axes, per spec.md §3.
const COMPONENT_PARITY: [[bool; 3]; 6] = [
    [true, true, true],   // A00 = Nxx: even in x,y,z
    [false, false, true], // A01 = Nxy: odd in x,y; even in z
    [false, true, false], // A02 = Nxz: odd in x,z; even in y
    [true, true, true],   // A11 = Nyy
    [true, false, false], // A12 = Nyz: even in x; odd in y,z
    [true, true, true],   // A22 = Nzz
];

/// Step 7-8: absorb the FFT scale (here, just the sign flip for `-N`;
/// `rustfft` applies no automatic amplitude normalization on either
/// direction, so no further per-axis scale factor is needed here), then
/// forward-transform each axis in turn using the mirror-extension
/// technique of spec.md §4.3 step 8.
fn forward_transform_axes(
    tensor: &mut DemagTensor,
    fft_dims: FftDims,
    workspace: &mut FftWorkspace,
) -> Result<(), Error> {
    const FFT_SIGN: f64 = -1.0;
    let octant = tensor.dims();
    for k in 0..octant[2] {
        for j in 0..octant[1] {
            for i in 0..octant[0] {
                let mut record = tensor.get(i, j, k);
                record.a00 *= FFT_SIGN;
                record.a01 *= FFT_SIGN;
                record.a02 *= FFT_SIGN;
                record.a11 *= FFT_SIGN;
                record.a12 *= FFT_SIGN;
                record.a22 *= FFT_SIGN;
                tensor.set(i, j, k, record);
            }
        }
    }

    for axis in Axis::ALL {
        transform_axis(tensor, axis, fft_dims, workspace);
    }
    Ok(())
}

fn component_get(record: TensorRecord, idx: usize) -> f64 {
    match idx {
        0 => record.a00,
        1 => record.a01,
        2 => record.a02,
        3 => record.a11,
        4 => record.a12,
        _ => record.a22,
    }
}

fn component_set(record: &mut TensorRecord, idx: usize, value: f64) {
    match idx {
        0 => record.a00 = value,
        1 => record.a01 = value,
        2 => record.a02 = value,
        3 => record.a11 = value,
        4 => record.a12 = value,
        _ => record.a22 = value,
    }
}

/// Transforms all six components along one axis in place, using the
/// mirror-extension FFT trick: a length-`octant_len` half-line is
/// extended to the full logical length with the parity-appropriate
/// mirror image (endpoints counted once, per spec.md §4.3 step 8/NOTES
/// VII), transformed with the workspace's cached plan for that axis,
/// and read back as the real part (even parity) or the negated
/// imaginary part (odd parity).
fn transform_axis(tensor: &mut DemagTensor, axis: Axis, fft_dims: FftDims, workspace: &mut FftWorkspace) {
    let octant = tensor.dims();
    let axis_idx = axis.index();
    let logical_len = fft_dims.logical[axis_idx];
    let octant_len = octant[axis_idx];

    if logical_len <= 1 {
        return;
    }

    let other = perpendicular_indices(axis_idx);
    for a in 0..octant[other[0]] {
        for b in 0..octant[other[1]] {
            for component in 0..6 {
                let even = COMPONENT_PARITY[component][axis_idx];
                let mut line = vec![0.0f64; octant_len];
                for (t, slot) in line.iter_mut().enumerate() {
                    let idx = axis_triple(axis_idx, t, other, a, b);
                    *slot = component_get(tensor.get(idx[0], idx[1], idx[2]), component);
                }

                let extended = mirror_extend(&line, logical_len, even);
                let mut complex_line: Vec<[Complex64; 3]> = extended
                    .iter()
                    .map(|&v| [Complex64::new(v, 0.0); 3])
                    .collect();
                match axis_idx {
                    0 => workspace.fft_x_forward(&mut complex_line),
                    1 => workspace.fft_y_forward(&mut complex_line),
                    _ => workspace.fft_z_forward(&mut complex_line),
                }

                for (t, sample) in complex_line.iter().take(octant_len).enumerate() {
                    let value = if even { sample[0].re } else { -sample[0].im };
                    let idx = axis_triple(axis_idx, t, other, a, b);
                    let mut record = tensor.get(idx[0], idx[1], idx[2]);
                    component_set(&mut record, component, value);
                    tensor.set(idx[0], idx[1], idx[2], record);
                }
            }
        }
    }
}

fn perpendicular_indices(axis_idx: usize) -> [usize; 2] {
    match axis_idx {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    }
}

fn axis_triple(axis_idx: usize, t: usize, other: [usize; 2], a: usize, b: usize) -> [usize; 3] {
    let mut idx = [0usize; 3];
    idx[axis_idx] = t;
    idx[other[0]] = a;
    idx[other[1]] = b;
    idx
}

/// Builds the length-`logical_len` (anti)symmetric extension of a
/// half-line `values` of length `octant_len = logical_len/2 + 1`.
fn mirror_extend(values: &[f64], logical_len: usize, even: bool) -> Vec<f64> {
    let mut full = vec![0.0; logical_len];
    let octant_len = values.len();
    for (t, slot) in full.iter_mut().enumerate().take(octant_len) {
        *slot = values[t];
    }
    let sign = if even { 1.0 } else { -1.0 };
    for t in octant_len..logical_len {
        let mirror = logical_len - t;
        if mirror < octant_len {
            full[t] = sign * values[mirror];
        }
    }
    full
}

// ======================================================================
// TESTS
