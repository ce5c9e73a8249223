//! Thread-Local FFT Workspace (spec.md §4.4): per-worker cached FFT
//! plans and scratch buffers, recycled across steps.
//!
//! Scratch is stored 3-wide (one `Complex<f64>` per vector component,
//! interleaved) rather than as three parallel scalar arrays, mirroring
//! the `ODTV_VECSIZE`-strided layout of the source's per-thread locker
//! (SPEC_FULL §10.8): the convolution engine's 3x3 symmetric-tensor
//! multiply then operates on one contiguous `[Complex<f64>; 3]` per
//! grid point instead of gathering three separate arrays.

use std::sync::Arc;

use rustfft::{num_complex::Complex64, Fft, FftPlanner};

/// One vector-valued (3-wide) complex sample.
pub type Vector3c = [Complex64; 3];

// ======================================================================
// FftWorkspace - PUBLIC

/// Per-worker FFT plans and scratch, sized for one mesh's FFT
/// dimensions.
///
/// Created once per worker on first use and reused for the lifetime of
/// the engine (spec.md §4.4); never shared across workers.
pub struct FftWorkspace {
    fft_x_forward: Arc<dyn Fft<f64>>,
    fft_x_inverse: Arc<dyn Fft<f64>>,
    fft_y_forward: Arc<dyn Fft<f64>>,
    fft_y_inverse: Arc<dyn Fft<f64>>,
    fft_z_forward: Arc<dyn Fft<f64>>,
    fft_z_inverse: Arc<dyn Fft<f64>>,

    /// x-axis scratch: one line of `logical_x` vector samples, used
    /// both for the forward real-to-complex pack and the inverse
    /// complex-to-real unpack.
    pub x_scratch: Vec<Vector3c>,
    /// y-axis scratch: `logical_y` vector samples per x-plane column.
    pub y_scratch: Vec<Vector3c>,
    /// z-axis scratch: `logical_z` vector samples per x-plane column.
    pub z_scratch: Vec<Vector3c>,

    /// Scratch rustfft needs internally, sized to the largest of the
    /// three transform lengths (`Fft::get_inplace_scratch_len`).
    fft_scratch: Vec<Complex64>,
}

impl FftWorkspace {
    /// Builds a workspace for logical FFT lengths `(logical_x,
    /// logical_y, logical_z)`, caching one planned transform per axis
    /// (forward and inverse share the planner but are distinct plans).
    pub fn new(logical: [usize; 3]) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft_x_forward = planner.plan_fft_forward(logical[0]);
        let fft_x_inverse = planner.plan_fft_inverse(logical[0]);
        let fft_y_forward = planner.plan_fft_forward(logical[1]);
        let fft_y_inverse = planner.plan_fft_inverse(logical[1]);
        let fft_z_forward = planner.plan_fft_forward(logical[2]);
        let fft_z_inverse = planner.plan_fft_inverse(logical[2]);

        let scratch_len = [
            &fft_x_forward,
            &fft_x_inverse,
            &fft_y_forward,
            &fft_y_inverse,
            &fft_z_forward,
            &fft_z_inverse,
        ]
        .iter()
        .map(|p| p.get_inplace_scratch_len())
        .max()
        .unwrap_or(0);

        Self {
            x_scratch: vec![[Complex64::default(); 3]; logical[0]],
            y_scratch: vec![[Complex64::default(); 3]; logical[1]],
            z_scratch: vec![[Complex64::default(); 3]; logical[2]],
            fft_scratch: vec![Complex64::default(); scratch_len],
            fft_x_forward,
            fft_x_inverse,
            fft_y_forward,
            fft_y_inverse,
            fft_z_forward,
            fft_z_inverse,
        }
    }

    /// Runs the cached x-axis forward transform in place over `buf`,
    /// one vector component at a time.
    pub fn fft_x_forward(&mut self, buf: &mut [Vector3c]) {
        run_componentwise(&*self.fft_x_forward, buf, &mut self.fft_scratch);
    }

    /// Runs the cached x-axis inverse transform in place over `buf`.
    pub fn fft_x_inverse(&mut self, buf: &mut [Vector3c]) {
        run_componentwise(&*self.fft_x_inverse, buf, &mut self.fft_scratch);
    }

    /// Runs the cached y-axis forward transform in place over `buf`.
    pub fn fft_y_forward(&mut self, buf: &mut [Vector3c]) {
        run_componentwise(&*self.fft_y_forward, buf, &mut self.fft_scratch);
    }

    /// Runs the cached y-axis inverse transform in place over `buf`.
    pub fn fft_y_inverse(&mut self, buf: &mut [Vector3c]) {
        run_componentwise(&*self.fft_y_inverse, buf, &mut self.fft_scratch);
    }

    /// Runs the cached z-axis forward transform in place over `buf`.
    pub fn fft_z_forward(&mut self, buf: &mut [Vector3c]) {
        run_componentwise(&*self.fft_z_forward, buf, &mut self.fft_scratch);
    }

    /// Runs the cached z-axis inverse transform in place over `buf`.
    pub fn fft_z_inverse(&mut self, buf: &mut [Vector3c]) {
        run_componentwise(&*self.fft_z_inverse, buf, &mut self.fft_scratch);
    }
}

/// Applies a planned scalar FFT to each of the three vector components
/// of `buf` independently (de-interleave, transform, re-interleave via
/// a small fixed-size stack buffer to avoid per-call heap traffic).
fn run_componentwise(fft: &dyn Fft<f64>, buf: &mut [Vector3c], scratch: &mut [Complex64]) {
    let len = buf.len();
    let mut component = vec![Complex64::default(); len];
    for axis in 0..3 {
        for (dst, src) in component.iter_mut().zip(buf.iter()) {
            *dst = src[axis];
        }
        fft.process_with_scratch(&mut component, scratch);
        for (src, dst) in component.iter().zip(buf.iter_mut()) {
            dst[axis] = *src;
        }
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_then_inverse_recovers_input_up_to_scale() {
        let mut workspace = FftWorkspace::new([8, 1, 1]);
        let mut buf: Vec<Vector3c> = (0..8)
            .map(|i| [Complex64::new(i as f64, 0.0); 3])
            .collect();
        let original = buf.clone();

        workspace.fft_x_forward(&mut buf);
        workspace.fft_x_inverse(&mut buf);

        let n = buf.len() as f64;
        for (got, want) in buf.iter().zip(original.iter()) {
            for axis in 0..3 {
                assert!((got[axis].re / n - want[axis].re).abs() < 1e-9);
                assert!((got[axis].im / n - want[axis].im).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn workspace_scratch_sized_per_axis() {
        let workspace = FftWorkspace::new([4, 8, 2]);
        assert_eq!(workspace.x_scratch.len(), 4);
        assert_eq!(workspace.y_scratch.len(), 8);
        assert_eq!(workspace.z_scratch.len(), 2);
    }
}
