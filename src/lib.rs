//! Parallel FFT-based demagnetization field engine for rectangular
//! micromagnetic meshes.
//!
//! [`Engine`] owns the one-time frequency-domain tensor build and the
//! per-step convolution that turns a magnetization field into the
//! demagnetizing field `H`, its energy density, and `m x H`. Everything
//! outside this (the wider energy-term framework, time integrators,
//! scripting) is a host concern.
#![deny(missing_docs)]

mod builder;
mod config;
mod convolution;
mod dispatcher;
mod error;
mod io;
mod kernel;
mod mesh;
mod periodic;
mod preconditioner;
mod tensor;
#[cfg(test)]
mod test_util;
mod util;
mod workspace;

pub use crate::{
    config::{Config, TensorDumpFormat},
    convolution::OutputRequest,
    error::Error,
    mesh::{Axis, MagnetizationField, MeshSpec},
    tensor::{DemagTensor, TensorRecord},
};

use crate::{builder::TensorBuilder, convolution::ConvolutionEngine, mesh::FftDims, preconditioner::Preconditioner};

const MU0: f64 = 4.0 * std::f64::consts::PI * 1e-7;

// ======================================================================
// Engine - PUBLIC

/// The demagnetization field engine.
///
/// Owns the frequency-domain tensor `A-hat`, the x-spectrum buffer, and
/// all worker scratch; borrows the mesh descriptor and magnetization
/// field read-only on each call. Construct with [`Engine::new`], then
/// call [`Engine::compute_energy`] once per time step.
pub struct Engine {
    config: Config,
    nthreads: usize,
    built: Option<BuiltState>,
}

struct BuiltState {
    mesh: MeshSpec,
    fft_dims: FftDims,
    tensor: DemagTensor,
    energy_density_error_estimate: f64,
}

impl Engine {
    /// Creates a new, uninitialized engine. The tensor is built lazily
    /// on the first [`Engine::compute_energy`] call (spec.md §4.6
    /// state machine).
    pub fn new(config: Config) -> Self {
        Self {
            config,
            nthreads: rayon::current_num_threads().max(1),
            built: None,
        }
    }

    /// Overrides the worker thread count used by the convolution
    /// engine and tensor builder (default: `rayon`'s global pool size).
    pub fn with_nthreads(mut self, nthreads: usize) -> Self {
        self.nthreads = nthreads.max(1);
        self
    }

    /// Forces the engine back to *uninitialized*, dropping the cached
    /// tensor and error estimate. The next [`Engine::compute_energy`]
    /// call rebuilds from scratch.
    pub fn init(&mut self) {
        self.built = None;
    }

    /// Reports the cached energy-density error estimate (spec.md
    /// §4.6 step 1), or `None` if the engine has not built a tensor
    /// yet.
    pub fn energy_density_error_estimate(&self) -> Option<f64> {
        self.built.as_ref().map(|b| b.energy_density_error_estimate)
    }

    /// Runs one convolution step for `mesh`/`field`, writing whichever
    /// outputs `out` requests, and returns the total demag energy.
    ///
    /// Rebuilds the tensor first if `mesh` differs from the last call
    /// (spec.md §4.6 state machine: *uninitialized* -> *armed*).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `mesh`'s FFT dimensions overflow or
    /// `field` is sized for a different mesh, or [`Error::Io`] if a
    /// configured tensor dump fails to write.
    pub fn compute_energy(
        &mut self,
        mesh: &MeshSpec,
        field: &MagnetizationField,
        out: &mut OutputRequest,
    ) -> Result<f64, Error> {
        if field.len() != mesh.cell_count() {
            return Err(Error::Config {
                reason: format!(
                    "magnetization field has {} cells, mesh has {}",
                    field.len(),
                    mesh.cell_count()
                ),
            });
        }

        self.ensure_built(mesh, field)?;
        let built = self.built.as_ref().ok_or_else(|| Error::Invariant {
            what: "tensor build did not populate engine state".into(),
        })?;

        let engine = ConvolutionEngine::new(
            &built.tensor,
            built.fft_dims,
            self.nthreads,
            self.config.cache_size_kb_value(),
        );
        Ok(engine.run(mesh, field, out))
    }

    /// Accumulates the diagonal preconditioner of spec.md §4.7 into
    /// `out_diag`, one 3-vector per mesh cell. Independent of the
    /// cached convolution tensor; does not trigger a rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `out_diag` is not sized for `mesh`.
    pub fn increment_preconditioner(
        &self,
        mesh: &MeshSpec,
        field: &MagnetizationField,
        out_diag: &mut [[f64; 3]],
    ) -> Result<(), Error> {
        Preconditioner::increment(mesh, field, &self.config, out_diag)
    }

    fn ensure_built(&mut self, mesh: &MeshSpec, field: &MagnetizationField) -> Result<(), Error> {
        let needs_build = match &self.built {
            None => true,
            Some(built) => &built.mesh != mesh,
        };
        if !needs_build {
            return Ok(());
        }

        let tensor = TensorBuilder::build(mesh, &self.config)?;
        let fft_dims = FftDims::from_mesh(mesh)?;
        let max_ms = field.ms().iter().cloned().fold(0.0f64, f64::max);
        let energy_density_error_estimate = estimate_energy_density_error(max_ms, &fft_dims);

        if let Some((path, fmt)) = self.config.save_tensor() {
            io::TensorDumpWriter::write(path, mesh, &tensor, fmt)?;
        }

        log::debug!(
            "demag engine rebuilt: mesh_dims={:?} fft_logical={:?} error_estimate={:e}",
            mesh.dims(),
            fft_dims.logical,
            energy_density_error_estimate,
        );

        self.built = Some(BuiltState {
            mesh: *mesh,
            fft_dims,
            tensor,
            energy_density_error_estimate,
        });
        Ok(())
    }
}

/// Per-cell energy-density error estimate of spec.md §4.6 step 1:
/// `½·ε_mach·μ0·max(Ms)²·(log2(Cx)+log2(Cy)+log2(Cz))`, a bound on the
/// floating-point rounding accumulated by `Cx·Cy·Cz`-point FFTs.
fn estimate_energy_density_error(max_ms: f64, fft_dims: &FftDims) -> f64 {
    let log2_sum: f64 = fft_dims.complex.iter().map(|&c| (c.max(1) as f64).log2()).sum();
    0.5 * f64::EPSILON * MU0 * max_ms * max_ms * log2_sum
}

// ======================================================================
// TESTS
