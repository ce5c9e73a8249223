//! Tensor Kernel Library (spec.md §4.1): pure closed-form and
//! asymptotic evaluators for a single ordered triple of cell offsets.
//!
//! Nothing in this module allocates, performs I/O, or logs; every
//! function is thread-safe and deterministic.

/// Asymptotic (multipole) tensor approximations.
pub mod asymptotic;
/// Analytic Newell primitives and the cell-averaging stencil.
pub mod newell;

/// Re-exported asymptotic tensor-component family.
pub use asymptotic::AsymptoticFamily;
/// Re-exported Newell-primitive and self-demag functions.
pub use newell::{
    cell_averaged, d6_stencil, newell_f, newell_f_yy, newell_f_zz, newell_g_xy, newell_g_xz,
    newell_g_yz, self_demag_nx, self_demag_ny, self_demag_nz,
};
