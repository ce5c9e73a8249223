//! Mesh descriptor and cell-wise field storage.
//!
//! Everything here is a flat owned buffer plus integer strides — no
//! array-of-pointers, no per-row heap indirection. `x` is always the
//! fastest-varying index.

use crate::Error;

// ======================================================================
// Axis - PUBLIC

/// One of the three mesh axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// x axis.
    X,
    /// y axis.
    Y,
    /// z axis.
    Z,
}

impl Axis {
    pub(crate) const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub(crate) fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

// ======================================================================
// MeshSpec - PUBLIC

/// Geometry of a rectangular, axis-aligned mesh.
///
/// `dims` are cell counts `(rx, ry, rz)`, `cell_size` are edge lengths
/// `(dx, dy, dz)`, and `periodic` marks which axes repeat (at most two
/// may be set — see [`Error::Config`]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshSpec {
    dims: [usize; 3],
    cell_size: [f64; 3],
    periodic: [bool; 3],
}

impl MeshSpec {
    /// Creates a new mesh descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any dimension or edge length is
    /// non-positive, or if all three axes are requested periodic.
    pub fn new(dims: [usize; 3], cell_size: [f64; 3], periodic: [bool; 3]) -> Result<Self, Error> {
        if dims.iter().any(|&r| r == 0) {
            return Err(Error::Config {
                reason: format!("mesh dimensions must be positive, got {:?}", dims),
            });
        }
        if cell_size.iter().any(|&d| !(d > 0.0)) {
            return Err(Error::Config {
                reason: format!("cell edge lengths must be positive, got {:?}", cell_size),
            });
        }
        if periodic.iter().filter(|&&p| p).count() == 3 {
            return Err(Error::Config {
                reason: "3-axis periodicity is not supported".into(),
            });
        }
        Ok(Self {
            dims,
            cell_size,
            periodic,
        })
    }

    /// Cell counts `(rx, ry, rz)`.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Edge lengths `(dx, dy, dz)`.
    pub fn cell_size(&self) -> [f64; 3] {
        self.cell_size
    }

    /// Per-axis periodicity flags.
    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    /// Cell volume `dx * dy * dz`.
    pub fn cell_volume(&self) -> f64 {
        self.cell_size[0] * self.cell_size[1] * self.cell_size[2]
    }

    /// Total number of cells `rx * ry * rz`.
    pub fn cell_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Flat index of cell `(i, j, k)`, `x` fastest.
    #[inline(always)]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.dims[1] + j) * self.dims[0] + i
    }
}

// ======================================================================
// MagnetizationField - PUBLIC

/// Cell-wise magnetization vectors and per-cell saturation magnetization.
///
/// Stored as one flat `Vec<[f64; 3]>` of length `rx*ry*rz`, `x` fastest,
/// matching [`MeshSpec::index`]. A cell with `Ms == 0.0` is empty: the
/// demag engine guarantees `H`, energy density, and `m x H` are all
/// zero there (spec property 2).
pub struct MagnetizationField {
    spin: Vec<[f64; 3]>,
    ms: Vec<f64>,
}

impl MagnetizationField {
    /// Creates a zero-initialized field sized for `mesh`.
    pub fn zeros(mesh: &MeshSpec) -> Self {
        let n = mesh.cell_count();
        Self {
            spin: vec![[0.0; 3]; n],
            ms: vec![0.0; n],
        }
    }

    /// Magnetization direction/magnitude vectors.
    pub fn spin(&self) -> &[[f64; 3]] {
        &self.spin
    }

    /// Mutable access to magnetization vectors.
    pub fn spin_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.spin
    }

    /// Per-cell saturation magnetization (`Ms >= 0`; `0` marks an empty cell).
    pub fn ms(&self) -> &[f64] {
        &self.ms
    }

    /// Mutable access to per-cell saturation magnetization.
    pub fn ms_mut(&mut self) -> &mut [f64] {
        &mut self.ms
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.spin.len()
    }

    /// Returns `true` if this field has no cells.
    pub fn is_empty(&self) -> bool {
        self.spin.is_empty()
    }
}

// ======================================================================
// FFT dimensions - CRATE

/// FFT logical, half-spectrum, and tensor-octant dimensions derived
/// from a [`MeshSpec`] (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FftDims {
    /// Logical (zero-padded / symmetric-extension) lengths `(Lx,Ly,Lz)`.
    pub logical: [usize; 3],
    /// Half-spectrum lengths `(Cx,Cy,Cz)`, `Cx = Lx/2+1`.
    pub complex: [usize; 3],
    /// Tensor octant lengths `(Ax,Ay,Az)`, `A_a = L_a/2+1`.
    pub octant: [usize; 3],
}

impl FftDims {
    /// Smallest FFT-efficient length `>= 2*r` (or `1` if `r <= 1`).
    fn logical_length(r: usize) -> usize {
        if r <= 1 {
            1
        } else {
            next_fft_efficient_length(2 * r)
        }
    }

    pub(crate) fn from_mesh(mesh: &MeshSpec) -> Result<Self, Error> {
        let dims = mesh.dims();
        let mut logical = [0usize; 3];
        for a in 0..3 {
            logical[a] = Self::logical_length(dims[a]);
        }

        let mut complex = [0usize; 3];
        let mut octant = [0usize; 3];
        for a in 0..3 {
            complex[a] = if a == 0 { logical[0] / 2 + 1 } else { logical[a] };
            octant[a] = logical[a] / 2 + 1;
        }

        let total = logical[0]
            .checked_mul(logical[1])
            .and_then(|v| v.checked_mul(logical[2]))
            .ok_or_else(|| Error::Config {
                reason: "mesh FFT dimension product overflows".into(),
            })?;
        if total > isize::MAX as usize {
            return Err(Error::Config {
                reason: "mesh FFT dimension product exceeds signed index range".into(),
            });
        }

        Ok(Self {
            logical,
            complex,
            octant,
        })
    }
}

/// Smallest length `>= n` that is a product of small primes (2,3,5,7),
/// which is what `rustfft`'s mixed-radix planner handles efficiently.
fn next_fft_efficient_length(n: usize) -> usize {
    let mut len = n.max(1);
    loop {
        if is_fft_efficient(len) {
            return len;
        }
        len += 1;
    }
}

fn is_fft_efficient(mut n: usize) -> bool {
    for p in [2, 3, 5, 7] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

// ======================================================================
// TESTS
