//! Engine configuration (spec.md §6).

use crate::Error;

// ======================================================================
// TensorDumpFormat - PUBLIC

/// On-disk representation for a dumped demag tensor (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorDumpFormat {
    /// IEEE 754 binary, 4 bytes per value (`f32`).
    Binary4,
    /// IEEE 754 binary, 8 bytes per value (`f64`).
    Binary8,
    /// Plain text, one `printf`-style formatted value per field.
    Text,
}

// ======================================================================
// Config - PUBLIC

/// Engine configuration.
///
/// Construct with [`Config::default`] and adjust with the builder
/// setters, e.g.:
///
/// ```rust
/// use oxs_demag::Config;
///
/// let config = Config::default()
///     .asymptotic_radius(16.0)
///     .zero_self_demag(true);
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    asymptotic_radius: f64,
    cache_size_kb: usize,
    zero_self_demag: bool,
    demag_tensor_error: f64,
    asymptotic_order: usize,
    save_tensor_path: Option<String>,
    save_tensor_fmt: TensorDumpFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            asymptotic_radius: 32.0,
            cache_size_kb: 1024,
            zero_self_demag: false,
            demag_tensor_error: 1e-11,
            asymptotic_order: 4,
            save_tensor_path: None,
            save_tensor_fmt: TensorDumpFormat::Binary8,
        }
    }
}

impl Config {
    /// Boundary between analytic and asymptotic tensor fill, in units
    /// of `(dx*dy*dz)^(1/3)`. `< 0` disables the asymptotic form for
    /// non-periodic meshes; default `32`.
    pub fn asymptotic_radius(mut self, value: f64) -> Self {
        self.asymptotic_radius = value;
        self
    }

    /// Controls the y/z embedding block size of the convolution
    /// engine; default `1024`.
    pub fn cache_size_kb(mut self, value: usize) -> Self {
        self.cache_size_kb = value;
        self
    }

    /// Subtract `1/3` from each diagonal tensor entry at the origin
    /// cell, making `H_self = 0` for a cubic cell; default `false`.
    pub fn zero_self_demag(mut self, value: bool) -> Self {
        self.zero_self_demag = value;
        self
    }

    /// Target absolute error in tensor entries; feeds the asymptotic
    /// order selection.
    pub fn demag_tensor_error(mut self, value: f64) -> Self {
        self.demag_tensor_error = value;
        self
    }

    /// Maximum multipole order retained in the asymptotic expansion.
    pub fn asymptotic_order(mut self, value: usize) -> Self {
        self.asymptotic_order = value;
        self
    }

    /// If set, the engine dumps `A-hat` as a six-component real field
    /// to this path the next time it is (re)built.
    pub fn save_tensor_path(mut self, path: impl Into<String>, fmt: TensorDumpFormat) -> Self {
        self.save_tensor_path = Some(path.into());
        self.save_tensor_fmt = fmt;
        self
    }

    pub(crate) fn asymptotic_radius_value(&self) -> f64 {
        self.asymptotic_radius
    }

    pub(crate) fn cache_size_kb_value(&self) -> usize {
        self.cache_size_kb
    }

    pub(crate) fn zero_self_demag_value(&self) -> bool {
        self.zero_self_demag
    }

    pub(crate) fn demag_tensor_error_value(&self) -> f64 {
        self.demag_tensor_error
    }

    pub(crate) fn asymptotic_order_value(&self) -> usize {
        self.asymptotic_order
    }

    pub(crate) fn save_tensor(&self) -> Option<(&str, TensorDumpFormat)> {
        self.save_tensor_path
            .as_deref()
            .map(|path| (path, self.save_tensor_fmt))
    }

    /// Validates this configuration against `periodic`, the mesh's
    /// per-axis periodicity flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `asymptotic_radius < 0` is
    /// requested together with any periodic axis (spec.md §9: the
    /// source leaves this combination ambiguous for periodic meshes;
    /// this crate disallows it rather than guess), or if
    /// `cache_size_kb` / `asymptotic_order` is zero.
    pub fn validate(&self, periodic: [bool; 3]) -> Result<(), Error> {
        if self.asymptotic_radius < 0.0 && periodic.iter().any(|&p| p) {
            return Err(Error::Config {
                reason: "asymptotic_radius < 0 is not supported for periodic meshes".into(),
            });
        }
        if self.cache_size_kb == 0 {
            return Err(Error::Config {
                reason: "cache_size_kb must be positive".into(),
            });
        }
        if self.asymptotic_order == 0 {
            return Err(Error::Config {
                reason: "asymptotic_order must be positive".into(),
            });
        }
        Ok(())
    }
}

// ======================================================================
// TESTS
