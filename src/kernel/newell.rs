//! Analytic Newell demag-tensor primitives (Newell, Williams & Dunlop
//! 1993) and the cell-averaging finite-difference stencil built on top
//! of them.
//!
//! Every function here is pure: no allocation, no I/O, deterministic,
//! safe to call concurrently from any number of threads.

use std::f64::consts::PI;

// ======================================================================
// FUNCTIONS - PRIVATE - raw antiderivatives

/// `asinh(num/denom)`, treating a zero `denom` as the limiting value
/// `0` (the coefficient this term is always multiplied by vanishes at
/// least as fast as `asinh` diverges, so the product's true limit is
/// `0`).
#[inline]
fn safe_asinh_ratio(num: f64, denom: f64) -> f64 {
    if denom.abs() < 1e-300 {
        0.0
    } else {
        (num / denom).asinh()
    }
}

/// Raw Newell `f` antiderivative (units of length^3). `f(x,y,z)` is
/// the "diagonal" primitive: `newell_f_xx/yy/zz` are obtained from it
/// by permuting axes so the squared-doubled term always lands on the
/// tensor's own axis.
fn f_raw(x: f64, y: f64, z: f64) -> f64 {
    let r = (x * x + y * y + z * z).sqrt();

    let term1 = 0.5 * y * (z * z - x * x) * safe_asinh_ratio(y, (x * x + z * z).sqrt());
    let term2 = 0.5 * z * (y * y - x * x) * safe_asinh_ratio(z, (x * x + y * y).sqrt());
    let term3 = -x * y * z * (y * z).atan2(x * r);
    let term4 = (2.0 * x * x - y * y - z * z) * r / 6.0;

    term1 + term2 + term3 + term4
}

/// Raw Newell `g` antiderivative (units of length^3). `g(x,y,z)` is
/// the "off-diagonal xy" primitive; `newell_g_xz/yz` are obtained by
/// permuting axes.
fn g_raw(x: f64, y: f64, z: f64) -> f64 {
    let r = (x * x + y * y + z * z).sqrt();

    let term1 = x * y * z * safe_asinh_ratio(z, (x * x + y * y).sqrt());
    let term2 = (y / 6.0) * (3.0 * z * z - y * y) * safe_asinh_ratio(x, (y * y + z * z).sqrt());
    let term3 = (x / 6.0) * (3.0 * z * z - x * x) * safe_asinh_ratio(y, (x * x + z * z).sqrt());
    let term4 = -(z * z * z / 6.0) * (x * y).atan2(z * r);
    let term5 = -(z * y * y / 2.0) * (x * z).atan2(y * r);
    let term6 = -(z * x * x / 2.0) * (y * z).atan2(x * r);
    let term7 = -(x * y * r) / 3.0;

    term1 + term2 + term3 + term4 + term5 + term6 + term7
}

// ======================================================================
// FUNCTIONS - PUBLIC - raw antiderivatives, axis-permuted

/// `Nxx` antiderivative.
pub fn newell_f(x: f64, y: f64, z: f64) -> f64 {
    f_raw(x, y, z)
}

/// `Nyy` antiderivative (cyclic permutation of [`newell_f`]).
pub fn newell_f_yy(x: f64, y: f64, z: f64) -> f64 {
    f_raw(y, z, x)
}

/// `Nzz` antiderivative (cyclic permutation of [`newell_f`]).
pub fn newell_f_zz(x: f64, y: f64, z: f64) -> f64 {
    f_raw(z, x, y)
}

/// `Nxy` antiderivative.
pub fn newell_g_xy(x: f64, y: f64, z: f64) -> f64 {
    g_raw(x, y, z)
}

/// `Nxz` antiderivative (`y`/`z` swap of [`newell_g_xy`]).
pub fn newell_g_xz(x: f64, y: f64, z: f64) -> f64 {
    g_raw(x, z, y)
}

/// `Nyz` antiderivative (cyclic permutation of [`newell_g_xy`]).
pub fn newell_g_yz(x: f64, y: f64, z: f64) -> f64 {
    g_raw(y, z, x)
}

// ======================================================================
// FUNCTIONS - PUBLIC - cell-averaging stencil

/// Six-point mixed second difference `D^2_x D^2_y D^2_z phi`, evaluated
/// at `(x0,y0,z0)` with steps `(dx,dy,dz)` (spec.md §4.3 step 3, the
/// "D6f" operation).
///
/// This turns the raw antiderivative `phi` into the cell-averaged
/// tensor contribution between two cells of size `dx*dy*dz` whose
/// centers are offset by `(x0,y0,z0)`; the caller still divides by
/// `4*pi*dx*dy*dz` to get a dimensionless tensor entry.
pub fn d6_stencil<F>(phi: F, x0: f64, y0: f64, z0: f64, dx: f64, dy: f64, dz: f64) -> f64
where
    F: Fn(f64, f64, f64) -> f64,
{
    const TAPS: [(f64, f64); 3] = [(-1.0, 1.0), (0.0, -2.0), (1.0, 1.0)];

    let mut sum = 0.0;
    for &(ia, ca) in &TAPS {
        for &(ib, cb) in &TAPS {
            for &(ic, cc) in &TAPS {
                let weight = ca * cb * cc;
                if weight != 0.0 {
                    sum += weight * phi(x0 + ia * dx, y0 + ib * dy, z0 + ic * dz);
                }
            }
        }
    }
    sum
}

/// Cell-averaged tensor entry at offset `(x0,y0,z0)` for antiderivative
/// `phi`, already divided by `4*pi*dx*dy*dz`.
pub fn cell_averaged(
    phi: impl Fn(f64, f64, f64) -> f64,
    x0: f64,
    y0: f64,
    z0: f64,
    dx: f64,
    dy: f64,
    dz: f64,
) -> f64 {
    d6_stencil(phi, x0, y0, z0, dx, dy, dz) / (4.0 * PI * dx * dy * dz)
}

// ======================================================================
// FUNCTIONS - PRIVATE - self-demag closed form

/// Aharoni (1998) closed-form demagnetizing factor of a rectangular
/// prism of half-widths `(a,b,c)` along its own `a` axis.
///
/// Unlike [`cell_averaged`]'s mixed-difference stencil, this has no
/// large terms of opposite sign that must cancel at zero offset, which
/// is exactly why production code substitutes a dedicated formula at
/// the origin: the zero-offset point is the most cancellation-prone
/// point in the whole tensor (spec.md §4.1).
fn aharoni_self_demag(a: f64, b: f64, c: f64) -> f64 {
    let r = (a * a + b * b + c * c).sqrt();
    let rab = (a * a + b * b).sqrt();
    let rbc = (b * b + c * c).sqrt();
    let rca = (c * c + a * a).sqrt();

    let term1 = (b * b - c * c) / (2.0 * b * c) * ((r - a) / (r + a)).ln();
    let term2 = (a * a - c * c) / (2.0 * a * c) * ((r - b) / (r + b)).ln();
    let term3 = (b / (2.0 * c)) * ((rab + a) / (rab - a)).ln();
    let term4 = (a / (2.0 * c)) * ((rab + b) / (rab - b)).ln();
    let term5 = (c / (2.0 * a)) * ((rbc - c) / (rbc + c)).ln();
    let term6 = (c / (2.0 * b)) * ((rca - c) / (rca + c)).ln();
    let term7 = 2.0 * (a * b).atan2(c * r);
    let term8 = (a.powi(3) + b.powi(3) - 2.0 * c.powi(3)) / (3.0 * a * b * c);
    let term9 = (a * a + b * b - 2.0 * c * c) / (3.0 * a * b * c) * r;
    let term10 = (c / (a * b)) * (rca + rbc);
    let term11 = -(rab.powi(3) + rbc.powi(3) + rca.powi(3)) / (3.0 * a * b * c);

    (term1 + term2 + term3 + term4 + term5 + term6 + term7 + term8 + term9 + term10 + term11)
        / PI
}

// ======================================================================
// FUNCTIONS - PUBLIC - self-demag (zero-offset diagonal)

/// Self-demagnetizing factor `Nxx` of a single rectangular cell, via
/// the dedicated closed form of [`aharoni_self_demag`] rather than the
/// general [`cell_averaged`] stencil (spec.md §4.1).
pub fn self_demag_nx(dx: f64, dy: f64, dz: f64) -> f64 {
    aharoni_self_demag(dx / 2.0, dy / 2.0, dz / 2.0)
}

/// Self-demagnetizing factor `Nyy` of a single rectangular cell. See
/// [`self_demag_nx`].
pub fn self_demag_ny(dx: f64, dy: f64, dz: f64) -> f64 {
    aharoni_self_demag(dy / 2.0, dz / 2.0, dx / 2.0)
}

/// Self-demagnetizing factor `Nzz` of a single rectangular cell. See
/// [`self_demag_nx`].
pub fn self_demag_nz(dx: f64, dy: f64, dz: f64) -> f64 {
    aharoni_self_demag(dz / 2.0, dx / 2.0, dy / 2.0)
}

// ======================================================================
// TESTS
