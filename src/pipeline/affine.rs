//! 2x3 affine transforms and bilinear warping.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Array3, ArrayView3, Axis};

use crate::error::{Error, Result};

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// A 2x3 affine transform `[[a, b, c], [d, e, f]]`.
///
/// A point `(x, y)` maps to `(a*x + b*y + c, d*x + e*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    m: [[f64; 3]; 2],
}

impl AffineMatrix {
    /// Create a transform from its two rows.
    #[must_use]
    pub const fn new(m: [[f64; 3]; 2]) -> Self {
        Self { m }
    }

    /// The identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    /// The two rows of the transform.
    #[must_use]
    pub const fn rows(&self) -> [[f64; 3]; 2] {
        self.m
    }

    /// Map a point through the transform.
    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [[a, b, c], [d, e, f]] = self.m;
        (a.mul_add(x, b.mul_add(y, c)), d.mul_add(x, e.mul_add(y, f)))
    }

    /// Invert the transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the linear part is singular.
    pub fn invert(&self) -> Result<Self> {
        let [[a, b, c], [d, e, f]] = self.m;
        let det = a.mul_add(e, -(b * d));
        if det.abs() < SINGULAR_EPS || !det.is_finite() {
            return Err(Error::InvalidParameter {
                name: "affine".to_string(),
                reason: format!("matrix is not invertible (determinant {det})"),
            });
        }

        let inv = 1.0 / det;
        Ok(Self::new([
            [e * inv, -b * inv, b.mul_add(f, -(c * e)) * inv],
            [-d * inv, a * inv, c.mul_add(d, -(a * f)) * inv],
        ]))
    }

    /// Multiply every coefficient, including the translation, by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let mut m = self.m;
        for value in m.iter_mut().flatten() {
            *value *= factor;
        }
        Self::new(m)
    }

    /// Add an offset to the translation terms.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        let mut m = self.m;
        m[0][2] += dx;
        m[1][2] += dy;
        Self::new(m)
    }
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for AffineMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [[a, b, c], [d, e, g]] = self.m;
        write!(f, "{a},{b},{c},{d},{e},{g}")
    }
}

/// Parses six comma-separated numbers in row-major order.
impl FromStr for AffineMatrix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| Error::InvalidParameter {
                name: "affine".to_string(),
                reason: err.to_string(),
            })?;

        let &[a, b, c, d, e, f] = values.as_slice() else {
            return Err(Error::InvalidParameter {
                name: "affine".to_string(),
                reason: format!("expected 6 values, got {}", values.len()),
            });
        };

        Ok(Self::new([[a, b, c], [d, e, f]]))
    }
}

/// Warp an `(height, width, channels)` raster into a `width` x `height` frame.
///
/// `transform` maps source coordinates to destination coordinates. Each
/// destination pixel samples the source bilinearly at the inverse-mapped
/// position; taps falling outside the source contribute zero.
///
/// # Errors
///
/// Returns an error if `transform` is not invertible.
pub fn warp_rgb(
    src: &Array3<f32>,
    transform: &AffineMatrix,
    width: u32,
    height: u32,
) -> Result<Array3<f32>> {
    warp_planes(src.view(), transform, width, height)
}

/// Warp a single-channel `(height, width)` raster into a `width` x `height` frame.
///
/// Same sampling rules as [`warp_rgb`].
///
/// # Errors
///
/// Returns an error if `transform` is not invertible.
pub fn warp_mask(
    src: &Array2<f32>,
    transform: &AffineMatrix,
    width: u32,
    height: u32,
) -> Result<Array2<f32>> {
    let warped = warp_planes(src.view().insert_axis(Axis(2)), transform, width, height)?;
    Ok(warped.index_axis_move(Axis(2), 0))
}

/// Floor-based 2x2 bilinear sampling with a constant zero border.
///
/// Each tap that falls outside the source contributes zero on its own, so
/// pixels whose neighborhood straddles the edge are blended with the border
/// rather than dropped.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn warp_planes(
    src: ArrayView3<'_, f32>,
    transform: &AffineMatrix,
    width: u32,
    height: u32,
) -> Result<Array3<f32>> {
    let backward = transform.invert()?;
    let (src_h, src_w, channels) = src.dim();
    let (out_w, out_h) = (width as usize, height as usize);

    let mut out = Array3::<f32>::zeros((out_h, out_w, channels));

    for y in 0..out_h {
        for x in 0..out_w {
            let (sx, sy) = backward.apply(x as f64, y as f64);
            let x0 = sx.floor();
            let y0 = sy.floor();

            // Entirely outside the source, including the one-pixel bilinear fringe
            if x0 < -1.0 || y0 < -1.0 || x0 >= src_w as f64 || y0 >= src_h as f64 {
                continue;
            }

            let fx = (sx - x0) as f32;
            let fy = (sy - y0) as f32;
            let (x0, y0) = (x0 as isize, y0 as isize);

            let taps = [
                (x0, y0, (1.0 - fx) * (1.0 - fy)),
                (x0 + 1, y0, fx * (1.0 - fy)),
                (x0, y0 + 1, (1.0 - fx) * fy),
                (x0 + 1, y0 + 1, fx * fy),
            ];

            for (tx, ty, weight) in taps {
                let (Ok(tx), Ok(ty)) = (usize::try_from(tx), usize::try_from(ty)) else {
                    continue;
                };
                if tx >= src_w || ty >= src_h || weight == 0.0 {
                    continue;
                }
                for c in 0..channels {
                    out[[y, x, c]] += src[[ty, tx, c]] * weight;
                }
            }
        }
    }

    Ok(out)
}
