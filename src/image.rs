//! Canonical decoded image types.
//!
//! Every decoder produces [`Image`] values: a dense, row-major grid of `f64`
//! samples already converted to physical units. Movies are ordered sequences
//! of [`Frame`]s sharing one calibration.

use crate::error::DecodeError;

// =============================================================================
// Image
// =============================================================================

/// A 2-D row-major grid of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Image {
    /// Wrap `data` as a `rows x cols` grid.
    ///
    /// # Errors
    /// `CorruptData` if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, DecodeError> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            DecodeError::corrupt(format!("image shape {rows}x{cols} overflows"))
        })?;
        if data.len() != expected {
            return Err(DecodeError::corrupt(format!(
                "image shape {rows}x{cols} needs {expected} samples, got {}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row < self.rows {
            Some(&self.data[row * self.cols..(row + 1) * self.cols])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Apply `f` to every sample.
    pub fn map_in_place(&mut self, f: impl Fn(f64) -> f64) {
        for value in &mut self.data {
            *value = f(*value);
        }
    }

    /// Reverse the row order (top row becomes bottom row).
    pub fn flip_vertical(&mut self) {
        let cols = self.cols;
        for i in 0..self.rows / 2 {
            let mirror = self.rows - 1 - i;
            let (top, bottom) = self.data.split_at_mut(mirror * cols);
            top[i * cols..(i + 1) * cols].swap_with_slice(&mut bottom[..cols]);
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Smallest and largest sample, ignoring NaN. `None` for empty images.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

// =============================================================================
// Frame
// =============================================================================

/// One image of a movie, tagged with its acquisition index.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in acquisition order, starting at 0
    pub index: usize,
    pub image: Image,
}
