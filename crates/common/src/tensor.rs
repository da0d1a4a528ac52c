//! Strided read-only views over model output buffers.

use crate::error::TensorError;
use crate::geometry::NormalizedPoint;
use crate::quad::NormalizedQuad;
use ndarray::ArrayViewD;
use std::fmt;

const MAX_RANK: usize = 5;

/// Numeric element types a model output can carry.
pub trait TensorElement: Copy + fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn to_f64(self) -> f64;
}

impl TensorElement for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl TensorElement for f64 {
    fn to_f64(self) -> f64 {
        self
    }
}

impl TensorElement for i32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// Row-major strides for a contiguous buffer of the given shape.
pub fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1].saturating_mul(shape[i + 1]);
    }
    strides
}

/// A borrowed n-dimensional view (rank 1 to 5) over a flat buffer.
///
/// Element `index` lives at `sum(index[i] * strides[i])`. Every accessor is
/// bounds-checked against the shape; the constructor checks that the largest
/// reachable offset fits inside the buffer.
#[derive(Debug, Clone)]
pub struct StridedTensor<'a, T> {
    data: &'a [T],
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<'a, T: TensorElement> StridedTensor<'a, T> {
    pub fn new(data: &'a [T], shape: Vec<usize>, strides: Vec<usize>) -> Result<Self, TensorError> {
        if shape.is_empty() || shape.len() > MAX_RANK {
            return Err(TensorError::UnsupportedRank(shape.len()));
        }
        if shape.len() != strides.len() {
            return Err(TensorError::StrideMismatch { shape, strides });
        }

        let count = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        let max_offset = shape
            .iter()
            .zip(strides.iter())
            .try_fold(0usize, |acc, (&dim, &stride)| {
                dim.saturating_sub(1)
                    .checked_mul(stride)
                    .and_then(|extent| acc.checked_add(extent))
            });
        let (Some(count), Some(max_offset)) = (count, max_offset) else {
            return Err(TensorError::Overflow { shape, strides });
        };
        if count > 0 && max_offset >= data.len() {
            return Err(TensorError::BufferTooSmall {
                required: max_offset.saturating_add(1),
                available: data.len(),
            });
        }

        Ok(Self {
            data,
            shape,
            strides,
        })
    }

    /// View over a densely packed row-major buffer.
    pub fn contiguous(data: &'a [T], shape: Vec<usize>) -> Result<Self, TensorError> {
        let strides = contiguous_strides(&shape);
        Self::new(data, shape, strides)
    }

    /// Borrows an ndarray view; only standard layout is accepted.
    pub fn from_ndarray(array: &'a ArrayViewD<'a, T>) -> Result<Self, TensorError> {
        let data = array.as_slice().ok_or(TensorError::NonContiguous)?;
        Self::contiguous(data, array.shape().to_vec())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of logical elements
    pub fn count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn get(&self, index: &[usize]) -> Result<T, TensorError> {
        if index.len() != self.shape.len()
            || index.iter().zip(self.shape.iter()).any(|(i, dim)| i >= dim)
        {
            return Err(TensorError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.shape.clone(),
            });
        }
        let offset: usize = index
            .iter()
            .zip(self.strides.iter())
            .map(|(i, stride)| i * stride)
            .sum();
        self.data
            .get(offset)
            .copied()
            .ok_or(TensorError::FlatIndexOutOfBounds {
                index: offset,
                count: self.data.len(),
            })
    }

    pub fn at1(&self, i: usize) -> Result<T, TensorError> {
        self.get(&[i])
    }

    pub fn at2(&self, i: usize, j: usize) -> Result<T, TensorError> {
        self.get(&[i, j])
    }

    pub fn at3(&self, i: usize, j: usize, k: usize) -> Result<T, TensorError> {
        self.get(&[i, j, k])
    }

    pub fn at4(&self, i: usize, j: usize, k: usize, l: usize) -> Result<T, TensorError> {
        self.get(&[i, j, k, l])
    }

    pub fn at5(&self, i: usize, j: usize, k: usize, l: usize, m: usize) -> Result<T, TensorError> {
        self.get(&[i, j, k, l, m])
    }

    /// Element at logical position `index` in row-major order, `0..count()`.
    pub fn flat(&self, index: usize) -> Result<T, TensorError> {
        let count = self.count();
        if index >= count {
            return Err(TensorError::FlatIndexOutOfBounds { index, count });
        }
        let mut remaining = index;
        let mut multi = vec![0; self.shape.len()];
        for (slot, dim) in multi.iter_mut().zip(self.shape.iter()).rev() {
            *slot = remaining % dim;
            remaining /= dim;
        }
        self.get(&multi)
    }

    /// Copies the logical elements out in row-major order.
    pub fn to_vec(&self) -> Result<Vec<T>, TensorError> {
        (0..self.count()).map(|i| self.flat(i)).collect()
    }

    fn fmt_dim(&self, f: &mut fmt::Formatter<'_>, dim: usize, prefix: &mut Vec<usize>) -> fmt::Result {
        write!(f, "[")?;
        for i in 0..self.shape[dim] {
            if i > 0 {
                write!(f, ", ")?;
            }
            prefix.push(i);
            if dim + 1 == self.shape.len() {
                match self.get(prefix) {
                    Ok(value) => write!(f, "{}", value)?,
                    Err(_) => write!(f, "?")?,
                }
            } else {
                self.fmt_dim(f, dim + 1, prefix)?;
            }
            prefix.pop();
        }
        write!(f, "]")
    }
}

impl<T: TensorElement> fmt::Display for StridedTensor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = Vec::with_capacity(self.rank());
        self.fmt_dim(f, 0, &mut prefix)
    }
}

/// An owned output buffer as returned by an inference engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBuffer<T> {
    pub data: Vec<T>,
    pub shape: Vec<usize>,
    pub strides: Vec<usize>,
}

impl<T: TensorElement> TensorBuffer<T> {
    pub fn new(data: Vec<T>, shape: Vec<usize>, strides: Vec<usize>) -> Self {
        Self {
            data,
            shape,
            strides,
        }
    }

    pub fn contiguous(data: Vec<T>, shape: Vec<usize>) -> Self {
        let strides = contiguous_strides(&shape);
        Self::new(data, shape, strides)
    }

    pub fn view(&self) -> Result<StridedTensor<'_, T>, TensorError> {
        StridedTensor::new(&self.data, self.shape.clone(), self.strides.clone())
    }
}

/// Decodes a `[2, 4]` corner tensor: row 0 holds x for tl, tr, br, bl and
/// row 1 holds y in the same order. Any other shape means no quad.
pub fn tensor_to_normalized_quad<T: TensorElement>(
    tensor: &StridedTensor<'_, T>,
) -> Option<NormalizedQuad> {
    if tensor.shape() != [2, 4] {
        return None;
    }
    let corner = |col: usize| -> Option<NormalizedPoint> {
        let x = tensor.at2(0, col).ok()?.to_f64();
        let y = tensor.at2(1, col).ok()?.to_f64();
        Some(NormalizedPoint::new(x, y))
    };
    Some(NormalizedQuad::new(
        corner(0)?,
        corner(1)?,
        corner(2)?,
        corner(3)?,
    ))
}
