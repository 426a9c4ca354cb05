//! Backend-agnostic representation of engine outputs.
//!
//! The engine returns flat buffers with an `i64` shape. Decoders never index
//! those buffers directly: they convert them into `ndarray` arrays of a fixed
//! rank first, and any disagreement between shape, rank and buffer length
//! surfaces as [`OCRError::ShapeMismatch`].

use crate::core::{OCRError, OcrResult};
use ndarray::{Array, ArrayD, Dimension, IxDyn};

/// A raw output tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorOutput {
    /// 32-bit floating point tensor
    F32 { shape: Vec<i64>, data: Vec<f32> },
    /// 64-bit integer tensor
    I64 { shape: Vec<i64>, data: Vec<i64> },
}

impl TensorOutput {
    /// Convenience constructor for an f32 tensor.
    pub fn f32(shape: impl Into<Vec<i64>>, data: Vec<f32>) -> Self {
        TensorOutput::F32 {
            shape: shape.into(),
            data,
        }
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[i64] {
        match self {
            TensorOutput::F32 { shape, .. } | TensorOutput::I64 { shape, .. } => shape,
        }
    }

    /// Number of elements implied by the shape.
    pub fn len(&self) -> usize {
        self.shape().iter().map(|&d| d.max(0) as usize).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts into an f32 array of rank `D`.
    ///
    /// `name` identifies the tensor in the error.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the tensor is not f32, has the wrong rank,
    /// has a negative dimension or a buffer length that disagrees with its
    /// shape.
    pub fn into_f32_array<D: Dimension>(self, name: &str) -> OcrResult<Array<f32, D>> {
        let expected = match D::NDIM {
            Some(n) => format!("f32 tensor of rank {n}"),
            None => "f32 tensor".to_string(),
        };
        let (shape, data) = match self {
            TensorOutput::F32 { shape, data } => (shape, data),
            TensorOutput::I64 { shape, .. } => {
                return Err(OCRError::shape_mismatch(
                    name,
                    format!("{expected}, got i64"),
                    &shape,
                ));
            }
        };

        if D::NDIM.is_some_and(|n| n != shape.len()) || shape.iter().any(|&d| d < 0) {
            return Err(OCRError::shape_mismatch(name, expected, &shape));
        }

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let numel: usize = dims.iter().product();
        if numel != data.len() {
            return Err(OCRError::shape_mismatch(
                name,
                format!("{expected} with {} elements, buffer has {}", numel, data.len()),
                &shape,
            ));
        }

        let array = ArrayD::from_shape_vec(IxDyn(&dims), data)?;
        array
            .into_dimensionality::<D>()
            .map_err(|_| OCRError::shape_mismatch(name, expected, &shape))
    }
}

/// Named outputs in engine order.
pub type NamedOutputs = Vec<(String, TensorOutput)>;

/// Removes and returns the output at `index`, or the first output named `name`
/// when one exists.
///
/// # Errors
///
/// Returns `ShapeMismatch` when the engine produced too few outputs.
pub fn take_output(
    outputs: &mut NamedOutputs,
    name: Option<&str>,
    index: usize,
) -> OcrResult<(String, TensorOutput)> {
    if let Some(name) = name
        && let Some(pos) = outputs.iter().position(|(n, _)| n == name)
    {
        return Ok(outputs.remove(pos));
    }
    if index >= outputs.len() {
        return Err(OCRError::shape_mismatch(
            name.unwrap_or("outputs"),
            format!("at least {} output tensors", index + 1),
            &[outputs.len() as i64],
        ));
    }
    Ok(outputs.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Ix3, Ix4};

    #[test]
    fn test_into_f32_array_ok() {
        let t = TensorOutput::f32([1, 2, 3], vec![0.0; 6]);
        let a = t.into_f32_array::<Ix3>("probs").unwrap();
        assert_eq!(a.shape(), &[1, 2, 3]);
    }

    #[test]
    fn test_rank_mismatch() {
        let t = TensorOutput::f32([2, 3], vec![0.0; 6]);
        let err = t.into_f32_array::<Ix4>("maps").unwrap_err();
        assert!(matches!(err, OCRError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_length_mismatch() {
        let t = TensorOutput::f32([1, 2, 3], vec![0.0; 5]);
        assert!(t.into_f32_array::<Ix3>("probs").is_err());
    }

    #[test]
    fn test_i64_rejected() {
        let t = TensorOutput::I64 {
            shape: vec![1],
            data: vec![3],
        };
        assert!(t.into_f32_array::<ndarray::Ix1>("ids").is_err());
    }

    #[test]
    fn test_take_output_by_name_then_index() {
        let mut outputs = vec![
            ("a".to_string(), TensorOutput::f32([1], vec![1.0])),
            ("b".to_string(), TensorOutput::f32([1], vec![2.0])),
        ];
        let (name, _) = take_output(&mut outputs, Some("b"), 0).unwrap();
        assert_eq!(name, "b");
        let (name, _) = take_output(&mut outputs, Some("missing"), 0).unwrap();
        assert_eq!(name, "a");
        assert!(take_output(&mut outputs, None, 0).is_err());
    }
}
