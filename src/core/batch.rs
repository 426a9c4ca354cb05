//! Batch processing utilities for the OCR stages.
//!
//! This module provides the tensor aliases shared by every stage, the sampler
//! that slices a call's images into fixed-size chunks, and the aspect-ratio
//! permutation used by recognition to group similarly shaped text lines.

use crate::core::{OCRError, OcrResult};
use image::RgbImage;

/// A 3-dimensional tensor represented as a 3D array of f32 values.
pub type Tensor3D = ndarray::Array3<f32>;

/// A 4-dimensional tensor represented as a 4D array of f32 values.
pub type Tensor4D = ndarray::Array4<f32>;

/// A sampler that creates batches of data with a specified batch size.
#[derive(Debug, Clone, Copy)]
pub struct BatchSampler {
    batch_size: usize,
}

impl BatchSampler {
    /// Creates a new BatchSampler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when `batch_size` is zero.
    pub fn new(batch_size: usize) -> OcrResult<Self> {
        if batch_size == 0 {
            return Err(OCRError::invalid_input("batch size must be greater than 0"));
        }
        Ok(Self { batch_size })
    }

    /// Creates an iterator over batches of data with the global index of
    /// their first element.
    pub fn batches_with_offsets<'a, T>(
        &self,
        data: &'a [T],
    ) -> impl Iterator<Item = (usize, &'a [T])> {
        let batch_size = self.batch_size;
        data.chunks(batch_size)
            .enumerate()
            .map(move |(batch_idx, chunk)| (batch_idx * batch_size, chunk))
    }
}

/// A stable ascending sort of images by aspect ratio (w / h), kept as an
/// explicit permutation so results can be put back in caller order.
///
/// `order()[k]` is the caller index of the `k`-th image in sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspectOrder {
    order: Vec<usize>,
}

impl AspectOrder {
    /// Builds the permutation from precomputed ratios.
    pub fn from_ratios(ratios: &[f32]) -> Self {
        let mut order: Vec<usize> = (0..ratios.len()).collect();
        // `sort_by` is stable, so equal ratios keep their caller order.
        order.sort_by(|&a, &b| ratios[a].total_cmp(&ratios[b]));
        Self { order }
    }

    /// Builds the permutation from image dimensions.
    pub fn from_images(images: &[RgbImage]) -> Self {
        let ratios: Vec<f32> = images
            .iter()
            .map(|img| img.width() as f32 / img.height().max(1) as f32)
            .collect();
        Self::from_ratios(&ratios)
    }

    /// Caller indices in sorted order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns references to `items` in sorted order.
    pub fn permute<'a, T>(&self, items: &'a [T]) -> Vec<&'a T> {
        self.order.iter().map(|&i| &items[i]).collect()
    }

    /// Puts results produced in sorted order back at their caller indices.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` when the number of results differs from the
    /// number of images the permutation was built from.
    pub fn scatter<T>(&self, sorted: Vec<T>) -> OcrResult<Vec<T>> {
        if sorted.len() != self.order.len() {
            return Err(OCRError::shape_mismatch(
                "sorted results",
                format!("{} items", self.order.len()),
                &[sorted.len() as i64],
            ));
        }

        let mut slots: Vec<Option<T>> = (0..sorted.len()).map(|_| None).collect();
        for (item, &dst) in sorted.into_iter().zip(&self.order) {
            slots[dst] = Some(item);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    OCRError::invalid_input(format!("permutation left index {i} unfilled"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_sampler_rejects_zero() {
        assert!(BatchSampler::new(0).is_err());
    }

    #[test]
    fn test_batches_with_offsets() {
        let sampler = BatchSampler::new(2).unwrap();
        let data = [10, 11, 12, 13, 14];
        let batches: Vec<_> = sampler.batches_with_offsets(&data).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], (0, &data[0..2]));
        assert_eq!(batches[2], (4, &data[4..5]));
    }

    #[test]
    fn test_aspect_order_is_stable_for_ties() {
        let order = AspectOrder::from_ratios(&[2.0, 1.0, 2.0, 1.0, 0.5]);
        assert_eq!(order.order(), &[4, 1, 3, 0, 2]);
    }

    #[test]
    fn test_aspect_order_round_trip() {
        let ratios = [3.0, 0.25, 3.0, 7.5, 1.0, 0.25, 3.0];
        let order = AspectOrder::from_ratios(&ratios);
        let items: Vec<usize> = (0..ratios.len()).collect();

        let sorted: Vec<usize> = order.permute(&items).into_iter().copied().collect();
        let restored = order.scatter(sorted).unwrap();
        assert_eq!(restored, items);
    }

    #[test]
    fn test_aspect_order_from_images() {
        let images = vec![
            RgbImage::new(100, 10),
            RgbImage::new(20, 10),
            RgbImage::new(50, 10),
        ];
        let order = AspectOrder::from_images(&images);
        assert_eq!(order.order(), &[1, 2, 0]);
    }

    #[test]
    fn test_scatter_length_mismatch() {
        let order = AspectOrder::from_ratios(&[1.0, 2.0]);
        let err = order.scatter(vec![1]).unwrap_err();
        assert!(matches!(err, OCRError::ShapeMismatch { .. }));
    }
}
