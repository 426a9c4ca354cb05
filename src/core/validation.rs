//! Input and configuration validation helpers.
//!
//! These return [`OCRError::InvalidInput`] so that config `validate()` methods
//! and stage entry points can short-circuit with `?` before touching buffers.

use crate::core::OCRError;
use image::RgbImage;

/// Validates that a float value is finite (not NaN or infinite).
#[inline]
pub fn validate_finite(value: f32, param_name: &str) -> Result<(), OCRError> {
    if !value.is_finite() {
        return Err(OCRError::InvalidInput {
            message: format!("Parameter '{}' must be finite, got: {}", param_name, value),
        });
    }
    Ok(())
}

/// Validates that a value is within a specified range (inclusive).
#[inline]
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    param_name: &str,
) -> Result<(), OCRError> {
    if value < min || value > max {
        return Err(OCRError::InvalidInput {
            message: format!(
                "Parameter '{}' must be in range [{}, {}], got: {}",
                param_name, min, max, value
            ),
        });
    }
    Ok(())
}

/// Validates that a value is positive (> 0).
#[inline]
pub fn validate_positive<T: PartialOrd + std::fmt::Display + Default>(
    value: T,
    param_name: &str,
) -> Result<(), OCRError> {
    if value <= T::default() {
        return Err(OCRError::InvalidInput {
            message: format!(
                "Parameter '{}' must be positive, got: {}",
                param_name, value
            ),
        });
    }
    Ok(())
}

/// Validates that a collection is not empty.
#[inline]
pub fn validate_non_empty<T>(items: &[T], param_name: &str) -> Result<(), OCRError> {
    if items.is_empty() {
        return Err(OCRError::InvalidInput {
            message: format!("Parameter '{}' cannot be empty", param_name),
        });
    }
    Ok(())
}

/// Validates image dimensions.
pub fn validate_image_dimensions(height: u32, width: u32, context: &str) -> Result<(), OCRError> {
    if height == 0 || width == 0 {
        return Err(OCRError::InvalidInput {
            message: format!(
                "{}: image dimensions must be positive, got {}x{}",
                context, height, width
            ),
        });
    }

    const MAX_DIMENSION: u32 = 32768;
    if height > MAX_DIMENSION || width > MAX_DIMENSION {
        return Err(OCRError::InvalidInput {
            message: format!(
                "{}: image dimensions exceed maximum of {}x{}, got {}x{}",
                context, MAX_DIMENSION, MAX_DIMENSION, height, width
            ),
        });
    }

    Ok(())
}

/// Validates that every image of a call has usable dimensions.
///
/// An empty slice is accepted: stages return an empty result list for it.
pub fn validate_image_batch(images: &[&RgbImage], context: &str) -> Result<(), OCRError> {
    for (idx, img) in images.iter().enumerate() {
        validate_image_dimensions(
            img.height(),
            img.width(),
            &format!("{} image {}", context, idx),
        )?;
    }
    Ok(())
}

/// Validates normalization parameters (mean and std).
pub fn validate_normalization_params(
    mean: &[f32],
    std: &[f32],
    num_channels: usize,
) -> Result<(), OCRError> {
    if mean.len() != num_channels {
        return Err(OCRError::InvalidInput {
            message: format!(
                "Mean length {} does not match number of channels {}",
                mean.len(),
                num_channels
            ),
        });
    }

    if std.len() != num_channels {
        return Err(OCRError::InvalidInput {
            message: format!(
                "Std length {} does not match number of channels {}",
                std.len(),
                num_channels
            ),
        });
    }

    for (i, &m) in mean.iter().enumerate() {
        validate_finite(m, &format!("mean[{}]", i))?;
    }

    for (i, &s) in std.iter().enumerate() {
        validate_finite(s, &format!("std[{}]", i))?;
        validate_positive(s, &format!("std[{}]", i))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_finite() {
        assert!(validate_finite(1.0, "test").is_ok());
        assert!(validate_finite(-1.0, "test").is_ok());
        assert!(validate_finite(f32::NAN, "test").is_err());
        assert!(validate_finite(f32::INFINITY, "test").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(0.3, 0.0, 1.0, "thresh").is_ok());
        assert!(validate_range(1.0, 0.0, 1.0, "thresh").is_ok());
        assert!(validate_range(1.2, 0.0, 1.0, "thresh").is_err());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1usize, "batch_size").is_ok());
        assert!(validate_positive(0usize, "batch_size").is_err());
        assert!(validate_positive(-0.5f32, "unclip_ratio").is_err());
    }

    #[test]
    fn test_validate_non_empty() {
        assert!(validate_non_empty(&[8, 16], "fpn_stride").is_ok());
        assert!(validate_non_empty::<u32>(&[], "fpn_stride").is_err());
    }

    #[test]
    fn test_validate_image_batch() {
        let ok = RgbImage::new(10, 4);
        let empty = RgbImage::new(0, 4);
        assert!(validate_image_batch(&[&ok], "rec").is_ok());
        assert!(validate_image_batch(&[], "rec").is_ok());
        let err = validate_image_batch(&[&ok, &empty], "rec").unwrap_err();
        assert!(err.to_string().contains("rec image 1"));
    }

    #[test]
    fn test_validate_normalization_params() {
        assert!(
            validate_normalization_params(&[0.485, 0.456, 0.406], &[0.229, 0.224, 0.225], 3)
                .is_ok()
        );
        assert!(validate_normalization_params(&[0.5, 0.5], &[0.5, 0.5, 0.5], 3).is_err());
        assert!(validate_normalization_params(&[0.5, 0.5, 0.5], &[0.0, 0.5, 0.5], 3).is_err());
    }
}
