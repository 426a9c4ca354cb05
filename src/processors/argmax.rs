//! Index of the highest score in a row.

/// Returns the index and value of the largest element, or `None` for an
/// empty row.
///
/// Ties resolve to the lowest index, so a CTC blank tied with a symbol is
/// read as the blank.
pub fn argmax<'a>(values: impl IntoIterator<Item = &'a f32>) -> Option<(usize, f32)> {
    values
        .into_iter()
        .enumerate()
        .fold(None, |best, (i, &v)| match best {
            Some((_, b)) if v <= b || v.is_nan() => best,
            _ => Some((i, v)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_picks_first_of_ties() {
        assert_eq!(argmax(&[0.5, 0.0, 0.0, 0.5, 0.0]), Some((0, 0.5)));
        assert_eq!(argmax(&[0.1, 0.7, 0.7]), Some((1, 0.7)));
    }

    #[test]
    fn test_argmax_empty_and_nan() {
        assert_eq!(argmax(&[] as &[f32]), None);
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.1]), Some((1, 0.2)));
    }
}
