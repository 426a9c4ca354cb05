//! Table structure decoding.
//!
//! A table recognizer has two heads: `structure_probs [B, L, V]` classifies an
//! HTML tag at each step and `loc_preds [B, L, K]` regresses a cell box for
//! the same step. Decoding walks the tag sequence until `eos`, emitting a box
//! for every cell-opening tag.

use crate::core::{OCRError, OcrResult};
use crate::processors::argmax::argmax;
use crate::processors::layout_postprocess::distribution_expectation;
use ndarray::{ArrayView1, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SOS: &str = "sos";
const EOS: &str = "eos";
const CELL_TOKENS: [&str; 3] = ["<td>", "<td", "<td></td>"];
const HTML_PREFIX: [&str; 3] = ["<html>", "<body>", "<table>"];
const HTML_SUFFIX: [&str; 3] = ["</table>", "</body>", "</html>"];

/// Recognized structure of one table image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableResult {
    /// Tag sequence framed by `<html><body><table>` … `</table></body></html>`
    pub structure: Vec<String>,
    /// Mean tag score
    pub score: f32,
    /// One box per cell tag, in source pixels: `[x1, y1, x2, y2]` or an
    /// 8-value quadrilateral
    pub cell_boxes: Vec<Vec<i32>>,
}

impl TableResult {
    fn framed(tags: Vec<String>, score: f32, cell_boxes: Vec<Vec<i32>>) -> Self {
        let structure = HTML_PREFIX
            .iter()
            .map(|t| t.to_string())
            .chain(tags)
            .chain(HTML_SUFFIX.iter().map(|t| t.to_string()))
            .collect();
        Self {
            structure,
            score,
            cell_boxes,
        }
    }

    /// The result used when no tag was decoded.
    pub fn empty() -> Self {
        Self::framed(Vec::new(), 0.0, Vec::new())
    }

    /// The structure as one HTML string.
    pub fn html(&self) -> String {
        self.structure.concat()
    }
}

/// How the box head encodes coordinates, detected from its width `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxEncoding {
    /// `K` normalized coordinates (4 or 8)
    Normalized(usize),
    /// Four coordinates, each a distribution over `reg_max` bins
    Distribution { reg_max: usize },
}

impl BoxEncoding {
    /// # Errors
    ///
    /// Returns `ShapeMismatch` for widths that are neither 4, 8 nor a
    /// multiple of 4 above 8.
    pub fn from_width(width: usize) -> OcrResult<Self> {
        match width {
            4 | 8 => Ok(Self::Normalized(width)),
            w if w % 4 == 0 && w / 4 > 2 => Ok(Self::Distribution { reg_max: w / 4 }),
            w => Err(OCRError::shape_mismatch(
                "table loc_preds",
                "last dimension 4, 8 or 4 * reg_max",
                &[w as i64],
            )),
        }
    }

    /// Decodes one step into normalized coordinates.
    fn decode(self, loc: &ArrayView1<f32>) -> Vec<f32> {
        match self {
            Self::Normalized(_) => loc.to_vec(),
            Self::Distribution { reg_max } => loc
                .to_vec()
                .chunks_exact(reg_max)
                .map(|bins| distribution_expectation(bins) / (reg_max - 1) as f32)
                .collect(),
        }
    }
}

/// Decoder for table structure recognizers.
#[derive(Debug, Clone)]
pub struct TableStructureDecode {
    dictionary: Vec<String>,
    cell_token_indices: Vec<usize>,
    end_idx: usize,
}

impl TableStructureDecode {
    /// Builds the decoder's label list `["sos", dictionary..., "eos"]`.
    ///
    /// With `merge_no_span_structure`, `<td></td>` is added and `<td>`
    /// removed first, matching recognizers that emit empty cells as one tag.
    pub fn new(mut dictionary: Vec<String>, merge_no_span_structure: bool) -> Self {
        if merge_no_span_structure {
            if !dictionary.iter().any(|t| t == "<td></td>") {
                dictionary.push("<td></td>".to_string());
            }
            dictionary.retain(|t| t != "<td>");
        }

        let dictionary: Vec<String> = std::iter::once(SOS.to_string())
            .chain(dictionary)
            .chain(std::iter::once(EOS.to_string()))
            .collect();
        let cell_token_indices = dictionary
            .iter()
            .enumerate()
            .filter(|(_, t)| CELL_TOKENS.contains(&t.as_str()))
            .map(|(i, _)| i)
            .collect();
        let end_idx = dictionary.len() - 1;
        debug!("table dictionary has {} entries", dictionary.len());

        Self {
            dictionary,
            cell_token_indices,
            end_idx,
        }
    }

    pub fn dictionary(&self) -> &[String] {
        &self.dictionary
    }

    /// Decodes a batch. `src_sizes` holds each source image's
    /// `(width, height)`.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` when the heads disagree on batch or sequence
    /// length, the batch does not match `src_sizes`, the box head width is
    /// unrecognized, or a tag index falls outside the dictionary.
    pub fn apply(
        &self,
        structure_probs: &ArrayView3<f32>,
        loc_preds: &ArrayView3<f32>,
        src_sizes: &[(u32, u32)],
    ) -> OcrResult<Vec<TableResult>> {
        let (batch, steps, _) = structure_probs.dim();
        let (loc_batch, loc_steps, width) = loc_preds.dim();
        if batch != src_sizes.len() || loc_batch != batch || loc_steps != steps {
            return Err(OCRError::shape_mismatch(
                "table loc_preds",
                format!("[{}, {steps}, K]", src_sizes.len()),
                &[loc_batch as i64, loc_steps as i64, width as i64],
            ));
        }
        let encoding = BoxEncoding::from_width(width)?;

        structure_probs
            .axis_iter(Axis(0))
            .zip(loc_preds.axis_iter(Axis(0)))
            .zip(src_sizes)
            .enumerate()
            .map(|(index, ((probs, locs), &size))| {
                match self.decode_sample(index, &probs, &locs, encoding, size) {
                    Err(OCRError::UncomputableConfidence { index }) => {
                        debug!("no table tag decoded for sample {index}");
                        Ok(TableResult::empty())
                    }
                    other => other,
                }
            })
            .collect()
    }

    fn decode_sample(
        &self,
        index: usize,
        probs: &ArrayView2<f32>,
        locs: &ArrayView2<f32>,
        encoding: BoxEncoding,
        (src_w, src_h): (u32, u32),
    ) -> OcrResult<TableResult> {
        let mut tags = Vec::new();
        let mut cell_boxes = Vec::new();
        let mut score_sum = 0.0f32;

        for (step, row) in probs.outer_iter().enumerate() {
            let Some((idx, score)) = argmax(row.iter()) else {
                continue;
            };
            if step > 0 && idx == self.end_idx {
                break;
            }
            if idx == 0 || idx == self.end_idx {
                continue;
            }

            let tag = self.dictionary.get(idx).ok_or_else(|| {
                OCRError::shape_mismatch(
                    "table structure_probs",
                    format!("tag index below {}", self.dictionary.len()),
                    &[idx as i64],
                )
            })?;
            tags.push(tag.clone());
            score_sum += score;

            if self.cell_token_indices.contains(&idx) {
                let cell = encoding
                    .decode(&locs.row(step))
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let scale = if i % 2 == 0 { src_w } else { src_h };
                        (v * scale as f32) as i32
                    })
                    .collect();
                cell_boxes.push(cell);
            }
        }

        if tags.is_empty() {
            return Err(OCRError::UncomputableConfidence { index });
        }
        let score = score_sum / tags.len() as f32;
        Ok(TableResult::framed(tags, score, cell_boxes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn decoder() -> TableStructureDecode {
        let dict = ["<tr>", "</tr>", "<td>", "</td>", "<td", ">"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        TableStructureDecode::new(dict, true)
    }

    fn index_of(dec: &TableStructureDecode, tag: &str) -> usize {
        dec.dictionary().iter().position(|t| t == tag).unwrap()
    }

    #[test]
    fn test_dictionary_layout() {
        let dec = decoder();
        let dict = dec.dictionary();
        assert_eq!(dict.first().map(String::as_str), Some("sos"));
        assert_eq!(dict.last().map(String::as_str), Some("eos"));
        assert!(dict.iter().any(|t| t == "<td></td>"));
        assert!(!dict.iter().any(|t| t == "<td>"));
    }

    #[test]
    fn test_decode_tags_and_boxes() {
        let dec = decoder();
        let vocab = dec.dictionary().len();
        let seq = [
            0,
            index_of(&dec, "<tr>"),
            index_of(&dec, "<td></td>"),
            index_of(&dec, "</tr>"),
            dec.end_idx,
            index_of(&dec, "<tr>"),
        ];
        let mut probs = Array3::<f32>::zeros((1, seq.len(), vocab));
        for (t, &idx) in seq.iter().enumerate() {
            probs[[0, t, idx]] = if t == 2 { 0.6 } else { 0.9 };
        }
        let mut locs = Array3::<f32>::zeros((1, seq.len(), 4));
        locs.slice_mut(ndarray::s![0, 2, ..])
            .assign(&ndarray::arr1(&[0.1, 0.2, 0.5, 0.6]));

        let results = dec.apply(&probs.view(), &locs.view(), &[(200, 100)]).unwrap();
        let result = &results[0];
        assert_eq!(
            result.html(),
            "<html><body><table><tr><td></td></tr></table></body></html>"
        );
        assert!((result.score - 0.8).abs() < 1e-6);
        assert_eq!(result.cell_boxes, vec![vec![20, 20, 100, 60]]);
    }

    #[test]
    fn test_leading_eos_is_skipped() {
        let dec = decoder();
        let vocab = dec.dictionary().len();
        let seq = [dec.end_idx, index_of(&dec, "<tr>"), index_of(&dec, "</tr>")];
        let mut probs = Array3::<f32>::zeros((1, seq.len(), vocab));
        for (t, &idx) in seq.iter().enumerate() {
            probs[[0, t, idx]] = 0.9;
        }
        let locs = Array3::<f32>::zeros((1, seq.len(), 4));

        let results = dec.apply(&probs.view(), &locs.view(), &[(10, 10)]).unwrap();
        assert_eq!(
            results[0].html(),
            "<html><body><table><tr></tr></table></body></html>"
        );
    }

    #[test]
    fn test_distribution_box_head() {
        assert_eq!(
            BoxEncoding::from_width(64).unwrap(),
            BoxEncoding::Distribution { reg_max: 16 }
        );
        assert!(BoxEncoding::from_width(6).is_err());

        // Mass concentrated on the last bin decodes to the far edge.
        let mut bins = vec![-10.0f32; 64];
        for c in 0..4 {
            bins[c * 16 + 15] = 10.0;
        }
        let coords = BoxEncoding::Distribution { reg_max: 16 }.decode(&ndarray::arr1(&bins).view());
        assert_eq!(coords.len(), 4);
        assert!(coords.iter().all(|&c| (c - 1.0).abs() < 1e-3));
    }

    #[test]
    fn test_empty_sequence_recovers() {
        let dec = decoder();
        let vocab = dec.dictionary().len();
        let mut probs = Array3::<f32>::zeros((1, 3, vocab));
        probs[[0, 0, 0]] = 1.0;
        probs[[0, 1, dec.end_idx]] = 1.0;
        let locs = Array3::<f32>::zeros((1, 3, 8));
        let results = dec.apply(&probs.view(), &locs.view(), &[(10, 10)]).unwrap();
        assert_eq!(results[0], TableResult::empty());
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_mismatched_heads_rejected() {
        let dec = decoder();
        let probs = Array3::<f32>::zeros((1, 4, dec.dictionary().len()));
        let locs = Array3::<f32>::zeros((1, 3, 4));
        assert!(matches!(
            dec.apply(&probs.view(), &locs.view(), &[(10, 10)]),
            Err(OCRError::ShapeMismatch { .. })
        ));
    }
}
