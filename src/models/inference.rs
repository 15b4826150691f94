//! ONNX-backed scorer

use crate::error::ScoringError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::loader::{ModelBundle, ModelInfo};
use crate::models::{check_probability, Scorer};
use crate::types::transaction::FeatureVector;
use ort::memory::Allocator;
use ort::session::Session;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::fmt::Display;
use std::sync::Mutex;
use tracing::debug;

struct OnnxModel {
    session: Session,
    input_name: String,
    output_name: String,
}

/// Scorer running an exported classifier through ONNX Runtime.
///
/// Sessions need exclusive access to run, so concurrent requests
/// serialize on the session lock.
pub struct OnnxScorer {
    model: Mutex<OnnxModel>,
    extractor: FeatureExtractor,
    info: ModelInfo,
}

fn backend<E: Display>(e: E) -> ScoringError {
    ScoringError::Backend(e.to_string())
}

impl OnnxScorer {
    pub fn new(bundle: ModelBundle) -> Self {
        let extractor = FeatureExtractor::new(bundle.info.layout.clone());
        Self {
            model: Mutex::new(OnnxModel {
                session: bundle.session,
                input_name: bundle.input_name,
                output_name: bundle.output_name,
            }),
            extractor,
            info: bundle.info,
        }
    }

    /// Threshold tuned alongside the model
    pub fn model_threshold(&self) -> f64 {
        self.info.threshold
    }

    /// Width of the model input row
    pub fn feature_count(&self) -> usize {
        self.extractor.feature_count()
    }

    fn run(&self, features: Vec<f32>) -> Result<f64, ScoringError> {
        let mut guard = self
            .model
            .lock()
            .map_err(|e| ScoringError::Backend(format!("Lock error: {}", e)))?;
        let model: &mut OnnxModel = &mut guard;

        // [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features)).map_err(backend)?;

        let outputs = model
            .session
            .run(ort::inputs![&model.input_name => input_tensor])
            .map_err(backend)?;

        extract_probability(&outputs, &model.output_name)
    }
}

impl Scorer for OnnxScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
        let row = self.extractor.extract(features)?;
        let probability = self.run(row)?;
        debug!(probability = probability, "ONNX inference complete");
        check_probability(probability)
    }
}

/// Fraud-class probability from the named output, falling back to any
/// non-label output. Handles plain tensors and sklearn zipmap outputs.
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
) -> Result<f64, ScoringError> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(prob) = probability_from_value(output) {
            return Ok(prob);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(prob) = probability_from_value(&output) {
            debug!(output = %name, prob = prob, "Extracted probability from fallback output");
            return Ok(prob);
        }
    }

    Err(ScoringError::Backend(
        "model produced no probability output".to_string(),
    ))
}

fn probability_from_value(output: &ort::value::DynValue) -> Option<f64> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return fraud_prob_from_tensor(&dims, data);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return fraud_prob_from_sequence_map(output).ok();
    }

    None
}

/// `[batch, classes]` or `[classes]`; class 1 is fraud.
fn fraud_prob_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return data.last().map(|&v| v as f64),
    };

    match classes {
        c if c >= 2 => data.get(1).map(|&v| v as f64),
        1 => data.first().map(|&v| v as f64),
        _ => None,
    }
}

/// seq(map(int64, float)), as emitted by sklearn classifiers with zipmap.
fn fraud_prob_from_sequence_map(output: &ort::value::DynValue) -> Result<f64, ScoringError> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(backend)?;
    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(backend)?;

    let first = maps
        .first()
        .ok_or_else(|| ScoringError::Backend("empty probability sequence".to_string()))?;
    let kv_pairs = first
        .try_extract_key_values::<i64, f32>()
        .map_err(backend)?;

    if let Some((_, prob)) = kv_pairs.iter().find(|(class, _)| *class == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = kv_pairs.iter().find(|(class, _)| *class == 0) {
        return Ok(1.0 - *prob as f64);
    }

    Err(ScoringError::Backend(
        "no class probability in map".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_class_tensor() {
        assert_eq!(fraud_prob_from_tensor(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(fraud_prob_from_tensor(&[2], &[0.6, 0.4]), Some(0.4_f32 as f64));
    }

    #[test]
    fn test_single_output_tensor() {
        assert_eq!(fraud_prob_from_tensor(&[1, 1], &[0.5]), Some(0.5));
    }

    #[test]
    fn test_empty_tensor() {
        assert_eq!(fraud_prob_from_tensor(&[1, 0], &[]), None);
        assert_eq!(fraud_prob_from_tensor(&[1, 2], &[]), None);
    }
}
