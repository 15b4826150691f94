//! Model bundle loader: ONNX classifier plus its training sidecar

use crate::feature_extractor::FeatureLayout;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Training-time metadata shipped next to the ONNX file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Decision threshold tuned during training
    pub threshold: f64,
    /// Input column layout
    #[serde(flatten)]
    pub layout: FeatureLayout,
}

impl ModelInfo {
    /// Read `model_info.json`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model info from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model info in {}", path.display()))
    }
}

/// Loaded classifier with metadata
pub struct ModelBundle {
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
    pub info: ModelInfo,
}

/// Loader for model bundles
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the classifier and its sidecar
    pub fn load_bundle<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        model_path: P,
        info_path: Q,
    ) -> Result<ModelBundle> {
        let model_path = model_path.as_ref();
        let info = ModelInfo::from_path(info_path)?;

        info!(path = %model_path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load model from {}", model_path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // sklearn exports emit "label" first and "probabilities" second
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            input = %input_name,
            output = %output_name,
            threshold = info.threshold,
            numeric = info.layout.numeric_features.len(),
            categorical = info.layout.categorical_features.len(),
            "Model loaded successfully"
        );

        Ok(ModelBundle {
            session,
            input_name,
            output_name,
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_model_info_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "threshold": 0.42,
                "numeric_features": ["amount", "balance"],
                "categorical_features": [
                    {{"name": "txn_type", "categories": ["ATM", "POS"]}}
                ]
            }}"#
        )
        .unwrap();

        let info = ModelInfo::from_path(file.path()).unwrap();

        assert_eq!(info.threshold, 0.42);
        assert_eq!(info.layout.numeric_features, vec!["amount", "balance"]);
        assert_eq!(info.layout.categorical_features[0].name, "txn_type");
    }

    #[test]
    fn test_missing_model_info() {
        assert!(ModelInfo::from_path("does/not/exist.json").is_err());
    }
}
