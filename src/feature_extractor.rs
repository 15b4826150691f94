//! Model input encoding.
//!
//! Turns a validated [`FeatureVector`] into the flat `f32` tensor row the
//! exported classifier expects. Column order and categorical vocabularies
//! come from the bundle's `model_info.json`, written at training time.

use crate::error::ScoringError;
use crate::types::transaction::FeatureVector;
use serde::Deserialize;

/// What to do with a categorical value the model never saw in training.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Reject the transaction with a scoring error
    #[default]
    Error,
    /// Encode as an all-zero block
    Ignore,
}

/// One-hot encoded column
#[derive(Debug, Clone, Deserialize)]
pub struct CategoricalFeature {
    pub name: String,
    pub categories: Vec<String>,
    #[serde(default)]
    pub handle_unknown: UnknownPolicy,
}

/// Input layout of the exported model
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureLayout {
    pub numeric_features: Vec<String>,
    #[serde(default)]
    pub categorical_features: Vec<CategoricalFeature>,
}

/// Feature extractor that transforms feature vectors into model input rows.
pub struct FeatureExtractor {
    layout: FeatureLayout,
}

impl FeatureExtractor {
    pub fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    /// Encode one transaction: numeric columns in order, then one-hot blocks.
    pub fn extract(&self, v: &FeatureVector) -> Result<Vec<f32>, ScoringError> {
        let mut features = Vec::with_capacity(self.feature_count());

        for name in &self.layout.numeric_features {
            let value = v
                .numeric(name)
                .ok_or_else(|| ScoringError::MissingFeature(name.clone()))?;
            features.push(value as f32);
        }

        for column in &self.layout.categorical_features {
            let value = v
                .categorical(&column.name)
                .ok_or_else(|| ScoringError::MissingFeature(column.name.clone()))?;

            let hit = column.categories.iter().position(|c| c == value);
            if hit.is_none() && column.handle_unknown == UnknownPolicy::Error {
                return Err(ScoringError::UnknownCategory {
                    feature: column.name.clone(),
                    value: value.to_string(),
                });
            }

            features.extend((0..column.categories.len()).map(|i| {
                if Some(i) == hit {
                    1.0
                } else {
                    0.0
                }
            }));
        }

        Ok(features)
    }

    /// Width of the encoded row.
    pub fn feature_count(&self) -> usize {
        self.layout.numeric_features.len()
            + self
                .layout
                .categorical_features
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Encoded column names, e.g. `amount`, `channel=Mobile`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.layout.numeric_features.clone();
        for column in &self.layout.categorical_features {
            names.extend(
                column
                    .categories
                    .iter()
                    .map(|c| format!("{}={}", column.name, c)),
            );
        }
        names
    }
}
