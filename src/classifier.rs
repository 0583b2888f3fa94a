//! Classifier backends and the screening prediction wrapper.
//!
//! The `Classifier` trait is the substitution seam: any backend that can
//! report its trained input width, a discrete class, and a class-probability
//! distribution plugs into `ScreeningModel` unchanged.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ScreenError};
use crate::types::{ClassLabel, PredictionResult};

/// Capability contract for a pre-trained classifier
pub trait Classifier {
    /// Feature vector width the model was trained on
    fn input_width(&self) -> usize;

    /// Number of classes in the probability distribution
    fn num_classes(&self) -> usize;

    /// Discrete class index for a feature vector of `input_width` values
    fn classify(&self, features: &[f64]) -> usize;

    /// Full class-probability distribution, one entry per class, summing to 1
    fn class_probabilities(&self, features: &[f64]) -> Vec<f64>;
}

/// One node of a serialized decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal split: descend left when x[feature] <= threshold
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node carrying the class distribution
    Leaf { probabilities: Vec<f64> },
}

/// A single decision tree as a flat node array rooted at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk from the root to the leaf distribution for one sample.
    /// Load-time validation requires children to come strictly after their
    /// parent in the node array, so the walk terminates at a leaf.
    fn decide(&self, features: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { probabilities } => return probabilities,
            }
        }
    }

    fn validate(&self, num_features: usize, num_classes: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ScreenError::Load("tree has no nodes".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= num_features {
                        return Err(ScreenError::Load(format!(
                            "split references feature {} but model has {} features",
                            feature, num_features
                        )));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(ScreenError::Load(format!(
                            "split child index out of bounds ({} nodes)",
                            self.nodes.len()
                        )));
                    }
                    // Children must come strictly after their parent in the
                    // flat array (the exported sklearn layout is topologically
                    // ordered); this rules out cycles, so decide() always
                    // reaches a leaf.
                    if *left <= index || *right <= index {
                        return Err(ScreenError::Load(format!(
                            "split at node {} has non-descending children ({}, {})",
                            index, left, right
                        )));
                    }
                }
                TreeNode::Leaf { probabilities } => {
                    if probabilities.len() != num_classes {
                        return Err(ScreenError::Load(format!(
                            "leaf has {} class probabilities, model has {} classes",
                            probabilities.len(),
                            num_classes
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Pre-trained random forest loaded from a JSON artifact.
///
/// The artifact format is owned by this crate (see DESIGN.md); the training
/// process exports into it. Loaded once at startup and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub num_features: usize,
    pub num_classes: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScreenError::Load(format!("cannot read model '{}': {}", path.display(), e))
        })?;
        let forest: RandomForest = serde_json::from_str(&text).map_err(|e| {
            ScreenError::Load(format!("invalid model artifact '{}': {}", path.display(), e))
        })?;
        forest.validate()?;

        log::debug!(
            "loaded forest: {} trees, {} features, {} classes",
            forest.trees.len(),
            forest.num_features,
            forest.num_classes
        );
        Ok(forest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(ScreenError::Load("model has no trees".to_string()));
        }
        if self.num_classes < 2 {
            return Err(ScreenError::Load(format!(
                "model reports {} classes, at least 2 required",
                self.num_classes
            )));
        }
        for tree in &self.trees {
            tree.validate(self.num_features, self.num_classes)?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn input_width(&self) -> usize {
        self.num_features
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn classify(&self, features: &[f64]) -> usize {
        let probabilities = self.class_probabilities(features);
        // argmax; ties resolve to the lower class index
        let mut best = 0;
        for (class, &p) in probabilities.iter().enumerate() {
            if p > probabilities[best] {
                best = class;
            }
        }
        best
    }

    fn class_probabilities(&self, features: &[f64]) -> Vec<f64> {
        let mut sums = vec![0.0; self.num_classes];
        for tree in &self.trees {
            for (sum, p) in sums.iter_mut().zip(tree.decide(features)) {
                *sum += p;
            }
        }
        let count = self.trees.len() as f64;
        sums.iter_mut().for_each(|s| *s /= count);
        sums
    }
}

/// Prediction wrapper around an injected, read-only classifier.
///
/// `predict` takes `&self` only, so a loaded model is safely shareable
/// across concurrent requests.
pub struct ScreeningModel<C: Classifier> {
    classifier: C,
}

impl<C: Classifier> ScreeningModel<C> {
    pub fn new(classifier: C) -> Result<Self> {
        if classifier.num_classes() < 2 {
            return Err(ScreenError::Load(format!(
                "binary screening requires at least 2 classes, backend has {}",
                classifier.num_classes()
            )));
        }
        Ok(Self { classifier })
    }

    pub fn input_width(&self) -> usize {
        self.classifier.input_width()
    }

    /// Classify one feature vector. The vector's width must exactly match
    /// the model's trained input width; there are no retries and no partial
    /// results.
    pub fn predict(&self, features: &[f64]) -> Result<PredictionResult> {
        let expected = self.classifier.input_width();
        if features.len() != expected {
            return Err(ScreenError::DimensionMismatch {
                expected,
                got: features.len(),
            });
        }

        let raw_code = self.classifier.classify(features);
        let probabilities = self.classifier.class_probabilities(features);

        Ok(PredictionResult {
            label: ClassLabel::from_code(raw_code),
            probability: probabilities[1],
            raw_code,
        })
    }
}
