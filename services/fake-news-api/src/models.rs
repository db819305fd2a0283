//! Pre-fitted binary classifiers exported as JSON parameter dumps.
//!
//! Every artifact is immutable after load, so a single instance is shared by all request
//! threads without locking.

use crate::error::ArtifactError;
use crate::vectorizer::FeatureVector;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// A loaded classifier: feature vector in, class label out.
pub trait Predictor: Send + Sync + fmt::Debug {
    fn kind(&self) -> &'static str;
    fn n_features(&self) -> usize;
    fn predict_label(&self, features: &FeatureVector) -> i64;

    fn predict(&self, model: &str, features: &FeatureVector) -> Result<i64, ArtifactError> {
        if features.dim() != self.n_features() {
            return Err(ArtifactError::DimensionMismatch { model: model.to_string(), expected: self.n_features(), got: features.dim() });
        }
        Ok(self.predict_label(features))
    }
}

fn default_classes() -> [i64; 2] { [0, 1] }

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    NaiveBayes(MultinomialNb),
}

impl ModelArtifact {
    pub fn from_slice(name: &str, bytes: &[u8]) -> Result<Self, ArtifactError> {
        serde_json::from_slice(bytes).map_err(|source| ArtifactError::Parse { name: name.to_string(), source })
    }

    /// Checks every table against the vectorizer dimension and hands back a shareable predictor.
    pub fn into_predictor(self, name: &str, dim: usize) -> Result<Arc<dyn Predictor>, ArtifactError> {
        let check = |res: Result<(), String>| res.map_err(|reason| ArtifactError::Invalid { name: name.to_string(), reason });
        let predictor: Arc<dyn Predictor> = match self {
            ModelArtifact::Linear(m) => { check(m.validate(dim))?; Arc::new(m) }
            ModelArtifact::DecisionTree(m) => { check(m.validate(dim))?; Arc::new(m) }
            ModelArtifact::RandomForest(m) => { check(m.validate(dim))?; Arc::new(m) }
            ModelArtifact::GradientBoosting(m) => { check(m.validate(dim))?; Arc::new(m) }
            ModelArtifact::NaiveBayes(m) => { check(m.validate(dim))?; Arc::new(m) }
        };
        Ok(predictor)
    }
}

fn validate_classes(classes: &[i64; 2]) -> Result<(), String> {
    if classes[0] == classes[1] { return Err(format!("classes must be distinct, got {classes:?}")); }
    Ok(())
}

fn argmax(values: &[f64]) -> usize {
    // First maximum wins on ties.
    values.iter().enumerate().fold(0, |best, (i, v)| if *v > values[best] { i } else { best })
}

/// Logistic regression, linear SVM and friends: sign of `w·x + b`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    fn validate(&self, dim: usize) -> Result<(), String> {
        validate_classes(&self.classes)?;
        if self.coef.len() != dim { return Err(format!("coef has {} weights, vectorizer dimension is {dim}", self.coef.len())); }
        if !self.intercept.is_finite() || self.coef.iter().any(|w| !w.is_finite()) { return Err("non-finite weights".into()); }
        Ok(())
    }

    pub fn decision_function(&self, x: &FeatureVector) -> f64 { x.dot(&self.coef) + self.intercept }
}

impl Predictor for LinearModel {
    fn kind(&self) -> &'static str { "linear" }
    fn n_features(&self) -> usize { self.coef.len() }
    fn predict_label(&self, x: &FeatureVector) -> i64 {
        if self.decision_function(x) > 0.0 { self.classes[1] } else { self.classes[0] }
    }
}

/// Flat node arrays as exported from a fitted `sklearn.tree.Tree`. `-1` children mark a leaf.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNodes {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl TreeNodes {
    fn validate(&self, dim: usize, value_width: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 { return Err("tree has no nodes".into()); }
        if [self.children_right.len(), self.feature.len(), self.threshold.len(), self.value.len()].iter().any(|l| *l != n) {
            return Err("tree node arrays differ in length".into());
        }
        for node in 0..n {
            let (l, r) = (self.children_left[node], self.children_right[node]);
            if self.value[node].len() != value_width {
                return Err(format!("node {node} carries {} values, expected {value_width}", self.value[node].len()));
            }
            if l == -1 && r == -1 { continue; }
            // Children always follow their parent, which also rules out cycles.
            for child in [l, r] {
                if child <= node as i64 || child >= n as i64 { return Err(format!("node {node} has invalid child {child}")); }
            }
            let f = self.feature[node];
            if f < 0 || f >= dim as i64 { return Err(format!("node {node} splits on feature {f} outside dimension {dim}")); }
        }
        Ok(())
    }

    fn leaf(&self, x: &FeatureVector) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            let f = self.feature[node] as usize;
            node = if x.get(f) <= self.threshold[node] { self.children_left[node] } else { self.children_right[node] } as usize;
        }
        node
    }

    fn leaf_value(&self, x: &FeatureVector) -> &[f64] { &self.value[self.leaf(x)] }

    /// Leaf class weights rescaled to sum to one.
    fn class_distribution(&self, x: &FeatureVector) -> [f64; 2] {
        let v = self.leaf_value(x);
        let total = v[0] + v[1];
        if total > 0.0 { [v[0] / total, v[1] / total] } else { [0.5, 0.5] }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
    pub n_features: usize,
    #[serde(flatten)]
    pub nodes: TreeNodes,
}

impl DecisionTree {
    fn validate(&self, dim: usize) -> Result<(), String> {
        validate_classes(&self.classes)?;
        if self.n_features != dim { return Err(format!("tree fitted on {} features, vectorizer dimension is {dim}", self.n_features)); }
        self.nodes.validate(dim, 2)
    }
}

impl Predictor for DecisionTree {
    fn kind(&self) -> &'static str { "decision_tree" }
    fn n_features(&self) -> usize { self.n_features }
    fn predict_label(&self, x: &FeatureVector) -> i64 { self.classes[argmax(self.nodes.leaf_value(x))] }
}

/// Soft-voting forest: per-tree class distributions are averaged.
#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
    pub n_features: usize,
    pub trees: Vec<TreeNodes>,
}

impl RandomForest {
    fn validate(&self, dim: usize) -> Result<(), String> {
        validate_classes(&self.classes)?;
        if self.n_features != dim { return Err(format!("forest fitted on {} features, vectorizer dimension is {dim}", self.n_features)); }
        if self.trees.is_empty() { return Err("forest has no trees".into()); }
        self.trees.iter().enumerate().try_for_each(|(i, t)| t.validate(dim, 2).map_err(|e| format!("tree {i}: {e}")))
    }
}

impl Predictor for RandomForest {
    fn kind(&self) -> &'static str { "random_forest" }
    fn n_features(&self) -> usize { self.n_features }
    fn predict_label(&self, x: &FeatureVector) -> i64 {
        let mut sum = [0.0f64; 2];
        for tree in &self.trees {
            let p = tree.class_distribution(x);
            sum[0] += p[0];
            sum[1] += p[1];
        }
        self.classes[argmax(&sum)]
    }
}

/// Binary gradient boosting with log-loss: `init + lr * Σ tree(x)`, positive class when > 0.
#[derive(Debug, Clone, Deserialize)]
pub struct GradientBoosting {
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
    pub n_features: usize,
    pub init: f64,
    pub learning_rate: f64,
    pub trees: Vec<TreeNodes>,
}

impl GradientBoosting {
    fn validate(&self, dim: usize) -> Result<(), String> {
        validate_classes(&self.classes)?;
        if self.n_features != dim { return Err(format!("ensemble fitted on {} features, vectorizer dimension is {dim}", self.n_features)); }
        if !self.init.is_finite() || !self.learning_rate.is_finite() { return Err("non-finite init or learning_rate".into()); }
        self.trees.iter().enumerate().try_for_each(|(i, t)| t.validate(dim, 1).map_err(|e| format!("stage {i}: {e}")))
    }

    pub fn raw_score(&self, x: &FeatureVector) -> f64 {
        self.init + self.learning_rate * self.trees.iter().map(|t| t.leaf_value(x)[0]).sum::<f64>()
    }
}

impl Predictor for GradientBoosting {
    fn kind(&self) -> &'static str { "gradient_boosting" }
    fn n_features(&self) -> usize { self.n_features }
    fn predict_label(&self, x: &FeatureVector) -> i64 {
        if self.raw_score(x) > 0.0 { self.classes[1] } else { self.classes[0] }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultinomialNb {
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
    pub class_log_prior: [f64; 2],
    pub feature_log_prob: [Vec<f64>; 2],
}

impl MultinomialNb {
    fn validate(&self, dim: usize) -> Result<(), String> {
        validate_classes(&self.classes)?;
        for (c, row) in self.feature_log_prob.iter().enumerate() {
            if row.len() != dim { return Err(format!("feature_log_prob row {c} has {} entries, vectorizer dimension is {dim}", row.len())); }
        }
        Ok(())
    }
}

impl Predictor for MultinomialNb {
    fn kind(&self) -> &'static str { "naive_bayes" }
    fn n_features(&self) -> usize { self.feature_log_prob[0].len() }
    fn predict_label(&self, x: &FeatureVector) -> i64 {
        let jll = [
            self.class_log_prior[0] + x.dot(&self.feature_log_prob[0]),
            self.class_log_prior[1] + x.dot(&self.feature_log_prob[1]),
        ];
        self.classes[argmax(&jll)]
    }
}
