//! Frozen TF-IDF feature extractor, loaded from the exported parameters of a fitted
//! scikit-learn `TfidfVectorizer`.

use crate::error::ArtifactError;
use crate::normalizer::NormalizedText;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Sparse, fixed-dimension feature vector. Entries are sorted by index and unique.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector { dim: usize, entries: Vec<(usize, f64)> }

impl FeatureVector {
    pub fn new(dim: usize, entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let merged: BTreeMap<usize, f64> = entries.into_iter().fold(BTreeMap::new(), |mut acc, (i, v)| {
            *acc.entry(i).or_insert(0.0) += v;
            acc
        });
        Self { dim, entries: merged.into_iter().collect() }
    }

    pub fn dim(&self) -> usize { self.dim }
    pub fn entries(&self) -> &[(usize, f64)] { &self.entries }
    pub fn nnz(&self) -> usize { self.entries.len() }

    pub fn get(&self, index: usize) -> f64 {
        self.entries.binary_search_by_key(&index, |(i, _)| *i).map(|pos| self.entries[pos].1).unwrap_or(0.0)
    }

    /// Dot product against a dense weight row. Indices past `weights` are ignored.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.entries.iter().filter_map(|(i, v)| weights.get(*i).map(|w| w * v)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm { L1, L2 }

fn default_ngram_range() -> (usize, usize) { (1, 1) }
fn default_norm() -> Option<Norm> { Some(Norm::L2) }
fn default_token_pattern() -> String { r"(?u)\b\w\w+\b".into() }
fn default_true() -> bool { true }

#[derive(Debug, Deserialize)]
struct TfidfArtifact {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default = "default_norm")]
    norm: Option<Norm>,
    #[serde(default = "default_token_pattern")]
    token_pattern: String,
    #[serde(default = "default_true")]
    lowercase: bool,
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
    norm: Option<Norm>,
    lowercase: bool,
    token_re: Regex,
}

impl TfidfVectorizer {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io { path: path.to_path_buf(), source })?;
        Self::from_slice(&path.display().to_string(), &bytes)
    }

    pub fn from_slice(name: &str, bytes: &[u8]) -> Result<Self, ArtifactError> {
        let raw: TfidfArtifact = serde_json::from_slice(bytes).map_err(|source| ArtifactError::Parse { name: name.to_string(), source })?;
        Self::from_artifact(name, raw)
    }

    fn from_artifact(name: &str, raw: TfidfArtifact) -> Result<Self, ArtifactError> {
        let invalid = |reason: String| ArtifactError::Invalid { name: name.to_string(), reason };
        let dim = raw.idf.len();
        if dim == 0 { return Err(invalid("idf table is empty".into())); }
        if let Some((term, idx)) = raw.vocabulary.iter().find(|(_, idx)| **idx >= dim) {
            return Err(invalid(format!("term {term:?} maps to index {idx} but dimension is {dim}")));
        }
        let (lo, hi) = raw.ngram_range;
        if lo == 0 || lo > hi { return Err(invalid(format!("bad ngram_range ({lo}, {hi})"))); }
        if raw.idf.iter().any(|w| !w.is_finite()) { return Err(invalid("idf contains non-finite weights".into())); }
        let token_re = Regex::new(&raw.token_pattern).map_err(|e| invalid(format!("token_pattern: {e}")))?;
        Ok(Self {
            vocabulary: raw.vocabulary,
            idf: raw.idf,
            ngram_range: raw.ngram_range,
            sublinear_tf: raw.sublinear_tf,
            norm: raw.norm,
            lowercase: raw.lowercase,
            token_re,
        })
    }

    pub fn dim(&self) -> usize { self.idf.len() }
    pub fn vocabulary_size(&self) -> usize { self.vocabulary.len() }

    pub fn transform(&self, text: &NormalizedText) -> FeatureVector {
        let lowered;
        let source = if self.lowercase { lowered = text.as_str().to_lowercase(); lowered.as_str() } else { text.as_str() };
        let tokens: Vec<&str> = self.token_re.find_iter(source).map(|m| m.as_str()).collect();

        let mut counts: HashMap<usize, f64> = HashMap::new();
        let (lo, hi) = self.ngram_range;
        for n in lo..=hi {
            for gram in tokens.windows(n) {
                let key = gram.join(" ");
                if let Some(&idx) = self.vocabulary.get(&key) { *counts.entry(idx).or_insert(0.0) += 1.0; }
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (idx, tf * self.idf[idx])
            })
            .collect();
        let scale = match self.norm {
            Some(Norm::L2) => entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt(),
            Some(Norm::L1) => entries.iter().map(|(_, v)| v.abs()).sum::<f64>(),
            None => 1.0,
        };
        if scale > 0.0 && scale != 1.0 { for (_, v) in entries.iter_mut() { *v /= scale; } }
        FeatureVector::new(self.dim(), entries)
    }
}
