//! Deterministic text cleaning applied before feature extraction.
//!
//! Stages run in a fixed order; later patterns assume earlier noise is already gone.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").expect("bracket pattern"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url pattern"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>+").expect("tag pattern"));
static DIGIT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S*\d\S*").expect("digit token pattern"));

/// Output of [`normalize`]. Only constructible through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Signature of the normalization stage, so the prediction pipeline can be driven with a
/// different cleaner in tests.
pub type Normalizer = fn(&str) -> NormalizedText;

pub fn normalize(text: &str) -> NormalizedText {
    let text = text.to_lowercase();
    let text = BRACKETED.replace_all(&text, "");
    let text = URL.replace_all(&text, "");
    let text = TAG.replace_all(&text, "");
    let mut text: String = text.chars().filter(|c| !c.is_ascii_punctuation()).collect();
    text.retain(|c| c != '\n');
    // Whitespace is the only token delimiter left once punctuation is stripped.
    NormalizedText(DIGIT_TOKEN.replace_all(&text, "").into_owned())
}
