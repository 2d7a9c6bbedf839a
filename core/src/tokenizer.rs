use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

use crate::config::AnalyzerConfig;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Tokenize the text of one cell into terms, in order of appearance, using NFKC
/// normalization and lowercasing. Stemming is applied when the analyzer asks for it.
pub fn tokenize_cell(text: &str, analyzer: &AnalyzerConfig) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|mat| {
            let token = mat.as_str();
            if analyzer.stem {
                STEMMER.stem(token).to_string()
            } else {
                token.to_string()
            }
        })
        .collect()
}
