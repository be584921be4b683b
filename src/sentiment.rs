// src/sentiment.rs
//! Small finance lexicon scorer used by the offline theme builder.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    [
        ("rally", 2),
        ("rallies", 2),
        ("surge", 2),
        ("surges", 2),
        ("soar", 3),
        ("soars", 3),
        ("record", 1),
        ("beat", 2),
        ("beats", 2),
        ("gain", 1),
        ("gains", 1),
        ("growth", 1),
        ("strong", 2),
        ("upgrade", 2),
        ("boom", 2),
        ("optimism", 2),
        ("rebound", 1),
        ("recovery", 1),
        ("demand", 1),
        ("easing", 1),
        ("cut", 1),
        ("fall", -1),
        ("falls", -1),
        ("drop", -1),
        ("drops", -1),
        ("slump", -2),
        ("slumps", -2),
        ("plunge", -3),
        ("plunges", -3),
        ("miss", -2),
        ("misses", -2),
        ("weak", -2),
        ("downgrade", -2),
        ("recession", -3),
        ("crisis", -3),
        ("default", -3),
        ("layoffs", -2),
        ("tariff", -1),
        ("tariffs", -1),
        ("inflation", -1),
        ("selloff", -2),
        ("fears", -2),
        ("warning", -2),
        ("probe", -1),
    ]
    .into_iter()
    .collect()
});

/// Largest per-word magnitude in the lexicon; used to scale into [-1, 1].
const MAX_WORD_SCORE: f64 = 3.0;

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        LEXICON.get(w).copied().unwrap_or(0)
    }

    /// Returns (raw score, number of lexicon hits).
    /// A negator within the previous three tokens flips the word's sign.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score = 0i32;
        let mut hits = 0usize;

        for i in 0..tokens.len() {
            let base = self.word_score(&tokens[i]);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(&tokens[i - k]));
            score += if negated { -base } else { base };
            hits += 1;
        }
        (score, hits)
    }

    /// Mean hit score scaled into [-1, 1]; 0.0 when nothing matched.
    pub fn normalized(&self, text: &str) -> f64 {
        let (score, hits) = self.score_text(text);
        if hits == 0 {
            return 0.0;
        }
        (f64::from(score) / (hits as f64 * MAX_WORD_SCORE)).clamp(-1.0, 1.0)
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn't" | "wasn't" | "aren't" | "won't" | "can't" | "cannot" | "without"
    )
}
