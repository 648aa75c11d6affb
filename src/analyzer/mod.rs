//! Query complexity scoring.
//!
//! [`ComplexityAnalyzer`] rates a query from 0 to 100 using five
//! independent heuristics and recommends which engine family should answer
//! it. Scoring is pure and deterministic: no I/O, no clocks, no randomness.
//!
//! | factor   | signal                                                        |
//! |----------|---------------------------------------------------------------|
//! | length   | character count, stepped                                      |
//! | keyword  | complex terms raise it, simple lookup terms pin it low        |
//! | pattern  | domain-technical vocabulary (low) or question density (high) |
//! | context  | conversation history, stated intent, domain data on hand      |
//! | language | mixed scripts, symbols, digits, multiple sentences            |
//!
//! The recommendation rule, first match wins:
//!
//! 1. pattern ≤ 30 and context ≤ 30 → `local` (the local engine already
//!    knows the domain vocabulary)
//! 2. score ≥ 70 → `cloud`
//! 3. length ≤ 10, keyword ≤ 30 and context ≤ 30 (a short plain query
//!    with little conversation behind it) → `local`
//! 4. score ≥ 40 → `hybrid`
//! 5. otherwise → `local`

mod config;

pub use config::{AnalyzerConfig, FactorWeights, RecommendationThresholds};

use regex::Regex;

use crate::types::{ComplexityFactors, ComplexityScore, EngineMode, Query, QueryContext};
use crate::{MuninnError, Result};

/// Character-count steps: below `.0` chars scores `.1`.
const LENGTH_STEPS: [(usize, u8); 4] = [(20, 10), (50, 25), (100, 50), (200, 75)];
const LENGTH_MAX: u8 = 90;

const KEYWORD_BASE: i32 = 30;
const COMPLEX_BONUS: i32 = 15;
const SIMPLE_PENALTY: i32 = 10;

const TECHNICAL_MATCH_MIN: usize = 2;
const TECHNICAL_SCORE: u8 = 15;
const QUESTION_BASE: i32 = 10;
const QUESTION_STEP: i32 = 30;

const HISTORY_MIN_TURNS: usize = 2;
const HISTORY_BONUS: i32 = 30;
const INTENT_MIN_CHARS: usize = 20;
const INTENT_BONUS: i32 = 20;
const DOMAIN_DATA_DISCOUNT: i32 = 20;

const LANGUAGE_BASE: i32 = 30;
const MIXED_SCRIPT_BONUS: i32 = 20;
const SYMBOL_BONUS: i32 = 15;
const DIGIT_BONUS: i32 = 10;
const MULTI_SENTENCE_BONUS: i32 = 20;
const MULTI_SENTENCE_MIN: usize = 2;

const BASIC_PUNCTUATION: &[char] = &[
    '.', ',', '?', '!', '\'', '"', '-', ':', ';', '(', ')', '？', '！', '。', '，',
];
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？', '\n'];

/// Scores queries for difficulty. Cheap to share; holds compiled tables only.
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    config: AnalyzerConfig,
    complex: Vec<Term>,
    simple: Vec<Term>,
    interrogatives: Vec<Term>,
    technical: Vec<Regex>,
}

impl ComplexityAnalyzer {
    /// Build an analyzer, validating weights and compiling the regex groups.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let technical = config
            .technical_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| MuninnError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(config, technical))
    }

    /// Analyzer with the default tables.
    pub fn with_defaults() -> Self {
        let config = AnalyzerConfig::default();
        let technical = config
            .technical_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self::assemble(config, technical)
    }

    fn assemble(config: AnalyzerConfig, technical: Vec<Regex>) -> Self {
        Self {
            complex: Term::compile_all(&config.complex_keywords),
            simple: Term::compile_all(&config.simple_keywords),
            interrogatives: Term::compile_all(&config.interrogatives),
            technical,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Score a query together with its context.
    pub fn analyze_query(&self, query: &Query) -> ComplexityScore {
        self.analyze(query.text(), query.context())
    }

    /// Score `text`. Never fails; empty text scores near the floor.
    pub fn analyze(&self, text: &str, context: Option<&QueryContext>) -> ComplexityScore {
        let text = text.trim();
        let lower = text.to_lowercase();

        let factors = ComplexityFactors {
            length: length_factor(text),
            keyword: self.keyword_factor(&lower),
            pattern: self.pattern_factor(text, &lower),
            context: context_factor(context),
            language: language_factor(text),
        };

        let w = &self.config.weights;
        let weighted = f64::from(factors.length) * w.length
            + f64::from(factors.keyword) * w.keyword
            + f64::from(factors.pattern) * w.pattern
            + f64::from(factors.context) * w.context
            + f64::from(factors.language) * w.language;
        let score = weighted.round().clamp(0.0, 100.0) as u8;

        ComplexityScore {
            score,
            recommendation: self.recommend(score, &factors),
            confidence: confidence(&factors),
            factors,
        }
    }

    fn recommend(&self, score: u8, factors: &ComplexityFactors) -> EngineMode {
        let t = &self.config.thresholds;
        if factors.pattern <= t.local_pattern_max && factors.context <= t.local_context_max {
            EngineMode::Local
        } else if score >= t.cloud_min {
            EngineMode::Cloud
        } else if factors.length <= t.short_length_max
            && factors.keyword <= t.short_keyword_max
            && factors.context <= t.local_context_max
        {
            // A burst of question marks alone does not make a chat line hard.
            EngineMode::Local
        } else if score >= t.hybrid_min {
            EngineMode::Hybrid
        } else {
            EngineMode::Local
        }
    }

    fn keyword_factor(&self, lower: &str) -> u8 {
        let complex = self.complex.iter().filter(|t| t.is_in(lower)).count() as i32;
        let simple = self.simple.iter().filter(|t| t.is_in(lower)).count() as i32;
        let raw = KEYWORD_BASE + COMPLEX_BONUS * complex - SIMPLE_PENALTY * simple;
        // Lookup-style terms win over anything that makes the query look hard.
        let raw = if simple > 0 { raw.min(KEYWORD_BASE) } else { raw };
        clamp_factor(raw)
    }

    fn pattern_factor(&self, text: &str, lower: &str) -> u8 {
        let technical = self.technical.iter().filter(|re| re.is_match(text)).count();
        if technical >= TECHNICAL_MATCH_MIN {
            return TECHNICAL_SCORE;
        }
        let question_marks = text.chars().filter(|c| matches!(c, '?' | '？')).count();
        let words = self
            .interrogatives
            .iter()
            .filter(|t| t.is_in(lower))
            .count();
        let markers = (question_marks + words) as i32;
        clamp_factor(QUESTION_BASE.saturating_add(QUESTION_STEP.saturating_mul(markers)))
    }
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn length_factor(text: &str) -> u8 {
    let chars = text.chars().count();
    LENGTH_STEPS
        .iter()
        .find(|(below, _)| chars < *below)
        .map_or(LENGTH_MAX, |(_, score)| *score)
}

fn context_factor(context: Option<&QueryContext>) -> u8 {
    let Some(ctx) = context else {
        return 0;
    };
    let mut score = 0;
    if ctx.previous_queries.len() > HISTORY_MIN_TURNS {
        score += HISTORY_BONUS;
    }
    if ctx
        .user_intent
        .as_deref()
        .is_some_and(|intent| intent.chars().count() > INTENT_MIN_CHARS)
    {
        score += INTENT_BONUS;
    }
    if ctx.has_domain_data() {
        score -= DOMAIN_DATA_DISCOUNT;
    }
    clamp_factor(score)
}

fn language_factor(text: &str) -> u8 {
    let mut score = LANGUAGE_BASE;
    if distinct_scripts(text) >= 2 {
        score += MIXED_SCRIPT_BONUS;
    }
    if text
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace() && !BASIC_PUNCTUATION.contains(&c))
    {
        score += SYMBOL_BONUS;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += DIGIT_BONUS;
    }
    let sentences = text
        .split(SENTENCE_TERMINATORS)
        .filter(|s| !s.trim().is_empty())
        .count();
    if sentences > MULTI_SENTENCE_MIN {
        score += MULTI_SENTENCE_BONUS;
    }
    clamp_factor(score)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Hangul,
    Han,
    Kana,
    Cyrillic,
}

fn script_of(c: char) -> Option<Script> {
    match c {
        'a'..='z' | 'A'..='Z' | '\u{00C0}'..='\u{024F}' => Some(Script::Latin),
        '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' => {
            Some(Script::Hangul)
        }
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' => Some(Script::Han),
        '\u{3040}'..='\u{30FF}' => Some(Script::Kana),
        '\u{0400}'..='\u{04FF}' => Some(Script::Cyrillic),
        _ => None,
    }
}

fn distinct_scripts(text: &str) -> usize {
    let mut seen: Vec<Script> = Vec::with_capacity(2);
    for script in text.chars().filter_map(script_of) {
        if !seen.contains(&script) {
            seen.push(script);
        }
    }
    seen.len()
}

/// Low spread across factors means they agree, so the recommendation is
/// more trustworthy.
fn confidence(factors: &ComplexityFactors) -> f64 {
    let values = factors.as_array().map(f64::from);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (1.0 - variance.sqrt() / 50.0).clamp(0.5, 0.95)
}

fn clamp_factor(raw: i32) -> u8 {
    raw.clamp(0, 100) as u8
}

/// A keyword matched case-insensitively.
///
/// ASCII terms must sit on ASCII word boundaries so that `list` does not
/// fire inside `specialist`; a Hangul particle right after an English word
/// (`trend를`) still counts as a boundary. Other terms match as substrings,
/// which suits agglutinative scripts.
#[derive(Debug, Clone)]
struct Term {
    text: String,
    ascii: bool,
}

impl Term {
    fn compile_all(terms: &[String]) -> Vec<Term> {
        terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .map(|text| Term {
                ascii: text.is_ascii(),
                text,
            })
            .collect()
    }

    fn is_in(&self, lower: &str) -> bool {
        if !self.ascii {
            return lower.contains(&self.text);
        }
        lower.match_indices(&self.text).any(|(start, _)| {
            let before = lower[..start].chars().next_back();
            let after = lower[start + self.text.len()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_alphanumeric())
                && !after.is_some_and(|c| c.is_ascii_alphanumeric())
        })
    }
}
