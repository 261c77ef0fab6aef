use crate::error::{Result, SuggestError};
use crate::types::DEFAULT_FILTERED_SUCCESSORS;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const DEFAULT_NUM_SUGGESTIONS: usize = 3;
pub(crate) const DEFAULT_BEAM_WIDTH: usize = 50;
pub(crate) const DEFAULT_FIRST_WORD_BEAM_WIDTH: usize = 10;
pub(crate) const DEFAULT_BEAM_LENGTH: usize = 30;
pub(crate) const DEFAULT_SAMPLE_LENGTH: usize = 6;
pub(crate) const DEFAULT_LATENCY_BUDGET_MS: u64 = 300;
pub(crate) const DEFAULT_MAX_RETRIES: usize = 10;
pub(crate) const DEFAULT_LENGTH_BONUS_MIN_LENGTH: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LengthBonus {
    pub min_length: usize,
    pub amount: f64,
}

impl LengthBonus {
    pub fn new(amount: f64) -> Self {
        Self {
            min_length: DEFAULT_LENGTH_BONUS_MIN_LENGTH,
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SuggestConfig {
    pub num_suggestions: usize,
    pub beam_width: usize,
    pub first_word_beam_width: usize,
    pub beam_length: usize,
    pub sample_length: usize,
    pub latency_budget: Duration,
    pub length_bonus: Option<LengthBonus>,
    pub pos_weights: Option<Vec<f64>>,
    pub max_retries: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            num_suggestions: DEFAULT_NUM_SUGGESTIONS,
            beam_width: DEFAULT_BEAM_WIDTH,
            first_word_beam_width: DEFAULT_FIRST_WORD_BEAM_WIDTH,
            beam_length: DEFAULT_BEAM_LENGTH,
            sample_length: DEFAULT_SAMPLE_LENGTH,
            latency_budget: Duration::from_millis(DEFAULT_LATENCY_BUDGET_MS),
            length_bonus: None,
            pos_weights: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl SuggestConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("num_suggestions", self.num_suggestions),
            ("beam_width", self.beam_width),
            ("first_word_beam_width", self.first_word_beam_width),
            ("beam_length", self.beam_length),
            ("sample_length", self.sample_length),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SuggestError::InvalidParameter(format!(
                    "{name} must be greater than or equal to 1."
                )));
            }
        }
        if let Some(bonus) = self.length_bonus {
            if !bonus.amount.is_finite() {
                return Err(SuggestError::InvalidParameter(
                    "length_bonus amount must be finite.".to_string(),
                ));
            }
        }
        if let Some(weights) = &self.pos_weights {
            if weights.iter().any(|w| !w.is_finite()) {
                return Err(SuggestError::InvalidParameter(
                    "pos_weights must all be finite.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainConfig {
    pub name: String,
    pub arpa_path: PathBuf,
    pub corpus_path: Option<PathBuf>,
    pub prune_bigrams: bool,
    pub filtered_successors: usize,
}

impl DomainConfig {
    pub fn new(name: impl Into<String>, arpa_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            arpa_path: arpa_path.into(),
            corpus_path: None,
            prune_bigrams: true,
            filtered_successors: DEFAULT_FILTERED_SUCCESSORS,
        }
    }

    pub fn with_corpus(mut self, corpus_path: impl Into<PathBuf>) -> Self {
        self.corpus_path = Some(corpus_path.into());
        self
    }

    pub fn from_basename(name: impl Into<String>, basename: impl AsRef<Path>) -> Self {
        let basename = basename.as_ref();
        let with_suffix = |suffix: &str| {
            let mut raw = basename.as_os_str().to_owned();
            raw.push(suffix);
            PathBuf::from(raw)
        };
        let corpus = with_suffix(".corpus.txt");
        let config = Self::new(name, with_suffix(".arpa"));
        if corpus.exists() {
            config.with_corpus(corpus)
        } else {
            config
        }
    }
}
