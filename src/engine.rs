use crate::beam::{generate_by_beamsearch_corpus, generate_by_beamsearch_ngram};
use crate::config::{DomainConfig, SuggestConfig};
use crate::error::{Result, SuggestError};
use crate::language_model::{LanguageModel, PrefixPrior};
use crate::sampler::{generate_diverse_phrases, GenerationParams};
use crate::suffix_array::DocSuffixArray;
use crate::tokenize::tokenize_so_far;
use crate::types::GenerationMode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyPress {
    Letter(char),
    Tap { x: f64, y: f64 },
}

pub fn typed_prefix(keys: &[KeyPress]) -> String {
    keys.iter()
        .map_while(|key| match key {
            KeyPress::Letter(c) => Some(*c),
            KeyPress::Tap { .. } => None,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionRequest {
    pub text_so_far: String,
    pub current_word: Vec<KeyPress>,
    pub domain: String,
    pub rare_word_bonus: f64,
    pub use_corpus_constraint: bool,
    pub temperature: f64,
    pub seed: Option<u64>,
}

impl SuggestionRequest {
    pub fn new(text_so_far: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            text_so_far: text_so_far.into(),
            current_word: Vec::new(),
            domain: domain.into(),
            rare_word_bonus: 0.0,
            use_corpus_constraint: false,
            temperature: 0.0,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(SuggestError::InvalidParameter(
                "temperature must be greater than or equal to 0.".to_string(),
            ));
        }
        if !self.rare_word_bonus.is_finite() {
            return Err(SuggestError::InvalidParameter(
                "rare_word_bonus must be finite.".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Suggestion {
    pub first_word: Vec<String>,
    pub continuation: Vec<String>,
    pub probabilities: Option<Vec<f64>>,
}

impl Suggestion {
    pub fn from_phrase(mut words: Vec<String>, probabilities: Option<Vec<f64>>) -> Self {
        let continuation = if words.is_empty() {
            Vec::new()
        } else {
            words.split_off(1)
        };
        Self {
            first_word: words,
            continuation,
            probabilities,
        }
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.first_word
            .iter()
            .chain(&self.continuation)
            .map(String::as_str)
    }
}

pub struct Domain {
    pub name: String,
    pub lm: LanguageModel,
    pub corpus: Option<DocSuffixArray>,
}

impl Domain {
    pub fn new(name: impl Into<String>, lm: LanguageModel, corpus: Option<DocSuffixArray>) -> Self {
        Self {
            name: name.into(),
            lm,
            corpus,
        }
    }

    pub fn load(config: &DomainConfig) -> Result<Self> {
        info!(domain = %config.name, arpa = %config.arpa_path.display(), "loading domain");
        let lm = LanguageModel::from_arpa_path(
            &config.arpa_path,
            config.prune_bigrams,
            config.filtered_successors,
        )?;
        let corpus = config
            .corpus_path
            .as_deref()
            .map(DocSuffixArray::from_corpus_path)
            .transpose()?;
        info!(
            domain = %config.name,
            vocab = lm.vocab_size(),
            corpus_positions = corpus.as_ref().map(DocSuffixArray::len).unwrap_or(0),
            "domain ready"
        );
        Ok(Self::new(config.name.clone(), lm, corpus))
    }
}

#[derive(Default)]
pub struct Registry {
    domains: FxHashMap<String, Arc<Domain>>,
}

impl Registry {
    pub fn load(configs: &[DomainConfig]) -> Result<Self> {
        let domains = configs
            .par_iter()
            .map(Domain::load)
            .collect::<Result<Vec<_>>>()?;
        let mut registry = Self::default();
        for domain in domains {
            registry.insert(domain);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, domain: Domain) {
        self.domains.insert(domain.name.clone(), Arc::new(domain));
    }

    pub fn get(&self, name: &str) -> Result<Arc<Domain>> {
        self.domains
            .get(name)
            .cloned()
            .ok_or_else(|| SuggestError::UnknownDomain(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.domains.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

pub struct Suggester {
    registry: Arc<Registry>,
    config: SuggestConfig,
}

impl Suggester {
    pub fn new(registry: Arc<Registry>, config: SuggestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    pub fn config(&self) -> &SuggestConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn suggest(&self, request: &SuggestionRequest) -> Result<Vec<Suggestion>> {
        let started = Instant::now();
        request.validate()?;
        let domain = self.registry.get(&request.domain)?;
        let context = tokenize_so_far(&request.text_so_far)?;
        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (mode, suggestions) = self.generate(&domain, &context, request, &mut rng)?;
        debug!(
            domain = %request.domain,
            ?mode,
            suggestions = suggestions.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "served suggestion request"
        );
        Ok(suggestions)
    }

    pub fn suggest_batch(&self, requests: &[SuggestionRequest]) -> Vec<Result<Vec<Suggestion>>> {
        requests
            .par_iter()
            .map(|request| self.suggest(request))
            .collect()
    }

    fn generate<R: Rng>(
        &self,
        domain: &Domain,
        context: &[String],
        request: &SuggestionRequest,
        rng: &mut R,
    ) -> Result<(GenerationMode, Vec<Suggestion>)> {
        let config = &self.config;
        let prefix = typed_prefix(&request.current_word);
        let prefix_priors = (!prefix.is_empty()).then(|| vec![PrefixPrior::new(0.0, prefix.as_str())]);
        let corpus = domain.corpus.as_ref().filter(|_| request.use_corpus_constraint);
        let mode = GenerationMode::select(request.temperature, corpus.is_some());

        let suggestions = match (mode, corpus) {
            (GenerationMode::BeamCorpus, Some(corpus)) => generate_by_beamsearch_corpus(
                &domain.lm,
                corpus,
                context,
                config.num_suggestions,
                config.beam_length,
                &prefix,
                request.rare_word_bonus,
                config.beam_width,
                config.latency_budget,
            )?
            .into_iter()
            .map(|words| Suggestion::from_phrase(words, None))
            .collect(),
            (GenerationMode::Sample, corpus) => {
                let params = GenerationParams {
                    temperature: request.temperature,
                    length_bonus: config.length_bonus,
                    pos_weights: config.pos_weights.as_deref(),
                };
                generate_diverse_phrases(
                    &domain.lm,
                    corpus,
                    rng,
                    context,
                    config.num_suggestions,
                    config.sample_length,
                    prefix_priors.as_deref(),
                    params,
                    config.max_retries,
                )?
                .into_iter()
                .map(|phrase| Suggestion::from_phrase(phrase.words, Some(phrase.logprobs)))
                .collect()
            }
            _ => generate_by_beamsearch_ngram(
                &domain.lm,
                context,
                config.num_suggestions,
                config.beam_length,
                prefix_priors.as_deref(),
                config.beam_width,
                config.first_word_beam_width,
            )?
            .into_iter()
            .map(|words| Suggestion::from_phrase(words, None))
            .collect(),
        };
        Ok((mode, suggestions))
    }
}
