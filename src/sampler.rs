use crate::backoff::LmState;
use crate::config::LengthBonus;
use crate::error::{Result, SuggestError};
use crate::language_model::{LanguageModel, PrefixPrior};
use crate::scoring::{
    next_word_probs, to_probabilities, weighted_random_choice, weighted_sample_without_replacement,
};
use crate::suffix_array::DocSuffixArray;
use crate::types::{BOS, MISMATCHED_PREFIX_LOGPROB};
use rand::Rng;
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub struct SampledPhrase {
    pub words: Vec<String>,
    pub logprobs: Vec<f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct GenerationParams<'a> {
    pub temperature: f64,
    pub length_bonus: Option<LengthBonus>,
    pub pos_weights: Option<&'a [f64]>,
}

impl Default for GenerationParams<'_> {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            length_bonus: None,
            pos_weights: None,
        }
    }
}

// `max_retries + 1` attempts; the last error is returned as is.
pub(crate) fn retry_dead_ends<T>(
    max_retries: usize,
    mut attempt: impl FnMut() -> Result<T>,
) -> Result<T> {
    for _ in 0..max_retries {
        match attempt() {
            Err(err) if err.is_dead_end() => continue,
            other => return other,
        }
    }
    attempt()
}

pub(crate) fn context_state<S: AsRef<str>>(lm: &LanguageModel, context: &[S]) -> LmState {
    match context.split_first() {
        Some((first, rest)) if first.as_ref() == BOS => lm.get_state(rest, true).0,
        _ => lm.get_state(context, false).0,
    }
}

fn last_word<S: AsRef<str>>(context: &[S]) -> Result<&str> {
    context
        .last()
        .map(AsRef::as_ref)
        .ok_or_else(|| SuggestError::MalformedContext("context must not be empty".to_string()))
}

fn sample_once<S: AsRef<str>, R: Rng + ?Sized>(
    lm: &LanguageModel,
    rng: &mut R,
    context: &[S],
    length: usize,
    prefix_priors: Option<&[PrefixPrior]>,
    params: GenerationParams<'_>,
) -> Result<SampledPhrase> {
    let mut state = context_state(lm, context);
    let mut prev = lm.vocab_index(last_word(context)?);
    let mut phrase = SampledPhrase {
        words: Vec::with_capacity(length),
        logprobs: Vec::with_capacity(length),
    };

    for step in 0..length {
        let priors = if step == 0 { prefix_priors } else { None };
        let (ids, probs) = next_word_probs(
            lm,
            &state,
            prev,
            priors,
            params.temperature,
            params.length_bonus,
            params.pos_weights,
        )?;
        if ids.is_empty() {
            return Err(SuggestError::GenerationFailed);
        }
        let picked = weighted_random_choice(rng, &probs).ok_or(SuggestError::GenerationFailed)?;
        let word = ids[picked];
        state = lm.advance(&state, word).0;
        prev = word;
        phrase.words.push(lm.word(word).to_string());
        phrase.logprobs.push(probs[picked].ln());
    }
    Ok(phrase)
}

pub fn generate_phrase<S: AsRef<str>, R: Rng + ?Sized>(
    lm: &LanguageModel,
    rng: &mut R,
    context: &[S],
    length: usize,
    prefix_priors: Option<&[PrefixPrior]>,
    params: GenerationParams<'_>,
    max_retries: usize,
) -> Result<SampledPhrase> {
    retry_dead_ends(max_retries, || {
        sample_once(lm, rng, context, length, prefix_priors, params)
    })
}

pub fn generate_phrase_from_corpus<S: AsRef<str>, R: Rng + ?Sized>(
    lm: &LanguageModel,
    corpus: &DocSuffixArray,
    rng: &mut R,
    context: &[S],
    length: usize,
    prefix_priors: Option<&[PrefixPrior]>,
    temperature: f64,
) -> Result<SampledPhrase> {
    let mut state = context_state(lm, context);
    let anchor = last_word(context)?;
    let mut phrase = SampledPhrase {
        words: Vec::with_capacity(length),
        logprobs: Vec::with_capacity(length),
    };

    for step in 0..length {
        let mut pattern = Vec::with_capacity(phrase.words.len() + 2);
        pattern.push(anchor);
        pattern.extend(phrase.words.iter().map(String::as_str));
        pattern.push("");
        let (lo, hi) = corpus.search_range(&pattern);
        let next_words = corpus.collect_next_tokens(lo, hi, step + 1);
        if next_words.is_empty() {
            return Err(SuggestError::GenerationFailed);
        }

        let ids = next_words
            .iter()
            .map(|word| lm.vocab_index(word))
            .collect::<Vec<_>>();
        let mut logprobs = lm.eval_logprobs_for_words(&state, &ids);
        if let Some(priors) = prefix_priors.filter(|_| step == 0) {
            for (logprob, word) in logprobs.iter_mut().zip(&next_words) {
                let prior = priors
                    .iter()
                    .rev()
                    .find(|prior| word.starts_with(prior.prefix.as_str()))
                    .map(|prior| prior.logprob)
                    .unwrap_or(MISMATCHED_PREFIX_LOGPROB);
                *logprob += prior;
            }
        }
        let probs = to_probabilities(lm, &ids, &logprobs, temperature, None, None)?;

        let picked = weighted_random_choice(rng, &probs).ok_or(SuggestError::GenerationFailed)?;
        state = lm.advance(&state, ids[picked]).0;
        phrase.words.push(next_words[picked].to_string());
        phrase.logprobs.push(probs[picked].ln());
    }
    Ok(phrase)
}

#[allow(clippy::too_many_arguments)]
pub fn generate_diverse_phrases<S: AsRef<str>, R: Rng + ?Sized>(
    lm: &LanguageModel,
    corpus: Option<&DocSuffixArray>,
    rng: &mut R,
    context: &[S],
    n: usize,
    length: usize,
    prefix_priors: Option<&[PrefixPrior]>,
    params: GenerationParams<'_>,
    max_retries: usize,
) -> Result<Vec<SampledPhrase>> {
    let state = lm.get_state(context, false).0;
    let prev = lm.vocab_index(last_word(context)?);
    let (first_words, first_probs) = next_word_probs(
        lm,
        &state,
        prev,
        prefix_priors,
        params.temperature,
        params.length_bonus,
        params.pos_weights,
    )?;
    if first_words.is_empty() {
        return Ok(Vec::new());
    }

    let mut phrases = Vec::with_capacity(n);
    for picked in weighted_sample_without_replacement(rng, &first_probs, n) {
        let first = lm.word(first_words[picked]).to_string();
        let mut extended = context.iter().map(|w| w.as_ref()).collect::<Vec<_>>();
        extended.push(first.as_str());

        let remaining = length.saturating_sub(1);
        let completion = match corpus {
            Some(corpus) => generate_phrase_from_corpus(
                lm,
                corpus,
                rng,
                &extended,
                remaining,
                None,
                params.temperature,
            ),
            None => generate_phrase(lm, rng, &extended, remaining, None, params, max_retries),
        };
        let rest = match completion {
            Ok(rest) => rest,
            Err(err) if err.is_dead_end() => {
                warn!(first_word = %first, "could not complete sampled phrase");
                continue;
            }
            Err(err) => return Err(err),
        };

        let mut words = Vec::with_capacity(rest.words.len() + 1);
        words.push(first);
        words.extend(rest.words);
        let mut logprobs = Vec::with_capacity(rest.logprobs.len() + 1);
        logprobs.push(first_probs[picked].ln());
        logprobs.extend(rest.logprobs);
        phrases.push(SampledPhrase { words, logprobs });
    }
    Ok(phrases)
}
