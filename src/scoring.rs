use crate::backoff::LmState;
use crate::config::LengthBonus;
use crate::error::{Result, SuggestError};
use crate::language_model::{LanguageModel, PrefixPrior};
use crate::types::WordId;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

pub(crate) fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

pub(crate) fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let lse = log_sum_exp(values);
    if !lse.is_finite() {
        let uniform = 1.0 / values.len() as f64;
        return vec![uniform; values.len()];
    }
    values.iter().map(|v| (v - lse).exp()).collect()
}

pub fn to_probabilities(
    lm: &LanguageModel,
    ids: &[WordId],
    logprobs: &[f64],
    temperature: f64,
    length_bonus: Option<LengthBonus>,
    pos_weights: Option<&[f64]>,
) -> Result<Vec<f64>> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(SuggestError::InvalidParameter(
            "temperature must be greater than 0 for sampling.".to_string(),
        ));
    }
    if ids.len() != logprobs.len() {
        return Err(SuggestError::InvalidParameter(format!(
            "expected one log-probability per candidate, got {} for {} candidates",
            logprobs.len(),
            ids.len()
        )));
    }

    let adjusted = ids
        .iter()
        .zip(logprobs)
        .map(|(id, logprob)| {
            let mut value = *logprob;
            if let Some(bonus) = length_bonus {
                if bonus.amount != 0.0 && lm.word_length(*id) >= bonus.min_length {
                    value += bonus.amount;
                }
            }
            if let Some(weights) = pos_weights {
                value += weights.get(lm.pos_tag(*id)).copied().unwrap_or(0.0);
            }
            value / temperature
        })
        .collect::<Vec<_>>();
    Ok(softmax(&adjusted))
}

pub fn weighted_random_choice<R: Rng + ?Sized>(rng: &mut R, probs: &[f64]) -> Option<usize> {
    let dist = WeightedIndex::new(probs).ok()?;
    Some(dist.sample(rng))
}

pub(crate) fn weighted_sample_without_replacement<R: Rng + ?Sized>(
    rng: &mut R,
    probs: &[f64],
    k: usize,
) -> Vec<usize> {
    let mut remaining = probs.to_vec();
    let mut picked = Vec::with_capacity(k.min(probs.len()));
    while picked.len() < k {
        let Some(ix) = weighted_random_choice(rng, &remaining) else {
            break;
        };
        picked.push(ix);
        remaining[ix] = 0.0;
    }
    picked
}

pub fn next_word_probs(
    lm: &LanguageModel,
    state: &LmState,
    prev_word: WordId,
    prefix_priors: Option<&[PrefixPrior]>,
    temperature: f64,
    length_bonus: Option<LengthBonus>,
    pos_weights: Option<&[f64]>,
) -> Result<(Vec<WordId>, Vec<f64>)> {
    let candidates = lm.next_word_candidates(state, prev_word, prefix_priors);
    if candidates.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let probs = to_probabilities(
        lm,
        &candidates.ids,
        &candidates.logprobs,
        temperature,
        length_bonus,
        pos_weights,
    )?;
    Ok((candidates.ids, probs))
}

