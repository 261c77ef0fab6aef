use crate::backoff::LmState;
use crate::error::{Result, SuggestError};
use crate::language_model::{LanguageModel, PrefixPrior, SuccessorKind};
use crate::suffix_array::DocSuffixArray;
use crate::types::{
    is_marker, is_punct_or_marker, WordId, END_OF_DOCUMENT, RESERVED_WORD_IDS, SENTENCE_END,
};
use rustc_hash::FxHashSet;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct BeamEntry<'a> {
    pub score: f64,
    pub words: Vec<&'a str>,
    pub done: bool,
    pub penultimate_state: LmState,
    pub last_word: Option<WordId>,
    pub num_chars: usize,
    pub bonus: f64,
}

impl<'a> BeamEntry<'a> {
    fn start(state: LmState, last_word: Option<WordId>) -> Self {
        Self {
            score: 0.0,
            words: Vec::new(),
            done: false,
            penultimate_state: state,
            last_word,
            num_chars: 0,
            bonus: 0.0,
        }
    }

    fn first_word(&self) -> Option<&'a str> {
        self.words.first().copied()
    }
}

impl PartialEq for BeamEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BeamEntry<'_> {}

impl PartialOrd for BeamEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BeamEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.words.cmp(&self.words))
    }
}

pub(crate) struct TopK<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<T>>,
}

impl<T: Ord> TopK<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(item));
            return;
        }
        if let Some(mut smallest) = self.heap.peek_mut() {
            if item > smallest.0 {
                *smallest = Reverse(item);
            }
        }
    }

    pub(crate) fn into_sorted_desc(self) -> Vec<T> {
        // Ascending order of `Reverse<T>` is descending order of `T`.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(item)| item)
            .collect()
    }
}

fn last_context_word<S: AsRef<str>>(context: &[S]) -> Result<&str> {
    context
        .last()
        .map(AsRef::as_ref)
        .ok_or_else(|| SuggestError::MalformedContext("context must not be empty".to_string()))
}

pub fn beam_search_phrases<'a, S: AsRef<str>>(
    lm: &'a LanguageModel,
    start_words: &[S],
    beam_width: usize,
    length: usize,
    prefix_priors: Option<&[PrefixPrior]>,
) -> Result<Vec<BeamEntry<'a>>> {
    let start_word = lm.vocab_index(last_context_word(start_words)?);
    let start_state = lm.get_state(start_words, false).0;
    let mut beam = vec![BeamEntry::start(start_state, Some(start_word))];

    for step in 0..length {
        let kind = if step == 0 {
            SuccessorKind::Unfiltered
        } else {
            SuccessorKind::Filtered
        };
        let prefix_chars = usize::from(step > 0);
        let mut next_beam = TopK::new(beam_width);

        for entry in &beam {
            if entry.done {
                next_beam.push(entry.clone());
                continue;
            }
            let Some(last_word) = entry.last_word else {
                continue;
            };
            let last_state = if step > 0 {
                lm.advance(&entry.penultimate_state, last_word).0
            } else {
                entry.penultimate_state.clone()
            };

            let candidates = match prefix_priors.filter(|_| step == 0) {
                Some(priors) => priors
                    .iter()
                    .flat_map(|prior| {
                        lm.words_with_prefix(&prior.prefix)
                            .into_iter()
                            .map(move |id| (id, prior.logprob))
                    })
                    .collect::<Vec<_>>(),
                None => lm
                    .successors(last_word, kind)
                    .iter()
                    .map(|id| (*id, 0.0))
                    .collect(),
            };

            for (word, prior) in candidates {
                if lm.is_end_marker(word) {
                    continue;
                }
                let logprob = lm.advance(&last_state, word).1;
                let num_chars = entry.num_chars + prefix_chars + lm.word_length(word);
                let mut words = Vec::with_capacity(entry.words.len() + 1);
                words.extend_from_slice(&entry.words);
                words.push(lm.word(word));
                next_beam.push(BeamEntry {
                    score: entry.score + prior + logprob,
                    words,
                    done: num_chars >= length,
                    penultimate_state: last_state.clone(),
                    last_word: Some(word),
                    num_chars,
                    bonus: entry.bonus,
                });
            }
        }
        beam = next_beam.into_sorted_desc();
    }
    Ok(beam)
}

// Stops early with the beam so far once `budget` is used up at the start of a step.
#[allow(clippy::too_many_arguments)]
pub fn beam_search_corpus<'a, S: AsRef<str>>(
    lm: &'a LanguageModel,
    corpus: &'a DocSuffixArray,
    start_words: &[S],
    beam_width: usize,
    length: usize,
    rare_word_bonus: f64,
    prefix: &str,
    budget: Duration,
) -> Result<Vec<BeamEntry<'a>>> {
    let started = Instant::now();
    let mut last_step = started;
    let mut step_times = Vec::with_capacity(length);

    let anchor = last_context_word(start_words)?;
    let start_state = lm.get_state(start_words, false).0;
    let mut beam = vec![BeamEntry::start(start_state, None)];
    let mut prefix = prefix;

    for step in 0..length {
        let now = Instant::now();
        step_times.push(now.duration_since(last_step));
        last_step = now;
        if now.duration_since(started) >= budget {
            info!(step, ?step_times, "latency budget exceeded, keeping partial beam");
            break;
        }

        let prefix_chars = usize::from(step > 0);
        let mut expansions = Vec::new();
        for entry in &beam {
            if entry.done {
                expansions.push(entry.clone());
                continue;
            }
            let last_state = match entry.last_word {
                Some(word) => lm.advance(&entry.penultimate_state, word).0,
                None => entry.penultimate_state.clone(),
            };

            let mut pattern = Vec::with_capacity(entry.words.len() + 2);
            pattern.push(anchor);
            pattern.extend_from_slice(&entry.words);
            pattern.push(prefix);
            let (lo, hi) = corpus.search_range(&pattern);
            let next_words = corpus.collect_next_tokens(lo, hi, step + 1);

            if next_words.is_empty() {
                match entry.words.last() {
                    None => continue,
                    Some(&last) if last == SENTENCE_END || last == END_OF_DOCUMENT => continue,
                    Some(&last) => {
                        error!(last_word = last, words = ?entry.words, "corpus ran out mid-sentence");
                        return Err(SuggestError::CorpusExhausted {
                            last_word: last.to_string(),
                        });
                    }
                }
            }

            for word in next_words {
                let word_id = lm.vocab_index(word);
                let num_chars = if is_marker(word) {
                    entry.num_chars
                } else {
                    entry.num_chars + prefix_chars + word.chars().count()
                };
                let logprob = lm.advance(&last_state, word_id).1;
                let bonus = if step > 0
                    && word_id > RESERVED_WORD_IDS
                    && !is_punct_or_marker(word)
                    && !entry.words.contains(&word)
                {
                    -lm.unigram_logprob(word_id) * rare_word_bonus
                } else {
                    0.0
                };

                let mut words = Vec::with_capacity(entry.words.len() + 1);
                words.extend_from_slice(&entry.words);
                words.push(word);
                expansions.push(BeamEntry {
                    score: entry.score + logprob + bonus,
                    words,
                    done: num_chars >= length,
                    penultimate_state: last_state.clone(),
                    last_word: Some(word_id),
                    num_chars,
                    bonus: entry.bonus + bonus,
                });
            }
        }

        if expansions.len() > beam_width {
            expansions.select_nth_unstable_by(beam_width, |a, b| b.cmp(a));
            expansions.truncate(beam_width);
        }
        expansions.sort_unstable_by(|a, b| b.cmp(a));
        beam = expansions;
        prefix = "";
    }
    Ok(beam)
}

pub fn take_diverse<'a>(entries: Vec<BeamEntry<'a>>, n: usize) -> Vec<BeamEntry<'a>> {
    let mut remaining = entries
        .into_iter()
        .filter(|entry| !entry.words.is_empty())
        .collect::<Vec<_>>();
    let mut picked = Vec::with_capacity(n.min(remaining.len()));
    let mut used = FxHashSet::default();

    while picked.len() < n && !remaining.is_empty() {
        let mut best = 0;
        for (ix, entry) in remaining.iter().enumerate().skip(1) {
            let fresh = entry.first_word().is_some_and(|w| !used.contains(w));
            let best_fresh = remaining[best]
                .first_word()
                .is_some_and(|w| !used.contains(w));
            let better = fresh
                .cmp(&best_fresh)
                .then_with(|| entry.score.total_cmp(&remaining[best].score));
            if better == Ordering::Greater {
                best = ix;
            }
        }
        let entry = remaining.remove(best);
        used.extend(entry.first_word());
        picked.push(entry);
    }
    picked
}

pub fn generate_by_beamsearch_ngram<S: AsRef<str>>(
    lm: &LanguageModel,
    context: &[S],
    n: usize,
    length: usize,
    prefix_priors: Option<&[PrefixPrior]>,
    beam_width: usize,
    first_word_beam_width: usize,
) -> Result<Vec<Vec<String>>> {
    let first_words = beam_search_phrases(lm, context, first_word_beam_width, 1, prefix_priors)?;

    let mut phrases = Vec::with_capacity(n);
    for first in first_words
        .into_iter()
        .filter(|entry| !entry.words.is_empty())
        .take(n)
    {
        let mut extended = context.iter().map(|w| w.as_ref()).collect::<Vec<_>>();
        extended.extend_from_slice(&first.words);
        let continuation = beam_search_phrases(
            lm,
            &extended,
            beam_width,
            length.saturating_sub(first.num_chars),
            None,
        )?
        .into_iter()
        .next()
        .map(|entry| entry.words)
        .unwrap_or_default();

        phrases.push(
            first
                .words
                .iter()
                .chain(&continuation)
                .map(|w| w.to_string())
                .collect(),
        );
    }
    Ok(phrases)
}

#[allow(clippy::too_many_arguments)]
pub fn generate_by_beamsearch_corpus<S: AsRef<str>>(
    lm: &LanguageModel,
    corpus: &DocSuffixArray,
    context: &[S],
    n: usize,
    length: usize,
    prefix: &str,
    rare_word_bonus: f64,
    beam_width: usize,
    budget: Duration,
) -> Result<Vec<Vec<String>>> {
    let entries = beam_search_corpus(
        lm,
        corpus,
        context,
        beam_width,
        length,
        rare_word_bonus,
        prefix,
        budget,
    )?;
    Ok(take_diverse(entries, n)
        .into_iter()
        .map(|entry| {
            entry
                .words
                .into_iter()
                .filter(|w| !is_marker(w))
                .map(str::to_string)
                .collect()
        })
        .collect())
}
