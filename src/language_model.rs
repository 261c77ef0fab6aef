use crate::arpa::ArpaTable;
use crate::backoff::{BackoffModel, LmState, ScoringModel};
use crate::error::{Result, SuggestError};
use crate::pos::PosTable;
use crate::successors::SuccessorTable;
use crate::types::{
    WordId, DEFAULT_FILTERED_SUCCESSORS, END_OF_DOCUMENT, LOG10, PARALLEL_SCORE_THRESHOLD,
    SENTENCE_END, SENTENCE_START,
};
use crate::vocab_trie::VocabTrie;
use rayon::prelude::*;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

#[derive(Clone, Debug, PartialEq)]
pub struct PrefixPrior {
    pub logprob: f64,
    pub prefix: String,
}

impl PrefixPrior {
    pub fn new(logprob: f64, prefix: impl Into<String>) -> Self {
        Self {
            logprob,
            prefix: prefix.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Candidates {
    pub ids: Vec<WordId>,
    pub logprobs: Vec<f64>,
}

impl Candidates {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuccessorKind {
    Unfiltered,
    Filtered,
}

pub struct LanguageModel {
    scorer: Box<dyn ScoringModel>,
    id_to_word: Vec<String>,
    unigram_logprobs: Vec<f64>,
    unfiltered: SuccessorTable,
    filtered: SuccessorTable,
    trie: VocabTrie,
    word_lengths: Vec<usize>,
    pos: OnceLock<PosTable>,
    eos: WordId,
    eop: WordId,
    sentence_start: WordId,
}

impl LanguageModel {
    pub fn from_arpa_path(path: &Path, prune: bool, filtered_successors: usize) -> Result<Self> {
        let table = ArpaTable::from_path(path)?;
        info!(order = table.order, vocab = table.vocab.len(), "building back-off model");
        let scorer = BackoffModel::from_table(&table);
        Self::new(Box::new(scorer), &table, prune, filtered_successors)
    }

    pub fn from_arpa_str(text: &str) -> Result<Self> {
        let table = ArpaTable::parse(text)?;
        let scorer = BackoffModel::from_table(&table);
        Self::new(Box::new(scorer), &table, true, DEFAULT_FILTERED_SUCCESSORS)
    }

    pub fn new(
        scorer: Box<dyn ScoringModel>,
        table: &ArpaTable,
        prune: bool,
        filtered_successors: usize,
    ) -> Result<Self> {
        let mismatch = table
            .vocab
            .par_iter()
            .enumerate()
            .find_first(|(id, word)| scorer.vocab_index(word) as usize != *id);
        if let Some((expected, word)) = mismatch {
            return Err(SuggestError::VocabMismatch {
                word: word.clone(),
                expected,
                found: scorer.vocab_index(word) as usize,
            });
        }
        info!(vocab = table.vocab.len(), "vocabulary ids verified");

        let unigram_logprobs = table
            .unigrams
            .iter()
            .map(|w| f64::from(w.prob) * LOG10)
            .collect::<Vec<_>>();

        info!(bigrams = table.bigrams().len(), "encoding bigrams to indices");
        let (unfiltered, filtered) = SuccessorTable::from_bigrams(
            table.vocab.len(),
            table.bigrams(),
            filtered_successors,
        );
        let unfiltered = if prune { unfiltered.pruned() } else { unfiltered };

        let trie = VocabTrie::from_vocab(table.vocab.as_slice());
        let word_lengths = table.vocab.iter().map(|w| w.chars().count()).collect();

        let eos = scorer.vocab_index(SENTENCE_END);
        let eop = scorer.vocab_index(END_OF_DOCUMENT);
        let sentence_start = scorer.vocab_index(SENTENCE_START);

        Ok(Self {
            scorer,
            id_to_word: table.vocab.clone(),
            unigram_logprobs,
            unfiltered,
            filtered,
            trie,
            word_lengths,
            pos: OnceLock::new(),
            eos,
            eop,
            sentence_start,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.id_to_word.len()
    }

    pub fn vocab_index(&self, word: &str) -> WordId {
        self.scorer.vocab_index(word)
    }

    pub fn word(&self, id: WordId) -> &str {
        self.id_to_word
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn unigram_logprob(&self, id: WordId) -> f64 {
        self.unigram_logprobs
            .get(id as usize)
            .copied()
            .unwrap_or(f64::NEG_INFINITY)
    }

    pub fn word_length(&self, id: WordId) -> usize {
        self.word_lengths.get(id as usize).copied().unwrap_or(0)
    }

    pub fn pos_table(&self) -> &PosTable {
        self.pos.get_or_init(|| {
            info!("computing part-of-speech tags");
            PosTable::tag_vocab(self.id_to_word.as_slice())
        })
    }

    pub fn pos_tag(&self, id: WordId) -> usize {
        self.pos_table().tag_id(id as usize)
    }

    pub fn successors(&self, id: WordId, kind: SuccessorKind) -> &[WordId] {
        match kind {
            SuccessorKind::Unfiltered => self.unfiltered.successors(id),
            SuccessorKind::Filtered => self.filtered.successors(id),
        }
    }

    pub fn successor_table(&self, kind: SuccessorKind) -> &SuccessorTable {
        match kind {
            SuccessorKind::Unfiltered => &self.unfiltered,
            SuccessorKind::Filtered => &self.filtered,
        }
    }

    pub fn words_with_prefix(&self, prefix: &str) -> Vec<WordId> {
        self.trie.ids_with_prefix(prefix)
    }

    pub fn is_end_marker(&self, id: WordId) -> bool {
        id == self.eos || id == self.eop
    }

    pub fn sentence_end_id(&self) -> WordId {
        self.eos
    }

    pub fn begin_sentence_state(&self) -> LmState {
        self.scorer.begin_sentence_state()
    }

    pub fn null_context_state(&self) -> LmState {
        self.scorer.null_context_state()
    }

    pub fn advance(&self, state: &LmState, word: WordId) -> (LmState, f64) {
        let (next, log10) = self.scorer.base_score(state, word);
        (next, f64::from(log10) * LOG10)
    }

    pub fn score_sequence<S: AsRef<str>>(&self, state: &LmState, words: &[S]) -> (f64, LmState) {
        let mut state = state.clone();
        let mut total = 0.0;
        for word in words {
            let (next, logprob) = self.advance(&state, self.vocab_index(word.as_ref()));
            total += logprob;
            state = next;
        }
        (total, state)
    }

    pub fn score_sequence_by_word<S: AsRef<str>>(&self, state: &LmState, words: &[S]) -> Vec<f64> {
        let mut state = state.clone();
        words
            .iter()
            .map(|word| {
                let (next, logprob) = self.advance(&state, self.vocab_index(word.as_ref()));
                state = next;
                logprob
            })
            .collect()
    }

    pub fn get_state<S: AsRef<str>>(&self, words: &[S], bos: bool) -> (LmState, f64) {
        let start = if bos {
            self.begin_sentence_state()
        } else {
            self.null_context_state()
        };
        let (score, state) = self.score_sequence(&start, words);
        (state, score)
    }

    pub fn eval_logprobs_for_words(&self, state: &LmState, words: &[WordId]) -> Vec<f64> {
        if words.len() >= PARALLEL_SCORE_THRESHOLD {
            words
                .par_iter()
                .map(|word| self.advance(state, *word).1)
                .collect()
        } else {
            words.iter().map(|word| self.advance(state, *word).1).collect()
        }
    }

    // Empty output is a dead end for the caller.
    pub fn next_word_candidates(
        &self,
        state: &LmState,
        prev_word: WordId,
        prefix_priors: Option<&[PrefixPrior]>,
    ) -> Candidates {
        let (ids, priors) = match prefix_priors {
            Some(priors) => {
                let mut ids = Vec::new();
                let mut weights = Vec::new();
                for prior in priors {
                    for id in self.words_with_prefix(&prior.prefix) {
                        ids.push(id);
                        weights.push(prior.logprob);
                    }
                }
                (ids, Some(weights))
            }
            None => {
                let mut next = self.unfiltered.successors(prev_word);
                if next.is_empty() {
                    next = self.unfiltered.successors(self.sentence_start);
                }
                let ids = next
                    .iter()
                    .copied()
                    .filter(|id| !self.is_end_marker(*id))
                    .collect::<Vec<_>>();
                (ids, None)
            }
        };
        if ids.is_empty() {
            return Candidates::default();
        }

        let mut logprobs = self.eval_logprobs_for_words(state, &ids);
        if let Some(priors) = priors {
            for (logprob, prior) in logprobs.iter_mut().zip(priors) {
                *logprob += prior;
            }
        }
        Candidates { ids, logprobs }
    }
}
