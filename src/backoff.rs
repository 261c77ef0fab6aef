use crate::arpa::{ArpaTable, Ngram, NgramWeights};
use crate::types::{WordId, BOS, UNK};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

// Advancing a state yields a new one; the old state stays valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LmState {
    context: SmallVec<[WordId; 4]>,
}

impl LmState {
    pub fn from_context(context: &[WordId]) -> Self {
        Self {
            context: SmallVec::from_slice(context),
        }
    }

    pub fn context(&self) -> &[WordId] {
        &self.context
    }
}

pub trait ScoringModel: Send + Sync {
    fn order(&self) -> usize;

    fn vocab_size(&self) -> usize;

    fn vocab_index(&self, word: &str) -> WordId;

    fn begin_sentence_state(&self) -> LmState;

    fn null_context_state(&self) -> LmState;

    fn base_score(&self, state: &LmState, word: WordId) -> (LmState, f32);
}

pub struct BackoffModel {
    order: usize,
    word_ids: FxHashMap<String, WordId>,
    unigrams: Vec<NgramWeights>,
    higher: FxHashMap<Ngram, NgramWeights>,
    unk: WordId,
    bos: Option<WordId>,
}

impl BackoffModel {
    pub fn from_table(table: &ArpaTable) -> Self {
        let word_ids = table
            .vocab
            .iter()
            .enumerate()
            .map(|(id, word)| (word.clone(), id as WordId))
            .collect::<FxHashMap<_, _>>();
        let unk = word_ids.get(UNK).copied().unwrap_or(0);
        let bos = word_ids.get(BOS).copied();

        let mut higher = FxHashMap::default();
        higher.reserve(table.higher.iter().map(Vec::len).sum());
        for grams in &table.higher {
            for (ngram, weights) in grams {
                higher.insert(ngram.clone(), *weights);
            }
        }

        Self {
            order: table.order.max(1),
            word_ids,
            unigrams: table.unigrams.clone(),
            higher,
            unk,
            bos,
        }
    }

    fn weights(&self, ngram: &[WordId]) -> Option<NgramWeights> {
        match ngram {
            [] => None,
            [single] => self.unigrams.get(*single as usize).copied(),
            _ => self.higher.get(ngram).copied(),
        }
    }
}

impl ScoringModel for BackoffModel {
    fn order(&self) -> usize {
        self.order
    }

    fn vocab_size(&self) -> usize {
        self.unigrams.len()
    }

    fn vocab_index(&self, word: &str) -> WordId {
        self.word_ids.get(word).copied().unwrap_or(self.unk)
    }

    fn begin_sentence_state(&self) -> LmState {
        match self.bos {
            Some(bos) => LmState::from_context(&[bos]),
            None => LmState::default(),
        }
    }

    fn null_context_state(&self) -> LmState {
        LmState::default()
    }

    fn base_score(&self, state: &LmState, word: WordId) -> (LmState, f32) {
        let word = if (word as usize) < self.unigrams.len() {
            word
        } else {
            self.unk
        };
        let history = state.context();
        let max_history = history.len().min(self.order - 1);

        let mut ngram = Ngram::with_capacity(max_history + 1);
        let mut score = 0.0f32;
        let mut matched = false;
        for used in (0..=max_history).rev() {
            ngram.clear();
            ngram.extend_from_slice(&history[history.len() - used..]);
            ngram.push(word);
            if let Some(weights) = self.weights(&ngram) {
                score += weights.prob;
                matched = true;
                break;
            }
            if used > 0 {
                let context = &history[history.len() - used..];
                score += self.weights(context).map(|w| w.backoff).unwrap_or(0.0);
            }
        }
        if !matched {
            score += self
                .unigrams
                .get(self.unk as usize)
                .map(|w| w.prob)
                .unwrap_or(-100.0);
        }

        let keep = self.order - 1;
        let mut next = SmallVec::<[WordId; 4]>::new();
        if keep > 0 {
            let tail_start = (history.len() + 1).saturating_sub(keep);
            next.extend(
                history
                    .iter()
                    .copied()
                    .chain(std::iter::once(word))
                    .skip(tail_start),
            );
        }
        (LmState { context: next }, score)
    }
}
