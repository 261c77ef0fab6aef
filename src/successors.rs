use crate::arpa::{Ngram, NgramWeights};
use crate::types::{WordId, PARALLEL_SCORE_THRESHOLD};
use rayon::prelude::*;
use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuccessorTable {
    offsets: Vec<usize>,
    targets: Vec<WordId>,
}

impl SuccessorTable {
    pub fn from_lists(lists: &[Vec<WordId>]) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut targets = Vec::with_capacity(lists.iter().map(Vec::len).sum());
        offsets.push(0);
        for list in lists {
            targets.extend_from_slice(list);
            offsets.push(targets.len());
        }
        Self { offsets, targets }
    }

    pub(crate) fn from_bigrams(
        vocab_size: usize,
        bigrams: &[(Ngram, NgramWeights)],
        keep: usize,
    ) -> (Self, Self) {
        let mut scored: Vec<Vec<(f32, WordId)>> = vec![Vec::new(); vocab_size];
        for (ngram, weights) in bigrams {
            if let [prev, next] = ngram.as_slice() {
                if let Some(row) = scored.get_mut(*prev as usize) {
                    row.push((weights.prob, *next));
                }
            }
        }

        let unfiltered = scored
            .iter()
            .map(|row| row.iter().map(|(_, id)| *id).collect::<Vec<_>>())
            .collect::<Vec<_>>();

        let top_k = |row: &Vec<(f32, WordId)>| {
            let mut row = row.clone();
            row.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
            row.truncate(keep);
            row.into_iter().map(|(_, id)| id).collect::<Vec<_>>()
        };
        let filtered = if bigrams.len() >= PARALLEL_SCORE_THRESHOLD {
            scored.par_iter().map(top_k).collect::<Vec<_>>()
        } else {
            scored.iter().map(top_k).collect::<Vec<_>>()
        };

        (Self::from_lists(&unfiltered), Self::from_lists(&filtered))
    }

    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn successors(&self, word: WordId) -> &[WordId] {
        let ix = word as usize;
        if ix + 1 >= self.offsets.len() {
            return &[];
        }
        &self.targets[self.offsets[ix]..self.offsets[ix + 1]]
    }

    pub fn has_successors(&self, word: WordId) -> bool {
        !self.successors(word).is_empty()
    }

    // Runs to a fixpoint.
    pub fn pruned(&self) -> Self {
        let mut current = self.clone();
        let mut rounds = 0usize;
        loop {
            rounds += 1;
            let lists = (0..current.len())
                .map(|word| {
                    current
                        .successors(word as WordId)
                        .iter()
                        .copied()
                        .filter(|next| current.has_successors(*next))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();

            let newly_emptied = lists
                .iter()
                .enumerate()
                .filter(|(word, list)| list.is_empty() && current.has_successors(*word as WordId))
                .count();
            current = Self::from_lists(&lists);
            if newly_emptied == 0 {
                break;
            }
        }
        info!(
            rounds,
            edges_before = self.targets.len(),
            edges_after = current.targets.len(),
            "pruned dead-end bigram successors"
        );
        current
    }
}
