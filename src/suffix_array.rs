use crate::error::{Result, SuggestError};
use crate::interner::Interner;
use crate::types::TokenId;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing::info;

// `lcp[i]` is the common prefix length of ranks `i` and `i + 1`, zero for the last rank.
#[derive(Clone, Debug)]
pub struct DocSuffixArray {
    interner: Interner,
    docs: Vec<Vec<TokenId>>,
    doc_idx: Vec<u32>,
    tok_idx: Vec<u32>,
    lcp: Vec<u32>,
}

fn common_prefix_len(a: &[TokenId], b: &[TokenId]) -> u32 {
    a.iter().zip(b).take_while(|(x, y)| x == y).count() as u32
}

impl DocSuffixArray {
    pub fn construct<S: AsRef<str>>(documents: &[Vec<S>]) -> Result<Self> {
        let (interner, docs) = Interner::from_documents(documents)?;

        let mut positions = Vec::with_capacity(docs.iter().map(Vec::len).sum());
        for (doc, tokens) in docs.iter().enumerate() {
            let doc = u32::try_from(doc).map_err(|_| {
                SuggestError::InvalidSuffixArray("too many documents (u32).".to_string())
            })?;
            for tok in 0..tokens.len() {
                let tok = u32::try_from(tok).map_err(|_| {
                    SuggestError::InvalidSuffixArray("document too long (u32).".to_string())
                })?;
                positions.push((doc, tok));
            }
        }
        info!(
            documents = docs.len(),
            positions = positions.len(),
            "constructing suffix array"
        );

        let suffix_of = |(doc, tok): (u32, u32)| &docs[doc as usize][tok as usize..];
        positions.par_sort_unstable_by(|a, b| {
            suffix_of(*a)
                .cmp(suffix_of(*b))
                .then_with(|| a.cmp(b))
        });

        let lcp = (0..positions.len())
            .into_par_iter()
            .map(|rank| match positions.get(rank + 1) {
                Some(next) => common_prefix_len(suffix_of(positions[rank]), suffix_of(*next)),
                None => 0,
            })
            .collect::<Vec<_>>();
        let (doc_idx, tok_idx) = positions.into_iter().unzip();

        Ok(Self {
            interner,
            docs,
            doc_idx,
            tok_idx,
            lcp,
        })
    }

    pub fn from_parts<S: AsRef<str>>(
        documents: &[Vec<S>],
        doc_idx: Vec<u32>,
        tok_idx: Vec<u32>,
        lcp: Vec<u32>,
    ) -> Result<Self> {
        let (interner, docs) = Interner::from_documents(documents)?;
        let total = docs.iter().map(Vec::len).sum::<usize>();
        if doc_idx.len() != total || tok_idx.len() != total || lcp.len() != total {
            return Err(SuggestError::InvalidSuffixArray(format!(
                "expected {total} entries per array, got doc_idx={}, tok_idx={}, lcp={}",
                doc_idx.len(),
                tok_idx.len(),
                lcp.len()
            )));
        }
        let out_of_range = doc_idx.iter().zip(&tok_idx).position(|(doc, tok)| {
            docs.get(*doc as usize)
                .map(|tokens| *tok as usize >= tokens.len())
                .unwrap_or(true)
        });
        if let Some(rank) = out_of_range {
            return Err(SuggestError::InvalidSuffixArray(format!(
                "rank {rank} points outside the corpus"
            )));
        }
        Ok(Self {
            interner,
            docs,
            doc_idx,
            tok_idx,
            lcp,
        })
    }

    pub fn from_corpus_path(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading tokenized corpus");
        let raw = fs::read_to_string(path).map_err(|e| SuggestError::io(path, e))?;
        let documents = raw
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>())
            .filter(|tokens| !tokens.is_empty())
            .collect::<Vec<_>>();
        Self::construct(&documents)
    }

    pub fn len(&self) -> usize {
        self.doc_idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_idx.is_empty()
    }

    pub fn num_documents(&self) -> usize {
        self.docs.len()
    }

    pub fn document(&self, doc: usize) -> Vec<String> {
        self.docs
            .get(doc)
            .map(|ids| self.interner.ids_to_strings(ids))
            .unwrap_or_default()
    }

    pub fn doc_idx(&self) -> &[u32] {
        &self.doc_idx
    }

    pub fn tok_idx(&self) -> &[u32] {
        &self.tok_idx
    }

    pub fn lcp(&self) -> &[u32] {
        &self.lcp
    }

    pub(crate) fn suffix(&self, rank: usize) -> &[TokenId] {
        &self.docs[self.doc_idx[rank] as usize][self.tok_idx[rank] as usize..]
    }

    fn token_at(&self, rank: usize, depth: usize) -> Option<TokenId> {
        self.suffix(rank).get(depth).copied()
    }

    fn cmp_pattern(&self, rank: usize, exact: &[TokenId], last: &Range<TokenId>) -> Ordering {
        let suffix = self.suffix(rank);
        for (ix, want) in exact.iter().enumerate() {
            match suffix.get(ix) {
                None => return Ordering::Less,
                Some(have) => match have.cmp(want) {
                    Ordering::Equal => continue,
                    other => return other,
                },
            }
        }
        match suffix.get(exact.len()) {
            None => Ordering::Less,
            Some(token) if *token < last.start => Ordering::Less,
            Some(token) if *token >= last.end => Ordering::Greater,
            Some(_) => Ordering::Equal,
        }
    }

    fn partition_ranks(&self, pred: impl Fn(usize) -> bool) -> usize {
        let (mut lo, mut hi) = (0usize, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if pred(mid) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn range_for(&self, exact: &[TokenId], last: Range<TokenId>) -> (usize, usize) {
        if last.is_empty() {
            return (0, 0);
        }
        let lo = self.partition_ranks(|rank| self.cmp_pattern(rank, exact, &last) == Ordering::Less);
        let hi =
            self.partition_ranks(|rank| self.cmp_pattern(rank, exact, &last) != Ordering::Greater);
        (lo, hi.max(lo))
    }

    // Every pattern element but the last matches exactly; the last is a token prefix.
    pub fn search_range<S: AsRef<str>>(&self, pattern: &[S]) -> (usize, usize) {
        let Some((last, exact)) = pattern.split_last() else {
            return (0, self.len());
        };
        let mut exact_ids = Vec::with_capacity(exact.len());
        for token in exact {
            match self.interner.maybe_id_for(token.as_ref()) {
                Some(id) => exact_ids.push(id),
                None => return (0, 0),
            }
        }
        self.range_for(&exact_ids, self.interner.prefix_range(last.as_ref()))
    }

    pub fn count_occurrences<S: AsRef<str>>(&self, words: &[S]) -> usize {
        let mut ids = Vec::with_capacity(words.len());
        for word in words {
            match self.interner.maybe_id_for(word.as_ref()) {
                Some(id) => ids.push(id),
                None => return 0,
            }
        }
        let Some(last) = ids.pop() else {
            return self.len();
        };
        let (lo, hi) = self.range_for(&ids, last..last + 1);
        hi - lo
    }

    pub fn contains_sequence<S: AsRef<str>>(&self, words: &[S]) -> bool {
        self.count_occurrences(words) > 0
    }

    // The token at `depth` only changes at a rank whose LCP with its predecessor is <= depth.
    pub fn collect_next_token_ids(&self, lo: usize, hi: usize, depth: usize) -> Vec<TokenId> {
        let mut tokens = Vec::new();
        let hi = hi.min(self.len());
        if lo >= hi {
            return tokens;
        }

        let mut rank = lo;
        loop {
            if let Some(token) = self.token_at(rank, depth) {
                if tokens.last() != Some(&token) {
                    tokens.push(token);
                }
            }
            match (rank..hi - 1).find(|ix| self.lcp[*ix] as usize <= depth) {
                Some(boundary) => rank = boundary + 1,
                None => break,
            }
        }
        tokens
    }

    pub fn collect_next_tokens(&self, lo: usize, hi: usize, depth: usize) -> Vec<&str> {
        self.collect_next_token_ids(lo, hi, depth)
            .into_iter()
            .map(|id| self.interner.token(id))
            .collect()
    }
}
