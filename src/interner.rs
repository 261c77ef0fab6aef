use crate::error::{Result, SuggestError};
use crate::types::TokenId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;

pub(crate) fn validate_token_vocabulary_size(vocab_size: usize) -> Result<()> {
    let capacity = (u32::MAX as usize).saturating_add(1);
    if vocab_size > capacity {
        return Err(SuggestError::InvalidSuffixArray(
            "token vocabulary exceeded TokenId capacity (u32).".to_string(),
        ));
    }
    Ok(())
}

// Ids follow sorted string order.
#[derive(Clone, Debug, Default)]
pub struct Interner {
    str_to_id: FxHashMap<String, TokenId>,
    id_to_str: Vec<String>,
}

impl Interner {
    pub fn from_documents<S: AsRef<str>>(documents: &[Vec<S>]) -> Result<(Self, Vec<Vec<TokenId>>)> {
        let mut uniq = FxHashSet::default();
        for document in documents {
            uniq.extend(document.iter().map(|token| token.as_ref()));
        }

        let mut sorted = uniq.into_iter().collect::<Vec<_>>();
        sorted.sort_unstable();
        validate_token_vocabulary_size(sorted.len())?;

        let mut interner = Self::default();
        interner.str_to_id.reserve(sorted.len());
        interner.id_to_str.reserve(sorted.len());
        for token in sorted {
            let id = interner.id_to_str.len() as TokenId;
            interner.str_to_id.insert(token.to_string(), id);
            interner.id_to_str.push(token.to_string());
        }

        let corpus_ids = documents
            .iter()
            .map(|tokens| {
                tokens
                    .iter()
                    .filter_map(|token| interner.maybe_id_for(token.as_ref()))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        Ok((interner, corpus_ids))
    }

    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    pub fn maybe_id_for(&self, value: &str) -> Option<TokenId> {
        self.str_to_id.get(value).copied()
    }

    pub fn token(&self, id: TokenId) -> &str {
        &self.id_to_str[id as usize]
    }

    pub fn prefix_range(&self, prefix: &str) -> Range<TokenId> {
        let lo = self.id_to_str.partition_point(|token| token.as_str() < prefix);
        let hi = lo
            + self.id_to_str[lo..].partition_point(|token| token.starts_with(prefix));
        lo as TokenId..hi as TokenId
    }

    pub fn ids_to_strings(&self, ids: &[TokenId]) -> Vec<String> {
        ids.iter()
            .map(|id| self.id_to_str[*id as usize].clone())
            .collect()
    }
}
