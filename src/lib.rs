mod arpa;
mod backoff;
mod beam;
mod config;
mod engine;
mod error;
mod interner;
mod language_model;
mod pos;
#[cfg(feature = "python")]
mod py_bindings;
mod sampler;
mod scoring;
mod successors;
mod suffix_array;
mod tokenize;
mod types;
mod vocab_trie;

pub use arpa::{ArpaTable, NgramWeights};
pub use backoff::{BackoffModel, LmState, ScoringModel};
pub use beam::{
    beam_search_corpus, beam_search_phrases, generate_by_beamsearch_corpus,
    generate_by_beamsearch_ngram, take_diverse, BeamEntry,
};
pub use config::{DomainConfig, LengthBonus, SuggestConfig};
pub use engine::{
    typed_prefix, Domain, KeyPress, Registry, Suggester, Suggestion, SuggestionRequest,
};
pub use error::{Result, SuggestError};
pub use interner::Interner;
pub use language_model::{Candidates, LanguageModel, PrefixPrior, SuccessorKind};
pub use pos::PosTable;
pub use sampler::{
    generate_diverse_phrases, generate_phrase, generate_phrase_from_corpus, GenerationParams,
    SampledPhrase,
};
pub use scoring::{next_word_probs, to_probabilities, weighted_random_choice};
pub use successors::SuccessorTable;
pub use suffix_array::DocSuffixArray;
pub use tokenize::{context_from_tokens, tokenize_mid_document, tokenize_so_far};
pub use types::{
    GenerationMode, TokenId, WordId, BOS, DOCUMENT_START, END_OF_DOCUMENT, PARAGRAPH_START,
    SENTENCE_END, SENTENCE_START, UNK,
};
pub use vocab_trie::VocabTrie;

#[cfg(test)]
mod tests;
