pub(crate) const LOG10: f64 = std::f64::consts::LN_10;
pub(crate) const PARALLEL_SCORE_THRESHOLD: usize = 2048;
pub(crate) const DEFAULT_FILTERED_SUCCESSORS: usize = 100;
pub(crate) const MISMATCHED_PREFIX_LOGPROB: f64 = -10.0;
// Ids at or below this are markers and never earn a rarity bonus.
pub(crate) const RESERVED_WORD_IDS: WordId = 4;

pub type WordId = u32;
pub type TokenId = u32;

pub const UNK: &str = "<unk>";
pub const BOS: &str = "<s>";
pub const END_OF_DOCUMENT: &str = "</s>";
pub const DOCUMENT_START: &str = "<D>";
pub const PARAGRAPH_START: &str = "<P>";
pub const SENTENCE_START: &str = "<S>";
pub const SENTENCE_END: &str = "</S>";

pub(crate) fn is_marker(word: &str) -> bool {
    word.starts_with('<')
}

pub(crate) fn is_punct_or_marker(word: &str) -> bool {
    matches!(word.chars().next(), Some('<' | '.' | '!' | '?'))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GenerationMode {
    BeamNgram,
    BeamCorpus,
    Sample,
}

impl GenerationMode {
    pub(crate) fn select(temperature: f64, corpus_available: bool) -> Self {
        if temperature == 0.0 {
            if corpus_available {
                Self::BeamCorpus
            } else {
                Self::BeamNgram
            }
        } else {
            Self::Sample
        }
    }
}
