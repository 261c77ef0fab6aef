use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ARPA data at line {line}: {message}")]
    Arpa { line: usize, message: String },

    #[error(
        "vocabulary mismatch: {word:?} is entry {expected} of the n-gram table but the scoring model maps it to {found}"
    )]
    VocabMismatch {
        word: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid suffix array: {0}")]
    InvalidSuffixArray(String),

    #[error("generation failed: no successor candidates")]
    GenerationFailed,

    #[error("corpus ran out of continuations after {last_word:?}, which is not an end of sentence")]
    CorpusExhausted { last_word: String },

    #[error("malformed context: {0}")]
    MalformedContext(String),

    #[error("unknown domain {0:?}")]
    UnknownDomain(String),

    #[error("{0}")]
    InvalidParameter(String),
}

impl SuggestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_dead_end(&self) -> bool {
        matches!(self, Self::GenerationFailed)
    }
}

pub type Result<T, E = SuggestError> = std::result::Result<T, E>;
