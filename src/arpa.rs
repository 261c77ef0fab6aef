use crate::error::{Result, SuggestError};
use crate::types::WordId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

pub(crate) type Ngram = SmallVec<[WordId; 4]>;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NgramWeights {
    pub prob: f32,
    pub backoff: f32,
}

#[derive(Clone, Debug, Default)]
pub struct ArpaTable {
    pub order: usize,
    pub vocab: Vec<String>,
    pub unigrams: Vec<NgramWeights>,
    pub higher: Vec<Vec<(Ngram, NgramWeights)>>,
}

enum Section {
    Preamble,
    Header,
    Grams(usize),
    End,
}

impl ArpaTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "reading ARPA statistics");
        let file = File::open(path).map_err(|e| SuggestError::io(path, e))?;
        Self::from_reader(BufReader::new(file)).map_err(|err| match err {
            SuggestError::Io { source, .. } => SuggestError::io(path, source),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = Self::default();
        let mut word_ids: FxHashMap<String, WordId> = FxHashMap::default();
        let mut section = Section::Preamble;

        for (line_ix, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| SuggestError::io("<arpa stream>", e))?;
            let line_no = line_ix + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "\\data\\" {
                section = Section::Header;
                continue;
            }
            if line == "\\end\\" {
                section = Section::End;
                continue;
            }
            if let Some(n) = line
                .strip_prefix('\\')
                .and_then(|rest| rest.strip_suffix("-grams:"))
            {
                let n = n.parse::<usize>().map_err(|_| SuggestError::Arpa {
                    line: line_no,
                    message: format!("bad section header {line:?}"),
                })?;
                if n == 0 {
                    return Err(SuggestError::Arpa {
                        line: line_no,
                        message: "n-gram order must be at least 1".to_string(),
                    });
                }
                table.order = table.order.max(n);
                while table.higher.len() + 1 < n {
                    table.higher.push(Vec::new());
                }
                section = Section::Grams(n);
                continue;
            }

            match section {
                Section::Preamble | Section::End => {}
                Section::Header => {
                    if !line.starts_with("ngram ") {
                        return Err(SuggestError::Arpa {
                            line: line_no,
                            message: format!("unexpected header line {line:?}"),
                        });
                    }
                }
                Section::Grams(n) => {
                    let fields = line.split_whitespace().collect::<Vec<_>>();
                    if fields.len() != n + 1 && fields.len() != n + 2 {
                        return Err(SuggestError::Arpa {
                            line: line_no,
                            message: format!("expected {n}-gram entry, got {line:?}"),
                        });
                    }
                    let parse_weight = |raw: &str| {
                        raw.parse::<f32>().map_err(|_| SuggestError::Arpa {
                            line: line_no,
                            message: format!("bad weight {raw:?}"),
                        })
                    };
                    let weights = NgramWeights {
                        prob: parse_weight(fields[0])?,
                        backoff: match fields.get(n + 1) {
                            Some(raw) => parse_weight(raw)?,
                            None => 0.0,
                        },
                    };

                    if n == 1 {
                        let word = fields[1];
                        if word_ids.contains_key(word) {
                            return Err(SuggestError::Arpa {
                                line: line_no,
                                message: format!("duplicate unigram {word:?}"),
                            });
                        }
                        let id = WordId::try_from(table.vocab.len()).map_err(|_| {
                            SuggestError::Arpa {
                                line: line_no,
                                message: "vocabulary exceeded WordId capacity (u32)".to_string(),
                            }
                        })?;
                        word_ids.insert(word.to_string(), id);
                        table.vocab.push(word.to_string());
                        table.unigrams.push(weights);
                    } else {
                        let mut ngram = Ngram::with_capacity(n);
                        for word in &fields[1..=n] {
                            let Some(id) = word_ids.get(*word) else {
                                return Err(SuggestError::Arpa {
                                    line: line_no,
                                    message: format!("{word:?} is not in the unigram section"),
                                });
                            };
                            ngram.push(*id);
                        }
                        table.higher[n - 2].push((ngram, weights));
                    }
                }
            }
        }

        if table.vocab.is_empty() {
            return Err(SuggestError::Arpa {
                line: 0,
                message: "no unigrams found".to_string(),
            });
        }
        Ok(table)
    }

    pub fn bigrams(&self) -> &[(Ngram, NgramWeights)] {
        self.higher.first().map(Vec::as_slice).unwrap_or(&[])
    }
}
