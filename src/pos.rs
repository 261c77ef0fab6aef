use crate::types::is_marker;

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "every", "each", "some", "any", "no",
    "all", "both", "another",
];
const PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "you", "your", "yours", "he", "him", "his", "she", "her", "hers",
    "it", "its", "we", "us", "our", "ours", "they", "them", "their", "theirs", "who", "whom",
    "what", "which", "myself", "yourself", "itself", "themselves", "i'm", "it's", "you're",
    "we're", "they're", "i've", "i'll", "i'd",
];
const ADPOSITIONS: &[&str] = &[
    "of", "in", "on", "at", "by", "for", "with", "about", "from", "into", "over", "under",
    "after", "before", "between", "through", "during", "without", "around", "near", "like",
    "than", "since", "until",
];
const CONJUNCTIONS: &[&str] = &["and", "or", "but", "nor", "so", "yet", "because", "if", "while", "although"];
const PARTICLES: &[&str] = &["to", "not", "n't", "up", "out", "off", "'s"];
const VERBS: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "being", "am", "do", "does", "did", "have", "has",
    "had", "will", "would", "can", "could", "should", "may", "might", "must", "shall", "go",
    "get", "got", "love", "loved", "come", "came", "make", "made", "say", "said", "try", "want",
];
const ADVERBS: &[&str] = &[
    "very", "really", "too", "also", "just", "always", "never", "here", "there", "now", "then",
    "again", "still", "even", "quite", "definitely", "well", "back", "only", "pretty",
];
const ADJECTIVES: &[&str] = &[
    "good", "great", "bad", "best", "better", "nice", "friendly", "delicious", "amazing",
    "awesome", "excellent", "fresh", "hot", "cold", "new", "old", "small", "big", "little",
    "clean", "slow", "fast", "cheap", "expensive", "happy", "tasty",
];
const NUMBERS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "hundred", "thousand",
];

pub(crate) fn coarse_tag(word: &str) -> &'static str {
    if word.is_empty() || is_marker(word) {
        return "X";
    }
    if word.chars().all(|c| c.is_ascii_punctuation()) {
        return ".";
    }
    if word.chars().all(|c| c.is_ascii_digit()) || NUMBERS.contains(&word) {
        return "NUM";
    }
    let lists: [(&[&str], &'static str); 8] = [
        (DETERMINERS, "DET"),
        (PRONOUNS, "PRON"),
        (ADPOSITIONS, "ADP"),
        (CONJUNCTIONS, "CONJ"),
        (PARTICLES, "PRT"),
        (VERBS, "VERB"),
        (ADVERBS, "ADV"),
        (ADJECTIVES, "ADJ"),
    ];
    for (words, tag) in lists {
        if words.contains(&word) {
            return tag;
        }
    }
    if word.len() > 4 && word.ends_with("ly") {
        "ADV"
    } else if word.len() > 4 && (word.ends_with("ing") || word.ends_with("ed")) {
        "VERB"
    } else if word.len() > 5 && (word.ends_with("ous") || word.ends_with("ful") || word.ends_with("able")) {
        "ADJ"
    } else {
        "NOUN"
    }
}

#[derive(Clone, Debug)]
pub struct PosTable {
    pub(crate) tag_names: Vec<&'static str>,
    pub(crate) tags: Vec<u8>,
}

impl PosTable {
    pub(crate) fn tag_vocab<S: AsRef<str>>(vocab: &[S]) -> Self {
        let raw = vocab
            .iter()
            .map(|word| coarse_tag(word.as_ref()))
            .collect::<Vec<_>>();
        let mut tag_names = raw.clone();
        tag_names.sort_unstable();
        tag_names.dedup();
        let tags = raw
            .iter()
            .map(|tag| tag_names.binary_search(tag).unwrap_or(0) as u8)
            .collect();
        Self { tag_names, tags }
    }

    pub fn tag_names(&self) -> &[&'static str] {
        &self.tag_names
    }

    pub fn tag_id(&self, word: usize) -> usize {
        self.tags.get(word).copied().unwrap_or(0) as usize
    }
}
