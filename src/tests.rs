use crate::arpa::ArpaTable;
use crate::backoff::{BackoffModel, LmState, ScoringModel};
use crate::beam::{
    beam_search_corpus, beam_search_phrases, generate_by_beamsearch_corpus,
    generate_by_beamsearch_ngram, take_diverse, BeamEntry, TopK,
};
use crate::config::{DomainConfig, SuggestConfig};
use crate::engine::{
    typed_prefix, Domain, KeyPress, Registry, Suggester, Suggestion, SuggestionRequest,
};
use crate::error::SuggestError;
use crate::interner::{validate_token_vocabulary_size, Interner};
use crate::language_model::{LanguageModel, PrefixPrior, SuccessorKind};
use crate::pos::coarse_tag;
use crate::sampler::{
    generate_diverse_phrases, generate_phrase, generate_phrase_from_corpus, GenerationParams,
};
use crate::scoring::{softmax, to_probabilities, weighted_sample_without_replacement};
use crate::successors::SuccessorTable;
use crate::suffix_array::DocSuffixArray;
use crate::tokenize::{context_from_tokens, tokenize_so_far};
use crate::types::{WordId, SENTENCE_END};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::time::Duration;

const TOY_WORDS: &[&str] = &[
    "<unk>", "<s>", "</s>", "<S>", "</S>", "<D>", "<P>", "the", "i", "we", "food", "place",
    "love", "had", "ate", "was", ".", "it", "a", "here", "good", "great",
];

const TOY_BIGRAMS: &[(&str, &str, f32)] = &[
    ("<D>", "the", -0.3),
    ("<D>", "i", -0.5),
    ("<D>", "we", -0.7),
    ("the", "food", -0.2),
    ("the", "place", -0.6),
    ("i", "love", -0.1),
    ("i", "had", -0.8),
    ("we", "ate", -0.2),
    ("we", "had", -0.5),
    ("food", "was", -0.2),
    ("food", ".", -0.4),
    ("place", "was", -0.3),
    ("love", "it", -0.1),
    ("had", "a", -0.2),
    ("ate", "here", -0.2),
    ("was", "good", -0.3),
    ("was", "great", -0.4),
    (".", "</S>", -0.1),
    (".", "the", -1.0),
    ("it", ".", -0.2),
    ("a", "good", -0.3),
    ("here", ".", -0.1),
    ("good", ".", -0.1),
    ("good", "food", -0.9),
    ("great", ".", -0.1),
];

const TOY_VOCAB_SIZE: usize = 50;

/// Bigram model over a 50-word vocabulary; words past `TOY_WORDS` are
/// fillers with no bigrams.
fn toy_arpa() -> String {
    let mut vocab = TOY_WORDS.iter().map(|w| w.to_string()).collect::<Vec<_>>();
    vocab.extend((0..TOY_VOCAB_SIZE - TOY_WORDS.len()).map(|i| format!("filler{i:02}")));

    let mut text = String::from("\\data\\\n");
    text.push_str(&format!("ngram 1={}\n", vocab.len()));
    text.push_str(&format!("ngram 2={}\n\n\\1-grams:\n", TOY_BIGRAMS.len()));
    for (ix, word) in vocab.iter().enumerate() {
        let prob = if ix < TOY_WORDS.len() { -1.5 } else { -3.0 };
        text.push_str(&format!("{prob}\t{word}\t0\n"));
    }
    text.push_str("\n\\2-grams:\n");
    for (prev, next, prob) in TOY_BIGRAMS {
        text.push_str(&format!("{prob}\t{prev} {next}\n"));
    }
    text.push_str("\n\\end\\\n");
    text
}

fn toy_lm() -> LanguageModel {
    LanguageModel::from_arpa_str(&toy_arpa()).expect("failed to load toy model")
}

const TOY_CORPUS: &[&str] = &[
    "<S> the food was good . </S>",
    "<S> the food was great . </S>",
    "<S> the place was good . </S>",
];

fn docs_from_lines(lines: &[&str]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}

fn toy_corpus() -> DocSuffixArray {
    DocSuffixArray::construct(&docs_from_lines(TOY_CORPUS)).expect("failed to build suffix array")
}

fn toy_registry(corpus: Option<DocSuffixArray>) -> Arc<Registry> {
    let mut registry = Registry::default();
    registry.insert(Domain::new("toy", toy_lm(), corpus));
    Arc::new(registry)
}

fn words_of(lm: &LanguageModel, ids: &[WordId]) -> Vec<String> {
    ids.iter().map(|id| lm.word(*id).to_string()).collect()
}

fn brute_force_matches<'a>(
    docs: &'a [Vec<String>],
    exact: &[String],
    prefix: &str,
) -> Vec<Vec<&'a str>> {
    let mut matches = Vec::new();
    for doc in docs {
        for start in 0..doc.len() {
            let suffix = doc[start..].iter().map(String::as_str).collect::<Vec<_>>();
            if suffix.len() > exact.len()
                && suffix.iter().zip(exact).all(|(have, want)| *have == want.as_str())
                && suffix[exact.len()].starts_with(prefix)
            {
                matches.push(suffix);
            }
        }
    }
    matches.sort();
    matches
}

fn distinct_at_depth<'a>(suffixes: &[Vec<&'a str>], depth: usize) -> Vec<&'a str> {
    let mut seen = FxHashSet::default();
    suffixes
        .iter()
        .filter_map(|suffix| suffix.get(depth).copied())
        .filter(|token| seen.insert(*token))
        .collect()
}

fn entry(score: f64, words: Vec<&'static str>) -> BeamEntry<'static> {
    BeamEntry {
        score,
        words,
        done: true,
        penultimate_state: LmState::default(),
        last_word: None,
        num_chars: 0,
        bonus: 0.0,
    }
}

struct ShiftedScorer {
    inner: BackoffModel,
    shifted: &'static str,
}

impl ScoringModel for ShiftedScorer {
    fn order(&self) -> usize {
        self.inner.order()
    }

    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    fn vocab_index(&self, word: &str) -> WordId {
        let id = self.inner.vocab_index(word);
        if word == self.shifted {
            id + 1
        } else {
            id
        }
    }

    fn begin_sentence_state(&self) -> LmState {
        self.inner.begin_sentence_state()
    }

    fn null_context_state(&self) -> LmState {
        self.inner.null_context_state()
    }

    fn base_score(&self, state: &LmState, word: WordId) -> (LmState, f32) {
        self.inner.base_score(state, word)
    }
}

#[test]
fn vocabulary_ids_round_trip() {
    let lm = toy_lm();
    assert_eq!(lm.vocab_size(), TOY_VOCAB_SIZE);
    for id in 0..lm.vocab_size() as WordId {
        assert_eq!(lm.vocab_index(lm.word(id)), id);
    }
    assert_eq!(lm.vocab_index("never-seen"), 0);
}

#[test]
fn mismatched_scoring_vocabulary_fails_to_load() {
    let table = ArpaTable::parse(&toy_arpa()).expect("failed to parse toy model");
    let scorer = ShiftedScorer {
        inner: BackoffModel::from_table(&table),
        shifted: "food",
    };
    match LanguageModel::new(Box::new(scorer), &table, true, 100) {
        Err(SuggestError::VocabMismatch {
            word,
            expected,
            found,
        }) => {
            assert_eq!(word, "food");
            assert_eq!(found, expected + 1);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("mismatched vocabulary was accepted"),
    }
}

#[test]
fn arpa_rejects_bigram_with_unknown_word() {
    let text = "\\data\\\nngram 1=1\nngram 2=1\n\n\\1-grams:\n-1.0\ta\t0\n\n\\2-grams:\n-0.5\ta b\n\\end\\\n";
    match ArpaTable::parse(text) {
        Err(SuggestError::Arpa { line, message }) => {
            assert_eq!(line, 9);
            assert!(message.contains("\"b\""));
        }
        other => panic!("expected ARPA error, got {other:?}"),
    }
}

#[test]
fn backoff_scores_are_natural_log_bigram_probabilities() {
    let lm = toy_lm();
    let (state, _) = lm.get_state(&["the"], false);
    let (_, logprob) = lm.advance(&state, lm.vocab_index("food"));
    assert!((logprob - (-0.2f32 as f64) * std::f64::consts::LN_10).abs() < 1e-6);

    // No "the the" bigram: back off to the unigram.
    let (_, logprob) = lm.advance(&state, lm.vocab_index("the"));
    assert!((logprob - (-1.5f32 as f64) * std::f64::consts::LN_10).abs() < 1e-6);

    let per_word = lm.score_sequence_by_word(&state, &["food", "was"]);
    let (total, _) = lm.score_sequence(&state, &["food", "was"]);
    assert!((per_word.iter().sum::<f64>() - total).abs() < 1e-9);
}

#[test]
fn filtered_successors_are_sorted_by_probability() {
    let lm = toy_lm();
    let good = lm.vocab_index("good");
    assert_eq!(
        words_of(&lm, lm.successors(good, SuccessorKind::Filtered)),
        vec![".", "food"]
    );
    let dot = lm.vocab_index(".");
    assert_eq!(
        words_of(&lm, lm.successors(dot, SuccessorKind::Filtered)),
        vec!["</S>", "the"]
    );
    // "</S>" has no successors of its own, so pruning removes it.
    assert_eq!(
        words_of(&lm, lm.successors(dot, SuccessorKind::Unfiltered)),
        vec!["the"]
    );
}

#[test]
fn next_word_candidates_fall_back_to_sentence_start_and_use_prefixes() {
    let lm = toy_lm();
    let state = lm.null_context_state();
    let filler = lm.vocab_index("filler00");
    assert!(lm.next_word_candidates(&state, filler, None).is_empty());

    let priors = [PrefixPrior::new(-1.0, "w"), PrefixPrior::new(0.0, "lo")];
    let candidates = lm.next_word_candidates(&state, filler, Some(&priors));
    assert_eq!(words_of(&lm, &candidates.ids), vec!["was", "we", "love"]);
    let unprimed = lm.eval_logprobs_for_words(&state, &candidates.ids);
    assert!((candidates.logprobs[0] - (unprimed[0] - 1.0)).abs() < 1e-9);
    assert!((candidates.logprobs[2] - unprimed[2]).abs() < 1e-9);
}

#[test]
fn coarse_tags_cover_closed_classes_and_suffixes() {
    assert_eq!(coarse_tag("the"), "DET");
    assert_eq!(coarse_tag("."), ".");
    assert_eq!(coarse_tag("<S>"), "X");
    assert_eq!(coarse_tag("quickly"), "ADV");
    assert_eq!(coarse_tag("42"), "NUM");
    assert_eq!(coarse_tag("restaurant"), "NOUN");

    let lm = toy_lm();
    let names = lm.pos_table().tag_names();
    assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(names[lm.pos_tag(lm.vocab_index("the"))], "DET");
}

#[test]
fn to_probabilities_rejects_non_positive_temperature() {
    let lm = toy_lm();
    let ids = [lm.vocab_index("the"), lm.vocab_index("we")];
    let result = to_probabilities(&lm, &ids, &[-1.0, -2.0], 0.0, None, None);
    assert!(matches!(result, Err(SuggestError::InvalidParameter(_))));
}

#[test]
fn softmax_of_all_negative_infinity_is_uniform() {
    let probs = softmax(&[f64::NEG_INFINITY; 4]);
    assert_eq!(probs, vec![0.25; 4]);
}

#[test]
fn sampling_without_replacement_never_repeats() {
    let mut rng = StdRng::seed_from_u64(3);
    let picked = weighted_sample_without_replacement(&mut rng, &[0.5, 0.0, 0.3, 0.2], 10);
    assert_eq!(picked.len(), 3);
    let unique = picked.iter().collect::<FxHashSet<_>>();
    assert_eq!(unique.len(), 3);
    assert!(!picked.contains(&1));
}

#[test]
fn interner_ids_follow_string_order() {
    let docs = vec![vec!["b", "a", "ba", "c"]];
    let (interner, ids) = Interner::from_documents(&docs).expect("failed to intern");
    assert_eq!(interner.ids_to_strings(&[0, 1, 2, 3]), vec!["a", "b", "ba", "c"]);
    assert_eq!(ids, vec![vec![1, 0, 2, 3]]);
    assert_eq!(interner.prefix_range("b"), 1..3);
    assert_eq!(interner.prefix_range(""), 0..4);
    assert!(interner.prefix_range("z").is_empty());
}

#[test]
fn token_vocabulary_size_overflow_returns_error() {
    let too_many = (u32::MAX as usize) + 2;
    assert!(validate_token_vocabulary_size(too_many).is_err());
}

#[test]
fn suffix_array_search_finds_corpus_substrings() {
    let sa = toy_corpus();
    assert_eq!(sa.len(), 21);
    assert_eq!(sa.count_occurrences(&["was", "good"]), 2);
    assert!(sa.contains_sequence(&["the", "place", "was"]));
    assert!(!sa.contains_sequence(&["place", "the"]));

    let (lo, hi) = sa.search_range(&["was", ""]);
    assert_eq!(hi - lo, 3);
    assert_eq!(sa.collect_next_tokens(lo, hi, 1), vec!["good", "great"]);

    let (lo, hi) = sa.search_range(&["the", "f"]);
    assert_eq!(hi - lo, 2);
    assert_eq!(sa.collect_next_tokens(lo, hi, 1), vec!["food"]);

    let (lo, hi) = sa.search_range(&["pizza", ""]);
    assert_eq!(lo, hi);
    assert!(sa.collect_next_tokens(lo, hi, 1).is_empty());
}

#[test]
fn suffix_array_from_parts_validates_lengths() {
    let docs = docs_from_lines(TOY_CORPUS);
    let sa = DocSuffixArray::construct(&docs).expect("failed to build suffix array");
    let rebuilt = DocSuffixArray::from_parts(
        &docs,
        sa.doc_idx().to_vec(),
        sa.tok_idx().to_vec(),
        sa.lcp().to_vec(),
    )
    .expect("failed to attach prebuilt arrays");
    assert_eq!(rebuilt.search_range(&["was", ""]), sa.search_range(&["was", ""]));

    let short = DocSuffixArray::from_parts(&docs, vec![0], vec![0], vec![0]);
    assert!(matches!(short, Err(SuggestError::InvalidSuffixArray(_))));
}

#[test]
fn prune_leaves_no_dead_successors_on_chain() {
    // 0 -> 1 -> 2 -> 3 (dead); 4 <-> 5 cycle.
    let table = SuccessorTable::from_lists(&[
        vec![1, 4],
        vec![2],
        vec![3],
        vec![],
        vec![5],
        vec![4],
    ]);
    let pruned = table.pruned();
    assert_eq!(pruned.successors(0), &[4]);
    assert!(pruned.successors(1).is_empty());
    assert!(pruned.successors(2).is_empty());
    assert_eq!(pruned.successors(4), &[5]);
}

#[test]
fn top_k_keeps_largest_items_in_descending_order() {
    let mut top = TopK::new(3);
    for item in [4, 9, 1, 7, 3, 8, 2] {
        top.push(item);
    }
    assert_eq!(top.into_sorted_desc(), vec![9, 8, 7]);
    let mut empty = TopK::new(0);
    empty.push(1);
    assert!(empty.into_sorted_desc().is_empty());
}

#[test]
fn beam_entry_ties_prefer_lexicographically_smaller_words() {
    let a = entry(-1.0, vec!["a"]);
    let b = entry(-1.0, vec!["b"]);
    assert!(a > b);
    assert!(entry(-0.5, vec!["z"]) > a);
}

#[test]
fn beam_search_phrases_ranks_continuations() {
    let lm = toy_lm();
    let beam = beam_search_phrases(&lm, &["<s>", "<D>", "i"], 50, 5, None)
        .expect("beam search failed");
    assert_eq!(beam[0].words, vec!["love", "it"]);
    assert_eq!(beam[0].num_chars, 7);
    assert!(beam[0].done);
    assert_eq!(beam[1].words, vec!["had", "a"]);
    assert!(beam.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn beam_search_phrases_applies_prefix_only_to_first_word() {
    let lm = toy_lm();
    let priors = [PrefixPrior::new(0.0, "l")];
    let phrases = generate_by_beamsearch_ngram(&lm, &["<s>", "<D>", "i"], 3, 6, Some(&priors), 50, 10)
        .expect("beam search failed");
    assert_eq!(phrases, vec![vec!["love".to_string(), "it".to_string()]]);
}

#[test]
fn corpus_beam_search_reports_exhaustion_mid_sentence() {
    let lm = toy_lm();
    let sa = DocSuffixArray::construct(&[vec!["<S>", "the", "food"]])
        .expect("failed to build suffix array");
    let result = beam_search_corpus(
        &lm,
        &sa,
        &["<s>", "<D>", "<S>"],
        5,
        30,
        0.0,
        "",
        Duration::from_secs(3600),
    );
    match result {
        Err(SuggestError::CorpusExhausted { last_word }) => assert_eq!(last_word, "food"),
        other => panic!("expected corpus exhaustion, got {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn corpus_beam_search_drops_entries_ending_at_sentence_end() {
    let lm = toy_lm();
    let sa = toy_corpus();
    let beam = beam_search_corpus(
        &lm,
        &sa,
        &["<s>", "<D>", "<S>"],
        50,
        60,
        0.0,
        "",
        Duration::from_secs(3600),
    )
    .expect("beam search failed");
    assert!(beam.is_empty());
}

#[test]
fn corpus_beam_search_honours_typed_prefix() {
    let lm = toy_lm();
    let sa = toy_corpus();
    let beam = beam_search_corpus(
        &lm,
        &sa,
        &["<s>", "<D>", "was"],
        50,
        6,
        1.0,
        "gr",
        Duration::from_secs(3600),
    )
    .expect("beam search failed");
    assert!(!beam.is_empty());
    assert!(beam.iter().all(|entry| entry.words[0] == "great"));
    assert!(beam.iter().all(|entry| entry.done));
}

#[test]
fn corpus_beam_search_keeps_start_entry_when_budget_is_spent() {
    let lm = toy_lm();
    let sa = toy_corpus();
    let context = ["<s>", "<D>", "<S>"];
    let beam = beam_search_corpus(&lm, &sa, &context, 50, 30, 1.0, "", Duration::ZERO)
        .expect("spent budget should not be an error");
    assert_eq!(beam.len(), 1);
    assert!(beam[0].words.is_empty());
    assert!(!beam[0].done);

    let phrases =
        generate_by_beamsearch_corpus(&lm, &sa, &context, 3, 30, "", 1.0, 50, Duration::ZERO)
            .expect("spent budget should not be an error");
    assert!(phrases.is_empty());
}

#[test]
fn rare_word_bonus_rewards_fresh_content_words_after_the_first() {
    let lm = toy_lm();
    let sa = DocSuffixArray::construct(&docs_from_lines(&[
        "<S> the zzz good good . </S> <S> we ate here . </S>",
    ]))
    .expect("failed to build suffix array");
    let weight = 5.0;
    assert_eq!(lm.vocab_index("zzz"), 0);
    let bonus_of = |word: &str| -lm.unigram_logprob(lm.vocab_index(word)) * weight;

    let phrase_after = |length: usize, weight: f64| {
        let beam = beam_search_corpus(
            &lm,
            &sa,
            &["<s>", "<D>", "<S>"],
            50,
            length,
            weight,
            "",
            Duration::from_secs(3600),
        )
        .expect("beam search failed");
        let entry = beam
            .iter()
            .find(|entry| entry.words.first() == Some(&"the"))
            .expect("missing phrase starting with \"the\"");
        let words = entry.words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        (words, entry.bonus)
    };

    // "the" is the first word and "zzz" maps to <unk>: only "good" counts.
    let (words, bonus) = phrase_after(8, weight);
    assert_eq!(words, vec!["the", "zzz", "good"]);
    assert!(bonus_of("good") > 0.0);
    assert!((bonus - bonus_of("good")).abs() < 1e-9);

    // A repeated word earns nothing.
    let (words, bonus) = phrase_after(13, weight);
    assert_eq!(words, vec!["the", "zzz", "good", "good"]);
    assert!((bonus - bonus_of("good")).abs() < 1e-9);

    // Punctuation and markers earn nothing; "we" is fresh.
    let (words, bonus) = phrase_after(21, weight);
    assert_eq!(
        words,
        vec!["the", "zzz", "good", "good", ".", "</S>", "<S>", "we"]
    );
    assert!((bonus - (bonus_of("good") + bonus_of("we"))).abs() < 1e-9);

    let (_, bonus) = phrase_after(21, 0.0);
    assert_eq!(bonus, 0.0);
}

#[test]
fn take_diverse_prefers_new_first_words() {
    let entries = vec![
        entry(-1.0, vec!["the", "food"]),
        entry(-1.5, vec!["the", "place"]),
        entry(-2.0, vec!["we", "ate"]),
        entry(-3.0, vec![]),
        entry(-4.0, vec!["i", "had"]),
    ];
    let picked = take_diverse(entries, 3);
    let firsts = picked.iter().map(|e| e.words[0]).collect::<Vec<_>>();
    assert_eq!(firsts, vec!["the", "we", "i"]);
}

#[test]
fn generate_phrase_follows_successors() {
    let lm = toy_lm();
    let mut rng = StdRng::seed_from_u64(11);
    let phrase = generate_phrase(
        &lm,
        &mut rng,
        &["<s>", "<D>"],
        6,
        None,
        GenerationParams::default(),
        10,
    )
    .expect("sampling failed");
    assert_eq!(phrase.words.len(), 6);
    assert_eq!(phrase.logprobs.len(), 6);
    assert!(phrase.logprobs.iter().all(|lp| *lp <= 0.0));

    let mut prev = lm.vocab_index("<D>");
    for word in &phrase.words {
        let id = lm.vocab_index(word);
        assert!(lm.successors(prev, SuccessorKind::Unfiltered).contains(&id));
        prev = id;
    }
}

#[test]
fn generate_phrase_gives_up_after_retries() {
    let lm = toy_lm();
    let mut rng = StdRng::seed_from_u64(1);
    let result = generate_phrase(
        &lm,
        &mut rng,
        &["filler03"],
        3,
        None,
        GenerationParams::default(),
        10,
    );
    assert!(matches!(result, Err(SuggestError::GenerationFailed)));
}

#[test]
fn corpus_sampling_stays_inside_corpus() {
    let lm = toy_lm();
    let sa = toy_corpus();
    let mut rng = StdRng::seed_from_u64(5);
    let priors = [PrefixPrior::new(0.0, "t")];
    let phrase = generate_phrase_from_corpus(&lm, &sa, &mut rng, &["<S>"], 4, Some(&priors), 1.0)
        .expect("sampling failed");
    assert_eq!(phrase.words[0], "the");
    let mut sequence = vec!["<S>".to_string()];
    sequence.extend(phrase.words);
    assert!(sa.contains_sequence(&sequence));
}

#[test]
fn diverse_phrases_have_distinct_first_words_and_are_reproducible() {
    let lm = toy_lm();
    let sample = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        generate_diverse_phrases(
            &lm,
            None,
            &mut rng,
            &["<s>", "<D>"],
            3,
            6,
            None,
            GenerationParams::default(),
            10,
        )
        .expect("sampling failed")
    };
    let phrases = sample(7);
    assert_eq!(phrases.len(), 3);
    let firsts = phrases
        .iter()
        .map(|p| p.words[0].as_str())
        .collect::<FxHashSet<_>>();
    assert_eq!(firsts.len(), 3);
    assert!(phrases.iter().all(|p| p.words.len() == 6 && p.logprobs.len() == 6));
    assert_eq!(phrases, sample(7));
}

#[test]
fn diverse_phrases_respect_typed_prefix() {
    let lm = toy_lm();
    let mut rng = StdRng::seed_from_u64(2);
    let priors = [PrefixPrior::new(0.0, "w")];
    let phrases = generate_diverse_phrases(
        &lm,
        None,
        &mut rng,
        &["<s>", "<D>"],
        3,
        4,
        Some(&priors),
        GenerationParams::default(),
        10,
    )
    .expect("sampling failed");
    assert_eq!(phrases.len(), 2);
    assert!(phrases.iter().all(|p| p.words[0].starts_with('w')));
}

#[test]
fn tokenize_so_far_builds_sentence_context() {
    assert_eq!(tokenize_so_far("").expect("tokenize"), vec!["<s>", "<D>"]);
    assert_eq!(
        tokenize_so_far("The food was good ").expect("tokenize"),
        vec!["<s>", "<D>", "the", "food", "was", "good"]
    );
    assert_eq!(
        tokenize_so_far("I love it, ").expect("tokenize"),
        vec!["<s>", "<D>", "i", "love", "it", ","]
    );
    // The partial word is not part of the context.
    assert_eq!(
        tokenize_so_far("The fo").expect("tokenize"),
        vec!["<s>", "<D>", "the"]
    );
}

#[test]
fn context_requires_document_header() {
    let tokens = ["<S>", "the", ""].map(str::to_string);
    assert!(matches!(
        context_from_tokens(&tokens),
        Err(SuggestError::MalformedContext(_))
    ));
}

#[test]
fn typed_prefix_stops_at_first_tap() {
    let keys = [
        KeyPress::Letter('g'),
        KeyPress::Letter('r'),
        KeyPress::Tap { x: 1.0, y: 2.0 },
        KeyPress::Letter('e'),
    ];
    assert_eq!(typed_prefix(&keys), "gr");
}

#[test]
fn suggestion_splits_first_word() {
    let s = Suggestion::from_phrase(vec!["we".into(), "ate".into(), "here".into()], None);
    assert_eq!(s.first_word, vec!["we"]);
    assert_eq!(s.continuation, vec!["ate", "here"]);
    assert_eq!(s.words().collect::<Vec<_>>(), vec!["we", "ate", "here"]);
    assert!(Suggestion::from_phrase(Vec::new(), None).first_word.is_empty());
}

#[test]
fn config_validation_rejects_zero_widths() {
    let config = SuggestConfig {
        beam_width: 0,
        ..SuggestConfig::default()
    };
    match config.validate() {
        Err(SuggestError::InvalidParameter(message)) => {
            assert_eq!(message, "beam_width must be greater than or equal to 1.")
        }
        other => panic!("expected invalid parameter, got {other:?}"),
    }
}

#[test]
fn greedy_suggestions_match_golden_ranking() {
    let config = SuggestConfig {
        beam_length: 6,
        ..SuggestConfig::default()
    };
    let suggester = Suggester::new(toy_registry(None), config).expect("valid config");
    let request = SuggestionRequest {
        seed: Some(0),
        ..SuggestionRequest::new("", "toy")
    };
    let suggestions = suggester.suggest(&request).expect("suggest failed");

    let expected = [
        (vec!["the"], vec!["food"]),
        (vec!["i"], vec!["love", "it"]),
        (vec!["we"], vec!["ate", "here"]),
    ];
    assert_eq!(suggestions.len(), expected.len());
    for (suggestion, (first, rest)) in suggestions.iter().zip(expected) {
        assert_eq!(suggestion.first_word, first);
        assert_eq!(suggestion.continuation, rest);
        assert!(suggestion.probabilities.is_none());
    }
}

#[test]
fn sampled_suggestions_carry_probabilities() {
    let suggester =
        Suggester::new(toy_registry(None), SuggestConfig::default()).expect("valid config");
    let request = SuggestionRequest {
        temperature: 1.0,
        seed: Some(9),
        ..SuggestionRequest::new("", "toy")
    };
    let suggestions = suggester.suggest(&request).expect("suggest failed");
    assert_eq!(suggestions.len(), 3);
    for suggestion in &suggestions {
        let probs = suggestion.probabilities.as_ref().expect("sampled probabilities");
        assert_eq!(probs.len(), 6);
        assert_eq!(suggestion.words().count(), 6);
    }
}

#[test]
fn corpus_suggestions_strip_markers() {
    let docs = [
        "<D> <S> the food was good . </S>",
        "<D> <S> we ate here . </S>",
        "<D> <S> i love it . </S>",
    ];
    let sa = DocSuffixArray::construct(&docs_from_lines(&docs)).expect("suffix array");
    let config = SuggestConfig {
        beam_length: 8,
        ..SuggestConfig::default()
    };
    let suggester = Suggester::new(toy_registry(Some(sa)), config).expect("valid config");
    let request = SuggestionRequest {
        use_corpus_constraint: true,
        ..SuggestionRequest::new("", "toy")
    };
    let suggestions = suggester.suggest(&request).expect("suggest failed");
    assert!(!suggestions.is_empty());
    for suggestion in &suggestions {
        assert!(suggestion.words().all(|w| !w.starts_with('<')));
        assert!(suggestion.probabilities.is_none());
    }
}

#[test]
fn request_errors_are_reported_per_request() {
    let suggester =
        Suggester::new(toy_registry(None), SuggestConfig::default()).expect("valid config");
    let requests = vec![
        SuggestionRequest::new("", "toy"),
        SuggestionRequest::new("", "missing"),
        SuggestionRequest {
            temperature: -1.0,
            ..SuggestionRequest::new("", "toy")
        },
    ];
    let results = suggester.suggest_batch(&requests);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(SuggestError::UnknownDomain(ref name)) if name == "missing"));
    assert!(matches!(results[2], Err(SuggestError::InvalidParameter(_))));
}

#[test]
fn registry_loads_domain_from_basename() {
    let base = std::env::temp_dir().join(format!("phrase_suggest_toy_{}", std::process::id()));
    let mut arpa = base.as_os_str().to_owned();
    arpa.push(".arpa");
    let mut corpus = base.as_os_str().to_owned();
    corpus.push(".corpus.txt");
    std::fs::write(&arpa, toy_arpa()).expect("write arpa");
    std::fs::write(&corpus, TOY_CORPUS.join("\n")).expect("write corpus");

    let config = DomainConfig::from_basename("toy", &base);
    let loaded = Registry::load(&[config.clone()]);
    std::fs::remove_file(&arpa).ok();
    std::fs::remove_file(&corpus).ok();

    assert!(config.corpus_path.is_some());
    let registry = loaded.expect("registry load failed");
    assert_eq!(registry.names(), vec!["toy"]);
    let domain = registry.get("toy").expect("domain");
    assert_eq!(domain.lm.vocab_size(), TOY_VOCAB_SIZE);
    assert_eq!(domain.corpus.as_ref().map(DocSuffixArray::len), Some(21));
}

#[test]
fn missing_arpa_file_is_an_io_error() {
    let config = DomainConfig::new("nowhere", "/definitely/not/here.arpa");
    assert!(matches!(Domain::load(&config), Err(SuggestError::Io { .. })));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn probabilities_sum_to_one(
        logprobs in prop::collection::vec(-60.0f64..0.0, 1..20),
        temperature in 0.05f64..5.0,
        bonus in prop::option::of(-2.0f64..2.0),
    ) {
        let lm = toy_lm();
        let ids = (0..logprobs.len() as WordId).map(|i| 7 + i).collect::<Vec<_>>();
        let weights = vec![0.5; lm.pos_table().tag_names().len()];
        let probs = to_probabilities(
            &lm,
            &ids,
            &logprobs,
            temperature,
            bonus.map(crate::config::LengthBonus::new),
            Some(&weights),
        )
        .expect("valid temperature");
        prop_assert_eq!(probs.len(), logprobs.len());
        prop_assert!(probs.iter().all(|p| *p >= 0.0));
        prop_assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn suffix_array_queries_match_brute_force(
        docs in prop::collection::vec(
            prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "."]), 1..8),
            3,
        ),
        exact in prop::collection::vec(prop::sample::select(vec!["a", "b", "c", ".", "z"]), 0..3),
        prefix in prop::sample::select(vec!["", "a", "b", ".", "z"]),
    ) {
        let docs = docs
            .into_iter()
            .map(|doc| doc.into_iter().map(str::to_string).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let exact = exact.into_iter().map(str::to_string).collect::<Vec<_>>();
        let sa = DocSuffixArray::construct(&docs).expect("suffix array");

        for rank in 1..sa.len() {
            let (prev, cur) = (sa.suffix(rank - 1), sa.suffix(rank));
            prop_assert!(prev <= cur);
            let common = prev.iter().zip(cur).take_while(|(a, b)| a == b).count();
            prop_assert_eq!(sa.lcp()[rank - 1] as usize, common);
        }

        let mut pattern = exact.clone();
        pattern.push(prefix.to_string());
        let (lo, hi) = sa.search_range(&pattern);
        let expected = brute_force_matches(&docs, &exact, prefix);
        prop_assert_eq!(hi - lo, expected.len());
        prop_assert_eq!(
            sa.collect_next_tokens(lo, hi, exact.len()),
            distinct_at_depth(&expected, exact.len())
        );
    }

    #[test]
    fn pruned_successors_all_have_successors(
        lists in prop::collection::vec(prop::collection::vec(0u32..8, 0..4), 8),
    ) {
        let pruned = SuccessorTable::from_lists(&lists).pruned();
        for word in 0..pruned.len() as WordId {
            for next in pruned.successors(word) {
                prop_assert!(pruned.has_successors(*next));
            }
        }
    }

    #[test]
    fn widening_the_beam_never_lowers_the_best_score(
        start in prop::sample::select(vec!["the", "i", "we", "food", "was", "good"]),
        width in 1usize..6,
        length in 1usize..9,
    ) {
        let lm = toy_lm();
        let context = ["<s>", "<D>", start];
        let narrow = beam_search_phrases(&lm, &context, width, length, None).expect("beam");
        let wide = beam_search_phrases(&lm, &context, 10_000, length, None).expect("beam");
        prop_assert!(!narrow.is_empty());
        prop_assert!(wide[0].score >= narrow[0].score);
    }

    #[test]
    fn corpus_beam_results_occur_in_corpus(
        width in 1usize..8,
        length in 1usize..16,
        rare_word_bonus in 0.0f64..2.0,
    ) {
        let lm = toy_lm();
        let sa = toy_corpus();
        let beam = beam_search_corpus(
            &lm,
            &sa,
            &["<s>", "<D>", "<S>"],
            width,
            length,
            rare_word_bonus,
            "",
            Duration::from_secs(3600),
        )
        .expect("beam search");
        prop_assert!(!beam.is_empty());
        prop_assert!(beam.len() <= width);
        for entry in &beam {
            let mut sequence = vec!["<S>"];
            sequence.extend_from_slice(&entry.words);
            prop_assert!(sa.contains_sequence(&sequence));
            prop_assert!(entry.words.last().copied() != Some(SENTENCE_END));
        }
    }

    #[test]
    fn diverse_selection_repeats_first_words_only_when_forced(
        raw in prop::collection::vec(
            (prop::sample::select(vec!["a", "b", "c", "d"]), -10.0f64..0.0),
            1..12,
        ),
        n in 1usize..5,
    ) {
        let mut entries = raw
            .iter()
            .map(|(first, score)| entry(*score, vec![*first, "x"]))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.cmp(a));
        let best = entries[0].clone();
        let available = entries.iter().map(|e| e.words[0]).collect::<FxHashSet<_>>().len();

        let picked = take_diverse(entries.clone(), n);
        prop_assert_eq!(picked.len(), n.min(entries.len()));
        prop_assert!(picked[0] == best);
        let distinct = picked.iter().map(|e| e.words[0]).collect::<FxHashSet<_>>().len();
        prop_assert_eq!(distinct, picked.len().min(available));
    }
}
