use crate::error::{Result, SuggestError};
use crate::types::{BOS, DOCUMENT_START, PARAGRAPH_START, SENTENCE_END, SENTENCE_START};
use sentencex::segment;
use tracing::warn;

const SENTENCE_LANGUAGE: &str = "en";

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

fn split_chunk(chunk: &str, out: &mut Vec<String>) {
    let mut word = String::new();
    for c in chunk.chars() {
        if is_word_char(c) {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            out.push(std::mem::take(&mut word));
        }
        out.push(c.to_string());
    }
    if !word.is_empty() {
        out.push(word);
    }
}

fn ends_sentence(token: &str) -> bool {
    matches!(token, "." | "!" | "?")
}

// A trailing "" token means the text ended at a word boundary.
pub fn tokenize_mid_document(text: &str) -> Vec<String> {
    let normalized = text.to_lowercase().replace(" .", ".").replace(" ,", ",");
    let mut tokens = vec![DOCUMENT_START.to_string()];

    let paragraphs = normalized
        .split('\n')
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>();
    if paragraphs.is_empty() {
        tokens.push(PARAGRAPH_START.to_string());
        tokens.push(SENTENCE_START.to_string());
    }
    for (p_ix, paragraph) in paragraphs.iter().enumerate() {
        if p_ix > 0 {
            tokens.push(SENTENCE_END.to_string());
        }
        tokens.push(PARAGRAPH_START.to_string());
        let sentences = segment(SENTENCE_LANGUAGE, paragraph)
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>();
        if sentences.is_empty() {
            tokens.push(SENTENCE_START.to_string());
        }
        for (s_ix, sentence) in sentences.iter().enumerate() {
            if s_ix > 0 {
                tokens.push(SENTENCE_END.to_string());
            }
            tokens.push(SENTENCE_START.to_string());
            for chunk in sentence.split_whitespace() {
                split_chunk(chunk, &mut tokens);
            }
        }
    }

    let at_boundary = normalized.is_empty() || normalized.ends_with(char::is_whitespace);
    if at_boundary {
        if tokens.last().is_some_and(|t| ends_sentence(t)) {
            tokens.push(SENTENCE_END.to_string());
            tokens.push(SENTENCE_START.to_string());
        }
        tokens.push(String::new());
    }
    tokens
}

pub fn context_from_tokens(tokens: &[String]) -> Result<Vec<String>> {
    let header = [DOCUMENT_START, PARAGRAPH_START, SENTENCE_START];
    let found = tokens.iter().take(header.len()).map(String::as_str);
    if tokens.len() < header.len() + 1 || !found.eq(header) {
        return Err(SuggestError::MalformedContext(format!(
            "expected tokens to start with {header:?} and end with a word slot, got {:?}",
            &tokens[..tokens.len().min(header.len() + 1)]
        )));
    }
    if tokens.last().is_some_and(|t| !t.is_empty()) {
        warn!(tokens = ?tokens, "text so far ends mid-word");
    }

    let mut context = Vec::with_capacity(tokens.len() - 2);
    context.push(BOS.to_string());
    context.push(DOCUMENT_START.to_string());
    context.extend(tokens[header.len()..tokens.len() - 1].iter().cloned());
    Ok(context)
}

pub fn tokenize_so_far(text: &str) -> Result<Vec<String>> {
    context_from_tokens(&tokenize_mid_document(text))
}
