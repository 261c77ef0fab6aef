use crate::types::WordId;
use smallvec::SmallVec;

#[derive(Clone, Debug, Default)]
struct TrieNode {
    children: SmallVec<[(u8, u32); 4]>,
    word: Option<WordId>,
}

#[derive(Clone, Debug)]
pub struct VocabTrie {
    nodes: Vec<TrieNode>,
}

impl Default for VocabTrie {
    fn default() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }
}

impl VocabTrie {
    pub fn from_vocab<S: AsRef<str>>(vocab: &[S]) -> Self {
        let mut trie = Self::default();
        for (id, word) in vocab.iter().enumerate() {
            trie.insert(word.as_ref(), id as WordId);
        }
        trie
    }

    pub fn insert(&mut self, word: &str, id: WordId) {
        let mut node_ix = 0usize;
        for &byte in word.as_bytes() {
            let children = &self.nodes[node_ix].children;
            node_ix = match children.binary_search_by_key(&byte, |(b, _)| *b) {
                Ok(pos) => children[pos].1 as usize,
                Err(pos) => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node_ix].children.insert(pos, (byte, child as u32));
                    child
                }
            };
        }
        self.nodes[node_ix].word = Some(id);
    }

    fn find(&self, prefix: &str) -> Option<usize> {
        let mut node_ix = 0usize;
        for &byte in prefix.as_bytes() {
            let children = &self.nodes[node_ix].children;
            let pos = children.binary_search_by_key(&byte, |(b, _)| *b).ok()?;
            node_ix = children[pos].1 as usize;
        }
        Some(node_ix)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.find(word)
            .map(|ix| self.nodes[ix].word.is_some())
            .unwrap_or(false)
    }

    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<WordId> {
        let Some(start) = self.find(prefix) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(node_ix) = stack.pop() {
            let node = &self.nodes[node_ix];
            if let Some(id) = node.word {
                out.push(id);
            }
            stack.extend(node.children.iter().rev().map(|(_, child)| *child as usize));
        }
        out
    }
}
