use std::sync::LazyLock;

use regex::Regex;

/// A sentence terminator (CJK or Latin) plus any whitespace after it
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。.!?]\s*").expect("valid sentence regex"));

/// One sentence-aligned slice of a document, in production order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split text into sentence units, keeping each terminator with its sentence.
///
/// Abbreviations, decimals and ellipses are not special-cased: "3.14" yields
/// "3." and "14".
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        let terminator_len = m.as_str().chars().next().map_or(0, char::len_utf8);
        units.push(&text[start..m.start() + terminator_len]);
        start = m.end();
    }
    units.push(&text[start..]);

    units
        .into_iter()
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
        .collect()
}

/// Partition text into chunks of at most `max_size` characters, breaking only
/// between sentences.
///
/// Sentences inside a chunk are joined with a single space. A lone sentence
/// longer than `max_size` is emitted as its own oversized chunk.
pub fn split_into_chunks(text: &str, max_size: usize) -> Vec<Chunk> {
    assert!(max_size > 0, "max_size must be greater than 0");

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.chars().count() <= max_size {
        return vec![Chunk {
            index: 0,
            text: trimmed.to_string(),
        }];
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for unit in split_sentences(trimmed) {
        let unit_len = unit.chars().count();
        let separator = usize::from(!current.is_empty());

        if !current.is_empty() && current_len + separator + unit_len > max_size {
            chunks.push(Chunk {
                index: chunks.len(),
                text: current.join(" "),
            });
            current.clear();
            current_len = 0;
        }

        current_len += usize::from(!current.is_empty()) + unit_len;
        current.push(unit);
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            text: current.join(" "),
        });
    }

    chunks
}
