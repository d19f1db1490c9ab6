use crate::config::ParserConfig;
use crate::language::Language;
use std::collections::VecDeque;

/// Recursive character splitter.
///
/// Text is cut on the coarsest separator of the language ladder that occurs
/// in it; pieces still longer than `chunk_size` are cut again with the next
/// separators. Neighbouring small pieces are merged back up to `chunk_size`,
/// and consecutive chunks share up to `chunk_overlap` characters. Separators
/// stay attached to the start of the piece that follows them.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &'static [&'static str],
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize, separators: &'static [&'static str]) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators,
        }
    }

    pub fn for_language(language: Language, config: &ParserConfig) -> Self {
        Self::new(
            config.chunk_size,
            config.chunk_overlap,
            language.split_separators(),
        )
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, self.separators)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                break;
            }
            if text.contains(candidate) {
                separator = *candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                if let Some(chunk) = trimmed(piece) {
                    chunks.push(chunk);
                }
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = joined(&window) {
                    chunks.push(chunk);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = joined(&window) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn joined(window: &VecDeque<&str>) -> Option<String> {
    trimmed(&window.iter().copied().collect::<String>())
}

/// Cuts before every occurrence of `separator`; the empty separator cuts
/// between characters. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::for_language(Language::Rust, &ParserConfig::default());
        let chunks = splitter.split("  fn main() {}\n");
        assert_eq!(chunks, vec!["fn main() {}".to_string()]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        let splitter = TextSplitter::for_language(Language::Python, &ParserConfig::default());
        assert!(splitter.split("   \n\n").is_empty());
    }

    #[test]
    fn separators_stay_with_the_following_piece() {
        assert_eq!(
            split_keeping_separator("a\nb\nc", "\n"),
            vec!["a", "\nb", "\nc"]
        );
        assert_eq!(split_keeping_separator("\nx", "\n"), vec!["\nx"]);
        assert_eq!(split_keeping_separator("héé", ""), vec!["h", "é", "é"]);
    }

    #[test]
    fn words_are_packed_up_to_chunk_size_with_overlap() {
        let splitter = TextSplitter::new(10, 4, &["\n", " ", ""]);
        let chunks = splitter.split("aaa bbb ccc ddd");
        // pieces: "aaa", " bbb", " ccc", " ddd" (3, 4, 4, 4 chars)
        assert_eq!(
            chunks,
            vec!["aaa bbb".to_string(), "bbb ccc".to_string(), "ccc ddd".to_string()]
        );
    }

    #[test]
    fn long_lines_fall_through_to_finer_separators() {
        let splitter = TextSplitter::new(8, 0, &["\n", " ", ""]);
        // "\nabcdefghijkl" is too long, so it is cut per character and the
        // leading newline is trimmed off the first window
        let chunks = splitter.split("short\nabcdefghijkl");
        assert_eq!(
            chunks,
            vec!["short".to_string(), "abcdefg".to_string(), "hijkl".to_string()]
        );
    }

    #[test]
    fn every_chunk_respects_the_size_limit() {
        let config = ParserConfig::with_chunk_size(40, 10);
        let splitter = TextSplitter::for_language(Language::Rust, &config);
        let body: String = (0..30).map(|i| format!("    let v{i} = {i};\n")).collect();
        let text = format!("fn long() {{\n{body}}}\n");

        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "{chunk:?}");
        }
        assert!(chunks[0].starts_with("fn long()"));
        assert!(chunks.last().unwrap().ends_with('}'));
    }
}
