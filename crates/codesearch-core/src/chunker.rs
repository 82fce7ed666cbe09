//! Line-oriented structural chunker.
//!
//! A line opens a new chunk when, after trimming, it starts with a namespace,
//! type or member keyword, a brace, an angle-bracket tag, an XML comment or a
//! `//` comment, or when it is a merge separator (see [`crate::corpus`]).
//! Chunks keep their line terminators, so concatenating them in order yields
//! the input byte for byte.

use regex::Regex;

use crate::corpus::is_separator_line;
use crate::types::{Chunk, LanguageBucket};

const TRIGGER_PATTERN: &str =
    r"^(?:(?:namespace|class|interface|void|public|private|protected)\b|[{}]|<[^>]+>|<!--|//)";

pub struct Chunker {
    trigger: Regex,
}

impl Default for Chunker {
    fn default() -> Self { Self::new() }
}

impl Chunker {
    pub fn new() -> Self {
        Self { trigger: Regex::new(TRIGGER_PATTERN).expect("static trigger pattern") }
    }

    pub fn is_trigger(&self, line: &str) -> bool {
        let trimmed = line.trim();
        is_separator_line(trimmed) || self.trigger.is_match(trimmed)
    }

    /// Split `text` into contiguous, non-overlapping chunks.
    ///
    /// Lines are counted with `split_inclusive('\n')`: a trailing newline ends
    /// the last line rather than starting an empty one.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut origin: Option<String> = None;
        let mut awaiting_name = false;
        let mut start_byte = 0usize;
        let mut start_line = 1usize;
        let mut offset = 0usize;
        let mut line_no = 0usize;

        for line in text.split_inclusive('\n') {
            line_no += 1;
            let trimmed = line.trim();
            // The line after a separator carries the merged file's name.
            if awaiting_name {
                awaiting_name = false;
                if !trimmed.is_empty() { origin = Some(trimmed.to_string()); }
            }
            let separator = is_separator_line(trimmed);
            if (separator || self.trigger.is_match(trimmed)) && line_no > start_line {
                chunks.push(make_chunk(&text[start_byte..offset], start_line, line_no - 1, origin.clone()));
                start_byte = offset;
                start_line = line_no;
            }
            awaiting_name = separator;
            offset += line.len();
        }

        if start_byte < text.len() {
            chunks.push(make_chunk(&text[start_byte..], start_line, line_no, origin));
        }
        chunks
    }
}

fn make_chunk(text: &str, start_line: usize, end_line: usize, origin: Option<String>) -> Chunk {
    Chunk {
        bucket: LanguageBucket::classify(text),
        text: text.to_string(),
        start_line,
        end_line,
        origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_triggers_yields_single_chunk() {
        let chunks = Chunker::new().chunk("hello world\nno code here");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[0].text, "hello world\nno code here");
        assert_eq!(chunks[0].bucket, LanguageBucket::Markup);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(Chunker::new().chunk("").is_empty());
    }

    #[test]
    fn each_trigger_line_opens_a_chunk() {
        let text = "namespace A {\nclass X {}\n}\nnamespace B {\nclass Y {}\n}";
        let chunks = Chunker::new().chunk(text);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].start_line, 1);
        assert!(chunks[0].text.starts_with("namespace A {"));
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_line).collect();
        assert_eq!(starts, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn leading_whitespace_and_crlf_are_ignored_for_detection() {
        let text = "intro\r\n    public void Run()\r\n    body\r\n";
        let chunks = Chunker::new().chunk(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 1));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (2, 3));
        assert_eq!(chunks[1].bucket, LanguageBucket::Code);
        assert_eq!(chunks.concat_text(), text);
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        let chunker = Chunker::new();
        assert!(chunker.is_trigger("  public int X;"));
        assert!(chunker.is_trigger("<StackPanel>"));
        assert!(chunker.is_trigger("<!-- note"));
        assert!(chunker.is_trigger("// comment"));
        assert!(chunker.is_trigger("}"));
        assert!(!chunker.is_trigger("publicKey = 1;"));
        assert!(!chunker.is_trigger("x < y && y > z"));
    }

    #[test]
    fn merge_separator_sets_origin() {
        let sep = "=".repeat(50);
        let text = format!("preamble\n\n{sep}\nA.cs.txt\nint a;\n\n{sep}\nB.xaml.txt\nint b;\n");
        let chunks = Chunker::new().chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].origin, None);
        assert_eq!(chunks[1].origin.as_deref(), Some("A.cs.txt"));
        assert_eq!(chunks[2].origin.as_deref(), Some("B.xaml.txt"));
        assert_eq!(chunks.concat_text(), text);
    }

    trait ConcatText { fn concat_text(&self) -> String; }
    impl ConcatText for Vec<Chunk> {
        fn concat_text(&self) -> String { self.iter().map(|c| c.text.as_str()).collect() }
    }
}
