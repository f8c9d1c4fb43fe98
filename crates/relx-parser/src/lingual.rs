//! Lingual parsing: sentence splitting and tokenization

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’.\-][\p{L}\p{N}]+)*|[^\s\p{L}\p{N}]")
        .expect("token pattern is a compile-time constant")
});

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "no", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// Lingual annotations for one sentence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LingualSentence {
    pub text: String,
    pub words: Vec<String>,
    pub lemmas: Vec<String>,
    /// Byte offset of each word within `text`
    pub char_offsets: Vec<usize>,
}

/// Rule-based sentence splitter and tokenizer
#[derive(Debug, Clone)]
pub struct LingualParser {
    abbreviations: HashSet<&'static str>,
}

impl LingualParser {
    pub fn new() -> Self {
        Self {
            abbreviations: ABBREVIATIONS.iter().copied().collect(),
        }
    }

    /// Split text into `(byte offset, token)` pairs
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        TOKEN_RE
            .find_iter(text)
            .map(|m| (m.start(), m.as_str()))
            .collect()
    }

    /// Split text into `(byte offset, sentence)` pairs
    pub fn split_sentences<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        let tokens = self.tokenize(text);
        let mut sentences = Vec::new();
        let mut first = 0;

        for i in 0..tokens.len() {
            let last = i + 1 == tokens.len();
            if last || self.is_boundary(&tokens, i) {
                let begin = tokens[first].0;
                let (offset, token) = tokens[i];
                let end = offset + token.len();
                sentences.push((begin, &text[begin..end]));
                first = i + 1;
            }
        }

        sentences
    }

    fn is_boundary(&self, tokens: &[(usize, &str)], i: usize) -> bool {
        let token = tokens[i].1;
        if !matches!(token, "." | "!" | "?") {
            return false;
        }

        let Some((_, next)) = tokens.get(i + 1) else {
            return true;
        };
        let next_opens = next
            .chars()
            .next()
            .map(|c| c.is_uppercase() || c.is_numeric() || matches!(c, '"' | '“' | '(' | '\''))
            .unwrap_or(false);
        if !next_opens {
            return false;
        }

        if token == "." && i > 0 {
            let previous = tokens[i - 1].1;
            let is_initial =
                previous.chars().count() == 1 && previous.chars().all(char::is_uppercase);
            if is_initial || self.abbreviations.contains(previous.to_lowercase().as_str()) {
                return false;
            }
        }

        true
    }

    /// Lemma of a word
    pub fn lemma(&self, word: &str) -> String {
        word.to_lowercase()
    }

    /// Sentence-split and tokenize a block of text
    pub fn annotate(&self, block: &str) -> Vec<LingualSentence> {
        self.split_sentences(block)
            .into_iter()
            .map(|(_, sentence)| {
                let tokens = self.tokenize(sentence);
                LingualSentence {
                    text: sentence.to_string(),
                    lemmas: tokens.iter().map(|(_, t)| self.lemma(t)).collect(),
                    words: tokens.iter().map(|(_, t)| t.to_string()).collect(),
                    char_offsets: tokens.iter().map(|(o, _)| *o).collect(),
                }
            })
            .collect()
    }

    /// Treat a whole block as one whitespace-tokenized sentence
    pub fn whitespace_sentence(&self, block: &str) -> LingualSentence {
        let mut words = Vec::new();
        let mut offsets = Vec::new();
        let mut cursor = 0;

        for word in block.split_whitespace() {
            let offset = cursor + block[cursor..].find(word).unwrap_or(0);
            offsets.push(offset);
            words.push(word.to_string());
            cursor = offset + word.len();
        }

        LingualSentence {
            text: block.to_string(),
            lemmas: words.iter().map(|w| self.lemma(w)).collect(),
            words,
            char_offsets: offsets,
        }
    }
}

impl Default for LingualParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let parser = LingualParser::new();
        let tokens: Vec<&str> = parser
            .tokenize("Obama, born in 1961, was the 44th president.")
            .into_iter()
            .map(|(_, t)| t)
            .collect();

        assert_eq!(
            tokens,
            vec!["Obama", ",", "born", "in", "1961", ",", "was", "the", "44th", "president", "."]
        );
    }

    #[test]
    fn test_tokenize_keeps_inner_punctuation() {
        let parser = LingualParser::new();
        let tokens: Vec<&str> = parser
            .tokenize("Jean-Luc's U.S trip")
            .into_iter()
            .map(|(_, t)| t)
            .collect();

        assert_eq!(tokens, vec!["Jean-Luc's", "U.S", "trip"]);
    }

    #[test]
    fn test_split_sentences() {
        let parser = LingualParser::new();
        let text = "Barack Obama was born in Honolulu. He served two terms! Did he?";
        let sentences: Vec<&str> = parser
            .split_sentences(text)
            .into_iter()
            .map(|(_, s)| s)
            .collect();

        assert_eq!(
            sentences,
            vec![
                "Barack Obama was born in Honolulu.",
                "He served two terms!",
                "Did he?"
            ]
        );
    }

    #[test]
    fn test_split_respects_abbreviations_and_initials() {
        let parser = LingualParser::new();
        let text = "Dr. Smith met John F. Kennedy. They talked.";
        let sentences = parser.split_sentences(text);

        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].1, "Dr. Smith met John F. Kennedy.");
        assert_eq!(sentences[1].0, text.find("They").unwrap());
    }

    #[test]
    fn test_annotate_offsets() {
        let parser = LingualParser::new();
        let annotated = parser.annotate("First one. Second Obama here.");

        assert_eq!(annotated.len(), 2);
        let second = &annotated[1];
        assert_eq!(second.text, "Second Obama here.");
        assert_eq!(second.words[1], "Obama");
        assert_eq!(second.lemmas[1], "obama");
        let offset = second.char_offsets[1];
        assert_eq!(&second.text[offset..offset + 5], "Obama");
    }

    #[test]
    fn test_whitespace_sentence() {
        let parser = LingualParser::new();
        let sentence = parser.whitespace_sentence("Barack  Obama,  Honolulu");

        assert_eq!(sentence.words, vec!["Barack", "Obama,", "Honolulu"]);
        assert_eq!(sentence.char_offsets, vec![0, 8, 16]);
    }

    #[test]
    fn test_empty_input() {
        let parser = LingualParser::new();
        assert!(parser.split_sentences("   ").is_empty());
        assert!(parser.annotate("").is_empty());
    }
}
