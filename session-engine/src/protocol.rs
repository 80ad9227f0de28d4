//! Splits a completion into the student-facing reply and the trailing
//! `KEY: value` signal block.
//!
//! Parsing is total. Missing delimiter, unknown keys, lines without a colon
//! and unrecognised values all fall back to per-key defaults.

use crate::state::{Difficulty, QuizFeedback, WeaknessSignal};

pub const META_DELIMITER: &str = "###META###";

/// Machine-readable signals extracted from one completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetaSignals {
    pub topic: Option<String>,
    pub weakness_signal: Option<WeaknessSignal>,
    pub difficulty: Option<Difficulty>,
    pub quiz_feedback: QuizFeedback,
    pub ask_consolidation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCompletion {
    pub reply: String,
    pub meta: MetaSignals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKey {
    Topic,
    WeaknessSignal,
    Difficulty,
    QuizFeedback,
    AskConsolidation,
}

impl MetaKey {
    fn parse(raw: &str) -> Option<Self> {
        let key = raw
            .trim()
            .trim_start_matches(['-', '*', ' '])
            .trim_end_matches('*')
            .trim()
            .to_ascii_uppercase()
            .replace(' ', "_");

        match key.as_str() {
            "TOPIC" => Some(Self::Topic),
            "WEAKNESS_SIGNAL" => Some(Self::WeaknessSignal),
            "DIFFICULTY" => Some(Self::Difficulty),
            "QUIZ_FEEDBACK" => Some(Self::QuizFeedback),
            "EXPLICIT_ASK_CONSOLIDATION" | "ASK_CONSOLIDATION" => Some(Self::AskConsolidation),
            _ => None,
        }
    }
}

pub fn parse_completion(raw: &str) -> ParsedCompletion {
    match raw.split_once(META_DELIMITER) {
        Some((reply, block)) => ParsedCompletion {
            reply: reply.trim().to_owned(),
            meta: parse_signal_block(block),
        },
        None => ParsedCompletion {
            reply: raw.to_owned(),
            meta: MetaSignals::default(),
        },
    }
}

/// Reads `KEY: value` lines. Later occurrences of a key win.
pub fn parse_signal_block(block: &str) -> MetaSignals {
    let mut meta = MetaSignals::default();

    for line in block.lines() {
        let Some((raw_key, raw_value)) = line.split_once(':') else {
            continue;
        };
        let Some(key) = MetaKey::parse(raw_key) else {
            continue;
        };
        let value = clean_value(raw_value);

        match key {
            MetaKey::Topic => {
                meta.topic = Some(value)
                    .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"));
            }
            MetaKey::WeaknessSignal => {
                meta.weakness_signal = WeaknessSignal::parse(first_word(&value));
            }
            MetaKey::Difficulty => meta.difficulty = Difficulty::parse(first_word(&value)),
            MetaKey::QuizFeedback => {
                meta.quiz_feedback = QuizFeedback::parse(value.trim_end_matches('.'));
            }
            MetaKey::AskConsolidation => {
                meta.ask_consolidation = value.to_ascii_lowercase().contains("yes");
            }
        }
    }

    meta
}

// Drops trailing `#` comments and the quoting or markup models like to add.
fn clean_value(raw: &str) -> String {
    let without_comment = raw.split_once(" #").map_or(raw, |(value, _)| value);
    without_comment
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '<' | '>'))
        .trim()
        .to_owned()
}

fn first_word(value: &str) -> &str {
    value
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .find(|w| !w.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reply_and_signals() {
        let parsed =
            parse_completion("Hello!\n###META###\nTOPIC: algebra\nWEAKNESS_SIGNAL: mistake\n");

        assert_eq!(parsed.reply, "Hello!");
        assert_eq!(parsed.meta.topic.as_deref(), Some("algebra"));
        assert_eq!(parsed.meta.weakness_signal, Some(WeaknessSignal::Mistake));
        assert_eq!(parsed.meta.difficulty, None);
        assert_eq!(parsed.meta.quiz_feedback, QuizFeedback::None);
        assert!(!parsed.meta.ask_consolidation);
    }

    #[test]
    fn missing_delimiter_keeps_whole_text() {
        let raw = "Just a reply.\nTOPIC: algebra";
        let parsed = parse_completion(raw);
        assert_eq!(parsed.reply, raw);
        assert_eq!(parsed.meta, MetaSignals::default());
    }

    #[test]
    fn full_block() {
        let parsed = parse_completion(
            "Nice work.\n###META###\nTOPIC: Cell Biology\nWEAKNESS_SIGNAL: none\nDIFFICULTY: Advanced\nQUIZ_FEEDBACK: partially_correct\nEXPLICIT_ASK_CONSOLIDATION: Yes please",
        );

        assert_eq!(parsed.meta.topic.as_deref(), Some("Cell Biology"));
        assert_eq!(parsed.meta.weakness_signal, None);
        assert_eq!(parsed.meta.difficulty, Some(Difficulty::Advanced));
        assert_eq!(parsed.meta.quiz_feedback, QuizFeedback::PartiallyCorrect);
        assert!(parsed.meta.ask_consolidation);
    }

    #[test]
    fn only_first_delimiter_splits() {
        let parsed = parse_completion("A###META###TOPIC: x\n###META###\nTOPIC: y");
        assert_eq!(parsed.reply, "A");
        // the second delimiter line has no colon and is skipped
        assert_eq!(parsed.meta.topic.as_deref(), Some("y"));
    }

    /// Malformed signal blocks never fail and fall back to defaults.
    #[test]
    fn malformed_blocks_fall_back_to_defaults() {
        let fixtures: &[(&str, MetaSignals)] = &[
            ("", MetaSignals::default()),
            ("\n\n   \n", MetaSignals::default()),
            ("TOPIC algebra\nWEAKNESS_SIGNAL mistake", MetaSignals::default()),
            ("COLOR: blue\nMOOD: happy", MetaSignals::default()),
            ("TOPIC: unknown", MetaSignals::default()),
            ("TOPIC: UNKNOWN\nDIFFICULTY: expert", MetaSignals::default()),
            ("TOPIC:", MetaSignals::default()),
            ("WEAKNESS_SIGNAL: catastrophic", MetaSignals::default()),
            ("QUIZ_FEEDBACK: 42", MetaSignals::default()),
            ("EXPLICIT_ASK_CONSOLIDATION: no", MetaSignals::default()),
            (": : :", MetaSignals::default()),
            ("\u{feff}\u{0}garbage\u{7f}", MetaSignals::default()),
            (
                "- **TOPIC**: \"fractions\"",
                MetaSignals {
                    topic: Some("fractions".into()),
                    ..MetaSignals::default()
                },
            ),
            (
                "weakness_signal:   Repeat.  ",
                MetaSignals {
                    weakness_signal: Some(WeaknessSignal::Repeat),
                    ..MetaSignals::default()
                },
            ),
            (
                "DIFFICULTY: <beginner>",
                MetaSignals {
                    difficulty: Some(Difficulty::Beginner),
                    ..MetaSignals::default()
                },
            ),
            (
                "EXPLICIT_ASK_CONSOLIDATION: <yes|no>   # yes if consolidation should run",
                MetaSignals {
                    ask_consolidation: true,
                    ..MetaSignals::default()
                },
            ),
            ("TOPIC: geometry\nTOPIC: unknown", MetaSignals::default()),
            (
                "ASK_CONSOLIDATION: YES",
                MetaSignals {
                    ask_consolidation: true,
                    ..MetaSignals::default()
                },
            ),
        ];

        for (block, expected) in fixtures {
            assert_eq!(&parse_signal_block(block), expected, "block: {block:?}");
        }
    }

    #[test]
    fn reply_is_trimmed_only_when_split() {
        let parsed = parse_completion("  spaced reply  \n###META###");
        assert_eq!(parsed.reply, "spaced reply");
        assert_eq!(parsed.meta, MetaSignals::default());
    }
}
