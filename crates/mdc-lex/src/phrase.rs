//! Multi-word phrase table.
//!
//! Machine Dialect spells most operators as English phrases (`is greater
//! than or equal to`). The lexer scans ahead word by word and takes the
//! longest phrase the table knows, the same greedy longest-match used for
//! multi-character symbolic operators, lifted from characters to words.
//! Matching is case-insensitive and respects word boundaries.

use crate::token::{Keyword, Op};

/// What a matched phrase lexes as.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PhraseKind {
    Keyword(Keyword),
    Op(Op),
}

/// One table entry: the phrase's words in lowercase, and its token kind.
pub struct Phrase {
    pub words: &'static [&'static str],
    pub kind: PhraseKind,
}

/// The longest phrase in the table, in words.
pub const MAX_PHRASE_WORDS: usize = 6;

/// All multi-word phrases, longest first. Single words are handled by the
/// keyword/operator/stopword lookups in [`crate::token`].
pub const PHRASES: &[Phrase] = &[
    Phrase {
        words: &["is", "greater", "than", "or", "equal", "to"],
        kind: PhraseKind::Op(Op::GtEq),
    },
    Phrase {
        words: &["is", "less", "than", "or", "equal", "to"],
        kind: PhraseKind::Op(Op::LtEq),
    },
    Phrase {
        words: &["is", "not", "strictly", "equal", "to"],
        kind: PhraseKind::Op(Op::StrictNotEq),
    },
    Phrase {
        words: &["is", "strictly", "equal", "to"],
        kind: PhraseKind::Op(Op::StrictEq),
    },
    Phrase {
        words: &["is", "not", "equal", "to"],
        kind: PhraseKind::Op(Op::NotEq),
    },
    Phrase {
        words: &["is", "equal", "to"],
        kind: PhraseKind::Op(Op::Eq),
    },
    Phrase {
        words: &["is", "greater", "than"],
        kind: PhraseKind::Op(Op::Gt),
    },
    Phrase {
        words: &["is", "less", "than"],
        kind: PhraseKind::Op(Op::Lt),
    },
    Phrase {
        words: &["does", "not", "equal"],
        kind: PhraseKind::Op(Op::NotEq),
    },
    Phrase {
        words: &["is", "at", "least"],
        kind: PhraseKind::Op(Op::GtEq),
    },
    Phrase {
        words: &["is", "at", "most"],
        kind: PhraseKind::Op(Op::LtEq),
    },
    Phrase {
        words: &["give", "back"],
        kind: PhraseKind::Keyword(Keyword::GiveBack),
    },
    Phrase {
        words: &["gives", "back"],
        kind: PhraseKind::Keyword(Keyword::GiveBack),
    },
];

/// Find the longest phrase matching a prefix of `words` (already lowercased).
/// Returns the word count consumed and the resulting kind.
pub fn match_phrase(words: &[&str]) -> Option<(usize, PhraseKind)> {
    for phrase in PHRASES {
        let n = phrase.words.len();
        if n <= words.len() && phrase.words == &words[..n] {
            return Some((n, phrase.kind));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_longest_first() {
        for pair in PHRASES.windows(2) {
            assert!(
                pair[0].words.len() >= pair[1].words.len(),
                "{:?} before {:?}",
                pair[0].words,
                pair[1].words
            );
        }
    }

    #[test]
    fn test_longest_match_wins() {
        let words = ["is", "greater", "than", "or", "equal", "to"];
        let (n, kind) = match_phrase(&words).unwrap();
        assert_eq!(n, 6);
        assert_eq!(kind, PhraseKind::Op(Op::GtEq));
    }

    #[test]
    fn test_prefix_match() {
        // With fewer words available, the shorter phrase matches.
        let words = ["is", "greater", "than", "five"];
        let (n, kind) = match_phrase(&words).unwrap();
        assert_eq!(n, 3);
        assert_eq!(kind, PhraseKind::Op(Op::Gt));
    }

    #[test]
    fn test_give_back() {
        let (n, kind) = match_phrase(&["give", "back"]).unwrap();
        assert_eq!(n, 2);
        assert_eq!(kind, PhraseKind::Keyword(Keyword::GiveBack));
    }

    #[test]
    fn test_no_match() {
        assert!(match_phrase(&["is", "quite", "large"]).is_none());
        assert!(match_phrase(&["banana"]).is_none());
    }

    #[test]
    fn test_max_phrase_words() {
        let longest = PHRASES.iter().map(|p| p.words.len()).max().unwrap();
        assert_eq!(longest, MAX_PHRASE_WORDS);
    }
}
