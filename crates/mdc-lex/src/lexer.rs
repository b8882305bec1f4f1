//! The Machine Dialect lexer.
//!
//! A streaming tokenizer over UTF-8 Markdown source. One call to
//! [`Lexer::next_token`] produces one token; after the end of input it keeps
//! returning [`TokenKind::Eof`]. Lexing never aborts: anything the lexer
//! cannot classify becomes a [`TokenKind::Illegal`] token plus a diagnostic,
//! and scanning continues with the next character.
//!
//! The interesting parts of the surface syntax:
//!
//! - literals are wrapped in underscores (`_42_`, `_"hi"_`, `_Yes_`),
//! - identifiers are wrapped in backticks and may contain spaces,
//! - keywords may be wrapped in bold markers (`**Set**`),
//! - most operators are English phrases matched longest-first
//!   (`is greater than or equal to`),
//! - a run of `>` at the start of a line marks block depth.

use mdc_util::diagnostic::codes;
use mdc_util::{Handler, Span, Symbol};

use crate::cursor::Cursor;
use crate::phrase::{self, PhraseKind, MAX_PHRASE_WORDS};
use crate::token::{
    is_stopword, keyword_from_word, op_from_word, Lit, Op, Punct, Token, TokenKind,
};

/// What the optional YAML frontmatter block declared.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frontmatter {
    /// Whether a `---` fenced block was present at the top of the file.
    pub present: bool,
    /// Whether it contained `executable: true`.
    pub executable: bool,
}

/// The streaming tokenizer.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    handler: &'a Handler,
    /// Start of the token being scanned.
    token_start: usize,
    token_start_line: u32,
    token_start_column: u32,
    /// True until the first token of the current logical line is produced.
    at_line_start: bool,
    /// Set after an opening `**` that did not introduce a keyword, so the
    /// matching closing `**` is consumed silently.
    in_bold: bool,
    /// Whether the iterator already yielded `Eof`.
    eof_emitted: bool,
    frontmatter: Frontmatter,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `source`, reporting problems to `handler`.
    ///
    /// A leading `---` fenced frontmatter block is consumed here; its
    /// `executable` flag is available from [`Lexer::frontmatter`].
    pub fn new(source: &'a str, handler: &'a Handler) -> Self {
        let mut lexer = Self {
            cursor: Cursor::new(source),
            handler,
            token_start: 0,
            token_start_line: 1,
            token_start_column: 1,
            at_line_start: true,
            in_bold: false,
            eof_emitted: false,
            frontmatter: Frontmatter::default(),
        };
        lexer.skip_frontmatter();
        lexer
    }

    /// The frontmatter flags scanned during construction.
    pub fn frontmatter(&self) -> Frontmatter {
        self.frontmatter
    }

    /// Produce the next token. Returns `Eof` forever once the input ends.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        self.token_start = self.cursor.position();
        self.token_start_line = self.cursor.line();
        self.token_start_column = self.cursor.column();

        if self.cursor.is_at_end() {
            return Token::eof(Span::point(self.cursor.line(), self.cursor.column()));
        }

        let line_start = self.at_line_start;
        self.at_line_start = false;

        match self.cursor.current() {
            '>' if line_start => self.lex_block_marker(),
            '#' if line_start => self.lex_header(),
            '_' => self.lex_underscore_literal(),
            '`' => self.lex_backtick_ident(),
            '"' | '\'' => self.lex_string(),
            '*' if self.cursor.peek(1) == '*' => self.lex_bold(),
            '<' => self.lex_tag(),
            c if c.is_ascii_digit() => self.lex_number(),
            c if is_word_start(c) => self.lex_word(),
            '+' => self.single(TokenKind::Op(Op::Plus)),
            '-' => self.single(TokenKind::Op(Op::Minus)),
            '*' => self.single(TokenKind::Op(Op::Star)),
            '/' => self.single(TokenKind::Op(Op::Slash)),
            '%' => self.single(TokenKind::Op(Op::Percent)),
            '^' => self.single(TokenKind::Op(Op::Caret)),
            '(' => self.single(TokenKind::Punct(Punct::LParen)),
            ')' => self.single(TokenKind::Punct(Punct::RParen)),
            ',' => self.single(TokenKind::Punct(Punct::Comma)),
            ':' => self.single(TokenKind::Punct(Punct::Colon)),
            '.' => self.single(TokenKind::Punct(Punct::Period)),
            c => {
                self.cursor.advance();
                self.handler.error(
                    codes::E_ILLEGAL_CHAR,
                    format!("illegal character `{c}`"),
                    self.token_span(),
                );
                self.make(TokenKind::Illegal(self.lexeme()))
            }
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.cursor.current() {
                ' ' | '\t' | '\r' => {
                    self.cursor.advance();
                }
                '\n' => {
                    self.cursor.advance();
                    self.at_line_start = true;
                }
                _ => break,
            }
        }
    }

    fn skip_frontmatter(&mut self) {
        if !self.cursor.starts_with("---") {
            return;
        }
        // The fence must be alone on the first line.
        let mut probe = 3;
        loop {
            match self.cursor.peek(probe) {
                ' ' | '\r' => probe += 1,
                '\n' => break,
                _ => return,
            }
        }

        self.frontmatter.present = true;
        // Consume the opening fence line.
        self.cursor.advance_while(|c| c != '\n');
        self.cursor.advance();

        // Scan body lines until the closing fence.
        loop {
            if self.cursor.is_at_end() {
                return;
            }
            if self.cursor.starts_with("---") {
                self.cursor.advance_while(|c| c != '\n');
                self.cursor.advance();
                return;
            }
            let start = self.cursor.position();
            self.cursor.advance_while(|c| c != '\n');
            let line = self.cursor.slice(start, self.cursor.position());
            if let Some((key, value)) = line.split_once(':') {
                if key.trim().eq_ignore_ascii_case("executable")
                    && value.trim().eq_ignore_ascii_case("true")
                {
                    self.frontmatter.executable = true;
                }
            }
            self.cursor.advance();
        }
    }

    fn lex_block_marker(&mut self) -> Token {
        let mut depth: u32 = 0;
        while self.cursor.current() == '>' {
            depth += 1;
            self.cursor.advance();
            // `> >` and `>>` both deepen by one per marker.
            while self.cursor.current() == ' ' && self.cursor.peek(1) == '>' {
                self.cursor.advance();
            }
        }
        self.make(TokenKind::BlockMarker(depth.min(u8::MAX as u32) as u8))
    }

    fn lex_header(&mut self) -> Token {
        let mut level: u32 = 0;
        while self.cursor.current() == '#' {
            level += 1;
            self.cursor.advance();
        }
        self.make(TokenKind::Punct(Punct::Header(
            level.min(u8::MAX as u32) as u8
        )))
    }

    /// `_42_`, `_3.14_`, `_-7_`, `_"hi"_`, `_Yes_`, `_No_`, `_empty_`.
    /// The underscores are delimiters and never part of the value.
    fn lex_underscore_literal(&mut self) -> Token {
        self.cursor.advance(); // opening `_`

        let lit = match self.cursor.current() {
            c if c.is_ascii_digit() || c == '-' => self.scan_numeric_lit(),
            '"' | '\'' => self.scan_string_lit(),
            c if c.is_ascii_alphabetic() => {
                let start = self.cursor.position();
                self.cursor.advance_while(|c| c.is_ascii_alphabetic());
                let word = self.cursor.slice(start, self.cursor.position());
                if word.eq_ignore_ascii_case("yes") || word.eq_ignore_ascii_case("true") {
                    Some(Lit::Bool(true))
                } else if word.eq_ignore_ascii_case("no") || word.eq_ignore_ascii_case("false") {
                    Some(Lit::Bool(false))
                } else if word.eq_ignore_ascii_case("empty") {
                    Some(Lit::Empty)
                } else {
                    self.handler.error(
                        codes::E_MALFORMED_LITERAL,
                        format!("`_{word}_` is not a literal"),
                        self.token_span(),
                    );
                    None
                }
            }
            _ => {
                self.handler.error(
                    codes::E_MALFORMED_LITERAL,
                    "expected a literal after `_`",
                    self.token_span(),
                );
                None
            }
        };

        match lit {
            Some(lit) if self.cursor.eat('_') => self.make(TokenKind::Literal(lit)),
            Some(_) => {
                self.handler.error(
                    codes::E_MALFORMED_LITERAL,
                    "unterminated `_`-wrapped literal",
                    self.token_span(),
                );
                self.make(TokenKind::Illegal(self.lexeme()))
            }
            None => {
                // Consume the closing delimiter so it does not open a new
                // literal on the next call.
                self.cursor.eat('_');
                self.make(TokenKind::Illegal(self.lexeme()))
            }
        }
    }

    /// Digits with optional leading `-` and optional `.digits`.
    /// No scientific notation.
    fn scan_numeric_lit(&mut self) -> Option<Lit> {
        let start = self.cursor.position();
        self.cursor.eat('-');
        self.cursor.advance_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.cursor.current() == '.' && self.cursor.peek(1).is_ascii_digit() {
            is_float = true;
            self.cursor.advance();
            self.cursor.advance_while(|c| c.is_ascii_digit());
        }
        let text = self.cursor.slice(start, self.cursor.position());
        let parsed = if is_float {
            text.parse::<f64>().ok().map(Lit::Float)
        } else {
            text.parse::<i64>().ok().map(Lit::Int)
        };
        if parsed.is_none() {
            self.handler.error(
                codes::E_MALFORMED_LITERAL,
                format!("malformed number `{text}`"),
                self.token_span(),
            );
        }
        parsed
    }

    /// A quoted string. Backslash escapes the quote character and itself;
    /// any other backslash sequence is kept verbatim. A string whose content
    /// is a valid absolute URL becomes a URL literal.
    fn scan_string_lit(&mut self) -> Option<Lit> {
        let quote = self.cursor.advance();
        let mut value = String::new();
        loop {
            match self.cursor.current() {
                '\0' | '\n' => {
                    self.handler.error(
                        codes::E_UNTERMINATED_STRING,
                        "unterminated string literal",
                        self.token_span(),
                    );
                    return None;
                }
                '\\' => {
                    let next = self.cursor.peek(1);
                    if next == quote || next == '\\' {
                        self.cursor.advance();
                        value.push(self.cursor.advance());
                    } else {
                        value.push(self.cursor.advance());
                    }
                }
                c if c == quote => {
                    self.cursor.advance();
                    break;
                }
                _ => value.push(self.cursor.advance()),
            }
        }
        let sym = Symbol::intern(&value);
        if url::Url::parse(&value).is_ok() {
            Some(Lit::Url(sym))
        } else {
            Some(Lit::Str(sym))
        }
    }

    fn lex_string(&mut self) -> Token {
        match self.scan_string_lit() {
            Some(lit) => self.make(TokenKind::Literal(lit)),
            None => self.make(TokenKind::Illegal(self.lexeme())),
        }
    }

    /// `` `name with spaces` `` — contents are taken verbatim.
    fn lex_backtick_ident(&mut self) -> Token {
        self.cursor.advance(); // opening backtick
        let start = self.cursor.position();
        self.cursor.advance_while(|c| c != '`' && c != '\n');
        let name = self.cursor.slice(start, self.cursor.position());
        if !self.cursor.eat('`') {
            self.handler.error(
                codes::E_UNTERMINATED_IDENT,
                "unterminated backtick identifier",
                self.token_span(),
            );
            return self.make(TokenKind::Illegal(self.lexeme()));
        }
        self.make(TokenKind::Ident(Symbol::intern(name)))
    }

    /// `**Set**` resolves to the keyword iff the delimited content is a
    /// known keyword or operator phrase; otherwise the content is lexed as
    /// its constituent tokens and only the markers are dropped.
    fn lex_bold(&mut self) -> Token {
        self.cursor.advance();
        self.cursor.advance();

        if self.in_bold {
            // Closing delimiter of a failed bold span.
            self.in_bold = false;
            return self.next_token();
        }

        let saved = self.cursor.checkpoint();
        let mut words: Vec<String> = Vec::new();
        loop {
            while self.cursor.current() == ' ' {
                self.cursor.advance();
            }
            if self.cursor.starts_with("**") {
                break;
            }
            if !is_word_start(self.cursor.current()) {
                // Not a plain word sequence; give up on keyword matching.
                words.clear();
                break;
            }
            let start = self.cursor.position();
            self.cursor.advance_while(is_word_char);
            words.push(
                self.cursor
                    .slice(start, self.cursor.position())
                    .to_ascii_lowercase(),
            );
        }

        let kind = match words.len() {
            0 => None,
            1 => keyword_from_word(&words[0])
                .map(TokenKind::Keyword)
                .or_else(|| op_from_word(&words[0]).map(TokenKind::Op)),
            n => {
                let refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
                match phrase::match_phrase(&refs) {
                    Some((len, PhraseKind::Keyword(kw))) if len == n => {
                        Some(TokenKind::Keyword(kw))
                    }
                    Some((len, PhraseKind::Op(op))) if len == n => Some(TokenKind::Op(op)),
                    _ => None,
                }
            }
        };

        match kind {
            Some(kind) => {
                self.cursor.advance();
                self.cursor.advance();
                self.make(kind)
            }
            None => {
                self.cursor.restore(saved);
                self.handler.error(
                    codes::E_UNKNOWN_BOLD_KEYWORD,
                    "bold marker does not wrap a known keyword",
                    self.token_span(),
                );
                self.in_bold = true;
                self.next_token()
            }
        }
    }

    /// `<summary>…</summary>` is a comment; `<details>`/`</details>` are
    /// structural; any other `<` is an illegal character.
    fn lex_tag(&mut self) -> Token {
        if self.cursor.starts_with("<details>") {
            for _ in 0.."<details>".len() {
                self.cursor.advance();
            }
            return self.make(TokenKind::Punct(Punct::DetailsOpen));
        }
        if self.cursor.starts_with("</details>") {
            for _ in 0.."</details>".len() {
                self.cursor.advance();
            }
            return self.make(TokenKind::Punct(Punct::DetailsClose));
        }
        if self.cursor.starts_with("<summary>") {
            for _ in 0.."<summary>".len() {
                self.cursor.advance();
            }
            let start = self.cursor.position();
            while !self.cursor.is_at_end() && !self.cursor.starts_with("</summary>") {
                self.cursor.advance();
            }
            let content = self.cursor.slice(start, self.cursor.position());
            if self.cursor.is_at_end() {
                self.handler.error(
                    codes::E_UNTERMINATED_COMMENT,
                    "unterminated `<summary>` comment",
                    self.token_span(),
                );
                return self.make(TokenKind::Illegal(self.lexeme()));
            }
            for _ in 0.."</summary>".len() {
                self.cursor.advance();
            }
            return self.make(TokenKind::Comment(Symbol::intern(content.trim())));
        }
        self.cursor.advance();
        self.handler.error(
            codes::E_ILLEGAL_CHAR,
            "illegal character `<`",
            self.token_span(),
        );
        self.make(TokenKind::Illegal(self.lexeme()))
    }

    fn lex_number(&mut self) -> Token {
        match self.scan_numeric_lit() {
            Some(lit) => self.make(TokenKind::Literal(lit)),
            None => self.make(TokenKind::Illegal(self.lexeme())),
        }
    }

    /// A bare word: the start of a phrase, a keyword, a stopword, or an
    /// identifier. Phrase matching collects up to [`MAX_PHRASE_WORDS`]
    /// words and keeps the longest known phrase, rewinding the rest.
    fn lex_word(&mut self) -> Token {
        let first_start = self.cursor.position();
        self.cursor.advance_while(is_word_char);
        let first = self.cursor.slice(first_start, self.cursor.position());

        let mut words = vec![first.to_ascii_lowercase()];
        let mut ends = vec![self.cursor.checkpoint()];

        while words.len() < MAX_PHRASE_WORDS {
            let probe = self.cursor.checkpoint();
            while self.cursor.current() == ' ' || self.cursor.current() == '\t' {
                self.cursor.advance();
            }
            if !is_word_start(self.cursor.current()) {
                self.cursor.restore(probe);
                break;
            }
            let start = self.cursor.position();
            self.cursor.advance_while(is_word_char);
            words.push(
                self.cursor
                    .slice(start, self.cursor.position())
                    .to_ascii_lowercase(),
            );
            ends.push(self.cursor.checkpoint());
        }

        let refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
        if let Some((len, kind)) = phrase::match_phrase(&refs) {
            self.cursor.restore(ends[len - 1]);
            return match kind {
                PhraseKind::Keyword(kw) => self.make(TokenKind::Keyword(kw)),
                PhraseKind::Op(op) => self.make(TokenKind::Op(op)),
            };
        }

        // Single word.
        self.cursor.restore(ends[0]);
        if let Some(kw) = keyword_from_word(first) {
            self.make(TokenKind::Keyword(kw))
        } else if let Some(op) = op_from_word(first) {
            self.make(TokenKind::Op(op))
        } else if is_stopword(first) {
            self.make(TokenKind::Stopword(Symbol::intern(first)))
        } else {
            self.make(TokenKind::Ident(Symbol::intern(first)))
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        self.cursor.advance();
        self.make(kind)
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), self.token_span())
    }

    fn lexeme(&self) -> Symbol {
        Symbol::intern(self.cursor.slice(self.token_start, self.cursor.position()))
    }

    fn token_span(&self) -> Span {
        Span::new(
            self.token_start,
            self.cursor.position(),
            self.token_start_line,
            self.token_start_column,
        )
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields tokens up to and including the first `Eof`, then `None`.
    fn next(&mut self) -> Option<Token> {
        if self.eof_emitted {
            return None;
        }
        let token = self.next_token();
        if token.is_eof() {
            self.eof_emitted = true;
        }
        Some(token)
    }
}

/// Lex an entire source into a token vector ending with `Eof`.
pub fn tokenize(source: &str, handler: &Handler) -> Vec<Token> {
    let mut lexer = Lexer::new(source, handler);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.is_eof();
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
