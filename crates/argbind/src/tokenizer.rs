//! Delimiter-aware, quote-respecting tokenizer.
//!
//! Not specific to command lines: the boolean expression parser uses it
//! directly, and it is public so callers can lex their own mini-languages.

/// What to do with whitespace between tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitespaceBehavior {
    /// Whitespace splits tokens and every whitespace character becomes a token.
    DelimitAndInclude,
    /// Whitespace splits tokens and is dropped.
    #[default]
    DelimitAndExclude,
    /// Whitespace is ordinary token content.
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Literal,
    /// Text that was wrapped in double quotes (quotes stripped).
    Quoted,
    Delimiter,
    Whitespace,
}

/// Something the scanner noticed but leaves to the token factory to judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenIssue {
    TrailingEscape,
    UnterminatedQuote,
}

/// A scanned token before it goes through the caller's factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub value: String,
    pub kind: TokenKind,
    /// Byte offset of the first character (including an opening quote).
    pub start: usize,
    pub issue: Option<TokenIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct TokenizerError {
    pub message: String,
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    delimiters: Vec<char>,
    whitespace: WhitespaceBehavior,
    escape: Option<char>,
    double_quotes: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            delimiters: Vec::new(),
            whitespace: WhitespaceBehavior::default(),
            escape: Some('\\'),
            double_quotes: true,
        }
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters that always form a single-character token of their own.
    pub fn delimiters(mut self, delimiters: impl IntoIterator<Item = char>) -> Self {
        for d in delimiters {
            if !self.delimiters.contains(&d) {
                self.delimiters.push(d);
            }
        }
        self
    }

    pub fn whitespace(mut self, behavior: WhitespaceBehavior) -> Self {
        self.whitespace = behavior;
        self
    }

    /// Set (or clear) the escape character. Default is `\`.
    pub fn escape(mut self, escape: Option<char>) -> Self {
        self.escape = escape;
        self
    }

    /// Whether `"..."` groups a literal token. Default is on.
    pub fn double_quotes(mut self, enabled: bool) -> Self {
        self.double_quotes = enabled;
        self
    }

    /// Tokenize with the built-in factory, which rejects trailing escapes and
    /// unterminated quotes.
    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, TokenizerError> {
        self.tokenize_with(input, |raw| match raw.issue {
            Some(TokenIssue::TrailingEscape) => Err(TokenizerError {
                message: "Unexpected end of input after escape character".to_string(),
                position: raw.start,
            }),
            Some(TokenIssue::UnterminatedQuote) => Err(TokenizerError {
                message: "Unterminated quoted string".to_string(),
                position: raw.start,
            }),
            None => Ok(Token {
                value: raw.value,
                kind: raw.kind,
                start: raw.start,
            }),
        })
    }

    /// Tokenize, handing every scanned token to `factory`.
    ///
    /// The first factory error aborts tokenization.
    pub fn tokenize_with<T, E, F>(&self, input: &str, mut factory: F) -> Result<Vec<T>, E>
    where
        F: FnMut(RawToken) -> Result<T, E>,
    {
        let raw = self.scan(input);
        let mut out = Vec::with_capacity(raw.len());
        for token in raw {
            out.push(factory(token)?);
        }
        Ok(out)
    }

    fn scan(&self, input: &str) -> Vec<RawToken> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut current_start: Option<usize> = None;
        let mut in_quotes = false;
        let mut escaping = false;

        fn flush(
            tokens: &mut Vec<RawToken>,
            current: &mut String,
            start: &mut Option<usize>,
            kind: TokenKind,
        ) {
            if let Some(s) = start.take() {
                if !current.is_empty() || kind == TokenKind::Quoted {
                    tokens.push(RawToken {
                        value: std::mem::take(current),
                        kind,
                        start: s,
                        issue: None,
                    });
                }
            }
            current.clear();
        }

        for (idx, c) in input.char_indices() {
            if escaping {
                current.push(c);
                escaping = false;
                continue;
            }

            if self.escape == Some(c) {
                escaping = true;
                current_start.get_or_insert(idx);
                continue;
            }

            if self.double_quotes && c == '"' {
                if in_quotes {
                    in_quotes = false;
                    flush(&mut tokens, &mut current, &mut current_start, TokenKind::Quoted);
                } else {
                    flush(&mut tokens, &mut current, &mut current_start, TokenKind::Literal);
                    in_quotes = true;
                    current_start = Some(idx);
                }
                continue;
            }

            if in_quotes {
                current.push(c);
                continue;
            }

            if self.delimiters.contains(&c) {
                flush(&mut tokens, &mut current, &mut current_start, TokenKind::Literal);
                tokens.push(RawToken {
                    value: c.to_string(),
                    kind: TokenKind::Delimiter,
                    start: idx,
                    issue: None,
                });
                continue;
            }

            if c.is_whitespace() {
                match self.whitespace {
                    WhitespaceBehavior::Include => {
                        current_start.get_or_insert(idx);
                        current.push(c);
                    }
                    WhitespaceBehavior::DelimitAndInclude => {
                        flush(&mut tokens, &mut current, &mut current_start, TokenKind::Literal);
                        tokens.push(RawToken {
                            value: c.to_string(),
                            kind: TokenKind::Whitespace,
                            start: idx,
                            issue: None,
                        });
                    }
                    WhitespaceBehavior::DelimitAndExclude => {
                        flush(&mut tokens, &mut current, &mut current_start, TokenKind::Literal);
                    }
                }
                continue;
            }

            current_start.get_or_insert(idx);
            current.push(c);
        }

        if in_quotes {
            tokens.push(RawToken {
                value: std::mem::take(&mut current),
                kind: TokenKind::Quoted,
                start: current_start.unwrap_or(input.len()),
                issue: Some(TokenIssue::UnterminatedQuote),
            });
        } else if escaping {
            tokens.push(RawToken {
                value: std::mem::take(&mut current),
                kind: TokenKind::Literal,
                start: current_start.unwrap_or(input.len()),
                issue: Some(TokenIssue::TrailingEscape),
            });
        } else {
            flush(&mut tokens, &mut current, &mut current_start, TokenKind::Literal);
        }

        tokens
    }
}
