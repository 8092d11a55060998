//! Tokenizer for exported declarations.
//!
//! Only the handful of tokens that can appear in a C function prototype are
//! recognised. Whitespace, newlines and comments separate tokens and are
//! otherwise dropped, which is what makes multi-line declarations and
//! differently spaced declarations compare equal after parsing.

use std::fmt;

/// A single token of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Identifier or keyword.
    Ident(&'a str),
    /// `*`
    Star,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `...`
    Ellipsis,
    /// `;`
    Semi,
    /// Any other character.
    Other(char),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => f.write_str(s),
            Token::Star => f.write_str("*"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Ellipsis => f.write_str("..."),
            Token::Semi => f.write_str(";"),
            Token::Other(c) => write!(f, "{c}"),
        }
    }
}

/// Iterator over the tokens of a declaration.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `src`.
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Byte offset just past the last token returned.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Skips whitespace and comments. An unterminated block comment runs to
    /// the end of the input.
    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if let Some(body) = trimmed.strip_prefix("//") {
                self.pos += 2 + body.find('\n').unwrap_or(body.len());
            } else if let Some(body) = trimmed.strip_prefix("/*") {
                self.pos += 2 + body.find("*/").map_or(body.len(), |end| end + 2);
            } else {
                return;
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();
        let rest = self.rest();
        let c = rest.chars().next()?;

        if is_ident_char(c) {
            let len = rest.find(|c| !is_ident_char(c)).unwrap_or(rest.len());
            self.pos += len;
            return Some(Token::Ident(&rest[..len]));
        }
        if rest.starts_with("...") {
            self.pos += 3;
            return Some(Token::Ellipsis);
        }

        self.pos += c.len_utf8();
        Some(match c {
            '*' => Token::Star,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ';' => Token::Semi,
            other => Token::Other(other),
        })
    }
}

/// Tokenizes `src` completely.
#[must_use]
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    Lexer::new(src).collect()
}
