//! Source-level understanding of ES modules
//!
//! This module contains the tokenizer and the declaration parser that
//! recognizes the import/export forms the bundler supports, plus the
//! rewrites used to strip module syntax from a module body.

pub mod declarations;
pub mod lexer;

pub use declarations::{
    ExportDeclaration, ImportDeclaration, ImportKind, ImportSpecifier, ParsedModule, Rewrite,
    parse_module, strip_module_syntax,
};
pub use lexer::{Lexer, Span, Token, TokenKind, tokenize};

/// A syntax problem found while reading module declarations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset into the module source
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    /// 1-based line of the error inside `source`
    pub fn line(&self, source: &str) -> usize {
        line_col(source, self.offset).0
    }
}

/// Convert a byte offset into a 1-based (line, column) pair
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.len(), |newline| before.len() - newline - 1)
        + 1;
    (line, column)
}

/// Cursor over a token vector with the small lookahead helpers the parsers need
#[derive(Debug)]
pub struct TokenStream<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
        }
    }

    pub fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + n)
    }

    /// The token before the cursor, if any
    pub fn previous(&self) -> Option<&Token<'a>> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    pub fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn eat_punct(&mut self, c: char) -> Option<Token<'a>> {
        if self.peek().is_some_and(|t| t.is_punct(c)) {
            self.bump()
        } else {
            None
        }
    }

    pub fn eat_ident(&mut self, name: &str) -> Option<Token<'a>> {
        if self.peek().is_some_and(|t| t.is_ident(name)) {
            self.bump()
        } else {
            None
        }
    }

    /// Offset to report for an error at the cursor
    pub fn offset(&self) -> usize {
        self.peek()
            .or_else(|| self.previous())
            .map_or(0, |t| t.span.start)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}
