//! Tokenizer for the slice of JavaScript the bundler has to understand.
//!
//! The lexer never builds an AST. It produces a flat token stream where
//! comments are dropped and string, template and regular-expression literals
//! are opaque single tokens, so an `import` or `export` inside one of them can
//! never be mistaken for a statement.

use log::trace;

/// Byte range into the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Ident(&'a str),
    /// String literal, escapes resolved
    Str(String),
    Template,
    Number,
    Regex,
    Punct(char),
    /// String, template or regex literal that runs into a line end or EOF
    Unterminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one
    pub newline_before: bool,
}

impl Token<'_> {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self.kind, TokenKind::Ident(ident) if ident == name)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn ident(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// Whether a line starting with this token would extend an unterminated
    /// statement on the line before it
    pub fn continues_previous_line(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Punct('(' | '[' | '+' | '-' | '/') | TokenKind::Template | TokenKind::Regex
        )
    }
}

/// Keywords after which a `/` starts a regular expression rather than a division
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// Statement keywords whose parenthesized head is followed by a statement
const CONTROL_HEAD_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

/// The last token read, as far as regex detection needs it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Previous<'a> {
    Start,
    Ident(&'a str),
    Punct(char),
    Literal,
}

impl<'a> Previous<'a> {
    fn of(kind: &TokenKind<'a>) -> Self {
        match kind {
            TokenKind::Ident(word) => Self::Ident(*word),
            TokenKind::Punct(c) => Self::Punct(*c),
            _ => Self::Literal,
        }
    }
}

#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    newline_before: bool,
    regex_allowed: bool,
    previous: Previous<'a>,
    /// One entry per open `(`: whether it opened an `if`/`while`/`for` head
    paren_heads: Vec<bool>,
    /// One entry per open `{`: whether it opened a block rather than an object literal
    brace_blocks: Vec<bool>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Self {
            input,
            pos: 0,
            newline_before: false,
            regex_allowed: true,
            previous: Previous::Start,
            paren_heads: Vec::new(),
            brace_blocks: Vec::new(),
        };
        if input.starts_with("#!") {
            lexer.skip_line();
        }
        lexer
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while let Some(c) = self.bump() {
            if c == '\n' {
                self.newline_before = true;
            } else if c == '*' && self.peek_char() == Some('/') {
                self.bump();
                return;
            }
        }
    }

    /// Skip whitespace and comments, recording whether a newline was crossed
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek_char() {
            match c {
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.newline_before = true;
                    self.bump();
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                '/' if self.peek_second() == Some('/') => self.skip_line(),
                '/' if self.peek_second() == Some('*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn read_ident(&mut self, start: usize) -> TokenKind<'a> {
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(&self.input[start..self.pos])
    }

    fn read_number(&mut self) -> TokenKind<'a> {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Number
    }

    fn read_string(&mut self, quote: char) -> TokenKind<'a> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return TokenKind::Unterminated,
                Some(c) if c == quote => return TokenKind::Str(value),
                Some('\\') => match self.bump() {
                    None => return TokenKind::Unterminated,
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    // line continuation
                    Some('\n') => {}
                    Some(c) => value.push(c),
                },
                Some(c) => value.push(c),
            }
        }
    }

    /// Read the rest of a template literal after its opening backtick
    fn read_template(&mut self) -> TokenKind<'a> {
        loop {
            match self.bump() {
                None => return TokenKind::Unterminated,
                Some('`') => return TokenKind::Template,
                Some('\\') => {
                    self.bump();
                }
                Some('$') if self.peek_char() == Some('{') => {
                    self.bump();
                    if !self.skip_substitution() {
                        return TokenKind::Unterminated;
                    }
                }
                Some(_) => {}
            }
        }
    }

    /// Skip a `${ ... }` substitution, including nested literals and braces.
    /// Returns false when the input ends first.
    fn skip_substitution(&mut self) -> bool {
        let mut depth = 1usize;
        while let Some(c) = self.peek_char() {
            match c {
                '\'' | '"' => {
                    self.bump();
                    self.read_string(c);
                }
                '`' => {
                    self.bump();
                    if self.read_template() == TokenKind::Unterminated {
                        return false;
                    }
                }
                '/' if self.peek_second() == Some('/') => self.skip_line(),
                '/' if self.peek_second() == Some('*') => self.skip_block_comment(),
                '{' => {
                    depth += 1;
                    self.bump();
                }
                '}' => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
        false
    }

    /// Read the rest of a regular expression literal after its opening slash
    fn read_regex(&mut self) -> TokenKind<'a> {
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') => return TokenKind::Unterminated,
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        // flags
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Regex
    }

    /// Whether a `{` read after the previous token opens a block
    fn opens_block(&self) -> bool {
        match self.previous {
            Previous::Start => true,
            Previous::Punct(c) => matches!(c, ')' | ';' | '{' | '}'),
            Previous::Ident(word) => {
                matches!(word, "else" | "do") || !REGEX_PRECEDING_KEYWORDS.contains(&word)
            }
            Previous::Literal => false,
        }
    }

    /// Decide whether a `/` after `kind` starts a regex, tracking brackets
    fn allows_regex_after(&mut self, kind: &TokenKind<'_>) -> bool {
        match kind {
            TokenKind::Punct('(') => {
                let head = matches!(
                    self.previous,
                    Previous::Ident(word) if CONTROL_HEAD_KEYWORDS.contains(&word)
                );
                self.paren_heads.push(head);
                true
            }
            // `if (x) /re/` but `(a) / b`
            TokenKind::Punct(')') => self.paren_heads.pop().unwrap_or(false),
            TokenKind::Punct('{') => {
                let block = self.opens_block();
                self.brace_blocks.push(block);
                true
            }
            // a statement may follow a block, an object literal is an operand
            TokenKind::Punct('}') => self.brace_blocks.pop().unwrap_or(true),
            TokenKind::Punct(c) => *c != ']',
            TokenKind::Ident(word) => REGEX_PRECEDING_KEYWORDS.contains(word),
            _ => false,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.newline_before = false;
        self.skip_trivia();

        let start = self.pos;
        let c = self.bump()?;
        let kind = match c {
            c if is_ident_start(c) => self.read_ident(start),
            c if c.is_ascii_digit() => self.read_number(),
            '\'' | '"' => self.read_string(c),
            '`' => self.read_template(),
            '/' if self.regex_allowed => self.read_regex(),
            c => TokenKind::Punct(c),
        };

        self.regex_allowed = self.allows_regex_after(&kind);
        self.previous = Previous::of(&kind);
        let token = Token {
            kind,
            span: Span::new(start, self.pos),
            newline_before: self.newline_before,
        };
        trace!("token {:?} at {}..{}", token.kind, start, self.pos);
        Some(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\u{200c}' || c == '\u{200d}'
}

/// Tokenize a whole source text
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}
