//! Import/export declaration discovery.
//!
//! Walks the token stream and recognizes module statements at the top level
//! only (brace, bracket and paren depth zero). For each statement it records
//! the declaration and the rewrite that removes its module syntax, so the
//! same pass drives both graph construction and concatenation.

use std::fmt;

use log::debug;

use super::{Span, SyntaxError, Token, TokenKind, TokenStream};

/// A single binding inside `import { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Name exported by the target module
    pub imported: String,
    /// Name bound in the importing module
    pub local: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    Named,
    Default,
    Namespace,
    SideEffect,
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named => write!(f, "named"),
            Self::Default => write!(f, "default"),
            Self::Namespace => write!(f, "namespace"),
            Self::SideEffect => write!(f, "side-effect"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDeclaration {
    /// `import { a, b as c } from 'src'`
    Named {
        specifiers: Vec<ImportSpecifier>,
        source: String,
    },
    /// `import name from 'src'`
    Default { local: String, source: String },
    /// `import * as name from 'src'`
    Namespace { local: String, source: String },
    /// `import 'src'`
    SideEffect { source: String },
}

impl ImportDeclaration {
    pub fn kind(&self) -> ImportKind {
        match self {
            Self::Named { .. } => ImportKind::Named,
            Self::Default { .. } => ImportKind::Default,
            Self::Namespace { .. } => ImportKind::Namespace,
            Self::SideEffect { .. } => ImportKind::SideEffect,
        }
    }

    /// The specifier exactly as written
    pub fn source(&self) -> &str {
        match self {
            Self::Named { source, .. }
            | Self::Default { source, .. }
            | Self::Namespace { source, .. }
            | Self::SideEffect { source } => source,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default { .. })
    }

    /// Local names this declaration introduces
    pub fn bound_names(&self) -> Vec<&str> {
        match self {
            Self::Named { specifiers, .. } => {
                specifiers.iter().map(|s| s.local.as_str()).collect()
            }
            Self::Default { local, .. } | Self::Namespace { local, .. } => vec![local.as_str()],
            Self::SideEffect { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportDeclaration {
    Named { name: String },
    Default,
}

impl ExportDeclaration {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named { name: name.into() }
    }

    /// Exported identifier, or `"default"` for the default export
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name } => name,
            Self::Default => "default",
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

/// Replace `span` of the source with `replacement` when stripping module syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rewrite {
    pub span: Span,
    pub replacement: &'static str,
}

impl Rewrite {
    const fn remove(span: Span) -> Self {
        Self {
            span,
            replacement: "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedModule {
    pub imports: Vec<ImportDeclaration>,
    pub exports: Vec<ExportDeclaration>,
    /// Ordered by position, non-overlapping
    pub rewrites: Vec<Rewrite>,
}

struct DeclarationParser<'a> {
    stream: TokenStream<'a>,
    parsed: ParsedModule,
}

impl<'a> DeclarationParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            stream: TokenStream::new(source),
            parsed: ParsedModule::default(),
        }
    }

    fn run(mut self) -> Result<ParsedModule, SyntaxError> {
        let mut depth = 0usize;
        while let Some(token) = self.stream.peek() {
            let after_dot = self.stream.previous().is_some_and(|t| t.is_punct('.'));
            match token.kind {
                TokenKind::Punct('{' | '(' | '[') => {
                    depth += 1;
                    self.stream.bump();
                }
                TokenKind::Punct('}' | ')' | ']') => {
                    depth = depth.saturating_sub(1);
                    self.stream.bump();
                }
                TokenKind::Ident("import") if depth == 0 && !after_dot => self.parse_import()?,
                TokenKind::Ident("export") if depth == 0 && !after_dot => self.parse_export()?,
                _ => {
                    self.stream.bump();
                }
            }
        }
        Ok(self.parsed)
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.stream.peek().and_then(Token::ident) {
            Some(ident) => {
                let ident = ident.to_owned();
                self.stream.bump();
                Ok(ident)
            }
            None => Err(SyntaxError::new(
                format!("expected {what}"),
                self.stream.offset(),
            )),
        }
    }

    /// Module specifier string; returns the value and the end of its token
    fn expect_specifier(&mut self) -> Result<(String, usize), SyntaxError> {
        let offset = self.stream.offset();
        match self.stream.bump() {
            Some(Token {
                kind: TokenKind::Str(value),
                span,
                ..
            }) => Ok((value, span.end)),
            Some(Token {
                kind: TokenKind::Unterminated,
                ..
            }) => Err(SyntaxError::new("unterminated module specifier", offset)),
            _ => Err(SyntaxError::new("expected a module specifier string", offset)),
        }
    }

    /// Statement end: swallow a `;` on the same line. A `;` that starts the
    /// next line guards the statement after it and stays.
    fn statement_end(&mut self, end: usize) -> usize {
        if self
            .stream
            .peek()
            .is_some_and(|t| t.is_punct(';') && !t.newline_before)
        {
            return self.stream.bump().map_or(end, |semi| semi.span.end);
        }
        end
    }

    /// Remove a whole statement. A `;` is left behind when the next token
    /// would otherwise join the line before the statement.
    fn remove_statement(&self, start: usize, end: usize) -> Rewrite {
        let replacement = if self
            .stream
            .peek()
            .is_some_and(Token::continues_previous_line)
        {
            ";"
        } else {
            ""
        };
        Rewrite {
            span: Span::new(start, end),
            replacement,
        }
    }

    /// Name inside `{ ... }` lists; string names are allowed for arbitrary exports
    fn list_name(&mut self) -> Result<String, SyntaxError> {
        let offset = self.stream.offset();
        match self.stream.bump().map(|t| t.kind) {
            Some(TokenKind::Ident(ident)) => Ok(ident.to_owned()),
            Some(TokenKind::Str(value)) => Ok(value),
            _ => Err(SyntaxError::new("expected a binding name", offset)),
        }
    }

    /// Parse `{ a, b as c }` into (name, alias) pairs; the cursor is on `{`
    fn braced_list(&mut self) -> Result<Vec<(String, String)>, SyntaxError> {
        self.stream.bump();
        let mut entries = Vec::new();
        loop {
            if self.stream.eat_punct('}').is_some() {
                return Ok(entries);
            }
            let name = self.list_name()?;
            let alias = if self.stream.eat_ident("as").is_some() {
                self.list_name()?
            } else {
                name.clone()
            };
            entries.push((name, alias));
            if self.stream.eat_punct(',').is_some() {
                continue;
            }
            if self.stream.eat_punct('}').is_some() {
                return Ok(entries);
            }
            return Err(SyntaxError::new(
                "expected `,` or `}` in binding list",
                self.stream.offset(),
            ));
        }
    }

    fn parse_import(&mut self) -> Result<(), SyntaxError> {
        let Some(keyword) = self.stream.bump() else {
            return Ok(());
        };
        let start = keyword.span.start;

        // `import(...)` and `import.meta` are expressions
        if self
            .stream
            .peek()
            .is_some_and(|t| t.is_punct('(') || t.is_punct('.'))
        {
            return Ok(());
        }

        if matches!(
            self.stream.peek().map(|t| &t.kind),
            Some(TokenKind::Str(_) | TokenKind::Unterminated)
        ) {
            let (source, end) = self.expect_specifier()?;
            let end = self.statement_end(end);
            debug!("side-effect import of '{source}'");
            self.parsed
                .imports
                .push(ImportDeclaration::SideEffect { source });
            let rewrite = self.remove_statement(start, end);
            self.parsed.rewrites.push(rewrite);
            return Ok(());
        }

        let mut default_local = None;
        let mut namespace_local = None;
        let mut named = None;

        if self.stream.peek().is_some_and(|t| t.ident().is_some()) {
            default_local = Some(self.expect_ident("a default import binding")?);
            if self.stream.eat_punct(',').is_none() {
                return self.finish_import(start, default_local, namespace_local, named);
            }
        }

        if self.stream.eat_punct('*').is_some() {
            if self.stream.eat_ident("as").is_none() {
                return Err(SyntaxError::new(
                    "expected `as` after `import *`",
                    self.stream.offset(),
                ));
            }
            namespace_local = Some(self.expect_ident("a namespace binding")?);
        } else if self.stream.peek().is_some_and(|t| t.is_punct('{')) {
            named = Some(self.braced_list()?);
        } else {
            return Err(SyntaxError::new(
                "unrecognized import clause",
                self.stream.offset(),
            ));
        }

        self.finish_import(start, default_local, namespace_local, named)
    }

    fn finish_import(
        &mut self,
        start: usize,
        default_local: Option<String>,
        namespace_local: Option<String>,
        named: Option<Vec<(String, String)>>,
    ) -> Result<(), SyntaxError> {
        if self.stream.eat_ident("from").is_none() {
            return Err(SyntaxError::new(
                "expected `from` after import clause",
                self.stream.offset(),
            ));
        }
        let (source, end) = self.expect_specifier()?;
        let end = self.statement_end(end);

        if let Some(local) = default_local {
            self.parsed.imports.push(ImportDeclaration::Default {
                local,
                source: source.clone(),
            });
        }
        if let Some(local) = namespace_local {
            self.parsed.imports.push(ImportDeclaration::Namespace {
                local,
                source: source.clone(),
            });
        }
        if let Some(entries) = named {
            let specifiers = entries
                .into_iter()
                .map(|(imported, local)| ImportSpecifier { imported, local })
                .collect();
            self.parsed
                .imports
                .push(ImportDeclaration::Named { specifiers, source });
        }
        let rewrite = self.remove_statement(start, end);
        self.parsed.rewrites.push(rewrite);
        Ok(())
    }

    fn parse_export(&mut self) -> Result<(), SyntaxError> {
        let Some(keyword) = self.stream.bump() else {
            return Ok(());
        };
        let start = keyword.span.start;
        let Some(next) = self.stream.peek().cloned() else {
            return Err(SyntaxError::new("dangling `export`", start));
        };
        // removes `export ` and leaves the declaration in place
        let keyword_only = Rewrite::remove(Span::new(start, next.span.start));

        match next.kind {
            TokenKind::Punct('*') => Err(SyntaxError::new(
                "re-exports (`export * from`) are not supported",
                start,
            )),
            TokenKind::Punct('{') => {
                let entries = self.braced_list()?;
                if self.stream.peek().is_some_and(|t| t.is_ident("from")) {
                    return Err(SyntaxError::new(
                        "re-exports (`export { ... } from`) are not supported",
                        start,
                    ));
                }
                let end = self
                    .stream
                    .previous()
                    .map_or(next.span.end, |t| t.span.end);
                let end = self.statement_end(end);
                for (_, exported) in entries {
                    self.parsed.exports.push(if exported == "default" {
                        ExportDeclaration::Default
                    } else {
                        ExportDeclaration::Named { name: exported }
                    });
                }
                let rewrite = self.remove_statement(start, end);
                self.parsed.rewrites.push(rewrite);
                Ok(())
            }
            TokenKind::Ident("default") => {
                self.stream.bump();
                self.parse_export_default(start)
            }
            TokenKind::Ident("function") => {
                self.stream.bump();
                self.stream.eat_punct('*');
                let name = self.expect_ident("a function name")?;
                self.parsed.exports.push(ExportDeclaration::named(name));
                self.parsed.rewrites.push(keyword_only);
                Ok(())
            }
            TokenKind::Ident("async") => {
                self.stream.bump();
                if self.stream.eat_ident("function").is_none() {
                    return Err(SyntaxError::new(
                        "expected `function` after `export async`",
                        self.stream.offset(),
                    ));
                }
                self.stream.eat_punct('*');
                let name = self.expect_ident("a function name")?;
                self.parsed.exports.push(ExportDeclaration::named(name));
                self.parsed.rewrites.push(keyword_only);
                Ok(())
            }
            TokenKind::Ident("class") => {
                self.stream.bump();
                let name = self.expect_ident("a class name")?;
                self.parsed.exports.push(ExportDeclaration::named(name));
                self.parsed.rewrites.push(keyword_only);
                Ok(())
            }
            TokenKind::Ident("const" | "let" | "var") => {
                self.stream.bump();
                let names = self.declarator_names()?;
                self.parsed
                    .exports
                    .extend(names.into_iter().map(ExportDeclaration::named));
                self.parsed.rewrites.push(keyword_only);
                Ok(())
            }
            _ => Err(SyntaxError::new("unsupported export form", start)),
        }
    }

    /// Cursor is just past `export default`
    fn parse_export_default(&mut self, start: usize) -> Result<(), SyntaxError> {
        let Some(value) = self.stream.peek().cloned() else {
            return Err(SyntaxError::new("missing value after `export default`", start));
        };
        self.parsed.exports.push(ExportDeclaration::Default);

        let is_named_declaration = match value.kind {
            TokenKind::Ident("function") => self.declaration_name_follows(1),
            TokenKind::Ident("async")
                if self
                    .stream
                    .peek_nth(1)
                    .is_some_and(|t| t.is_ident("function")) =>
            {
                self.declaration_name_follows(2)
            }
            TokenKind::Ident("class") => self
                .stream
                .peek_nth(1)
                .and_then(Token::ident)
                .is_some_and(|name| name != "extends"),
            _ => false,
        };
        let is_anonymous_declaration = !is_named_declaration
            && (value.is_ident("function")
                || value.is_ident("class")
                || (value.is_ident("async")
                    && self.stream.peek_nth(1).is_some_and(|t| t.is_ident("function"))));

        // An object literal or anonymous declaration cannot start a statement
        let replacement = if value.is_punct('{') || is_anonymous_declaration {
            "void "
        } else if value.continues_previous_line() {
            ";"
        } else {
            ""
        };
        self.parsed.rewrites.push(Rewrite {
            span: Span::new(start, value.span.start),
            replacement,
        });
        Ok(())
    }

    /// Names bound by the declarator list after `const`, `let` or `var`
    fn declarator_names(&mut self) -> Result<Vec<String>, SyntaxError> {
        let mut names = Vec::new();
        loop {
            self.binding_pattern(&mut names)?;
            if self.stream.eat_punct('=').is_some() {
                self.skip_expression(true);
            }
            if self.stream.eat_punct(',').is_none() {
                return Ok(names);
            }
        }
    }

    fn binding_pattern(&mut self, names: &mut Vec<String>) -> Result<(), SyntaxError> {
        let offset = self.stream.offset();
        match self.stream.bump().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => {
                names.push(name.to_owned());
                Ok(())
            }
            Some(TokenKind::Punct('{')) => self.object_pattern(names),
            Some(TokenKind::Punct('[')) => self.array_pattern(names),
            _ => Err(SyntaxError::new(
                "expected a binding name or pattern",
                offset,
            )),
        }
    }

    /// Cursor is just past `{`
    fn object_pattern(&mut self, names: &mut Vec<String>) -> Result<(), SyntaxError> {
        loop {
            if self.stream.eat_punct('}').is_some() {
                return Ok(());
            }
            if self.eat_spread() {
                self.binding_pattern(names)?;
            } else {
                let offset = self.stream.offset();
                let shorthand = match self.stream.bump().map(|t| t.kind) {
                    Some(TokenKind::Ident(name)) => Some(name.to_owned()),
                    Some(TokenKind::Str(_) | TokenKind::Number) => None,
                    Some(TokenKind::Punct('[')) => {
                        self.skip_balanced();
                        None
                    }
                    _ => {
                        return Err(SyntaxError::new(
                            "unsupported property in binding pattern",
                            offset,
                        ));
                    }
                };
                if self.stream.eat_punct(':').is_some() {
                    self.binding_pattern(names)?;
                } else if let Some(name) = shorthand {
                    names.push(name);
                } else {
                    return Err(SyntaxError::new(
                        "expected `:` after a quoted or computed key",
                        self.stream.offset(),
                    ));
                }
            }
            if self.stream.eat_punct('=').is_some() {
                self.skip_expression(false);
            }
            if self.stream.eat_punct(',').is_none() {
                return self.expect_pattern_close('}');
            }
        }
    }

    /// Cursor is just past `[`
    fn array_pattern(&mut self, names: &mut Vec<String>) -> Result<(), SyntaxError> {
        loop {
            if self.stream.eat_punct(']').is_some() {
                return Ok(());
            }
            // hole
            if self.stream.eat_punct(',').is_some() {
                continue;
            }
            self.eat_spread();
            self.binding_pattern(names)?;
            if self.stream.eat_punct('=').is_some() {
                self.skip_expression(false);
            }
            if self.stream.eat_punct(',').is_none() {
                return self.expect_pattern_close(']');
            }
        }
    }

    fn expect_pattern_close(&mut self, close: char) -> Result<(), SyntaxError> {
        if self.stream.eat_punct(close).is_some() {
            Ok(())
        } else {
            Err(SyntaxError::new(
                format!("expected `,` or `{close}` in binding pattern"),
                self.stream.offset(),
            ))
        }
    }

    fn eat_spread(&mut self) -> bool {
        let is_spread = (0..3).all(|n| self.stream.peek_nth(n).is_some_and(|t| t.is_punct('.')));
        if is_spread {
            for _ in 0..3 {
                self.stream.bump();
            }
        }
        is_spread
    }

    /// Skip past the bracket closing the one just consumed
    fn skip_balanced(&mut self) {
        let mut depth = 1usize;
        while let Some(token) = self.stream.bump() {
            match token.kind {
                TokenKind::Punct('{' | '(' | '[') => depth += 1,
                TokenKind::Punct('}' | ')' | ']') => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip an initializer or default value. Stops before a `,`, `;` or
    /// unmatched closing bracket; at statement level also where a line break
    /// ends the statement.
    fn skip_expression(&mut self, statement_level: bool) {
        let mut depth = 0usize;
        while let Some(token) = self.stream.peek() {
            if depth == 0 {
                let ends = match token.kind {
                    TokenKind::Punct(',' | ';' | '}' | ')' | ']') => true,
                    _ => {
                        statement_level
                            && token.newline_before
                            && starts_statement(token)
                            && self.stream.previous().is_some_and(ends_expression)
                    }
                };
                if ends {
                    return;
                }
            }
            match token.kind {
                TokenKind::Punct('{' | '(' | '[') => depth += 1,
                TokenKind::Punct('}' | ')' | ']') => depth -= 1,
                _ => {}
            }
            self.stream.bump();
        }
    }

    /// Whether an identifier follows `function` (optionally after `*`) at lookahead `n`
    fn declaration_name_follows(&self, n: usize) -> bool {
        let n = if self.stream.peek_nth(n).is_some_and(|t| t.is_punct('*')) {
            n + 1
        } else {
            n
        };
        self.stream.peek_nth(n).and_then(Token::ident).is_some()
    }
}

fn ends_expression(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Ident(word) => !matches!(
            word,
            "in" | "instanceof" | "of" | "typeof" | "new" | "delete" | "void" | "await" | "yield"
        ),
        TokenKind::Punct(c) => matches!(c, ')' | ']' | '}'),
        TokenKind::Unterminated => false,
        _ => true,
    }
}

fn starts_statement(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Ident(word) => !matches!(word, "in" | "instanceof" | "of"),
        TokenKind::Number | TokenKind::Str(_) => true,
        _ => false,
    }
}

/// Extract the import and export declarations of a module
pub fn parse_module(source: &str) -> Result<ParsedModule, SyntaxError> {
    DeclarationParser::new(source).run()
}

/// Remove import statements and `export` syntax, keeping the declarations
pub fn strip_module_syntax(source: &str) -> Result<String, SyntaxError> {
    let parsed = parse_module(source)?;
    let mut output = String::with_capacity(source.len());
    let mut last = 0;
    for rewrite in &parsed.rewrites {
        output.push_str(&source[last..rewrite.span.start]);
        output.push_str(rewrite.replacement);
        last = rewrite.span.end;
    }
    output.push_str(&source[last..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn imports(source: &str) -> Vec<ImportDeclaration> {
        parse_module(source).expect("module should parse").imports
    }

    fn export_names(source: &str) -> Vec<String> {
        parse_module(source)
            .expect("module should parse")
            .exports
            .iter()
            .map(|e| e.name().to_owned())
            .collect()
    }

    #[test]
    fn test_named_import() {
        assert_eq!(
            imports("import { a, b as c } from './m.js';"),
            vec![ImportDeclaration::Named {
                specifiers: vec![
                    ImportSpecifier {
                        imported: "a".into(),
                        local: "a".into()
                    },
                    ImportSpecifier {
                        imported: "b".into(),
                        local: "c".into()
                    },
                ],
                source: "./m.js".into(),
            }]
        );
    }

    #[test]
    fn test_default_namespace_and_side_effect_imports() {
        let parsed = imports(
            "import Panel from './panel.js'\nimport * as dom from \"./dom.js\";\nimport './styles.js';",
        );
        assert_eq!(
            parsed,
            vec![
                ImportDeclaration::Default {
                    local: "Panel".into(),
                    source: "./panel.js".into()
                },
                ImportDeclaration::Namespace {
                    local: "dom".into(),
                    source: "./dom.js".into()
                },
                ImportDeclaration::SideEffect {
                    source: "./styles.js".into()
                },
            ]
        );
        assert!(parsed[0].is_default());
        assert_eq!(parsed[1].kind(), ImportKind::Namespace);
        assert!(parsed[2].bound_names().is_empty());
    }

    #[test]
    fn test_combined_default_and_named_import() {
        let parsed = imports("import Main, { helper } from './main.js';");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].kind(), ImportKind::Default);
        assert_eq!(parsed[1].kind(), ImportKind::Named);
        assert_eq!(parsed[1].bound_names(), vec!["helper"]);
    }

    #[test]
    fn test_multiline_named_import() {
        let parsed = imports("import {\n    one,\n    two,\n} from './numbers.js';\n");
        assert_eq!(parsed[0].bound_names(), vec!["one", "two"]);
    }

    #[test]
    fn test_dynamic_import_and_nested_keywords_are_ignored() {
        let source = "const m = import('./lazy.js');\nconst u = import.meta.url;\nconst s = \"import x from 'y'\";\nfunction f() { obj.import = 1; }";
        assert!(imports(source).is_empty());
    }

    #[test]
    fn test_export_forms() {
        let source = "export function f() {}\nexport async function g() {}\nexport const A = 1;\nexport let b;\nexport var c = 2;\nexport class K {}\nconst x = 1, y = 2;\nexport { x, y as z };\nexport default K;";
        assert_eq!(
            export_names(source),
            vec!["f", "g", "A", "b", "c", "K", "x", "z", "default"]
        );
        let exports = parse_module(source).expect("module should parse").exports;
        assert!(exports.last().is_some_and(ExportDeclaration::is_default));
    }

    #[test]
    fn test_every_declarator_is_exported() {
        assert_eq!(export_names("export const a = 1, b = 2;"), vec!["a", "b"]);
        assert_eq!(
            export_names("export const { x, y: z, ...rest } = o, [p, , q = 1, ...more] = arr;"),
            vec!["x", "z", "rest", "p", "q", "more"]
        );
        assert_eq!(
            export_names(
                "export let f = (u, v) => ({ u, v }), g = [1, 2]\nexport var h = f\n  (1, 2)\nexport const i = 3"
            ),
            vec!["f", "g", "h", "i"]
        );
    }

    #[test]
    fn test_unsupported_binding_pattern_is_rejected() {
        let err = parse_module("export const { a: 1 } = o;").unwrap_err();
        assert_eq!(err.message, "expected a binding name or pattern");
    }

    #[test]
    fn test_regex_after_if_head_keeps_top_level_imports() {
        let parsed = imports("if (ok) /[{(]/.test(s)\nimport { y } from './y.js'\n");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].bound_names(), vec!["y"]);
    }

    #[test]
    fn test_export_as_default_counts_as_default() {
        let exports = parse_module("const a = 1;\nexport { a as default };")
            .expect("module should parse")
            .exports;
        assert_eq!(exports, vec![ExportDeclaration::Default]);
    }

    #[test]
    fn test_reexports_are_rejected() {
        let err = parse_module("export * from './a.js';").unwrap_err();
        assert!(err.message.contains("not supported"));
        let err = parse_module("export { a } from './a.js';").unwrap_err();
        assert!(err.message.contains("not supported"));
    }

    #[test]
    fn test_malformed_import_reports_line() {
        let source = "const a = 1;\nimport { a } './a.js';";
        let err = parse_module(source).unwrap_err();
        assert_eq!(err.message, "expected `from` after import clause");
        assert_eq!(err.line(source), 2);
    }

    #[test]
    fn test_unterminated_specifier() {
        let err = parse_module("import { a } from './a.js\n").unwrap_err();
        assert_eq!(err.message, "unterminated module specifier");
    }

    #[test]
    fn test_strip_removes_imports_and_export_keywords() {
        let source = "import { f } from './a.js';\nexport function g() { return f(); }\nexport const h = 1;\nexport { g as gee };\n";
        assert_eq!(
            strip_module_syntax(source).expect("module should strip"),
            "\nfunction g() { return f(); }\nconst h = 1;\n\n"
        );
    }

    #[test]
    fn test_strip_keeps_statements_apart() {
        let strip = |source| strip_module_syntax(source).expect("module should strip");
        assert_eq!(
            strip("import { g } from './a.js'\n;(() => g())()"),
            "\n;(() => g())()"
        );
        assert_eq!(
            strip("let y = f\nimport './s.js'\n[1].map(y)"),
            "let y = f\n;\n[1].map(y)"
        );
        assert_eq!(strip("let y = f\nexport default (y)"), "let y = f\n;(y)");
        assert_eq!(strip("import './s.js'; run()"), " run()");
    }

    #[test]
    fn test_strip_export_default_variants() {
        assert_eq!(
            strip_module_syntax("export default class Panel {}").expect("strip"),
            "class Panel {}"
        );
        assert_eq!(
            strip_module_syntax("export default function* gen() {}").expect("strip"),
            "function* gen() {}"
        );
        assert_eq!(
            strip_module_syntax("export default Panel;").expect("strip"),
            "Panel;"
        );
        assert_eq!(
            strip_module_syntax("export default { a: 1, b: 2 };").expect("strip"),
            "void { a: 1, b: 2 };"
        );
        assert_eq!(
            strip_module_syntax("export default function () {}").expect("strip"),
            "void function () {}"
        );
        assert_eq!(
            strip_module_syntax("export default class extends Base {}").expect("strip"),
            "void class extends Base {}"
        );
    }
}
