//! Userscript metadata header
//!
//! The metadata module exports one object literal whose fields become the
//! `// @key value` lines of the header. The literal is read as data by a
//! token-level reader; it is never evaluated.
//!
//! ```js
//! export const metadata = {
//!     name: 'Example',
//!     version: '{{VERSION}}',
//!     match: ['https://example.com/*', 'https://example.org/*'],
//! };
//! ```

use cow_utils::CowUtils;
use log::{debug, warn};

use crate::{
    syntax::{SyntaxError, Token, TokenKind, TokenStream},
    types::FxIndexMap,
};

pub const HEADER_OPEN: &str = "// ==UserScript==";
pub const HEADER_CLOSE: &str = "// ==/UserScript==";

/// Shared by the opening and closing lines of the block
const HEADER_MARKER: &str = "UserScript==";

/// Width of the key column in header lines
const KEY_WIDTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Scalar(String),
    List(Vec<String>),
}

impl MetadataValue {
    fn values(&self) -> &[String] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::List(values) => values,
        }
    }

    fn map(&self, f: impl Fn(&str) -> String) -> Self {
        match self {
            Self::Scalar(value) => Self::Scalar(f(value)),
            Self::List(values) => Self::List(values.iter().map(|v| f(v)).collect()),
        }
    }
}

/// Ordered header fields, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptMetadata {
    fields: FxIndexMap<String, MetadataValue>,
}

impl ScriptMetadata {
    /// Read the exported metadata object out of a module's source
    pub fn parse(source: &str) -> Result<Self, SyntaxError> {
        let mut stream = TokenStream::new(source);
        seek_exported_object(&mut stream)?;
        let fields = ObjectReader {
            stream: &mut stream,
            source,
        }
        .read_object()?;
        debug!("Read {} metadata fields", fields.len());
        Ok(Self { fields })
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Replace every `{{NAME}}` placeholder given in `values`
    pub fn substitute(&self, values: &[(&str, String)]) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|(key, value)| {
                let value = value.map(|text| {
                    values
                        .iter()
                        .fold(text.to_owned(), |acc, (placeholder, replacement)| {
                            acc.cow_replace(*placeholder, replacement).into_owned()
                        })
                });
                (key.clone(), value)
            })
            .collect();
        let substituted = Self { fields };
        substituted.warn_unresolved();
        substituted
    }

    fn warn_unresolved(&self) {
        for (key, value) in &self.fields {
            if value.values().iter().any(|v| v.contains("{{")) {
                warn!("Metadata field '{key}' still contains a placeholder after substitution");
            }
        }
    }

    /// First field whose key or value would not stay on its own header line
    pub fn unsafe_field(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, value)| {
                !fits_header_line(key) || !value.values().iter().all(|v| fits_header_line(v))
            })
            .map(|(key, _)| key.as_str())
    }

    /// Render the `// ==UserScript==` block, without a trailing newline
    pub fn render_header(&self) -> String {
        let mut header = String::from(HEADER_OPEN);
        for (key, value) in &self.fields {
            for item in value.values() {
                let key = format!("@{key}");
                header.push_str(&format!("\n// {key:<KEY_WIDTH$} {item}"));
                // Empty values would leave trailing whitespace
                let trimmed = header.trim_end_matches(' ').len();
                header.truncate(trimmed);
            }
        }
        header.push('\n');
        header.push_str(HEADER_CLOSE);
        header
    }
}

/// No line terminator and no block markers
fn fits_header_line(text: &str) -> bool {
    !text.contains(['\n', '\r', '\u{2028}', '\u{2029}']) && !text.contains(HEADER_MARKER)
}

/// Advance to the `{` of the first top-level `export default {` or
/// `export const NAME = {`
fn seek_exported_object(stream: &mut TokenStream<'_>) -> Result<(), SyntaxError> {
    let mut depth = 0usize;
    let mut non_object = None;
    while let Some(token) = stream.bump() {
        match token.kind {
            TokenKind::Punct('{' | '(' | '[') => depth += 1,
            TokenKind::Punct('}' | ')' | ']') => depth = depth.saturating_sub(1),
            TokenKind::Ident("export") if depth == 0 => {
                if stream.eat_ident("default").is_none() {
                    let is_binding = ["const", "let", "var"]
                        .iter()
                        .any(|kw| stream.eat_ident(kw).is_some());
                    if !is_binding {
                        continue;
                    }
                    let named = stream.bump().is_some_and(|t| t.ident().is_some());
                    if !named || stream.eat_punct('=').is_none() {
                        continue;
                    }
                }
                if stream.peek().is_some_and(|t| t.is_punct('{')) {
                    return Ok(());
                }
                non_object.get_or_insert(stream.offset());
            }
            _ => {}
        }
    }
    Err(match non_object {
        Some(offset) => SyntaxError::new("exported metadata must be an object literal", offset),
        None => SyntaxError::new("no exported metadata object found", 0),
    })
}

struct ObjectReader<'s, 'a> {
    stream: &'s mut TokenStream<'a>,
    source: &'a str,
}

impl ObjectReader<'_, '_> {
    fn read_object(&mut self) -> Result<FxIndexMap<String, MetadataValue>, SyntaxError> {
        self.expect_punct('{')?;
        let mut fields = FxIndexMap::default();
        loop {
            if self.stream.eat_punct('}').is_some() {
                return Ok(fields);
            }
            let key = self.read_key()?;
            self.expect_punct(':')?;
            let value = self.read_value()?;
            if fields.insert(key.clone(), value).is_some() {
                warn!("Metadata field '{key}' is declared twice; the last value wins");
            }
            if self.stream.eat_punct(',').is_none() {
                self.expect_punct('}')?;
                return Ok(fields);
            }
        }
    }

    fn read_key(&mut self) -> Result<String, SyntaxError> {
        let offset = self.stream.offset();
        match self.stream.bump().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => Ok(name.to_owned()),
            Some(TokenKind::Str(name)) => Ok(name),
            _ => Err(SyntaxError::new(
                "metadata keys must be identifiers or string literals",
                offset,
            )),
        }
    }

    fn read_value(&mut self) -> Result<MetadataValue, SyntaxError> {
        if self.stream.eat_punct('[').is_none() {
            return self.read_string().map(MetadataValue::Scalar);
        }
        let mut items = Vec::new();
        loop {
            if self.stream.eat_punct(']').is_some() {
                return Ok(MetadataValue::List(items));
            }
            items.push(self.read_string()?);
            if self.stream.eat_punct(',').is_none() {
                self.expect_punct(']')?;
                return Ok(MetadataValue::List(items));
            }
        }
    }

    fn read_string(&mut self) -> Result<String, SyntaxError> {
        let offset = self.stream.offset();
        match self.stream.bump() {
            Some(Token {
                kind: TokenKind::Str(value),
                ..
            }) => Ok(value),
            Some(Token {
                kind: TokenKind::Template,
                span,
                ..
            }) => {
                let text = span.text(self.source);
                let inner = &text[1..text.len() - 1];
                if inner.contains("${") {
                    Err(SyntaxError::new(
                        "metadata templates cannot contain substitutions",
                        offset,
                    ))
                } else {
                    Ok(inner.to_owned())
                }
            }
            _ => Err(SyntaxError::new(
                "metadata values must be strings or arrays of strings",
                offset,
            )),
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), SyntaxError> {
        if self.stream.eat_punct(c).is_some() {
            Ok(())
        } else {
            Err(SyntaxError::new(
                format!("expected `{c}` in metadata object"),
                self.stream.offset(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const META: &str = r"
// Header fields
export const metadata = {
    name: 'Demo Script',
    'namespace': 'https://example.com',
    version: '{{VERSION}}',
    match: [
        'https://example.com/*',
        `https://example.org/*`,
    ],
    updateURL: '{{UPDATE_URL}}',
    grant: [],
};
";

    #[test]
    fn test_parse_fields_in_order() {
        let metadata = ScriptMetadata::parse(META).expect("metadata should parse");
        let keys: Vec<_> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["name", "namespace", "version", "match", "updateURL", "grant"]
        );
        assert_eq!(
            metadata.get("match"),
            Some(&MetadataValue::List(vec![
                "https://example.com/*".to_owned(),
                "https://example.org/*".to_owned(),
            ]))
        );
    }

    #[test]
    fn test_default_export_object() {
        let metadata = ScriptMetadata::parse("export default { name: \"x\" }")
            .expect("default export should parse");
        assert_eq!(
            metadata.get("name"),
            Some(&MetadataValue::Scalar("x".to_owned()))
        );
    }

    #[test]
    fn test_substitution_and_rendering() {
        let metadata = ScriptMetadata::parse(META)
            .expect("metadata should parse")
            .substitute(&[
                ("{{VERSION}}", "2.3.0".to_owned()),
                (
                    "{{UPDATE_URL}}",
                    "https://cdn.example/main/demo.user.js".to_owned(),
                ),
            ]);

        insta::assert_snapshot!(metadata.render_header(), @r"
        // ==UserScript==
        // @name        Demo Script
        // @namespace   https://example.com
        // @version     2.3.0
        // @match       https://example.com/*
        // @match       https://example.org/*
        // @updateURL   https://cdn.example/main/demo.user.js
        // ==/UserScript==
        ");
    }

    #[test]
    fn test_empty_value_has_no_trailing_space() {
        let metadata =
            ScriptMetadata::parse("export const m = { noframes: '' };").expect("should parse");
        assert_eq!(
            metadata.render_header(),
            "// ==UserScript==\n// @noframes\n// ==/UserScript=="
        );
    }

    #[test]
    fn test_values_must_stay_on_one_line() {
        let metadata = ScriptMetadata::parse(
            "export const m = { name: 'x\\nwindow.pwned = 1; //', grant: ['none'] };",
        )
        .expect("should parse");
        assert_eq!(metadata.unsafe_field(), Some("name"));

        let closing =
            ScriptMetadata::parse("export const m = { a: 'ok', b: ['// ==/UserScript=='] };")
                .expect("should parse");
        assert_eq!(closing.unsafe_field(), Some("b"));

        let version = ScriptMetadata::parse("export const m = { version: '{{VERSION}}' };")
            .expect("should parse")
            .substitute(&[("{{VERSION}}", "1.0\u{2028}alert(2)".to_owned())]);
        assert_eq!(version.unsafe_field(), Some("version"));

        let safe = ScriptMetadata::parse(META).expect("should parse");
        assert_eq!(safe.unsafe_field(), None);
    }

    #[test]
    fn test_non_literal_values_are_rejected() {
        let err = ScriptMetadata::parse("export const m = { version: VERSION };").unwrap_err();
        assert_eq!(
            err.message,
            "metadata values must be strings or arrays of strings"
        );

        let err = ScriptMetadata::parse("export const m = { v: `${x}` };").unwrap_err();
        assert!(err.message.contains("substitutions"));
    }

    #[test]
    fn test_missing_export_is_an_error() {
        let err = ScriptMetadata::parse("const m = { name: 'x' };").unwrap_err();
        assert_eq!(err.message, "no exported metadata object found");

        let err = ScriptMetadata::parse("export const m = build();").unwrap_err();
        assert_eq!(err.message, "exported metadata must be an object literal");
    }

    #[test]
    fn test_exports_before_the_object_are_skipped() {
        let source = "export function helper() {}\nexport const meta = { name: 'x' };";
        let metadata = ScriptMetadata::parse(source).expect("should parse");
        assert_eq!(metadata.len(), 1);
    }
}
