//! Turns an ordered module list into one userscript document

use std::time::Instant;

use cow_utils::CowUtils;
use log::{debug, info};
use once_cell::sync::Lazy;
use oxc_allocator::Allocator;
use oxc_parser::{Parser, ParserReturn};
use oxc_span::SourceType;
use regex::Regex;

use crate::{
    config::Config,
    context::BuildContext,
    error::{BuildError, Result},
    metadata::ScriptMetadata,
    module_graph::ModuleRecord,
    syntax::{self, Lexer, Span, SyntaxError, TokenKind, line_col},
};

/// Two or more blank lines, counting whitespace-only lines as blank
static BLANK_LINE_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+")
        .unwrap_or_else(|e| panic!("BUG: invalid blank line pattern: {e}"))
});

const WRAPPER_OPEN: &str = "(function () {";
const WRAPPER_CLOSE: &str = "})();";

/// Emits the header, the strict-mode wrapper and every module body
#[derive(Debug, Clone)]
pub struct FileConcatenator {
    metadata_module: String,
    indent: String,
}

impl FileConcatenator {
    pub fn new(metadata_module: impl Into<String>, indent_width: usize) -> Self {
        Self {
            metadata_module: metadata_module.into(),
            indent: " ".repeat(indent_width),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.metadata_module, config.indent_width)
    }

    /// Build the output document for modules already in execution order
    ///
    /// The result always ends with a newline and parses as a classic script.
    pub fn concatenate_modules(
        &self,
        modules: &[ModuleRecord],
        context: &BuildContext,
    ) -> Result<String> {
        let started = Instant::now();
        let header = self.render_header(modules, context)?;

        let mut parts = vec![
            header,
            String::new(),
            WRAPPER_OPEN.to_owned(),
            format!("{}'use strict';", self.indent),
        ];

        for module in modules {
            if module.relative_path == self.metadata_module {
                continue;
            }
            let body = prepare_body(&module.content).map_err(|err| {
                BuildError::Concatenation(format!(
                    "{}:{}: {}",
                    module.relative_path,
                    err.line(&module.content),
                    err.message
                ))
            })?;
            parts.push(String::new());
            parts.push(format!("{}// {}", self.indent, module.relative_path));
            if !body.is_empty() {
                parts.push(self.indent_body(&body));
            }
            debug!("Emitted {} ({} bytes)", module.relative_path, body.len());
        }

        parts.push(WRAPPER_CLOSE.to_owned());
        let mut output = parts.join("\n");
        output.push('\n');

        validate_output(&output)?;
        info!(
            "Concatenated {} modules into {} bytes in {:.2?}",
            modules.len(),
            output.len(),
            started.elapsed()
        );
        Ok(output)
    }

    fn render_header(&self, modules: &[ModuleRecord], context: &BuildContext) -> Result<String> {
        let module = modules
            .iter()
            .find(|m| m.relative_path == self.metadata_module)
            .ok_or_else(|| {
                BuildError::Concatenation(format!(
                    "metadata module '{}' is not part of the bundle",
                    self.metadata_module
                ))
            })?;

        let metadata = ScriptMetadata::parse(&module.content).map_err(|err| {
            BuildError::Concatenation(format!(
                "malformed metadata in {}:{}: {}",
                module.relative_path,
                err.line(&module.content),
                err.message
            ))
        })?;
        if metadata.is_empty() {
            return Err(BuildError::Concatenation(format!(
                "metadata in {} declares no fields",
                module.relative_path
            )));
        }

        let metadata = metadata.substitute(&context.template_values());
        if let Some(key) = metadata.unsafe_field() {
            return Err(BuildError::Concatenation(format!(
                "metadata field '{key}' in {} must fit on one header line",
                module.relative_path
            )));
        }
        Ok(metadata.render_header())
    }

    /// Indent every line by one level, except empty lines and lines that
    /// start inside a multi-line template or continued string literal
    fn indent_body(&self, body: &str) -> String {
        let literals: Vec<Span> = syntax::tokenize(body)
            .into_iter()
            .filter(|t| matches!(t.kind, TokenKind::Template | TokenKind::Str(_)))
            .map(|t| t.span)
            .collect();

        let mut offset = 0;
        let mut lines = Vec::new();
        for line in body.split('\n') {
            let inside_literal = literals
                .iter()
                .any(|span| span.start < offset && offset < span.end);
            if inside_literal {
                lines.push(line.to_owned());
            } else if line.trim().is_empty() {
                lines.push(String::new());
            } else {
                lines.push(format!("{}{line}", self.indent));
            }
            offset += line.len() + 1;
        }
        lines.join("\n")
    }
}

/// Strip module syntax, collapse blank-line runs and trim
///
/// A body whose first line would extend the previous module's last
/// statement starts with `;`.
pub fn prepare_body(source: &str) -> std::result::Result<String, SyntaxError> {
    let source = source.cow_replace("\r\n", "\n");
    let stripped = syntax::strip_module_syntax(&source)?;
    let collapsed = BLANK_LINE_RUN.replace_all(&stripped, "\n\n");
    let body = collapsed.trim();
    let needs_guard = Lexer::new(body)
        .next()
        .is_some_and(|token| token.continues_previous_line());
    Ok(if needs_guard {
        format!(";{body}")
    } else {
        body.to_owned()
    })
}

/// Parse the generated document as a classic script
pub fn validate_output(code: &str) -> Result<()> {
    let allocator = Allocator::default();
    let ParserReturn { errors, .. } = Parser::new(&allocator, code, SourceType::cjs()).parse();

    let Some(error) = errors.first() else {
        return Ok(());
    };
    let offset = error
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map_or(0, |label| label.offset());
    let (line, column) = line_col(code, offset);
    Err(BuildError::SyntaxValidation {
        message: error.message.to_string(),
        line,
        column,
    })
}
