//! Structured build errors
//!
//! Every failure of the core pipeline is a [`BuildError`]. The core never
//! prints; callers use [`BuildError::stage`] to tell which part of the build
//! failed and format the message themselves.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Pipeline stage an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ModuleResolution,
    Concatenation,
    SyntaxValidation,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleResolution => "module-resolution",
            Self::Concatenation => "concatenation",
            Self::SyntaxValidation => "syntax-validation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source root {} cannot be read: {source}", root.display())]
    Discovery {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read module {module}: {source}")]
    ReadModule {
        module: String,
        #[source]
        source: io::Error,
    },

    #[error("{module}:{line}: {message}")]
    Parse {
        module: String,
        line: usize,
        message: String,
    },

    #[error("cannot resolve '{specifier}' imported from {importer}")]
    Resolution { specifier: String, importer: String },

    #[error("'{name}' is not exported by '{specifier}' (imported from {importer})")]
    Validation {
        name: String,
        specifier: String,
        importer: String,
    },

    #[error("circular dependency detected: {}", cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("{0}")]
    Concatenation(String),

    #[error("generated bundle is not valid JavaScript ({line}:{column}): {message}")]
    SyntaxValidation {
        message: String,
        line: usize,
        column: usize,
    },
}

impl BuildError {
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Discovery { .. }
            | Self::ReadModule { .. }
            | Self::Parse { .. }
            | Self::Resolution { .. }
            | Self::Validation { .. }
            | Self::Cycle { .. }
            | Self::Internal(_) => Stage::ModuleResolution,
            Self::Concatenation(_) => Stage::Concatenation,
            Self::SyntaxValidation { .. } => Stage::SyntaxValidation,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
