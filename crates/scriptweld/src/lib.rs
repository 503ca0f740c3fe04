//! Bundles a tree of ES modules into a single userscript.
//!
//! [`resolver::ModuleResolver`] discovers and orders the modules,
//! [`concatenator::FileConcatenator`] turns the ordered modules into the
//! output document and [`orchestrator::BuildManager`] drives both.

pub mod concatenator;
pub mod config;
pub mod context;
pub mod error;
pub mod gates;
pub mod metadata;
pub mod module_graph;
pub mod orchestrator;
pub mod resolver;
pub mod syntax;
pub mod types;

pub use concatenator::FileConcatenator;
pub use config::Config;
pub use context::BuildContext;
pub use error::{BuildError, Stage};
pub use module_graph::ModuleRecord;
pub use orchestrator::{BuildManager, BuildReport};
pub use resolver::ModuleResolver;
