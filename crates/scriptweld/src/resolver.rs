//! Module discovery, import resolution and dependency ordering
//!
//! [`ModuleResolver::resolve_modules`] runs the whole resolution pipeline
//! against the configured source root: discover files, parse each one, validate
//! every local import against the exports of its target, reject cycles, and
//! return the records in dependency order. Nothing is cached between calls.

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
    time::Instant,
};

use log::{debug, info, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{
    config::Config,
    error::{BuildError, Result},
    module_graph::{ModuleGraph, ModuleRecord},
    syntax::{self, ImportDeclaration},
    types::{FxIndexSet, SpecifierKind, display_path},
};

/// Extensions that are kept as written when resolving a specifier
const RECOGNIZED_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// Canonicalize a path, falling back to the input when the filesystem
/// cannot answer
fn canonicalize_path(path: PathBuf) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(e) => {
            warn!("Failed to canonicalize path {}: {}", path.display(), e);
            path
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Maps import specifiers to files below one source root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    extension: String,
}

impl PathResolver {
    /// `root` should already be canonical
    pub fn new(root: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            root,
            extension: extension.into(),
        }
    }

    /// Path relative to the source root, `/`-separated
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map_or_else(|_| display_path(path), display_path)
    }

    /// Resolve `specifier` as imported from `importer`
    ///
    /// Returns `Ok(None)` for external specifiers, which are never looked up.
    /// A local specifier that names no existing file is an error.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<Option<PathBuf>> {
        let base = match SpecifierKind::classify(specifier) {
            SpecifierKind::External => {
                trace!("Leaving external specifier '{specifier}' unresolved");
                return Ok(None);
            }
            SpecifierKind::Relative => importer.parent().unwrap_or(&self.root).join(specifier),
            SpecifierKind::Rooted => self.root.join(specifier.trim_start_matches('/')),
        };

        let candidate = normalize_path(&self.with_default_extension(base));
        if candidate.is_file() {
            Ok(Some(canonicalize_path(candidate)))
        } else {
            debug!(
                "Specifier '{specifier}' from {} points at missing file {}",
                self.relative(importer),
                candidate.display()
            );
            Err(BuildError::Resolution {
                specifier: specifier.to_owned(),
                importer: self.relative(importer),
            })
        }
    }

    fn with_default_extension(&self, path: PathBuf) -> PathBuf {
        let recognized = path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| {
            ext == self.extension || RECOGNIZED_EXTENSIONS.contains(&ext)
        });
        if recognized {
            return path;
        }
        let mut with_extension = path.into_os_string();
        with_extension.push(".");
        with_extension.push(&self.extension);
        PathBuf::from(with_extension)
    }
}

/// Resolves the modules of a source tree into dependency order
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    config: Config,
}

impl ModuleResolver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Canonical source root; fails when it is missing or not a directory
    pub fn source_root(&self) -> Result<PathBuf> {
        let root = &self.config.src;
        let canonical = root.canonicalize().map_err(|source| BuildError::Discovery {
            root: root.clone(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(BuildError::Discovery {
                root: root.clone(),
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }
        Ok(canonical)
    }

    /// Every source file below the root, sorted by path
    ///
    /// Hidden entries and excluded directory names are skipped.
    pub fn discover_source_files(&self) -> Result<Vec<PathBuf>> {
        let root = self.source_root()?;
        self.discover_below(&root)
    }

    fn discover_below(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_skipped(entry));

        for entry in walker {
            let entry = entry.map_err(|err| BuildError::Discovery {
                root: self.config.src.clone(),
                source: err.into(),
            })?;
            if entry.file_type().is_file() && self.has_source_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        debug!("Discovered {} source files under {}", files.len(), root.display());
        Ok(files)
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.')
            || (entry.file_type().is_dir() && self.config.exclude.iter().any(|ex| *ex == name))
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.config.extension)
    }

    /// Run discovery, parsing, validation and ordering from scratch
    ///
    /// Every returned module appears after all modules it imports. Modules are
    /// included whether or not anything reaches them.
    pub fn resolve_modules(&self) -> Result<Vec<ModuleRecord>> {
        let started = Instant::now();
        let root = self.source_root()?;
        let files = self.discover_below(&root)?;
        let mut run = ResolutionRun::new(PathResolver::new(root, &self.config.extension));

        run.load_modules(&files)?;
        run.validate_imports()?;
        run.graph.link_dependencies()?;
        run.reject_cycles()?;

        let order = run.graph.topological_order();
        let records = run.graph.into_ordered_records(&order)?;

        info!(
            "Resolved {} modules in {:.2?}",
            records.len(),
            started.elapsed()
        );
        Ok(records)
    }
}

/// State of one `resolve_modules` call
struct ResolutionRun {
    paths: PathResolver,
    graph: ModuleGraph,
}

impl ResolutionRun {
    fn new(paths: PathResolver) -> Self {
        Self {
            paths,
            graph: ModuleGraph::new(),
        }
    }

    fn load_modules(&mut self, files: &[PathBuf]) -> Result<()> {
        for path in files {
            let record = self.load_module(path)?;
            trace!(
                "Parsed {}: {} imports, {} exports",
                record.relative_path,
                record.imports.len(),
                record.exports.len()
            );
            self.graph.add_module(record);
        }
        Ok(())
    }

    fn load_module(&self, path: &Path) -> Result<ModuleRecord> {
        let relative_path = self.paths.relative(path);
        let content = fs::read_to_string(path).map_err(|source| BuildError::ReadModule {
            module: relative_path.clone(),
            source,
        })?;

        let parsed = syntax::parse_module(&content).map_err(|err| BuildError::Parse {
            module: relative_path.clone(),
            line: err.line(&content),
            message: err.message,
        })?;

        let mut dependencies = FxIndexSet::default();
        for import in &parsed.imports {
            if let Some(resolved) = self.paths.resolve(import.source(), path)? {
                dependencies.insert(resolved);
            }
        }

        Ok(ModuleRecord {
            path: path.to_path_buf(),
            relative_path,
            content,
            imports: parsed.imports,
            exports: parsed.exports,
            dependencies: dependencies.into_iter().collect(),
        })
    }

    /// Check every local import against the exports of the module it names
    fn validate_imports(&self) -> Result<()> {
        for (_, record) in self.graph.modules() {
            for import in &record.imports {
                self.validate_import(record, import)?;
            }
        }
        Ok(())
    }

    fn validate_import(&self, importer: &ModuleRecord, import: &ImportDeclaration) -> Result<()> {
        let specifier = import.source();
        let Some(target_path) = self.paths.resolve(specifier, &importer.path)? else {
            return Ok(());
        };

        // Files outside the discovered set (other extension, excluded dir,
        // outside the root) cannot be bundled
        let target = importer
            .dependencies
            .contains(&target_path)
            .then(|| self.graph.module_by_path(&target_path))
            .flatten()
            .ok_or_else(|| BuildError::Resolution {
                specifier: specifier.to_owned(),
                importer: importer.relative_path.clone(),
            })?;

        let missing = match import {
            ImportDeclaration::Named { specifiers, .. } => specifiers
                .iter()
                .find(|spec| !target.exports_name(&spec.imported))
                .map(|spec| spec.imported.clone()),
            ImportDeclaration::Default { .. } => {
                (!target.has_default_export()).then(|| "default".to_owned())
            }
            ImportDeclaration::Namespace { .. } | ImportDeclaration::SideEffect { .. } => None,
        };

        match missing {
            Some(name) => Err(BuildError::Validation {
                name,
                specifier: specifier.to_owned(),
                importer: importer.relative_path.clone(),
            }),
            None => Ok(()),
        }
    }

    fn reject_cycles(&self) -> Result<()> {
        match self.graph.find_cycle() {
            Some(cycle) => Err(BuildError::Cycle {
                cycle: self.graph.relative_paths(&cycle),
            }),
            None => Ok(()),
        }
    }
}
