//! Build orchestration: gates, resolution, concatenation, output, watch mode

use std::{
    fs,
    path::{Path, PathBuf},
    sync::mpsc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::{
    concatenator::FileConcatenator,
    config::Config,
    context::BuildContext,
    gates::configured_gates,
    resolver::ModuleResolver,
};

/// Quiet period that ends a batch of file events in watch mode
const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Summary of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Relative paths in execution order
    pub modules: Vec<String>,
    pub output_path: PathBuf,
    pub bytes: usize,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct BuildManager {
    config: Config,
    skip_checks: bool,
}

impl BuildManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            skip_checks: false,
        }
    }

    #[must_use]
    pub fn skip_checks(mut self, skip: bool) -> Self {
        self.skip_checks = skip;
        self
    }

    /// Run the configured gates against every discovered source file
    pub fn run_quality_gates(&self, resolver: &ModuleResolver) -> Result<()> {
        let gates = configured_gates(&self.config);
        if gates.is_empty() {
            return Ok(());
        }

        let files = resolver
            .discover_source_files()
            .context("module-resolution failed")?;
        for gate in &gates {
            let outcome = gate.check(&files);
            if !outcome.passed {
                bail!(
                    "quality gate '{}' failed:\n{}",
                    outcome.gate,
                    outcome.diagnostics.join("\n")
                );
            }
            debug!("Quality gate '{}' passed", outcome.gate);
        }
        Ok(())
    }

    /// Produce the bundle text without writing it
    pub fn bundle(&self) -> Result<(String, Vec<String>)> {
        let resolver = ModuleResolver::new(self.config.clone());
        if self.skip_checks {
            debug!("Skipping quality gates");
        } else {
            self.run_quality_gates(&resolver)?;
        }

        let modules = resolver.resolve_modules().map_err(|err| {
            let stage = err.stage();
            anyhow::Error::new(err).context(format!("{stage} failed"))
        })?;
        let order: Vec<String> = modules.iter().map(|m| m.relative_path.clone()).collect();

        let context = BuildContext::from_config(&self.config).with_source_files(order.clone());
        let output = FileConcatenator::from_config(&self.config)
            .concatenate_modules(&modules, &context)
            .map_err(|err| {
                let stage = err.stage();
                anyhow::Error::new(err).context(format!("{stage} failed"))
            })?;

        Ok((output, order))
    }

    /// One full build, writing the output file
    pub fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        self.check_output_location()?;

        let (output, modules) = self.bundle()?;
        let output_path = self.config.output.clone();
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&output_path, &output)
            .with_context(|| format!("failed to write {}", output_path.display()))?;

        let report = BuildReport {
            modules,
            output_path,
            bytes: output.len(),
            duration: started.elapsed(),
        };
        info!(
            "Built {} ({} modules, {} bytes) in {:.2?}",
            report.output_path.display(),
            report.modules.len(),
            report.bytes,
            report.duration
        );
        Ok(report)
    }

    /// An output file inside the source root would be bundled into itself
    fn check_output_location(&self) -> Result<()> {
        let (Ok(src), Ok(output)) = (
            std::path::absolute(&self.config.src),
            std::path::absolute(&self.config.output),
        ) else {
            return Ok(());
        };
        let extension = output.extension().and_then(|ext| ext.to_str());
        if output.starts_with(&src) && extension == Some(self.config.extension.as_str()) {
            bail!(
                "output {} is inside the source root {}",
                self.config.output.display(),
                self.config.src.display()
            );
        }
        Ok(())
    }

    fn build_and_log(&self) {
        if let Err(e) = self.build() {
            error!("Build failed: {e:#}");
        }
    }

    /// Build once, then rebuild after every batch of source changes
    ///
    /// Failed builds are logged and watching continues. Returns only when
    /// the watcher shuts down.
    pub fn watch(&self) -> Result<()> {
        self.build_and_log();

        let root = ModuleResolver::new(self.config.clone())
            .source_root()
            .context("cannot watch source root")?;
        let output = std::path::absolute(&self.config.output)
            .with_context(|| format!("invalid output path {}", self.config.output.display()))?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!("Watch error: {e}"),
            }
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;
        info!("Watching {} for changes", root.display());

        while let Ok(event) = rx.recv() {
            let mut changed = self.relevant_paths(&event, &root, &output);
            if changed.is_empty() {
                continue;
            }
            while let Ok(next) = rx.recv_timeout(WATCH_DEBOUNCE) {
                changed.extend(self.relevant_paths(&next, &root, &output));
            }
            changed.sort();
            changed.dedup();
            info!(
                "{} file(s) changed, rebuilding (first: {})",
                changed.len(),
                changed[0].display()
            );
            self.build_and_log();
        }

        Ok(())
    }

    fn relevant_paths(&self, event: &Event, root: &Path, output: &Path) -> Vec<PathBuf> {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return Vec::new();
        }
        event
            .paths
            .iter()
            .filter(|path| is_watched_path(path, root, output, &self.config.exclude))
            .cloned()
            .collect()
    }
}

/// Whether a changed path below `root` should trigger a rebuild
pub fn is_watched_path(path: &Path, root: &Path, output: &Path, exclude: &[String]) -> bool {
    if path == output {
        return false;
    }
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    !relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        name.starts_with('.') || exclude.iter().any(|ex| *ex == name)
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, content).expect("write file");
    }

    fn project(dir: &Path) -> Config {
        write(
            &dir.join("src/meta.js"),
            "export const metadata = { name: 'T', version: '{{VERSION}}' };\n",
        );
        write(&dir.join("src/main.js"), "import { x } from './x.js';\nconsole.log(x);\n");
        write(&dir.join("src/x.js"), "export const x = 1;\n");
        Config {
            src: dir.join("src"),
            output: dir.join("dist/out.user.js"),
            version: "3.1.4".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_writes_output() {
        let dir = TempDir::new().expect("tempdir");
        let config = project(dir.path());
        let report = BuildManager::new(config).build().expect("build");

        assert_eq!(report.modules, vec!["x.js", "main.js", "meta.js"]);
        let written = fs::read_to_string(&report.output_path).expect("output exists");
        assert_eq!(written.len(), report.bytes);
        assert!(written.contains("// @version     3.1.4"));
    }

    #[test]
    fn test_failed_gate_stops_build() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config {
            max_module_lines: Some(1),
            ..project(dir.path())
        };
        let output = config.output.clone();

        let err = BuildManager::new(config.clone()).build().unwrap_err();
        assert!(err.to_string().contains("size-policy"));
        assert!(!output.exists());

        BuildManager::new(config)
            .skip_checks(true)
            .build()
            .expect("gates skipped");
        assert!(output.exists());
    }

    #[test]
    fn test_resolution_errors_keep_their_stage() {
        let dir = TempDir::new().expect("tempdir");
        let config = project(dir.path());
        write(&dir.path().join("src/x.js"), "export const y = 1;\n");

        let err = BuildManager::new(config).build().unwrap_err();
        assert_eq!(err.to_string(), "module-resolution failed");
        let build_error = err
            .downcast_ref::<crate::error::BuildError>()
            .expect("structured error");
        assert!(matches!(
            build_error,
            crate::error::BuildError::Validation { .. }
        ));
    }

    #[test]
    fn test_output_inside_source_root_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let config = Config {
            output: dir.path().join("src/out.js"),
            ..project(dir.path())
        };
        assert!(BuildManager::new(config).build().is_err());
    }

    #[test]
    fn test_watched_paths() {
        let root = Path::new("/p/src");
        let output = Path::new("/p/dist/out.user.js");
        let exclude = vec!["node_modules".to_owned()];

        assert!(is_watched_path(Path::new("/p/src/a.js"), root, output, &exclude));
        assert!(!is_watched_path(Path::new("/p/src/.git/HEAD"), root, output, &exclude));
        assert!(!is_watched_path(
            Path::new("/p/src/node_modules/x.js"),
            root,
            output,
            &exclude
        ));
        assert!(!is_watched_path(output, Path::new("/p"), output, &exclude));
        assert!(!is_watched_path(Path::new("/elsewhere/a.js"), root, output, &exclude));
    }
}
