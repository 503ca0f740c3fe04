//! Pre-build quality gates
//!
//! Gates run against the discovered source files before resolution starts.
//! A failing gate stops the build; its diagnostics are reported as-is.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use log::debug;

use crate::config::Config;

/// Result of one gate run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub gate: String,
    pub passed: bool,
    pub diagnostics: Vec<String>,
}

impl GateOutcome {
    pub fn pass(gate: impl Into<String>) -> Self {
        Self {
            gate: gate.into(),
            passed: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn fail(gate: impl Into<String>, diagnostics: Vec<String>) -> Self {
        Self {
            gate: gate.into(),
            passed: false,
            diagnostics,
        }
    }
}

pub trait QualityGate {
    fn name(&self) -> &str;

    fn check(&self, files: &[PathBuf]) -> GateOutcome;
}

/// Rejects modules longer than a fixed number of lines
#[derive(Debug, Clone)]
pub struct SizePolicyGate {
    max_lines: usize,
}

impl SizePolicyGate {
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }
}

impl QualityGate for SizePolicyGate {
    fn name(&self) -> &str {
        "size-policy"
    }

    fn check(&self, files: &[PathBuf]) -> GateOutcome {
        let mut diagnostics = Vec::new();
        for file in files {
            match fs::read_to_string(file) {
                Ok(content) => {
                    let lines = content.lines().count();
                    if lines > self.max_lines {
                        diagnostics.push(format!(
                            "{}: {lines} lines (limit {})",
                            file.display(),
                            self.max_lines
                        ));
                    }
                }
                Err(e) => diagnostics.push(format!("{}: {e}", file.display())),
            }
        }

        if diagnostics.is_empty() {
            GateOutcome::pass(self.name())
        } else {
            GateOutcome::fail(self.name(), diagnostics)
        }
    }
}

/// Runs an external program; exit status 0 passes
#[derive(Debug, Clone)]
pub struct CommandGate {
    argv: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandGate {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            working_dir: None,
        }
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl QualityGate for CommandGate {
    fn name(&self) -> &str {
        self.argv.first().map_or("command", String::as_str)
    }

    fn check(&self, _files: &[PathBuf]) -> GateOutcome {
        let Some((program, args)) = self.argv.split_first() else {
            return GateOutcome::fail(self.name(), vec!["no command configured".to_owned()]);
        };

        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        debug!("Running gate command {:?}", self.argv);

        match command.output() {
            Ok(output) if output.status.success() => GateOutcome::pass(self.name()),
            Ok(output) => {
                let diagnostics = [output.stdout, output.stderr]
                    .iter()
                    .map(|stream| String::from_utf8_lossy(stream).trim().to_owned())
                    .filter(|text| !text.is_empty())
                    .collect();
                GateOutcome::fail(self.name(), diagnostics)
            }
            Err(e) => GateOutcome::fail(self.name(), vec![format!("failed to run {program}: {e}")]),
        }
    }
}

/// Gates enabled by the configuration, in run order
pub fn configured_gates(config: &Config) -> Vec<Box<dyn QualityGate>> {
    let mut gates: Vec<Box<dyn QualityGate>> = Vec::new();
    if let Some(argv) = &config.lint_command {
        let mut gate = CommandGate::new(argv.clone());
        if let Some(dir) = &config.project_dir {
            gate = gate.current_dir(dir);
        }
        gates.push(Box::new(gate));
    }
    if let Some(max_lines) = config.max_module_lines {
        gates.push(Box::new(SizePolicyGate::new(max_lines)));
    }
    gates
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_size_policy() {
        let dir = TempDir::new().expect("tempdir");
        let short = dir.path().join("short.js");
        let long = dir.path().join("long.js");
        fs::write(&short, "a();\nb();\n").expect("write");
        fs::write(&long, "a();\n".repeat(5)).expect("write");

        let gate = SizePolicyGate::new(3);
        assert!(gate.check(std::slice::from_ref(&short)).passed);

        let outcome = gate.check(&[short, long]);
        assert!(!outcome.passed);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].ends_with("long.js: 5 lines (limit 3)"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_gate_uses_exit_status() {
        assert!(CommandGate::new(vec!["true".into()]).check(&[]).passed);

        let outcome = CommandGate::new(vec![
            "sh".into(),
            "-c".into(),
            "echo 'src/a.js: bad'; exit 1".into(),
        ])
        .check(&[]);
        assert!(!outcome.passed);
        assert_eq!(outcome.gate, "sh");
        assert_eq!(outcome.diagnostics, vec!["src/a.js: bad".to_owned()]);
    }

    #[test]
    fn test_missing_program_fails() {
        let outcome = CommandGate::new(vec!["scriptweld-no-such-linter".into()]).check(&[]);
        assert!(!outcome.passed);
        assert!(outcome.diagnostics[0].starts_with("failed to run"));
    }

    #[cfg(unix)]
    #[test]
    fn test_lint_command_runs_in_project_dir() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("eslint.config.js"), "export default [];\n").expect("write");
        let config = Config {
            lint_command: Some(vec![
                "sh".into(),
                "-c".into(),
                "test -f eslint.config.js".into(),
            ]),
            project_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(configured_gates(&config)[0].check(&[]).passed);

        let elsewhere = Config {
            project_dir: None,
            ..config
        };
        assert!(!configured_gates(&elsewhere)[0].check(&[]).passed);
    }

    #[test]
    fn test_configured_gates() {
        let config = Config {
            max_module_lines: Some(300),
            lint_command: Some(vec!["eslint".into(), "src".into()]),
            ..Default::default()
        };
        let names: Vec<_> = configured_gates(&config)
            .iter()
            .map(|g| g.name().to_owned())
            .collect();
        assert_eq!(names, vec!["eslint", "size-policy"]);
        assert!(configured_gates(&Config::default()).is_empty());
    }
}
