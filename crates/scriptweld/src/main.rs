use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};
use scriptweld::{BuildManager, Config};

#[derive(Parser, Debug)]
#[command(name = "scriptweld", version, about = "Bundle ES modules into a single userscript")]
struct Cli {
    /// Configuration file (defaults to scriptweld.toml, then the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source root to bundle
    #[arg(long)]
    src: Option<PathBuf>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Version substituted into the header
    #[arg(long = "set-version", value_name = "VERSION")]
    set_version: Option<String>,

    /// Release branch used for update and download URLs
    #[arg(long)]
    branch: Option<String>,

    /// Rebuild whenever a source file changes
    #[arg(short, long)]
    watch: bool,

    /// Skip lint and size-policy gates
    #[arg(long)]
    skip_checks: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(src) = &self.src {
            config.src.clone_from(src);
        }
        if let Some(output) = &self.output {
            config.output.clone_from(output);
        }
        if let Some(version) = &self.set_version {
            config.version.clone_from(version);
        }
        if let Some(branch) = &self.branch {
            config.branch.clone_from(branch);
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        let level = match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        builder.filter_level(level);
    }
    builder.format_timestamp(None).init();
}

#[allow(clippy::print_stdout)]
fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    let manager = BuildManager::new(config).skip_checks(cli.skip_checks);
    if cli.watch {
        return manager.watch();
    }

    let report = manager.build()?;
    info!("Module order: {}", report.modules.join(", "));
    println!(
        "Wrote {} ({} modules, {} bytes)",
        report.output_path.display(),
        report.modules.len(),
        report.bytes
    );
    Ok(())
}

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
