//! HolyC execution substrate - CLI

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use holyc::backends::dev::{Evaluator, LineREPL, LineREPLConfig};
use holyc::runtime::Runtime;
use holyc::util::{config, logger};
use holyc::{check_file, run_file, NAME, VERSION};

/// Compile, run or interactively evaluate HolyC
#[derive(Parser, Debug)]
#[command(name = "hcc")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.config/holyc/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a source file for errors without running it
    Check {
        /// Source file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Run a source file
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Compile a source file and run it right away
    Jit {
        /// Source file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Start the interactive REPL
    Repl,

    /// Build a native executable
    Build {
        /// Source file to build
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output path
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },

    /// Run the preprocessor only
    Preprocess {
        /// Source file to preprocess
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Preprocessor mode
        #[arg(long)]
        mode: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        logger::init_debug();
        eprintln!("{} version: {}", NAME, VERSION);
        eprintln!("Host: {}", std::env::consts::OS);
    } else {
        logger::init();
    }

    let user_config = config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let runtime_config = user_config.runtime.to_runtime_config();

    match args.command {
        Commands::Check { file } => {
            check_file(&file).with_context(|| format!("Failed to check: {}", file.display()))?;
            eprintln!("Check passed!");
        }
        Commands::Run { file } | Commands::Jit { file } => {
            run_file(&file, runtime_config).with_context(|| format!("Failed to run: {}", file.display()))?;
        }
        Commands::Repl => {
            let runtime = Arc::new(Runtime::new(runtime_config).context("Failed to start runtime")?);
            let evaluator = Evaluator::new(runtime.clone());
            let mut repl = LineREPL::with_config(evaluator, LineREPLConfig::from(user_config.repl))
                .context("Failed to start line editor")?;
            let result = repl.run();
            runtime.shutdown();
            result.context("REPL failed")?;
        }
        Commands::Build { file, .. } | Commands::Preprocess { file, .. } => {
            bail!(
                "{}: this build has no native code generator; use `hcc run` or `hcc repl`",
                file.display()
            );
        }
    }

    Ok(())
}
