//! Command-line entry point. Parses the flag surface in §6.2 with
//! `clap`'s derive API and runs the compile pipeline in `driver.rs`,
//! following the teacher's own convention of printing a diagnostic and
//! exiting non-zero on any fatal error rather than panicking.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser as ClapParser, ValueEnum};

use tglc::driver::compile_file;

const VERSION: &str = "Tiny GPU language compiler (TGLC) - v1.2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
enum Target {
    Nvidia,
}

impl Target {
    fn triple(self) -> &'static str {
        match self {
            Target::Nvidia => "nvptx64-nvidia-cuda",
        }
    }
}

/// Translates TGL kernels into PTX assembly.
#[derive(Debug, ClapParser)]
#[command(name = "tglc", version = VERSION, disable_version_flag = true)]
struct Cli {
    /// Print a one-line version identifier and exit.
    #[arg(long)]
    version: bool,

    /// Path to a .tgl source file.
    #[arg(long, value_name = "PATH")]
    src: Option<PathBuf>,

    /// Target selection.
    #[arg(long, value_enum, default_value_t = Target::Nvidia)]
    target: Target,

    /// Additionally write .ast and .ll dumps alongside the PTX.
    #[arg(long)]
    save_temps: bool,

    /// Write artifacts into DIR instead of alongside the source.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Streaming-multiprocessor version passed to the backend, e.g. 70 for sm_70.
    #[arg(long, value_name = "NN", default_value = "70")]
    sm: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("{VERSION}");
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the requested compile, collecting everything that can go wrong
/// along the way (a missing `--src`, a bad path, a fatal `CompileError`)
/// into one reportable chain.
fn run(cli: Cli) -> anyhow::Result<()> {
    let src = cli.src.context("no source file given; pass --src PATH. See --help for details.")?;
    let sm = format!("sm_{}", cli.sm);

    compile_file(&src, &sm, cli.target.triple(), cli.save_temps, cli.out.as_deref())
        .with_context(|| format!("failed to compile '{}'", src.display()))
}
