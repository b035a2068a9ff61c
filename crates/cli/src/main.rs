// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! `mxvm`: parse → validate → {run, emit-asm} (spec §2). The flag surface
//! is intentionally small — target, optimizer on/off, trace, module search
//! path — this binary carries no packaging or build-system logic of its
//! own (spec §1 Non-goals: "native linker invocation").

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mxvm_program::{ProgramSettings, Target};

/// A register-oriented virtual machine: interpret or compile MXVM programs.
#[derive(Parser)]
#[command(name = "mxvm", version, about)]
struct Cli {
    /// MXVM source file to run or compile.
    source: PathBuf,

    /// Emit assembly instead of interpreting the program.
    #[arg(long)]
    emit_asm: bool,

    /// Assembly target for --emit-asm.
    #[arg(long, default_value = "linux")]
    target: CliTarget,

    /// Disable the peephole optimizer.
    #[arg(long)]
    no_optimize: bool,

    /// Enable trace-level logging of every dispatched instruction.
    #[arg(long)]
    trace: bool,

    /// Additional directory or shared-object path to search when loading
    /// `invoke` modules. May be given more than once.
    #[arg(long = "module-path", value_name = "PATH")]
    module_paths: Vec<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliTarget {
    Linux,
    Macos,
    Windows,
}

impl From<CliTarget> for Target {
    fn from(value: CliTarget) -> Self {
        match value {
            CliTarget::Linux => Target::SysV,
            CliTarget::Macos => Target::Darwin,
            CliTarget::Windows => Target::Win64,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    match run(cli) {
        Ok(code) => code_to_exit(code),
        Err(err) => {
            eprintln!("mxvm: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(trace: bool) {
    let default_level = if trace { "trace" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<i64, mxvm_types::MxvmError> {
    let source_path = cli.source.to_string_lossy().into_owned();
    let text = std::fs::read_to_string(&cli.source)
        .map_err(|e| mxvm_types::MxvmError::host(format!("{source_path}: {e}")))?;

    let tree = mxvm_parser::parse_source(&text)?;
    let flat = mxvm_program::flatten::flatten(&tree)?;

    let mut settings = ProgramSettings::new(&source_path, cli.target.into());
    settings.optimize = !cli.no_optimize;
    settings.trace = cli.trace;
    settings.module_search_paths = cli.module_paths;

    if cli.emit_asm {
        let asm = mxvm_codegen::generate(&flat, settings.target, settings.optimize);
        print!("{asm}");
        return Ok(0);
    }

    let mut interp = mxvm_runtime::Interpreter::new(flat, settings.clone());
    interp.modules = mxvm_modules::load_registry(&settings.module_search_paths)?;
    interp.run()
}

fn code_to_exit(code: i64) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}
