// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The `vsopc` command-line driver.
//!
//! Stage flags fix the last stage to run: `-lex` emits the token stream,
//! `-parse` the AST dump, `-check` the typed AST dump, `-llvm` the IR
//! text. Without a stage flag the driver runs the full pipeline and links
//! an executable named after the input file. The exit code is the number
//! of diagnostics emitted.

use std::ffi::OsString;
use std::io::Write;

use camino::Utf8PathBuf;
use clap::{ArgGroup, Parser};
use miette::{IntoDiagnostic, Result, WrapErr};

use vsop_cli::linker;
use vsop_cli::pipeline::{self, Stage};
use vsop_core::source_analysis::Dialect;

/// VSOP compiler
#[derive(Debug, Parser)]
#[command(name = "vsopc")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("stage").args(["lex", "parse", "check", "llvm"])))]
struct Cli {
    /// Stop after lexical analysis and print the token stream
    #[arg(long)]
    lex: bool,

    /// Stop after parsing and print the AST
    #[arg(long)]
    parse: bool,

    /// Stop after semantic analysis and print the annotated AST
    #[arg(long)]
    check: bool,

    /// Stop after code generation and print the IR
    #[arg(long)]
    llvm: bool,

    /// Enable the extended dialect
    #[arg(long)]
    ext: bool,

    /// Skip the IR clean-up passes
    #[arg(long)]
    nopt: bool,

    /// Source file to compile
    file: Utf8PathBuf,
}

/// Promotes the traditional single-dash stage flags (`-lex`, `-ext`, …)
/// to the double-dash spelling clap expects.
fn promote_flags(args: impl Iterator<Item = OsString>) -> Vec<OsString> {
    args.map(|arg| match arg.to_str() {
        Some("-lex" | "-parse" | "-check" | "-llvm" | "-ext" | "-nopt") => {
            let mut promoted = OsString::from("-");
            promoted.push(&arg);
            promoted
        }
        _ => arg,
    })
    .collect()
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    }

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))?;

    let cli = Cli::parse_from(promote_flags(std::env::args_os()));

    let source = std::fs::read_to_string(&cli.file)
        .into_diagnostic()
        .wrap_err_with(|| format!("{}: no such file or directory", cli.file))?;

    let stage = if cli.lex {
        Stage::Lex
    } else if cli.parse {
        Stage::Parse
    } else if cli.check {
        Stage::Check
    } else {
        Stage::Llvm
    };
    let dialect = if cli.ext {
        Dialect::Extended
    } else {
        Dialect::Core
    };
    let file_name = cli.file.file_name().unwrap_or("input.vsop");

    let compilation = pipeline::compile(&source, stage, dialect, !cli.nopt, file_name);

    let stderr = std::io::stderr();
    let mut stderr = stderr.lock();
    for diagnostic in compilation.diagnostics.iter() {
        let _ = writeln!(stderr, "{}:{diagnostic}", cli.file);
    }
    drop(stderr);

    let has_stage_flag = cli.lex || cli.parse || cli.check || cli.llvm;
    if let Some(output) = &compilation.output {
        if has_stage_flag {
            print!("{output}");
            if stage != Stage::Lex && !output.ends_with('\n') {
                println!();
            }
        } else {
            // Full pipeline: assemble and link an executable.
            linker::link_executable(&cli.file, output)?;
        }
    }

    std::process::exit(compilation.diagnostics.len() as i32);
}
