// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The compilation pipeline, up to the selected stage.
//!
//! Every stage keeps going after errors so that one run reports as many
//! problems as possible. Dumps are only produced when the run is clean —
//! except the token dump, which prints tokens as they are recognized, the
//! way the lexer's own error recovery intends.

use tracing::debug;

use vsop_core::ast::Program;
use vsop_core::codegen;
use vsop_core::diagnostic::{Diagnostic, Diagnostics};
use vsop_core::ir;
use vsop_core::parse::parse_program;
use vsop_core::semantic_analysis::resolve;
use vsop_core::source_analysis::{Dialect, Lexer, Position, Token};

/// The last stage to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Emit the token stream.
    Lex,
    /// Emit the untyped AST dump.
    Parse,
    /// Emit the type-annotated AST dump.
    Check,
    /// Emit textual IR.
    Llvm,
}

/// The outcome of a pipeline run.
#[derive(Debug)]
pub struct Compilation {
    /// The stage dump, when the stage produced one.
    pub output: Option<String>,
    /// Everything reported along the way; the count is the exit code.
    pub diagnostics: Diagnostics,
}

/// Runs the pipeline over `source` up to `stage`.
///
/// `optimize` controls the IR clean-up pass driver (`-nopt` disables it);
/// `module_name` names the emitted IR module, conventionally the source
/// file name.
#[must_use]
pub fn compile(
    source: &str,
    stage: Stage,
    dialect: Dialect,
    optimize: bool,
    module_name: &str,
) -> Compilation {
    let mut diagnostics = Diagnostics::new();
    debug!(?stage, ?dialect, module_name, "starting compilation");

    // Lexical analysis. Tokens are dumped as they are produced, so a
    // source with lexical errors still lists every recognizable token.
    let mut lexer = Lexer::new(source, dialect);
    let mut tokens: Vec<Token> = Vec::new();
    let mut token_dump = String::new();
    loop {
        match lexer.next_token() {
            Ok(token) => {
                let eof = token.kind.is_eof();
                if !eof && stage == Stage::Lex {
                    token_dump.push_str(&token.dump());
                    token_dump.push('\n');
                }
                tokens.push(token);
                if eof {
                    break;
                }
            }
            Err(diagnostic) => diagnostics.report(diagnostic),
        }
    }
    if stage == Stage::Lex {
        return Compilation {
            output: Some(token_dump),
            diagnostics,
        };
    }

    let mut program: Program = parse_program(&tokens, dialect, &mut diagnostics);
    if stage == Stage::Parse {
        let output = diagnostics.is_empty().then(|| program.dump(false));
        return Compilation {
            output,
            diagnostics,
        };
    }

    // Declaration resolution, then the interleaved check/emit traversal.
    let table = resolve(&mut program, dialect, &mut diagnostics);
    let mut module = codegen::emit(&mut program, &table, module_name, &mut diagnostics);
    if stage == Stage::Check {
        let output = diagnostics.is_empty().then(|| program.dump(true));
        return Compilation {
            output,
            diagnostics,
        };
    }

    if optimize {
        for error in ir::passes::run_cleanup(&mut module) {
            diagnostics.report(Diagnostic::internal(error, Position::new(1, 1)));
        }
    }
    debug!(count = diagnostics.len(), "compilation finished");

    let output = diagnostics.is_empty().then(|| module.to_ir_text());
    Compilation {
        output,
        diagnostics,
    }
}
