// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Native toolchain integration.
//!
//! The final pipeline stage writes the emitted IR next to the source file
//! and invokes the external `clang` to assemble and link it with the
//! small VSOP runtime (object printing and input reading). Toolchain
//! problems are CLI errors, not compiler diagnostics: they don't count
//! towards the exit code contract.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::debug;

/// Environment variable pointing at the runtime object file.
const RUNTIME_ENV: &str = "VSOP_RUNTIME";

/// Default runtime object path, relative to the working directory.
const RUNTIME_DEFAULT: &str = "runtime/object.o";

/// Writes the emitted IR next to the source file as `<stem>.ll`.
pub fn write_ir(source_path: &Utf8Path, ir_text: &str) -> Result<Utf8PathBuf> {
    let ll_path = source_path.with_extension("ll");
    std::fs::write(&ll_path, ir_text)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to write {ll_path}"))?;
    Ok(ll_path)
}

/// Produces an executable from IR text.
///
/// Writes `<stem>.ll` next to the source file and links it with the
/// runtime into `<stem>` (the source path with its extension stripped).
/// Returns the executable path.
pub fn link_executable(source_path: &Utf8Path, ir_text: &str) -> Result<Utf8PathBuf> {
    let stem = source_path.with_extension("");
    let ll_path = write_ir(source_path, ir_text)?;

    let runtime = std::env::var(RUNTIME_ENV).unwrap_or_else(|_| RUNTIME_DEFAULT.to_string());
    debug!(%ll_path, %stem, runtime, "invoking clang");

    let output = Command::new("clang")
        .arg(ll_path.as_str())
        .arg(&runtime)
        .arg("-o")
        .arg(stem.as_str())
        .output()
        .into_diagnostic()
        .wrap_err("failed to run clang; is it installed and on PATH?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(miette!("clang failed:\n{stderr}"));
    }
    Ok(stem)
}
