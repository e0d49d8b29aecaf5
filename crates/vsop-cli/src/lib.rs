// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! VSOP compiler command-line interface internals.
//!
//! The pipeline and linker live here so that integration tests can drive
//! them without spawning the binary.

pub mod linker;
pub mod pipeline;
