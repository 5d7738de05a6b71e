//! Testing infrastructure for Ucai.
//!
//! Fixtures build throwaway projects holding a loop record and a transcript
//! so the hooks can be exercised against real files.

pub mod fixtures;

pub use fixtures::*;
