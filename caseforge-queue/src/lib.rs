// caseforge-queue/src/lib.rs
// ============================================================================
// Module: CaseForge Queue Library
// Description: In-memory reliable job queue implementing the Queue contract.
// Purpose: Provide the only Queue backend this workspace ships.
// Dependencies: caseforge-core, tokio
// ============================================================================

//! ## Overview
//! CaseForge Queue provides [`InMemoryQueue`], a per-topic FIFO with
//! visibility timeout and dead-lettering, sufficient to run the system
//! without an external broker.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod queue;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use queue::InMemoryQueue;

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
}
