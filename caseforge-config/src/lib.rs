// caseforge-config/src/lib.rs
// ============================================================================
// Module: Caseforge Config Library
// Description: Canonical configuration model for CaseForge.
// Purpose: Single source of truth for environment-driven startup config.
// Dependencies: caseforge-store-sqlite, caseforge-worker, serde, toml, thiserror
// ============================================================================

//! ## Overview
//! `caseforge-config` defines the canonical [`Config`] assembled once at
//! process startup from environment variables and an optional TOML file
//! overlay. It fails closed on missing required fields rather than
//! falling back to defaults that would leave the system silently
//! misconfigured.

pub mod config;

pub use config::ClientEndpointConfig;
pub use config::Config;
pub use config::ConfigError;
pub use config::RetryConfig;
pub use config::StorageConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::DEFAULT_BIND_ADDR;

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
