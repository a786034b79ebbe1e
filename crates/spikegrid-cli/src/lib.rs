//! spikegrid CLI crate
//!
//! Runs spiking network scenarios built with `spikegrid_runtime` from the
//! command line:
//! - run: load a TOML scenario (or the built-in hello-world network), apply
//!   flag overrides, simulate it on the blocking pool with a progress bar,
//!   print monitor summaries and optionally write them as JSON.
//! - scenario: write the built-in scenario as a TOML template.
//!
//! The binary (src/main.rs) wires up logging and argument parsing and calls
//! `SpikegridCli::execute()`. The library surface exists so commands and
//! scenarios can be exercised in tests without spawning a process.

pub mod commands;
pub mod config;
pub mod error;
pub mod scenario;

pub use commands::SpikegridCli;
