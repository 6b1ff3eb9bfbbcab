//! Confidential ERC20 terminal client
//!
//! Hosts the production collaborators of the core library (a key-backed
//! JSON-RPC wallet and the HTTP encryption gateway), wires them per build
//! mode and exposes the terminal commands.

pub mod commands;
pub mod config;
pub mod relayer;
pub mod rpc_wallet;
pub mod session;

pub use config::{expand_env_vars, AppConfig};
pub use session::App;
