//! Shared utilities for the research assistant workspace
//!
//! This crate provides logging setup and the environment helpers every
//! configuration type in the workspace is built on.

pub mod config;
pub mod logging;

pub use config::{Env, EnvError, env_first, env_parse, env_var, load_dotenv};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
