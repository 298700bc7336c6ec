//! Ralph - a resumable, crash-safe agent loop
//!
//! Ralph drives an external agent command through repeated fresh-context
//! iterations until a completion token appears or a safety limit stops it.
//! All loop state lives in files, so any process can stop, pause or resume it.

pub mod config;
pub mod domain;
pub mod environment;
pub mod error;
pub mod id;
pub mod manager;
pub mod orchestrator;
pub mod policy;
pub mod prompt;
pub mod runner;
pub mod storage;
pub mod work_unit;

pub use error::{RalphError, Result};
