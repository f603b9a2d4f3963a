//! Core of the sorapc video generation client.
//!
//! Credentials, job tracking, restart recovery and the download pipeline,
//! composed by [`orchestrator::Orchestrator`].

pub mod config;
pub mod credentials;
pub mod database;
pub mod downloader;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod remote;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
