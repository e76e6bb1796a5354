//! Analyst Configuration Module
//!
//! Thresholds, model parameters, and output locations loaded from a YAML
//! file into an immutable [`AnalystConfig`], replacing hardcoded values with
//! operator-tunable ones.
//!
//! ## Loading Order
//!
//! 1. `ADSIGHT_CONFIG` environment variable (path to YAML file)
//! 2. `config/config.yaml` in the current working directory
//! 3. Built-in defaults
//!
//! The config is loaded once in `main()` and passed to the workflow behind
//! an `Arc`; nothing mutates it after startup.

mod analyst_config;

pub use analyst_config::*;
