//! Catalog matching library: normalization, search strategies, scoring and
//! the match engine, plus the input reader and report writer used by the CLI.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod input;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod provider;
pub mod report;
pub mod safety;
pub mod scoring;
pub mod similarity;
pub mod strategy;
