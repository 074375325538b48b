//! form13f - SEC Form 13F holdings extraction pipeline.
//!
//! Fetches 13F filings, extracts the holdings table through a cascade of
//! parsers (strict XML, loose markup, then a language model), and persists
//! one normalized artifact per accession, skipping accessions already done.

pub mod cli;
pub mod config;
pub mod extract;
pub mod http_client;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod source;
pub mod storage;
