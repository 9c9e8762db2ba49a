//! Caselink - Case Clustering for Crime-Event Records
//!
//! Groups textual records that describe the same real-world case by
//! embedding each record's feature text, clustering the vectors with a
//! density-based algorithm, and gating cluster membership into case
//! assignments by confidence.
//!
//! Cluster labels and case ids are per-run values: a fresh run renumbers
//! clusters from zero, so two executions must never be diffed against each
//! other by id.

pub mod assign;
pub mod cluster;
pub mod commands;
pub mod embedding;
pub mod error;
pub mod feature;
pub mod pipeline;
pub mod record;
pub mod store;
