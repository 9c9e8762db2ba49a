use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use colored::*;

use crate::assign::NOISE;
use crate::cluster::ClusterParams;
use crate::embedding::HttpEmbeddingProvider;
use crate::pipeline::{Pipeline, RunReport};
use crate::store::{JsonFileStore, RecordStore};

/// Execute a full clustering run and report what it did
pub async fn run_pipeline(
  store_root: PathBuf,
  endpoint: &str,
  model: &str,
  params: ClusterParams,
  threshold: f32,
) -> Result<()> {
  let store = JsonFileStore::new(store_root);
  let provider = HttpEmbeddingProvider::new(endpoint, model);
  let pipeline = Pipeline::new(store, provider, params, threshold);

  let report = pipeline.run().await?;
  print_report(&report);
  Ok(())
}

fn print_report(report: &RunReport) {
  println!(
    "{} Processed {} records: {} updated, {} assigned to cases",
    "✓".green(),
    report.total,
    report.updated,
    report.cases_assigned
  );

  print_histogram(&report.cluster_counts);

  if !report.skipped.is_empty() {
    println!("{} {} records skipped during sync:", "!".yellow(), report.skipped.len());
    for skipped in &report.skipped {
      println!("  {} {}: {}", "-".yellow(), skipped.id.cyan(), skipped.reason);
    }
  }

  println!("Note: cluster labels and case ids are renumbered on every run.");
}

/// Read-only view over the store: label histogram and gating summary
pub async fn show_stats(store_root: PathBuf) -> Result<()> {
  let store = JsonFileStore::new(store_root);
  let records = store.load_records().await?;

  let mut cluster_counts: BTreeMap<i32, usize> = BTreeMap::new();
  let mut pending = 0usize;
  let mut cased = 0usize;

  for record in &records {
    // A record without cluster fields has not been through a run yet
    if !record.is_processed() {
      pending += 1;
      continue;
    }
    if let Some(label) = record.cluster_label {
      *cluster_counts.entry(label).or_insert(0) += 1;
    }
    if record.case_id.is_some_and(|case| case != NOISE) {
      cased += 1;
    }
  }

  println!(
    "{} {} records: {} clustered, {} in cases, {} not yet processed",
    "✓".green(),
    records.len(),
    records.len() - pending,
    cased,
    pending
  );
  print_histogram(&cluster_counts);
  Ok(())
}

fn print_histogram(counts: &BTreeMap<i32, usize>) {
  for (label, count) in counts {
    if *label == NOISE {
      println!("  {} noise: {}", "·".dimmed(), count);
    } else {
      println!("  {} cluster {}: {}", "·".dimmed(), label.to_string().cyan(), count);
    }
  }
}
