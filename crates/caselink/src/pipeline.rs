use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::assign::{assign_case, NOISE};
use crate::cluster::{ClusterParams, Clusterer};
use crate::embedding::{validate_batch, EmbeddingProvider};
use crate::error::PipelineError;
use crate::feature;
use crate::record::RecordUpdate;
use crate::store::{RecordStore, SkippedRecord};

/// What one full run did, for reporting; no record goes unaccounted
#[derive(Debug)]
pub struct RunReport {
  /// Records in the snapshot
  pub total: usize,
  /// Records whose clustering fields were written back
  pub updated: usize,
  /// Records whose write failed, with reasons
  pub skipped: Vec<SkippedRecord>,
  /// Records promoted to a case by the confidence gate
  pub cases_assigned: usize,
  /// Cluster label histogram for the run (-1 is the noise bucket)
  pub cluster_counts: BTreeMap<i32, usize>,
}

/// The full batch pipeline: load → build → embed → cluster → gate → sync.
///
/// Collaborators are injected; the pipeline owns no global state. A run
/// either reaches the sync step with one coherent clustering or aborts
/// without writing anything: labels from different runs must never mix.
pub struct Pipeline<S, P> {
  store: S,
  provider: P,
  params: ClusterParams,
  confidence_threshold: f32,
}

impl<S: RecordStore, P: EmbeddingProvider> Pipeline<S, P> {
  pub fn new(store: S, provider: P, params: ClusterParams, confidence_threshold: f32) -> Self {
    Self { store, provider, params, confidence_threshold }
  }

  pub async fn run(&self) -> Result<RunReport, PipelineError> {
    let records = self.store.load_records().await?;
    if records.is_empty() {
      return Err(PipelineError::EmptyInput);
    }
    info!(total = records.len(), "starting clustering run");

    let texts: Vec<String> = records.iter().map(feature::build_text).collect();
    for (record, text) in records.iter().zip(&texts) {
      if text.is_empty() {
        // Still embedded; it just carries no signal worth trusting
        warn!(id = %record.id, "record has an empty feature text");
      }
    }

    let vectors = self.provider.embed(&texts).await?;
    // Row alignment is the provider's contract, but a violation here would
    // write another record's clustering output, so it is re-checked before
    // anything downstream consumes the rows
    validate_batch(texts.len(), &vectors)?;

    let clustering = Clusterer::new(self.params.clone()).fit(&vectors)?;
    info!(
      clusters = clustering.cluster_count,
      noise = clustering.labels.iter().filter(|&&l| l == NOISE).count(),
      "clustering complete"
    );

    let updates: Vec<RecordUpdate> = records
      .iter()
      .zip(vectors)
      .zip(clustering.labels.iter().zip(&clustering.confidences))
      .map(|((record, embedding), (&label, &confidence))| RecordUpdate {
        id: record.id.clone(),
        cluster_label: label,
        cluster_confidence: confidence,
        case_id: assign_case(label, confidence, self.confidence_threshold),
        embedding,
      })
      .collect();

    let cases_assigned = updates.iter().filter(|u| u.case_id != NOISE).count();
    let mut cluster_counts: BTreeMap<i32, usize> = BTreeMap::new();
    for label in &clustering.labels {
      *cluster_counts.entry(*label).or_insert(0) += 1;
    }

    let outcome = self.store.apply_updates(&updates).await?;
    info!(updated = outcome.updated, skipped = outcome.skipped.len(), "sync complete");

    Ok(RunReport {
      total: records.len(),
      updated: outcome.updated,
      skipped: outcome.skipped,
      cases_assigned,
      cluster_counts,
    })
  }
}
