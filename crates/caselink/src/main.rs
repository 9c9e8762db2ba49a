use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use caselink::cluster::{ClusterParams, DistanceMetric, SelectionMethod};
use caselink::commands;
use caselink::embedding::DEFAULT_MODEL;
use caselink::store::default_store_root;

#[derive(Parser)]
#[command(name = "caselink")]
#[command(
  about = "Caselink - Case Clustering for Crime-Event Records\nGroups records describing the same real-world case and writes the grouping back to the store"
)]
#[command(version)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct StoreArgs {
  /// Record store root (default: ~/.caselink/records)
  #[arg(long, env = "CASELINK_STORE_ROOT")]
  store_root: Option<PathBuf>,
}

#[derive(Args)]
struct ClusterArgs {
  /// Distance metric between embedding vectors
  #[arg(long, env = "CASELINK_METRIC", value_enum, default_value_t = DistanceMetric::Cosine)]
  metric: DistanceMetric,

  /// Minimum members for a cluster; 2 catches two-article cases
  #[arg(long, env = "CASELINK_MIN_CLUSTER_SIZE", default_value_t = 2)]
  min_cluster_size: usize,

  /// Neighborhood size for local density, counting the point itself;
  /// higher is stricter
  #[arg(long, env = "CASELINK_MIN_SAMPLES", default_value_t = 2)]
  min_samples: usize,

  /// How flat clusters are selected from the hierarchy
  #[arg(long, env = "CASELINK_SELECTION_METHOD", value_enum, default_value_t = SelectionMethod::Leaf)]
  selection_method: SelectionMethod,

  /// Merge clusters born closer than this distance
  #[arg(long, env = "CASELINK_SELECTION_EPSILON", default_value_t = 0.02)]
  selection_epsilon: f32,

  /// Random seed for clustering backends with stochastic sub-steps
  #[arg(long, env = "CASELINK_SEED", default_value_t = 0)]
  seed: u64,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the full pipeline: embed, cluster, gate and write back
  Run {
    #[command(flatten)]
    store: StoreArgs,

    /// Embedding service endpoint
    #[arg(long, env = "CASELINK_EMBED_ENDPOINT", default_value = "http://127.0.0.1:8192/embed")]
    endpoint: String,

    /// Embedding model selector sent to the service
    #[arg(long, env = "CASELINK_EMBED_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[command(flatten)]
    cluster: ClusterArgs,

    /// Minimum membership confidence to promote a cluster into a case.
    /// Higher trades recall for precision: more records land in manual
    /// review instead of being merged into a case wrongly.
    #[arg(long, env = "CASELINK_THRESHOLD", default_value_t = 0.9)]
    threshold: f32,
  },
  /// Show the stored clustering state without recomputing anything
  Stats {
    #[command(flatten)]
    store: StoreArgs,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run { store, endpoint, model, cluster, threshold } => {
      let root = match store.store_root {
        Some(root) => root,
        None => default_store_root()?,
      };
      let params = ClusterParams::default()
        .with_metric(cluster.metric)
        .with_min_cluster_size(cluster.min_cluster_size)
        .with_min_samples(cluster.min_samples)
        .with_selection_method(cluster.selection_method)
        .with_selection_epsilon(cluster.selection_epsilon)
        .with_seed(cluster.seed);

      commands::run_pipeline(root, &endpoint, &model, params, threshold).await?;
    }
    Commands::Stats { store } => {
      let root = match store.store_root {
        Some(root) => root,
        None => default_store_root()?,
      };
      commands::show_stats(root).await?;
    }
  }

  Ok(())
}
