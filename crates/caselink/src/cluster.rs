use serde::{Deserialize, Serialize};

use crate::assign::NOISE;
use crate::error::ClusterError;

/// Distances collapse below this; keeps density values finite for duplicates
const MIN_DISTANCE: f64 = 1e-10;

/// Distance metric over embedding vectors.
///
/// Both are valid on unit-normalized vectors: Euclidean distance on the unit
/// sphere is monotonic with cosine distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
  #[default]
  Cosine,
  Euclidean,
}

/// How flat clusters are pulled out of the condensed hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
  /// Leaves of the hierarchy: fine-grained, keeps near-duplicate bursts
  /// apart instead of collapsing them into one parent cluster
  #[default]
  Leaf,
  /// Excess-of-mass stability selection: coarser, general purpose
  Eom,
}

impl std::fmt::Display for DistanceMetric {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Cosine => write!(f, "cosine"),
      Self::Euclidean => write!(f, "euclidean"),
    }
  }
}

impl std::fmt::Display for SelectionMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Leaf => write!(f, "leaf"),
      Self::Eom => write!(f, "eom"),
    }
  }
}

/// Tuning knobs for the density clusterer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
  pub metric: DistanceMetric,

  /// Minimum members for a grouping to be a cluster rather than noise.
  /// 2 matters here: a case can be exactly two corroborating articles.
  pub min_cluster_size: usize,

  /// Neighborhood size for the local density estimate, counting the point
  /// itself; higher is stricter
  pub min_samples: usize,

  pub selection_method: SelectionMethod,

  /// Clusters born closer than this distance merge upward, so a burst of
  /// near-identical records does not fragment into spurious cases
  pub selection_epsilon: f32,

  /// Threaded through for reproducibility. The exact neighbor search used
  /// here has no stochastic sub-steps, so output does not depend on it;
  /// approximate backends can honor it without a config break.
  pub seed: u64,
}

impl Default for ClusterParams {
  fn default() -> Self {
    Self {
      metric: DistanceMetric::Cosine,
      min_cluster_size: 2,
      min_samples: 2,
      selection_method: SelectionMethod::Leaf,
      selection_epsilon: 0.02,
      seed: 0,
    }
  }
}

impl ClusterParams {
  #[must_use]
  pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
    self.metric = metric;
    self
  }

  #[must_use]
  pub fn with_min_cluster_size(mut self, size: usize) -> Self {
    self.min_cluster_size = size;
    self
  }

  #[must_use]
  pub fn with_min_samples(mut self, samples: usize) -> Self {
    self.min_samples = samples;
    self
  }

  #[must_use]
  pub fn with_selection_method(mut self, method: SelectionMethod) -> Self {
    self.selection_method = method;
    self
  }

  #[must_use]
  pub fn with_selection_epsilon(mut self, epsilon: f32) -> Self {
    self.selection_epsilon = epsilon;
    self
  }

  #[must_use]
  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = seed;
    self
  }

  pub fn validate(&self) -> Result<(), ClusterError> {
    if self.min_cluster_size < 2 {
      return Err(ClusterError::invalid_parameter(format!(
        "min_cluster_size must be >= 2, got {}",
        self.min_cluster_size
      )));
    }
    if self.min_samples < 1 {
      return Err(ClusterError::invalid_parameter(format!(
        "min_samples must be >= 1, got {}",
        self.min_samples
      )));
    }
    if self.min_samples > self.min_cluster_size {
      return Err(ClusterError::invalid_parameter(format!(
        "min_samples ({}) must be <= min_cluster_size ({})",
        self.min_samples, self.min_cluster_size
      )));
    }
    if !self.selection_epsilon.is_finite() || self.selection_epsilon < 0.0 {
      return Err(ClusterError::invalid_parameter(format!(
        "selection_epsilon must be finite and >= 0, got {}",
        self.selection_epsilon
      )));
    }
    Ok(())
  }
}

/// One clustering run over one snapshot of the record set
#[derive(Debug, Clone)]
pub struct Clustering {
  /// Per record: -1 for noise, otherwise 0..cluster_count
  pub labels: Vec<i32>,
  /// Per record: membership strength in [0,1]; 0 for noise
  pub confidences: Vec<f32>,
  pub cluster_count: usize,
}

/// Density-based clusterer over embedding vectors (HDBSCAN family).
///
/// Pipeline: core distances from the k-th nearest neighbor, mutual
/// reachability graph, exact minimum spanning tree, single-linkage
/// hierarchy, condensation by min_cluster_size, then flat selection.
pub struct Clusterer {
  params: ClusterParams,
}

impl Clusterer {
  pub fn new(params: ClusterParams) -> Self {
    Self { params }
  }

  pub fn params(&self) -> &ClusterParams {
    &self.params
  }

  /// Cluster the full matrix at once.
  ///
  /// Deterministic for a fixed input and configuration. Fails before any
  /// caller could write partial results: empty input, ragged rows and
  /// non-finite components are all fatal.
  pub fn fit(&self, vectors: &[Vec<f32>]) -> Result<Clustering, ClusterError> {
    self.params.validate()?;

    let n = vectors.len();
    if n == 0 {
      return Err(ClusterError::EmptyInput);
    }

    let dim = vectors[0].len();
    for (row, vector) in vectors.iter().enumerate() {
      if vector.len() != dim {
        return Err(ClusterError::DimensionMismatch { row, got: vector.len(), expected: dim });
      }
      if vector.iter().any(|v| !v.is_finite()) {
        return Err(ClusterError::NonFinite { row });
      }
    }

    if n < self.params.min_cluster_size {
      // Too few records to form any cluster: everything is noise
      return Ok(Clustering {
        labels: vec![NOISE; n],
        confidences: vec![0.0; n],
        cluster_count: 0,
      });
    }

    let core = self.core_distances(vectors);
    let mst = self.spanning_tree(vectors, &core);
    let linkage = single_linkage(&mst, n);
    let condensed = condense(&linkage, n, self.params.min_cluster_size);
    self.extract(&condensed, n)
  }

  fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
    match self.params.metric {
      DistanceMetric::Cosine => cosine_distance(a, b),
      DistanceMetric::Euclidean => euclidean_distance(a, b),
    }
  }

  /// Distance to the min_samples-th nearest neighbor, per point. The
  /// neighborhood counts the point itself, so min_samples = 2 means the
  /// nearest other point sets the local density; min_samples = 1 degrades
  /// to plain single linkage on raw distances.
  fn core_distances(&self, vectors: &[Vec<f32>]) -> Vec<f64> {
    let n = vectors.len();
    let k = self.params.min_samples;

    (0..n)
      .map(|i| {
        if k < 2 {
          return 0.0;
        }
        let mut distances: Vec<f64> =
          (0..n).filter(|&j| j != i).map(|j| self.distance(&vectors[i], &vectors[j])).collect();
        distances.sort_by(|a, b| a.total_cmp(b));
        distances.get(k - 2).or_else(|| distances.last()).copied().unwrap_or(0.0)
      })
      .collect()
  }

  /// Exact MST over the mutual reachability graph (Prim), edges sorted
  /// ascending. mr(a,b) = max(core(a), core(b), dist(a,b)).
  fn spanning_tree(&self, vectors: &[Vec<f32>], core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = vectors.len();
    let mut in_tree = vec![false; n];
    let mut best_dist = vec![f64::MAX; n];
    let mut best_edge = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    in_tree[0] = true;
    for j in 1..n {
      best_dist[j] = self.distance(&vectors[0], &vectors[j]).max(core[0]).max(core[j]);
    }

    for _ in 1..n {
      let mut next = usize::MAX;
      let mut next_dist = f64::MAX;
      for j in 0..n {
        if !in_tree[j] && best_dist[j] < next_dist {
          next_dist = best_dist[j];
          next = j;
        }
      }

      in_tree[next] = true;
      edges.push((best_edge[next], next, next_dist));

      for j in 0..n {
        if !in_tree[j] {
          let mr = self.distance(&vectors[next], &vectors[j]).max(core[next]).max(core[j]);
          if mr < best_dist[j] {
            best_dist[j] = mr;
            best_edge[j] = next;
          }
        }
      }
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
    edges
  }

  /// Flat clusters out of the condensed hierarchy: selection, epsilon
  /// merging, labeling and membership confidences.
  fn extract(&self, condensed: &[CondensedCluster], n: usize) -> Result<Clustering, ClusterError> {
    let m = condensed.len();
    let mut selected = vec![false; m];

    match self.params.selection_method {
      SelectionMethod::Leaf => {
        for (c, cluster) in condensed.iter().enumerate().skip(1) {
          selected[c] = cluster.children.is_empty();
        }
      }
      SelectionMethod::Eom => {
        select_by_stability(condensed, &mut selected);
      }
    }

    // Degenerate hierarchy: the root never split into two viable children.
    // The root itself becomes eligible, with strict membership below.
    let root_only = m == 1;
    if root_only {
      selected[0] = true;
    }

    if self.params.selection_epsilon > 0.0 {
      merge_within_epsilon(condensed, &mut selected, self.params.selection_epsilon as f64);
    }

    // Max density reached inside each cluster, over its direct rows
    let lambda_max: Vec<f64> = condensed
      .iter()
      .map(|cluster| {
        cluster
          .points
          .iter()
          .map(|&(_, lambda)| lambda)
          .chain(cluster.children.iter().map(|&child| condensed[child].birth_lambda))
          .fold(0.0, f64::max)
      })
      .collect();

    // Each point exits exactly one condensed cluster; its assignment is the
    // nearest selected ancestor of that exit, if any.
    let mut exit = vec![(0usize, 0.0f64); n];
    for (c, cluster) in condensed.iter().enumerate() {
      for &(point, lambda) in &cluster.points {
        exit[point] = (c, lambda);
      }
    }

    let mut assigned = vec![None; n];
    let mut confidences = vec![0.0f32; n];

    for point in 0..n {
      let (mut cursor, lambda_point) = exit[point];
      let home = loop {
        if selected[cursor] {
          break Some(cursor);
        }
        match condensed[cursor].parent {
          Some(parent) => cursor = parent,
          None => break None,
        }
      };

      let Some(cluster) = home else { continue };

      if cluster == 0 {
        // Single-cluster fallback: only points persisting into the densest
        // region (or within the epsilon radius, when configured) belong
        let floor = if self.params.selection_epsilon > 0.0 {
          1.0 / self.params.selection_epsilon as f64
        } else {
          lambda_max[0]
        };
        if lambda_point < floor {
          continue;
        }
      }

      assigned[point] = Some(cluster);
      let ceiling = lambda_max[cluster].max(MIN_DISTANCE);
      confidences[point] = (lambda_point.min(ceiling) / ceiling).clamp(0.0, 1.0) as f32;
    }

    // Number clusters 0..k-1 by their smallest member index, so labels are
    // stable for a fixed input even though they carry no cross-run identity
    let mut order: Vec<usize> = Vec::new();
    for cluster in assigned.iter().flatten() {
      if !order.contains(cluster) {
        order.push(*cluster);
      }
    }

    let mut labels = vec![NOISE; n];
    for (point, cluster) in assigned.iter().enumerate() {
      if let Some(cluster) = cluster {
        let label = order.iter().position(|c| c == cluster).unwrap_or(0);
        labels[point] = label as i32;
      }
    }

    Ok(Clustering { labels, confidences, cluster_count: order.len() })
  }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
  let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
  let mag_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
  let mag_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();

  if mag_a == 0.0 || mag_b == 0.0 {
    1.0
  } else {
    (1.0 - dot / (mag_a * mag_b)).max(0.0)
  }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
  a.iter()
    .zip(b.iter())
    .map(|(x, y)| {
      let d = (*x as f64) - (*y as f64);
      d * d
    })
    .sum::<f64>()
    .sqrt()
}

/// Single-linkage hierarchy built from sorted MST edges.
/// Internal node i (id n + i) merges two earlier nodes at `dist[i]`.
struct Linkage {
  left: Vec<usize>,
  right: Vec<usize>,
  dist: Vec<f64>,
  size: Vec<usize>,
}

fn single_linkage(edges: &[(usize, usize, f64)], n: usize) -> Linkage {
  let mut linkage = Linkage {
    left: Vec::with_capacity(n - 1),
    right: Vec::with_capacity(n - 1),
    dist: Vec::with_capacity(n - 1),
    size: Vec::with_capacity(n - 1),
  };

  // Union-find over points; each component tracks its current tree node
  let mut parent: Vec<usize> = (0..n).collect();
  let mut node_of: Vec<usize> = (0..n).collect();

  fn find(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
      root = parent[root];
    }
    let mut cursor = i;
    while parent[cursor] != root {
      let next = parent[cursor];
      parent[cursor] = root;
      cursor = next;
    }
    root
  }

  for &(a, b, weight) in edges {
    let ra = find(&mut parent, a);
    let rb = find(&mut parent, b);

    let left = node_of[ra];
    let right = node_of[rb];
    let size_left = if left < n { 1 } else { linkage.size[left - n] };
    let size_right = if right < n { 1 } else { linkage.size[right - n] };

    linkage.left.push(left);
    linkage.right.push(right);
    linkage.dist.push(weight);
    linkage.size.push(size_left + size_right);

    parent[rb] = ra;
    node_of[ra] = n + linkage.left.len() - 1;
  }

  linkage
}

/// A cluster of the condensed hierarchy.
///
/// `points` records every point that fell out of this cluster and the
/// density (lambda = 1/distance) at which it left. A child cluster's
/// `birth_lambda` is the density at which the parent split.
struct CondensedCluster {
  parent: Option<usize>,
  birth_lambda: f64,
  children: Vec<usize>,
  points: Vec<(usize, f64)>,
  size: usize,
}

/// Collapse the dendrogram: splits that shed fewer than min_cluster_size
/// points are demoted to points falling out of the surviving cluster.
fn condense(linkage: &Linkage, n: usize, min_cluster_size: usize) -> Vec<CondensedCluster> {
  let node_size = |node: usize| if node < n { 1 } else { linkage.size[node - n] };

  let mut clusters = vec![CondensedCluster {
    parent: None,
    birth_lambda: 0.0,
    children: Vec::new(),
    points: Vec::new(),
    size: n,
  }];

  if n < 2 {
    if n == 1 {
      clusters[0].points.push((0, 1.0 / MIN_DISTANCE));
    }
    return clusters;
  }

  let root_node = n + linkage.left.len() - 1;
  let mut stack = vec![(root_node, 0usize)];

  while let Some((node, cluster)) = stack.pop() {
    let i = node - n;
    let (left, right) = (linkage.left[i], linkage.right[i]);
    let lambda = 1.0 / linkage.dist[i].max(MIN_DISTANCE);

    let left_viable = node_size(left) >= min_cluster_size;
    let right_viable = node_size(right) >= min_cluster_size;

    match (left_viable, right_viable) {
      (true, true) => {
        // A true split: both sides carry on as new clusters
        for child_node in [left, right] {
          let child = clusters.len();
          clusters.push(CondensedCluster {
            parent: Some(cluster),
            birth_lambda: lambda,
            children: Vec::new(),
            points: Vec::new(),
            size: node_size(child_node),
          });
          clusters[cluster].children.push(child);
          stack.push((child_node, child));
        }
      }
      (true, false) => {
        shed_points(linkage, n, right, lambda, &mut clusters[cluster].points);
        stack.push((left, cluster));
      }
      (false, true) => {
        shed_points(linkage, n, left, lambda, &mut clusters[cluster].points);
        stack.push((right, cluster));
      }
      (false, false) => {
        shed_points(linkage, n, left, lambda, &mut clusters[cluster].points);
        shed_points(linkage, n, right, lambda, &mut clusters[cluster].points);
      }
    }
  }

  clusters
}

/// Record every point under `node` as leaving its cluster at `lambda`
fn shed_points(linkage: &Linkage, n: usize, node: usize, lambda: f64, out: &mut Vec<(usize, f64)>) {
  let mut stack = vec![node];
  while let Some(node) = stack.pop() {
    if node < n {
      out.push((node, lambda));
    } else {
      stack.push(linkage.left[node - n]);
      stack.push(linkage.right[node - n]);
    }
  }
}

/// Excess-of-mass selection: a cluster wins over its subtree when its own
/// stability exceeds the stability its children account for.
fn select_by_stability(condensed: &[CondensedCluster], selected: &mut [bool]) {
  let m = condensed.len();

  let stability: Vec<f64> = condensed
    .iter()
    .map(|cluster| {
      let from_points: f64 =
        cluster.points.iter().map(|&(_, lambda)| lambda - cluster.birth_lambda).sum();
      let from_children: f64 = cluster
        .children
        .iter()
        .map(|&child| {
          (condensed[child].birth_lambda - cluster.birth_lambda) * condensed[child].size as f64
        })
        .sum();
      from_points + from_children
    })
    .collect();

  // Children always index after their parent, so reverse order is bottom-up
  let mut subtree = stability.clone();
  for c in (1..m).rev() {
    if condensed[c].children.is_empty() {
      selected[c] = true;
      continue;
    }

    let child_sum: f64 = condensed[c].children.iter().map(|&child| subtree[child]).sum();
    if stability[c] > child_sum {
      selected[c] = true;
      deselect_descendants(condensed, selected, c);
      subtree[c] = stability[c];
    } else {
      subtree[c] = child_sum;
    }
  }
}

fn deselect_descendants(condensed: &[CondensedCluster], selected: &mut [bool], cluster: usize) {
  let mut stack = condensed[cluster].children.clone();
  while let Some(child) = stack.pop() {
    selected[child] = false;
    stack.extend(condensed[child].children.iter().copied());
  }
}

/// Clusters born at a distance tighter than epsilon climb to the first
/// ancestor at or above it, merging over-fragmented near-duplicate bursts
fn merge_within_epsilon(condensed: &[CondensedCluster], selected: &mut [bool], epsilon: f64) {
  let chosen: Vec<usize> = (0..condensed.len()).filter(|&c| selected[c]).collect();

  for c in chosen {
    let mut cursor = c;
    loop {
      if cursor == 0 || 1.0 / condensed[cursor].birth_lambda >= epsilon {
        break;
      }
      match condensed[cursor].parent {
        Some(parent) if parent != 0 => cursor = parent,
        _ => break,
      }
    }
    if cursor != c {
      selected[c] = false;
      selected[cursor] = true;
    }
  }

  // A selected ancestor absorbs any selected cluster beneath it
  for c in 0..condensed.len() {
    if !selected[c] {
      continue;
    }
    let mut cursor = condensed[c].parent;
    while let Some(up) = cursor {
      if selected[up] {
        selected[c] = false;
        break;
      }
      cursor = condensed[up].parent;
    }
  }
}
