/// Noise label reported by the clusterer and the "no case" sentinel
pub const NOISE: i32 = -1;

/// Promote a cluster assignment into a case assignment.
///
/// A record only gets a case when it was clustered at all and its membership
/// confidence clears the threshold. Everything else stays at -1: a missed
/// grouping is recoverable downstream, a false case merger is not.
pub fn assign_case(label: i32, confidence: f32, threshold: f32) -> i32 {
  if label != NOISE && confidence >= threshold {
    label
  } else {
    NOISE
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_confident_member_is_promoted() {
    assert_eq!(assign_case(4, 0.97, 0.9), 4);
    assert_eq!(assign_case(0, 0.9, 0.9), 0); // threshold is inclusive
  }

  #[test]
  fn test_low_confidence_is_not_promoted() {
    assert_eq!(assign_case(4, 0.89, 0.9), NOISE);
    assert_eq!(assign_case(0, 0.0, 0.9), NOISE);
  }

  #[test]
  fn test_noise_is_never_promoted() {
    // Whatever the clusterer reported for a noise point, it is not a case
    assert_eq!(assign_case(NOISE, 1.0, 0.0), NOISE);
    assert_eq!(assign_case(NOISE, 0.99, 0.9), NOISE);
  }

  #[test]
  fn test_gate_is_monotone_in_threshold() {
    let assignments = [(0, 0.95f32), (1, 0.85), (2, 0.5), (NOISE, 0.0)];

    let promoted = |threshold: f32| {
      assignments
        .iter()
        .filter(|(label, conf)| assign_case(*label, *conf, threshold) != NOISE)
        .count()
    };

    let mut last = promoted(0.0);
    for threshold in [0.5, 0.85, 0.9, 0.99, 1.0] {
      let now = promoted(threshold);
      assert!(now <= last, "raising the threshold must never promote more records");
      last = now;
    }
  }
}
