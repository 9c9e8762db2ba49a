use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discovery event extracted upstream from a transcript
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEvent {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub text_snippet: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub time_detail: Option<String>,
}

/// One input document, persisted as a single JSON file keyed by id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub events: Vec<DiscoveryEvent>,

  // Clustering output (None until a run has processed this record)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub embedding: Option<Vec<f32>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cluster_label: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cluster_confidence: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub case_id: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      title: None,
      description: None,
      date: None,
      events: Vec::new(),
      embedding: None,
      cluster_label: None,
      cluster_confidence: None,
      case_id: None,
      updated_at: None,
    }
  }

  /// True once a clustering run has written its output fields
  pub fn is_processed(&self) -> bool {
    self.embedding.is_some() && self.cluster_label.is_some()
  }
}

/// The write-back payload for one record after a clustering run
#[derive(Debug, Clone)]
pub struct RecordUpdate {
  pub id: String,
  pub cluster_label: i32,
  pub cluster_confidence: f32,
  pub case_id: i32,
  pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_record_roundtrip_uses_camel_case() {
    let mut record = Record::new("rec-1");
    record.title = Some("River search resumes".to_string());
    record.cluster_label = Some(3);
    record.cluster_confidence = Some(0.95);

    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains("\"clusterLabel\":3"));
    assert!(json.contains("\"clusterConfidence\""));
    assert!(!json.contains("cluster_label"));

    let back: Record = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, "rec-1");
    assert_eq!(back.cluster_label, Some(3));
  }

  #[test]
  fn test_absent_fields_deserialize_as_none() {
    let record: Record = serde_json::from_str(r#"{"id":"bare"}"#).unwrap();
    assert!(record.title.is_none());
    assert!(record.events.is_empty());
    assert!(!record.is_processed());
  }

  #[test]
  fn test_event_fields_are_camel_case() {
    let event: DiscoveryEvent =
      serde_json::from_str(r#"{"textSnippet":"found near the bridge","timeDetail":"dawn"}"#)
        .unwrap();
    assert_eq!(event.text_snippet.as_deref(), Some("found near the bridge"));
    assert_eq!(event.time_detail.as_deref(), Some("dawn"));
    assert!(event.location.is_none());
  }
}
