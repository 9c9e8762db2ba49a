use crate::record::Record;

/// Build the single text blob embedded for a record.
///
/// Concatenates, in fixed order, the non-empty parts: title, description,
/// date, then each discovery event's snippet, location and time detail.
/// Pure and deterministic; empty parts contribute nothing.
pub fn build_text(record: &Record) -> String {
  let mut parts: Vec<&str> = Vec::new();

  push_part(&mut parts, record.title.as_deref());
  push_part(&mut parts, record.description.as_deref());
  push_part(&mut parts, record.date.as_deref());

  for event in &record.events {
    push_part(&mut parts, event.text_snippet.as_deref());
    push_part(&mut parts, event.location.as_deref());
    push_part(&mut parts, event.time_detail.as_deref());
  }

  parts.join(" ")
}

fn push_part<'a>(parts: &mut Vec<&'a str>, value: Option<&'a str>) {
  if let Some(value) = value {
    let trimmed = value.trim();
    if !trimmed.is_empty() {
      parts.push(trimmed);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::DiscoveryEvent;

  fn event(snippet: &str, location: &str, time: &str) -> DiscoveryEvent {
    DiscoveryEvent {
      text_snippet: (!snippet.is_empty()).then(|| snippet.to_string()),
      location: (!location.is_empty()).then(|| location.to_string()),
      time_detail: (!time.is_empty()).then(|| time.to_string()),
    }
  }

  #[test]
  fn test_build_text_fixed_order() {
    let mut record = Record::new("r1");
    record.title = Some("Hiker missing".to_string());
    record.description = Some("Last seen on the ridge trail".to_string());
    record.date = Some("2024-03-02".to_string());
    record.events.push(event("backpack recovered", "mile marker 7", "late afternoon"));

    assert_eq!(
      build_text(&record),
      "Hiker missing Last seen on the ridge trail 2024-03-02 backpack recovered mile marker 7 late afternoon"
    );
  }

  #[test]
  fn test_build_text_skips_empty_parts() {
    let mut record = Record::new("r2");
    record.title = Some("  ".to_string());
    record.date = Some("2024-03-02".to_string());
    record.events.push(event("", "riverbank", ""));

    // No placeholders, no double separators
    assert_eq!(build_text(&record), "2024-03-02 riverbank");
  }

  #[test]
  fn test_build_text_empty_record() {
    let record = Record::new("r3");
    assert_eq!(build_text(&record), "");
  }

  #[test]
  fn test_build_text_preserves_event_order() {
    let mut record = Record::new("r4");
    record.events.push(event("first", "", ""));
    record.events.push(event("second", "", ""));
    assert_eq!(build_text(&record), "first second");
  }

  #[test]
  fn test_build_text_is_deterministic() {
    let mut record = Record::new("r5");
    record.title = Some("Same case".to_string());
    record.events.push(event("snippet", "spot", "noon"));

    let first = build_text(&record);
    for _ in 0..10 {
      assert_eq!(build_text(&record), first);
    }
  }
}
