use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn caselink() -> Command {
  Command::cargo_bin("caselink").unwrap()
}

fn seed_record(root: &std::path::Path, id: &str, body: &str) {
  std::fs::create_dir_all(root).unwrap();
  std::fs::write(root.join(format!("{id}.json")), body).unwrap();
}

#[test]
fn test_help_lists_subcommands() {
  caselink()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("run"))
    .stdout(predicate::str::contains("stats"));
}

#[test]
fn test_run_help_documents_threshold() {
  caselink()
    .args(["run", "--help"])
    .assert()
    .success()
    .stdout(predicate::str::contains("--threshold"))
    .stdout(predicate::str::contains("--selection-epsilon"));
}

#[test]
fn test_stats_on_unprocessed_store() {
  let temp = TempDir::new().unwrap();
  seed_record(temp.path(), "rec-1", r#"{"id":"rec-1","title":"Quarry search"}"#);

  caselink()
    .args(["stats", "--store-root"])
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("1 records"))
    .stdout(predicate::str::contains("1 not yet processed"));
}

#[test]
fn test_stats_counts_cases_and_noise() {
  let temp = TempDir::new().unwrap();
  seed_record(
    temp.path(),
    "rec-1",
    r#"{"id":"rec-1","embedding":[1.0,0.0],"clusterLabel":0,"clusterConfidence":1.0,"caseId":0}"#,
  );
  seed_record(
    temp.path(),
    "rec-2",
    r#"{"id":"rec-2","embedding":[0.0,1.0],"clusterLabel":-1,"clusterConfidence":0.0,"caseId":-1}"#,
  );

  caselink()
    .args(["stats", "--store-root"])
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("1 in cases"))
    .stdout(predicate::str::contains("noise: 1"));
}

#[test]
fn test_store_root_env_var_is_honored() {
  let temp = TempDir::new().unwrap();
  seed_record(temp.path(), "rec-1", r#"{"id":"rec-1"}"#);

  caselink()
    .arg("stats")
    .env("CASELINK_STORE_ROOT", temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("1 records"));
}

#[test]
fn test_stats_on_missing_root_fails() {
  let temp = TempDir::new().unwrap();

  caselink()
    .args(["stats", "--store-root"])
    .arg(temp.path().join("nowhere"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("store root"));
}

#[test]
fn test_run_fails_fast_when_store_is_missing() {
  let temp = TempDir::new().unwrap();

  // Loading fails before the embedding endpoint is ever contacted
  caselink()
    .args(["run", "--store-root"])
    .arg(temp.path().join("nowhere"))
    .args(["--endpoint", "http://127.0.0.1:1/embed"])
    .assert()
    .failure();
}
