use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Copy of the superstore fixture project in a scratch directory.
struct TallyTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl TallyTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/superstore");
        let dest = tmp.path().join("superstore");
        Self::copy_dir(&fixture, &dest)?;
        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let target = dst.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                Self::copy_dir(&entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), target)?;
            }
        }
        Ok(())
    }

    fn tally(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tally"));
        cmd.current_dir(&self.root);
        cmd.env_remove("TALLY_TARGET_PATH");
        cmd.env_remove("TALLY_ON_INVALID_ROW");
        cmd
    }

    fn report_path(&self) -> PathBuf {
        self.root.join("target/report.json")
    }

    fn report_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&fs::read_to_string(self.report_path())?)?)
    }
}

#[test]
fn test_run_seals_report_and_prints_kpis() -> Result<()> {
    let env = TallyTestEnv::new()?;

    env.tally()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Report sealed"))
        .stdout(predicate::str::contains("region=West"))
        .stdout(predicate::str::contains("EXCESSIVE_DISCOUNT_MARGIN"));

    let report = env.report_json()?;
    assert_eq!(report["generation"], 0);
    assert_eq!(report["rounding_places"], 4);
    assert!(report["content_hash"].as_str().is_some_and(|h| h.len() == 64));
    Ok(())
}

#[test]
fn test_rerun_keeps_hash_and_bumps_generation() -> Result<()> {
    let env = TallyTestEnv::new()?;

    env.tally().arg("run").assert().success();
    let first = env.report_json()?;
    env.tally().arg("run").assert().success();
    let second = env.report_json()?;

    assert_eq!(first["content_hash"], second["content_hash"]);
    assert_eq!(second["generation"], 1);
    Ok(())
}

#[test]
fn test_json_input_seals_the_same_content() -> Result<()> {
    let env = TallyTestEnv::new()?;

    env.tally().arg("run").assert().success();
    let from_csv = env.report_json()?;
    env.tally().arg("clean").assert().success();
    env.tally()
        .args(["run", "--input", "data/orders.json"])
        .assert()
        .success();
    let from_json = env.report_json()?;

    assert_eq!(from_csv["content_hash"], from_json["content_hash"]);
    Ok(())
}

#[test]
fn test_verify_accepts_exact_and_rejects_drifted_claims() -> Result<()> {
    let env = TallyTestEnv::new()?;
    env.tally().arg("run").assert().success();

    env.tally()
        .args(["verify", "--subject", "region=West/total_profit", "--value", "112.50"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("VERIFIED"));

    env.tally()
        .args(["verify", "--subject", "West region total_profit", "--value", "$112.5"])
        .assert()
        .success();

    env.tally()
        .args(["verify", "--subject", "*/total_sales", "--value", "1,120"])
        .assert()
        .success();

    env.tally()
        .args(["verify", "--subject", "region=West/total_profit", "--value", "112.49"])
        .assert()
        .failure()
        .stdout(predicate::str::starts_with("REJECTED"));

    env.tally()
        .args(["verify", "--subject", "region=North/total_profit", "--value", "0"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_ask_releases_only_cited_numbers() -> Result<()> {
    let env = TallyTestEnv::new()?;
    env.tally().arg("run").assert().success();

    env.tally()
        .args(["ask", "What is our margin?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The current profit margin is -4.6875%."))
        .stdout(predicate::str::contains("[[").not());

    env.tally()
        .args(["ask", "Give me an executive summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Business health score: 23.125."));
    Ok(())
}

#[test]
fn test_summary_prints_health_score() -> Result<()> {
    let env = TallyTestEnv::new()?;
    env.tally().arg("run").assert().success();

    env.tally()
        .arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Health score"))
        .stdout(predicate::str::contains("23.125"))
        .stdout(predicate::str::contains("-52.5"));
    Ok(())
}

#[test]
fn test_tampered_report_is_refused() -> Result<()> {
    let env = TallyTestEnv::new()?;
    env.tally().arg("run").assert().success();

    let mut report = env.report_json()?;
    report["summary"]["total_profit"] = serde_json::Value::String("1000".into());
    fs::write(env.report_path(), serde_json::to_string_pretty(&report)?)?;

    env.tally()
        .args(["verify", "--subject", "summary/total_profit", "--value", "1000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("integrity"));

    // The next run refuses to continue a tampered generation.
    env.tally().arg("run").assert().failure();
    Ok(())
}

#[test]
fn test_invalid_rules_abort_the_run() -> Result<()> {
    let env = TallyTestEnv::new()?;
    fs::write(
        env.root.join("config/rules.yml"),
        "rules:\n  discount_threshold: 1.5\n",
    )?;

    env.tally()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("discount_threshold"));
    assert!(!env.report_path().exists());
    Ok(())
}

#[test]
fn test_clean_removes_target() -> Result<()> {
    let env = TallyTestEnv::new()?;
    env.tally().arg("run").assert().success();
    assert!(env.report_path().exists());

    env.tally()
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed target"));
    assert!(!env.root.join("target").exists());
    Ok(())
}

#[test]
fn test_missing_config_fails() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    Command::new(assert_cmd::cargo::cargo_bin!("tally"))
        .current_dir(tmp.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No configuration file found"));
    Ok(())
}
