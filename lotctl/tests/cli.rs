use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

struct Survey {
    dir: TempDir,
}

impl Survey {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("lotctl").unwrap();
        cmd.env("LOTCTL_STATE_DIR", self.dir.path().join("state"));
        cmd
    }

    fn ok(&self, args: &[&str]) {
        self.cmd().args(args).assert().success();
    }

    fn json(&self, args: &[&str]) -> Value {
        let out = self.cmd().arg("--json").args(args).output().unwrap();
        assert!(out.status.success(), "{args:?} failed");
        serde_json::from_slice(&out.stdout).unwrap()
    }
}

#[test]
fn sight_and_manual_capture() {
    let s = Survey::new();
    s.ok(&["new-lot", "Norte"]);
    s.ok(&["distance", "15"]);
    s.cmd()
        .args(["sight", "0"])
        .assert()
        .success()
        .stdout(contains("segment 1: 1.60 m (+1.60) sensor"));
    s.cmd()
        .args(["capture", "8.2"])
        .assert()
        .success()
        .stdout(contains("segment 2: 8.20 m (+6.60) manual"));
    s.cmd()
        .arg("commit")
        .assert()
        .success()
        .stdout(contains("tree 1 MethodA: 8.20 m in 2 segments"));

    let status = s.json(&["status"]);
    assert_eq!(status["method"], "MethodB");
    assert_eq!(status["tree"], 1);
    assert_eq!(status["segments"].as_array().unwrap().len(), 0);
}

#[test]
fn export_lot_csv() {
    let s = Survey::new();
    let out = s.dir.path().join("out");
    s.ok(&["new-lot", "Norte"]);
    s.ok(&["capture", "1.6"]);
    s.ok(&["capture", "8.2"]);
    s.ok(&["commit"]);
    let res = s.json(&["export", "--out", out.to_str().unwrap()]);
    let path = res["path"].as_str().unwrap();
    let csv = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Lot,Tree,Method,Segment"));
    assert_eq!(lines[1], "Norte,1,MethodA,1,1.60,1.60,manual,15.00,8.20");
    assert_eq!(lines[2], "Norte,1,MethodA,2,8.20,6.60,manual,15.00,8.20");
}

#[test]
fn rejected_height_is_reported() {
    let s = Survey::new();
    s.ok(&["new-lot", "Norte"]);
    s.ok(&["capture", "5"]);
    s.cmd()
        .args(["capture", "4"])
        .assert()
        .failure()
        .stderr(contains("must be greater than 5.00 m"));
    s.cmd()
        .args(["edit", "0", "3"])
        .assert()
        .failure()
        .stderr(contains("numbered from 1"));
    s.cmd()
        .args(["delete", "2"])
        .assert()
        .failure()
        .stderr(contains("segment 2 not found"));

    let status = s.json(&["status"]);
    assert_eq!(status["segments"].as_array().unwrap().len(), 1);
}

#[test]
fn lots_round_trip() {
    let s = Survey::new();
    s.ok(&["new-lot", "Norte"]);
    s.ok(&["tree", "4"]);
    s.ok(&["capture", "12"]);
    s.ok(&["commit"]);
    s.cmd().arg("save").assert().success().stdout(contains("lot created"));
    s.ok(&["clear"]);

    let lots = s.json(&["lots"]);
    assert_eq!(lots[0]["name"], "Norte");
    assert_eq!(lots[0]["measurement_count"], 1);

    s.cmd()
        .args(["load", "Norte"])
        .assert()
        .success()
        .stdout(contains("loaded Norte at tree 5"));
    s.ok(&["delete-lot", "Norte"]);
    s.cmd()
        .args(["load", "Norte"])
        .assert()
        .failure()
        .stderr(contains("not found"));
}

#[test]
fn commas_survive_export() {
    let s = Survey::new();
    let out = s.dir.path().join("out");
    s.ok(&["new-lot", "Norte, parcela 2"]);
    s.ok(&["capture", "3"]);
    s.ok(&["commit"]);
    s.ok(&["save"]);
    let res = s.json(&["export", "--all", "--out", out.to_str().unwrap()]);
    let path = res["path"].as_str().unwrap();
    assert!(path.contains("tree_heights_ALL_"));
    let csv = fs::read_to_string(path).unwrap();
    assert!(csv.lines().nth(1).unwrap().starts_with("\"Norte, parcela 2\",1,MethodA"));
}

#[test]
fn calibrate_then_sight() {
    let s = Survey::new();
    s.ok(&["new-lot", "Norte"]);
    let cal = s.json(&["calibrate", "-2.5"]);
    assert_eq!(cal["calibration_offset"], -2.5);
    let seg = s.json(&["sight", "-2.5"]);
    assert_eq!(seg["cumulative_height"], 1.6);
    assert_eq!(seg["capture_method"], "sensor");
}

#[test]
fn edit_method_next_and_export_active_lot() {
    let s = Survey::new();
    let out = s.dir.path().join("out");
    s.ok(&["new-lot", "Norte"]);
    s.ok(&["capture", "2"]);
    s.ok(&["capture", "5"]);
    s.cmd()
        .args(["edit", "2", "6"])
        .assert()
        .success()
        .stdout(contains("segment 2: 6.00 m (+4.00) manual"));
    s.cmd()
        .args(["method", "b"])
        .assert()
        .success()
        .stdout(contains("MethodB"));
    s.cmd()
        .arg("commit")
        .assert()
        .success()
        .stdout(contains("tree 1 MethodB: 6.00 m in 2 segments"));
    s.cmd().arg("next").assert().success().stdout(contains("tree 2"));

    let status = s.json(&["status"]);
    assert_eq!(status["tree"], 2);
    assert_eq!(status["method"], "MethodA");

    let res = s.json(&["export", "--all", "--out", out.to_str().unwrap()]);
    let csv = fs::read_to_string(res["path"].as_str().unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with(",Date"));
    assert!(lines[1].starts_with("Norte,1,MethodB,1,2.00,2.00,manual,15.00,6.00,"));
    assert!(lines[2].starts_with("Norte,1,MethodB,2,6.00,4.00,manual,15.00,6.00,"));
}

#[test]
fn non_finite_input_is_refused() {
    let s = Survey::new();
    s.cmd()
        .args(["--eye-height", "nan", "new-lot", "Norte"])
        .assert()
        .failure()
        .stderr(contains("invalid eye height"));
    s.ok(&["new-lot", "Norte"]);
    s.cmd()
        .args(["sight", "nan"])
        .assert()
        .success()
        .stdout(contains("segment 1: 1.60 m (+1.60) sensor"));

    let status = s.json(&["status"]);
    assert_eq!(status["current_angle"], 0.0);
    assert_eq!(status["segments"].as_array().unwrap().len(), 1);
}
