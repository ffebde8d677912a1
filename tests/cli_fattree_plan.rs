use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "fattree-rs-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn run_plan(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fattree_plan"))
        .args(args)
        .output()
        .expect("run fattree_plan")
}

#[test]
fn fattree_plan_prints_json_plan() {
    let output = run_plan(&["--k", "4", "--density", "2", "--format", "json"]);
    assert!(
        output.status.success(),
        "fattree_plan failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: Value = serde_json::from_slice(&output.stdout).expect("parse plan json");
    assert_eq!(v["k"], 4);
    assert_eq!(v["density"], 2);
    let tables = v["tables"].as_array().expect("tables array");
    assert_eq!(tables.len(), 4 + 8 + 8);

    let edge1 = tables
        .iter()
        .find(|t| t["switch"]["layer"] == "edge" && t["switch"]["index"] == 1)
        .expect("edge#1 table");
    let first = &edge1["rules"][0];
    assert_eq!(first["match"]["class"], "arp");
    assert_eq!(first["match"]["dst"]["addr"], "10.1.0.1");
    assert_eq!(first["action"]["port"], 3);
}

#[test]
fn fattree_plan_ofctl_output_uses_flow_syntax() {
    let output = run_plan(&["--k", "4", "--density", "2", "--format", "ofctl"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# 3001\n"));
    assert!(stdout.contains(
        "table=0,idle_timeout=0,hard_timeout=0,priority=10,ip,nw_dst=10.1.0.2,actions=output:4"
    ));
    assert!(stdout.contains("priority=10,arp,nw_dst=10.2.0.0/16,actions=output:4"));
}

#[test]
fn fattree_plan_reads_config_and_writes_out_file() {
    let dir = unique_temp_dir("plan-config");
    let config = dir.join("fabric.json");
    fs::write(&config, r#"{ "k": 8, "density": 1, "uplink": "none" }"#).expect("write config");
    let out = dir.join("plan.json");

    let output = run_plan(&[
        "--config",
        config.to_str().unwrap(),
        "--format",
        "json",
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let v: Value = serde_json::from_str(&fs::read_to_string(&out).expect("read plan")).unwrap();
    assert_eq!(v["k"], 8);
    let tables = v["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 16 + 32 + 32);
    for table in tables {
        for rule in table["rules"].as_array().unwrap() {
            assert_eq!(rule["priority"], 10);
        }
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn fattree_plan_fails_on_invalid_k() {
    let output = run_plan(&["--k", "5"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid parameter"), "stderr={stderr}");
}

#[test]
fn fattree_plan_reference_shapes_reject_k6() {
    let output = run_plan(&["--k", "6", "--reference-shapes"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported fat-tree shape"), "stderr={stderr}");

    let output = run_plan(&["--k", "6"]);
    assert!(output.status.success());
}
