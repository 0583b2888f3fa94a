use assert_cmd::Command;
use predicates::prelude::*;
use std::f64::consts::PI;
use std::path::Path;

use eegscreen::classifier::{DecisionTree, TreeNode};
use eegscreen::edf::{EdfWriter, SignalHeader};
use eegscreen::RandomForest;

fn write_model(path: &Path, probabilities: Vec<f64>) {
    let forest = RandomForest {
        num_features: 80,
        num_classes: 2,
        trees: vec![DecisionTree {
            nodes: vec![TreeNode::Leaf { probabilities }],
        }],
    };
    std::fs::write(path, serde_json::to_string(&forest).unwrap()).unwrap();
}

fn write_two_channel_edf(path: &Path) {
    let headers: Vec<SignalHeader> = (0..2)
        .map(|c| SignalHeader {
            label: format!("EEG Ch{}", c),
            transducer_type: String::new(),
            physical_dimension: "uV".to_string(),
            physical_minimum: -100.0,
            physical_maximum: 100.0,
            digital_minimum: -32768,
            digital_maximum: 32767,
            prefiltering: String::new(),
            samples_per_record: 256,
        })
        .collect();

    let mut writer = EdfWriter::create(path, "X X X X", "cli fixture", 1.0, headers).unwrap();
    for record in 0..10 {
        let physical: Vec<Vec<f64>> = (0..2)
            .map(|c| {
                (0..256)
                    .map(|s| {
                        let t = (record * 256 + s) as f64 / 256.0;
                        40.0 * (2.0 * PI * (10.0 + c as f64) * t).sin()
                    })
                    .collect()
            })
            .collect();
        writer.write_physical_record(&physical).unwrap();
    }
    writer.finalize(10).unwrap();
}

#[test]
fn test_predict_on_csv_payload() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("forest.json");
    let input = dir.path().join("features.csv");

    write_model(&model, vec![0.09, 0.91]);
    let payload = (0..80).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
    std::fs::write(&input, payload).unwrap();

    Command::cargo_bin("eegscreen")
        .unwrap()
        .args(["predict", "--model"])
        .arg(&model)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"MDD\""))
        .stdout(predicate::str::contains("\"raw_code\": 1"));
}

#[test]
fn test_predict_on_edf_recording() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("forest.json");
    let input = dir.path().join("recording.edf");

    write_model(&model, vec![0.8, 0.2]);
    write_two_channel_edf(&input);

    Command::cargo_bin("eegscreen")
        .unwrap()
        .args(["predict", "--model"])
        .arg(&model)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Healthy\""));
}

#[test]
fn test_features_subcommand_prints_eighty_values() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("recording.edf");
    write_two_channel_edf(&input);

    let output = Command::cargo_bin("eegscreen")
        .unwrap()
        .arg("features")
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let features: Vec<f64> = serde_json::from_slice(&output).unwrap();
    assert_eq!(features.len(), 80);
}

#[test]
fn test_info_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("recording.edf");
    write_two_channel_edf(&input);

    Command::cargo_bin("eegscreen")
        .unwrap()
        .arg("info")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"num_channels\": 2"))
        .stdout(predicate::str::contains("EEG Ch0"));
}

#[test]
fn test_short_csv_fails_with_dimension_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("forest.json");
    let input = dir.path().join("short.csv");

    write_model(&model, vec![0.5, 0.5]);
    std::fs::write(&input, "1.0,2.0,3.0").unwrap();

    Command::cargo_bin("eegscreen")
        .unwrap()
        .args(["predict", "--model"])
        .arg(&model)
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("width 3"));
}

#[test]
fn test_missing_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("features.csv");
    std::fs::write(&input, "1.0,2.0").unwrap();

    Command::cargo_bin("eegscreen")
        .unwrap()
        .args(["predict", "--model"])
        .arg(dir.path().join("absent.json"))
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_missing_recording_fails() {
    Command::cargo_bin("eegscreen")
        .unwrap()
        .arg("features")
        .arg("/nonexistent/recording.edf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
