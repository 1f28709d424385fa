//! Tests running the tabula binary

use pretty_assertions::assert_eq;
use std::process::{Command, Output};

fn tabula(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tabula"))
        .args(args)
        .output()
        .expect("failed to run tabula")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Test evaluating a formula against a few cells
#[test]
fn test_eval_with_cells() {
    let output = tabula(&["eval", "=SUM(A1:A2)*B1", "--set", "A1=2", "--set", "A2=3", "-s", "B1=10"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "50\n");
}

/// Test that the leading '=' is optional and formats are applied
#[test]
fn test_eval_formatted_and_raw() {
    let output = tabula(&["eval", "A1*2", "--set", "A1=12.5%"]);
    assert_eq!(stdout(&output), "25.0%\n");

    let output = tabula(&["eval", "A1*2", "--set", "A1=12.5%", "--raw"]);
    assert_eq!(stdout(&output), "0.25\n");
}

/// Test that evaluation errors print their marker and message
#[test]
fn test_eval_error() {
    let output = tabula(&["eval", "=1/0"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "#ERROR\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("The divisor must be different from zero."));
}

/// Test evaluating a JSON workbook to a file
#[test]
fn test_run_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("book.json");
    let output_path = dir.path().join("out.json");
    std::fs::write(
        &input,
        r#"{
            "sheets": [
                { "name": "Data", "cells": { "A1": "1", "A2": "2", "A3": "=A1+A2" } },
                { "name": "Report", "cells": { "A1": "=Data!A3*10" } }
            ]
        }"#,
    )
    .unwrap();

    let output = tabula(&[
        "run",
        input.to_str().unwrap(),
        "--format",
        "json",
        "-o",
        output_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
    let cells = written.as_array().unwrap();
    assert_eq!(cells.len(), 4);
    assert_eq!(cells[3]["sheet"], "Report");
    assert_eq!(cells[3]["content"], "=Data!A3*10");
    assert_eq!(cells[3]["value"], 30.0);
}

/// Test the text output of a workbook run
#[test]
fn test_run_text_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("book.json");
    std::fs::write(&input, r#"{ "sheets": [ { "name": "S", "cells": { "B1": "=A1", "A1": "x" } } ] }"#).unwrap();

    let output = tabula(&["run", input.to_str().unwrap()]);
    assert_eq!(stdout(&output), "S!A1\tx\nS!B1\tx\n");
}

/// Test that a missing file fails with context
#[test]
fn test_run_missing_file() {
    let output = tabula(&["run", "/definitely/not/here.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to open"));
}

/// Test listing functions of one category
#[test]
fn test_functions_by_category() {
    let output = tabula(&["functions"]);
    let all = stdout(&output);
    assert!(all.lines().any(|l| l.starts_with("SUM\t")));

    let output = tabula(&["functions", "--category", "does-not-exist"]);
    assert!(!output.status.success());
}
