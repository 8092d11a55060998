#![allow(missing_docs)]

use std::{
    fs,
    path::Path,
    process::{Command, Output},
};

const HEADER: &str = include_str!("../../../tests/fixtures/pocketlang.h");

fn project(header: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let include = dir.path().join("src/include");
    fs::create_dir_all(&include).unwrap();
    fs::write(include.join("pocketlang.h"), header).unwrap();
    dir
}

fn pknative(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pknative"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env("PKNATIVE_LOG", "warn")
        .output()
        .expect("failed to run pknative")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_generate_is_the_default() {
    let dir = project(HEADER);
    let output = pknative(dir.path(), &[]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "Generated: tests/native/dl/pknative.c\nGenerated: src/libs/gen/nativeapi.h\n"
    );
    assert!(dir.path().join("tests/native/dl/pknative.c").is_file());
    assert!(dir.path().join("src/libs/gen/nativeapi.h").is_file());
}

#[test]
fn test_check_fails_until_generated() {
    let dir = project(HEADER);

    let output = pknative(dir.path(), &["check"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("generated artifacts are out of date"));

    assert!(pknative(dir.path(), &["generate"]).status.success());
    let output = pknative(dir.path(), &["check"]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn test_list_json_reports_functions_and_fingerprint() {
    let dir = project(HEADER);
    let output = pknative(dir.path(), &["list", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let functions = listing["functions"].as_array().unwrap();
    assert_eq!(functions.len(), 12);
    assert_eq!(functions[7]["name"], "pkSetGlobal");
    assert_eq!(functions[7]["return_type"], "void");
    assert_eq!(functions[7]["parameters"][1]["type"], "int");
    assert!(listing["fingerprint"].as_str().unwrap().starts_with("0x"));
}

#[test]
fn test_list_prints_prototypes() {
    let dir = project(HEADER);
    let output = pknative(dir.path(), &["list"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert_eq!(text.lines().count(), 12);
    assert!(text.contains("void pkSetGlobal(PKVM*, int);\n"));
    assert!(text.contains("PkConfiguration pkNewConfiguration(void);\n"));
}

#[test]
fn test_parse_errors_name_the_header_line() {
    let header = HEADER.replace(
        "PK_PUBLIC PkHandle* pkNewList(PKVM* vm);",
        "PK_PUBLIC PkHandle* pkNewList(PKVM* vm, int items[]);",
    );
    let line = header
        .lines()
        .position(|l| l.contains("pkNewList"))
        .unwrap()
        + 1;
    let dir = project(&header);
    let output = pknative(dir.path(), &[]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains(&format!("line {line}:")), "{err}");
    assert!(err.contains("pkNewList(PKVM* vm, int items[]);"), "{err}");
    assert!(!dir.path().join("tests/native/dl/pknative.c").exists());
}

#[test]
fn test_header_override_is_used() {
    let dir = project(HEADER);
    fs::write(
        dir.path().join("api.h"),
        "/* POCKETLANG PUBLIC API */\nPK_PUBLIC int pkAnswer(void);\n",
    )
    .unwrap();

    let output = pknative(dir.path(), &["list", "--header", "api.h"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "int pkAnswer(void);\n");
}
