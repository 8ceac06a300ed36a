use assert_cmd::Command;
use predicates::prelude::*;
use std::env::temp_dir;
use std::fs;

fn lc3vm() -> Command {
    let mut cmd = Command::cargo_bin("lc3vm").unwrap();
    cmd.env_remove("LC3VM_FEATURES")
        .env_remove("LC3VM_STEP_LIMIT");
    cmd
}

#[test]
fn runs_without_arguments() {
    let mut cmd = lc3vm();
    cmd.assert().success().stdout(predicate::str::contains("lc3vm"));
}

#[test]
fn runs_hello_world() {
    let mut cmd = lc3vm();
    cmd.args(["run", "tests/files/hello.asm", "--features", "plain-puts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, world!"))
        .stdout(predicate::str::contains("Halted"));
}

#[test]
fn features_from_environment() {
    let mut cmd = lc3vm();
    cmd.env("LC3VM_FEATURES", "plain-puts")
        .args(["run", "--minimal", "tests/files/hello.asm"])
        .assert()
        .success()
        .stdout("Hello, world!\n");
}

#[test]
fn unknown_feature_is_rejected() {
    let mut cmd = lc3vm();
    cmd.args(["run", "tests/files/hello.asm", "--features", "stack"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown feature"));
}

#[test]
fn minimal_register_dump() {
    let mut cmd = lc3vm();
    cmd.args(["run", "-m", "-r", "tests/files/sum.asm"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("R0 15\nR1 0\n"))
        .stdout(predicate::str::contains("CC Z\n"));
}

#[test]
fn reads_console_input() {
    let mut cmd = lc3vm();
    cmd.args(["run", "--minimal", "tests/files/echo.asm"])
        .write_stdin("q")
        .assert()
        .success()
        .stdout("Q");
}

#[test]
fn exhausted_input_fails() {
    let mut cmd = lc3vm();
    cmd.args(["run", "--minimal", "tests/files/echo.asm"])
        .write_stdin("")
        .assert()
        .failure();
}

#[test]
fn illegal_instruction_fails() {
    let mut cmd = lc3vm();
    cmd.args(["run", "tests/files/illegal.asm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Illegal instruction"));
}

#[test]
fn step_limit_stops_runaway_program() {
    let mut cmd = lc3vm();
    cmd.args(["run", "--step-limit", "1000", "tests/files/spin.asm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1000"));
}

#[test]
fn check_reports_errors() {
    let mut cmd = lc3vm();
    cmd.args(["check", "tests/files/sum.asm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no errors found"));

    let mut cmd = lc3vm();
    cmd.args(["check", "tests/files/bad.asm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Line 2"));
}

#[test]
fn assemble_then_run_and_disassemble() {
    let dest = temp_dir().join(format!("lc3vm-sum-{}.obj", std::process::id()));
    let dest_str = dest.to_str().unwrap();

    let mut cmd = lc3vm();
    cmd.args(["assemble", "tests/files/sum.asm", dest_str])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved"));

    let image = fs::read(&dest).unwrap();
    // Origin, then six instructions
    assert_eq!(image.len(), 14);
    assert_eq!(&image[..4], &[0x30, 0x00, 0x50, 0x20]);

    let mut cmd = lc3vm();
    cmd.args(["run", "-m", "-r", dest_str])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("R0 15\n"));

    let mut cmd = lc3vm();
    cmd.args(["disasm", dest_str])
        .assert()
        .success()
        .stdout(predicate::str::contains("x3000  x5020  AND R0, R0, #0"))
        .stdout(predicate::str::contains("x3004  x03FD  BRp #-3"))
        .stdout(predicate::str::contains("HALT"));

    fs::remove_file(&dest).unwrap();
}

#[test]
fn unknown_extension_fails() {
    let mut cmd = lc3vm();
    cmd.args(["run", "Cargo.toml"]).assert().failure();
}
