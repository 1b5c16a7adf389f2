use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn demo_reports_a_sequential_run() {
    Command::cargo_bin("taskpool-demo")
        .unwrap()
        .args(["--threads", "0", "--tasks", "1000"])
        .assert()
        .success()
        .stdout(contains("total tasks: 1000"));
}

#[test]
fn demo_reports_a_concurrent_run() {
    Command::cargo_bin("taskpool-demo")
        .unwrap()
        .args(["--threads", "4", "--tasks", "1000"])
        .assert()
        .success()
        .stdout(contains("total tasks: 1000"));
}

#[test]
fn demo_rejects_a_malformed_thread_count() {
    Command::cargo_bin("taskpool-demo")
        .unwrap()
        .args(["--threads", "many"])
        .assert()
        .failure();
}
