use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use tempfile::tempdir;

fn netrate() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netrate"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn records_a_fixed_number_of_samples() {
    let tmp = tempdir().expect("temp dir");
    let series = tmp.path().join("report.txt");
    fs::write(&series, "2020-01-01T00:00:00Z 1 1\n").expect("seed old series");

    netrate()
        .args(["--record", "--interface", "eth0", "--interval-ms", "10", "--count", "3"])
        .arg("--source")
        .arg("tests/fixtures/net_dev.txt")
        .arg("--output")
        .arg(&series)
        .assert()
        .success();

    let content = fs::read_to_string(&series).expect("read series");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3, "old series should be replaced: {content}");
    for line in lines {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 3);
        // the fixture never changes, so no traffic is observed
        assert_eq!(&fields[1..], ["0", "0"]);
    }
}

#[test]
fn answering_no_at_the_prompt_records() {
    let tmp = tempdir().expect("temp dir");
    let series = tmp.path().join("report.txt");

    netrate()
        .args(["--interface", "lo", "--interval-ms", "10", "--count", "1"])
        .arg("--source")
        .arg("tests/fixtures/net_dev.txt")
        .arg("--output")
        .arg(&series)
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(contains("[y/N]"));

    assert_eq!(fs::read_to_string(&series).expect("series").lines().count(), 1);
}

#[test]
fn unknown_interface_exits_with_not_found() {
    let tmp = tempdir().expect("temp dir");
    netrate()
        .args(["--record", "--interface", "eth"])
        .arg("--source")
        .arg("tests/fixtures/net_dev.txt")
        .arg("--output")
        .arg(tmp.path().join("report.txt"))
        .assert()
        .code(2)
        .stderr(contains("interface 'eth' not present"));
}

#[test]
fn plotting_writes_the_chart_image() {
    let tmp = tempdir().expect("temp dir");
    let series = tmp.path().join("report.txt");
    let chart = tmp.path().join("report.png");
    fs::write(
        &series,
        "2024-05-01T12:00:00Z 7.996096 15.992192\n2024-05-01T12:00:01Z 2.5 0.75\n",
    )
    .expect("seed series");

    netrate()
        .arg("--plot")
        .arg("--output")
        .arg(&series)
        .arg("--chart")
        .arg(&chart)
        .assert()
        .success();

    let image = fs::read(&chart).expect("chart image");
    assert!(image.starts_with(b"\x89PNG"), "chart is not a PNG");
}

#[test]
fn torn_series_is_not_plotted() {
    let tmp = tempdir().expect("temp dir");
    let series = tmp.path().join("report.txt");
    fs::write(&series, "2024-05-01T12:00:00Z 1 2\n2024-05-01T12:00:01Z 12.5 3").expect("seed");
    netrate()
        .arg("--plot")
        .arg("--output")
        .arg(&series)
        .arg("--chart")
        .arg(tmp.path().join("report.png"))
        .assert()
        .code(3)
        .stderr(contains("line 2: incomplete final row"));
    assert!(!tmp.path().join("report.png").exists());
}

#[test]
fn malformed_series_is_not_plotted() {
    netrate()
        .args(["--plot", "--output", "tests/fixtures/corrupt_series.txt"])
        .assert()
        .code(3)
        .stderr(contains("line 2: expected 3 fields"));
}

#[test]
fn missing_series_is_an_io_error() {
    let tmp = tempdir().expect("temp dir");
    netrate()
        .arg("--plot")
        .arg("--output")
        .arg(tmp.path().join("absent.txt"))
        .assert()
        .code(5)
        .stderr(contains("failed to read series"));
}

#[test]
fn conflicting_modes_are_rejected() {
    netrate()
        .args(["--plot", "--record"])
        .assert()
        .code(1)
        .stderr(contains("mutually exclusive"));
}
