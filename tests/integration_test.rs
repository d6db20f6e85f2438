// End-to-end tests driving the vultrctl binary against a mock API

use assert_cmd::cargo::cargo_bin_cmd;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use tempfile::{TempDir, tempdir};

fn vultrctl(config: &TempDir, server: &MockServer) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vultrctl");
    cmd.env("VULTRCTL_CONFIG_DIR", config.path())
        .env_remove("VULTR_API_KEY")
        .env_remove("VULTR_ENDPOINT")
        .arg("--endpoint")
        .arg(server.base_url());
    cmd
}

#[test]
fn help_lists_every_command() {
    let mut cmd = cargo_bin_cmd!("vultrctl");
    cmd.arg("--help");
    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    for usage in [
        "list",
        "create --osid=ID --dcid=ID --vpsplanid=ID",
        "start <subid>",
        "destroy [--yes] <subid>",
        "ssh <subid> ...",
    ] {
        assert!(stdout.contains(usage), "{usage} missing from help");
    }
}

#[test]
fn list_pretty_prints_json() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/server/list")
            .query_param("api_key", "flag-key");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"576965":{"status":"active"}}"#);
    });

    vultrctl(&config, &server)
        .args(["--api-key", "flag-key", "list"])
        .assert()
        .success()
        .stdout("{\n    \"576965\": {\n        \"status\": \"active\"\n    }\n}\n");
    mock.assert();
}

#[test]
fn stored_profile_key_is_used() {
    let config = tempdir().unwrap();
    fs::write(
        config.path().join("config.yaml"),
        "vultr.config:\n  api_key: stored-key\n",
    )
    .unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/regions/list")
            .query_param("api_key", "stored-key");
        then.status(200).body("ok");
    });

    vultrctl(&config, &server)
        .arg("regions")
        .assert()
        .success()
        .stdout("ok\n");
    mock.assert();
}

#[test]
fn start_posts_subid_form() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/server/start")
            .query_param("api_key", "k")
            .body("SUBID=576965");
        then.status(200);
    });

    vultrctl(&config, &server)
        .args(["--api-key", "k", "start", "576965"])
        .assert()
        .success();
    mock.assert();
}

#[test]
fn declined_destroy_exits_non_zero_without_request() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.any_request();
        then.status(200);
    });

    vultrctl(&config, &server)
        .args(["--api-key", "k", "destroy", "576965"])
        .write_stdin("N\n")
        .assert()
        .failure()
        .stdout(predicate::str::starts_with("Really destroy 576965? [y/N]"))
        .stderr(predicate::str::contains("Error").not());
    mock.assert_calls(0);
}

#[test]
fn destroy_with_yes_flag_skips_confirmation() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/server/destroy")
            .body("SUBID=576965");
        then.status(200);
    });

    vultrctl(&config, &server)
        .args(["--api-key", "k", "destroy", "--yes", "576965"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Really destroy").not());
    mock.assert();
}

#[test]
fn create_requires_all_ids() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.any_request();
        then.status(200);
    });

    vultrctl(&config, &server)
        .args(["--api-key", "k", "create", "--osid=167"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required option --dcid, --vpsplanid"))
        .stderr(predicate::str::contains("Usage: create --osid=ID --dcid=ID --vpsplanid=ID"));
    mock.assert_calls(0);
}

#[test]
fn wrong_arity_reports_usage() {
    let config = tempdir().unwrap();
    let server = MockServer::start();

    vultrctl(&config, &server)
        .args(["--api-key", "k", "reboot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid argument"))
        .stderr(predicate::str::contains("Usage: reboot <subid>"));
}

#[test]
fn unknown_command_fails_before_credentials() {
    let config = tempdir().unwrap();
    let server = MockServer::start();

    vultrctl(&config, &server)
        .arg("resize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command `resize`"));
    assert!(!config.path().join("config.yaml").exists());
}

#[test]
fn http_error_status_exits_non_zero() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/os/list");
        then.status(403).body("Invalid API key.");
    });

    vultrctl(&config, &server)
        .args(["--api-key", "bad", "os"])
        .assert()
        .failure()
        .stdout("Invalid API key.\n")
        .stderr(predicate::str::contains("403"));
}

#[test]
fn piped_api_key_is_used_and_saved() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/plans/list")
            .query_param("api_key", "piped-key");
        then.status(200).body("ok");
    });

    vultrctl(&config, &server)
        .arg("plans")
        .write_stdin("piped-key\n")
        .assert()
        .success()
        .stdout("ok\n")
        .stderr(predicate::str::contains("your api key"));
    mock.assert();

    let saved = fs::read_to_string(config.path().join("config.yaml")).unwrap();
    assert!(saved.contains("api_key: piped-key"));
}

#[test]
fn list_keeps_numbers_and_escapes_verbatim() {
    let config = tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/server/list");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"576965":{"cost_per_month":"10.05","current_bandwidth_gb":131.50,"kvm_url":"https:\/\/my.vultr.com\/subs\/vps\/novnc"}}"#);
    });

    vultrctl(&config, &server)
        .args(["--api-key", "k", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"current_bandwidth_gb\": 131.50"))
        .stdout(predicate::str::contains(r#""kvm_url": "https:\/\/my.vultr.com\/subs\/vps\/novnc""#));
}
