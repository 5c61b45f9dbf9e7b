use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::PathBuf;
use std::process::Command;

// Nothing listens here, so any wallet call fails fast
const DEAD_RPC_URL: &str = "http://127.0.0.1:1";

fn cli() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_walletsession_cli"));
    command.env_remove("WALLETSESSION_RPC_URL");
    command
}

#[test]
fn test_cli_with_fixtures() {
    let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures");

    let test_cases = fs::read_dir(&fixtures_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .path()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .ends_with(".input")
        });

    for input_file in test_cases {
        let input_path = input_file.path();
        let test_name = input_path
            .file_stem()
            .unwrap()
            .to_str()
            .unwrap()
            .replace(".input", "");

        let input_contents = fs::read_to_string(&input_path)
            .unwrap_or_else(|_| panic!("Failed to read input file: {:?}", input_path));

        let mut command = cli();
        command.current_dir(env!("CARGO_MANIFEST_DIR"));
        for line in input_contents.lines() {
            if !line.trim().is_empty() {
                command.arg(line);
            }
        }

        let output = command
            .output()
            .unwrap_or_else(|e| panic!("Failed to execute CLI: {}", e));
        println!("Output {:?}: {:?}", test_name, output);

        let expected_path = fixtures_dir.join(format!("{}.expected", test_name));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|_| panic!("Expected output file not found: {:?}", expected_path));

        let actual_output = String::from_utf8(output.stdout)
            .unwrap_or_else(|e| panic!("Invalid UTF-8 output: {}", e));

        let expected = expected_output.trim();
        let actual = actual_output.trim();

        if expected != actual {
            let diff = TextDiff::from_lines(expected, actual);
            let mut diff_output = String::new();

            for change in diff.iter_all_changes() {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                diff_output.push_str(&format!("{}{}", sign, change));
            }

            panic!("Test case '{}' failed:\n{}", test_name, diff_output);
        }
    }
}

#[test]
fn test_chains_json_output() {
    let output = cli().args(["chains", "--output", "json"]).output().unwrap();
    assert!(output.status.success());

    let chains: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let chains = chains.as_array().unwrap();
    assert_eq!(chains.len(), 5);
    assert_eq!(chains[3]["chainId"], 137);
    assert_eq!(chains[3]["hexChainId"], "0x89");
    assert_eq!(chains[3]["nativeCoinSymbol"], "MATIC");
}

#[test]
fn test_switch_to_unknown_chain_name_fails() {
    let output = cli()
        .args(["switch", "--chain", "optimism", "--rpc-url", DEAD_RPC_URL])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unknown chain 'optimism'"), "{stderr}");
    assert!(stderr.contains("polygon-mainnet"), "{stderr}");
}

#[test]
fn test_status_without_wallet_fails() {
    let data_dir = tempfile::tempdir().unwrap();
    let output = cli()
        .args(["status", "--rpc-url", DEAD_RPC_URL, "--data-dir"])
        .arg(data_dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Error: No wallet found"), "{stderr}");
}

#[test]
fn test_restore_failure_clears_marker() {
    let data_dir = tempfile::tempdir().unwrap();
    let markers = data_dir.path().join("markers.json");
    fs::write(
        &markers,
        r#"{ "walletsession.last-connected-wallet": "json-rpc" }"#,
    )
    .unwrap();

    let output = cli()
        .args(["restore", "--rpc-url", DEAD_RPC_URL, "--data-dir"])
        .arg(data_dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "Status: Disconnected");
    let remaining = fs::read_to_string(&markers).unwrap();
    assert!(!remaining.contains("json-rpc"), "{remaining}");
}

#[test]
fn test_disconnect_forgets_wallet() {
    let data_dir = tempfile::tempdir().unwrap();
    let markers = data_dir.path().join("markers.json");
    fs::write(
        &markers,
        r#"{ "walletsession.last-connected-wallet": "json-rpc", "other": "kept" }"#,
    )
    .unwrap();

    let output = cli()
        .args(["disconnect", "--output", "json", "--rpc-url", DEAD_RPC_URL, "--data-dir"])
        .arg(data_dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view, serde_json::json!({ "status": "Disconnected" }));

    let remaining: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&markers).unwrap()).unwrap();
    assert_eq!(remaining, serde_json::json!({ "other": "kept" }));
}
