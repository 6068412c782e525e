use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn slipscan() -> Command {
    Command::cargo_bin("slipscan").unwrap()
}

fn write_config(dir: &Path, json: &str) -> String {
    let path = dir.join("config.json");
    fs::write(&path, json).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_commands() {
    slipscan()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("ledger"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_init_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("nested").join("config.json");
    let config = config.to_str().unwrap();

    slipscan()
        .args(["--config", config, "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    slipscan()
        .args(["--config", config, "config", "init"])
        .assert()
        .success();

    slipscan()
        .args(["--config", config, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    slipscan()
        .args(["--config", config, "config", "get", "ocr.max_pages"])
        .assert()
        .success()
        .stdout("2\n");

    slipscan()
        .args(["--config", config, "config", "set", "extraction.token_window", "7"])
        .assert()
        .success();

    slipscan()
        .args(["--config", config, "config", "get", "extraction.token_window"])
        .assert()
        .success()
        .stdout("7\n");

    slipscan()
        .args(["--config", config, "config", "set", "extraction.no_such_key", "1"])
        .assert()
        .failure();
}

#[test]
fn test_ledger_show_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "{}");

    slipscan()
        .args(["--config", &config, "ledger", "--dir"])
        .arg(dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("No entries"));
}

#[test]
fn test_ledger_show_lists_entries() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "{}");
    fs::write(
        dir.path().join("arquivos_processados.log"),
        concat!(
            r#"{"arquivo":"a.pdf","tipo":"BOLETO","campos_extraidos":{"Vencimento":"10/10/2025"},"data_processo":"2025-10-01 08:00:00"}"#,
            "\n",
            "not json\n",
        ),
    )
    .unwrap();

    slipscan()
        .args(["--config", &config, "ledger", "--dir"])
        .arg(dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("a.pdf"))
        .stdout(predicate::str::contains("Vencimento=10/10/2025"))
        .stdout(predicate::str::contains("1 malformed"));
}

#[test]
fn test_run_without_ocr_engine_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"{"ocr": {"tesseract_path": "/nonexistent/tesseract", "pdftoppm_path": "/nonexistent/pdftoppm"}}"#,
    );
    fs::write(dir.path().join("doc.pdf"), b"%PDF-1.4").unwrap();

    slipscan()
        .args(["--config", &config, "run"])
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("OCR engine unavailable"));

    assert!(dir.path().join("doc.pdf").exists());
    assert!(!dir.path().join("arquivos_processados.log").exists());
}

#[test]
fn test_check_reports_missing_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let roster = dir.path().join("roster.csv");
    fs::write(&roster, "Apelido;Mês;Ano\nacme;9;2025\nbeta;9;2025\ngamma;8;2025\n").unwrap();
    fs::write(dir.path().join("ACME_NF.pdf"), b"x").unwrap();

    slipscan()
        .arg("check")
        .arg("--roster")
        .arg(&roster)
        .arg("--dir")
        .arg(dir.path())
        .args(["--month", "9", "--year", "2025"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("beta.pdf"))
        .stdout(predicate::str::contains("acme").not());

    fs::write(dir.path().join("beta.pdf"), b"x").unwrap();

    slipscan()
        .arg("check")
        .arg("--roster")
        .arg(&roster)
        .arg("--dir")
        .arg(dir.path())
        .args(["--month", "9", "--year", "2025"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All documents for 09/2025"));
}
