use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn grasp(dir: &Path) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = assert_cmd::cargo::cargo_bin_cmd!("grasp").into();
    cmd.current_dir(dir);
    cmd
}

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path.to_str().unwrap().to_string()
}

// ── desugar ─────────────────────────────────────────────────

#[test]
fn desugar_reads_stdin() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .arg("desugar")
        .write_stdin("[&v, +w] || v.len() + w")
        .assert()
        .success()
        .stdout(predicate::str::contains("let __cap_v = &v;"))
        .stdout(predicate::str::contains("let __cap_w = Clone::clone(&w);"))
        .stdout(predicate::str::contains("move || __cap_v.len() + __cap_w"));
}

#[test]
fn desugar_unauthorized_capture_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "bad.grasp", "[my_vec] || (my_vec, other_var)");
    grasp(dir.path())
        .args(["desugar", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("C002"))
        .stderr(predicate::str::contains("other_var"))
        .stdout(predicate::str::contains("[my_vec] || (my_vec, other_var)"));
}

#[test]
fn desugar_invalid_clause_reports_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .args(["desugar", "-"])
        .write_stdin("([&mut a] || a, [&b] || b)")
        .assert()
        .failure()
        .stderr(predicate::str::contains("P001"))
        .stdout(predicate::str::contains("let __cap_b = &b;"));
}

#[test]
fn desugar_unparsable_fragment_fails() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .arg("desugar")
        .write_stdin("(a, b")
        .assert()
        .failure()
        .stderr(predicate::str::contains("P001"));
}

#[test]
fn desugar_rejects_borrowing_bound_expression() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .arg("desugar")
        .write_stdin("[c = &mut count] || { *c += 10; *c }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("C007"))
        .stderr(predicate::str::contains("`c` borrows `count`"));
}

#[test]
fn desugar_show_table() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .args(["desugar", "--show-table"])
        .write_stdin("[&v] || v.len()")
        .assert()
        .success()
        .stdout(predicate::str::contains("explicit {v: Reference}"));
}

#[test]
fn desugar_diff() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "frag.grasp", "[&v] || v.len()");
    grasp(dir.path())
        .args(["desugar", "--diff", &file])
        .assert()
        .success()
        .stdout(predicate::str::contains("-[&v] || v.len()"))
        .stdout(predicate::str::contains("+    let __cap_v = &v;"));
}

#[test]
fn desugar_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = grasp(dir.path())
        .args(["--format", "json", "desugar", "--show-table"])
        .write_stdin("[&a, &unused] || a")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["code"], "W001");
    assert_eq!(lines[1]["type"], "result");
    assert_eq!(lines[1]["hints"], 1);
    assert_eq!(lines[1]["closures"][0]["table"]["entries"][1]["name"], "unused");
}

#[test]
fn desugar_uses_config_structs_and_prefix() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "grasp.toml",
        r#"
[desugar]
binding_prefix = "__g_"

[[struct]]
name = "Counter"
fields = ["count: u32", "label: String"]
"#,
    );
    grasp(dir.path())
        .arg("desugar")
        .write_stdin("impl Counter;\n[+self.*] || self.count")
        .assert()
        .success()
        .stdout(predicate::str::contains("let __g_self_count = Clone::clone(&self.count);"))
        .stdout(predicate::str::contains("let __g_self_label = Clone::clone(&self.label);"));
}

#[test]
fn bad_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "other.toml", "[desugar]\nbinding_prefix = 3\n");
    grasp(dir.path())
        .args(["--config", &config, "desugar"])
        .write_stdin("|| x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

// ── check ───────────────────────────────────────────────────

#[test]
fn check_clean_directory_passes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.grasp", "[&v] || v.len()");
    write(dir.path(), "nested/b.grasp", "move |x| x + y");
    grasp(dir.path())
        .args(["check", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checking 2 file(s)"))
        .stdout(predicate::str::contains("All checks passed!"));
}

#[test]
fn check_reports_errors_from_every_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.grasp", "[] || x");
    write(dir.path(), "b.grasp", "[&count] || count += 1");
    write(dir.path(), "c.grasp", "[&v] || v");
    grasp(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Check failed: 2 error(s)"))
        .stderr(predicate::str::contains("C002"))
        .stderr(predicate::str::contains("C006"));
}

#[test]
fn check_strict_fails_on_unused_entry() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "a.grasp", "[&a, &unused] || a");
    grasp(dir.path()).args(["check", &file]).assert().success();
    grasp(dir.path())
        .args(["check", "--strict", &file])
        .assert()
        .failure()
        .stdout(predicate::str::contains("strict mode"));
}

#[test]
fn check_json_summary() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.grasp", "[] || x");
    grasp(dir.path())
        .args(["check", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\":\"C002\""))
        .stdout(predicate::str::contains("\"files_checked\":1"));
}

#[test]
fn check_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .args(["check", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such file or directory"));
}

// ── explain ─────────────────────────────────────────────────

#[test]
fn explain_known_code() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .args(["explain", "c002"])
        .assert()
        .success()
        .stdout(predicate::str::contains("C002: Unauthorized Capture"))
        .stdout(predicate::str::contains("UnauthorizedCapture"));
}

#[test]
fn explain_unknown_code_fails() {
    let dir = tempfile::tempdir().unwrap();
    grasp(dir.path())
        .args(["explain", "Z123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown diagnostic code"));
}
