use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use confjson::{ErrorKind, Value, json, translate};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> String {
    let path = fixture(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {path:?}: {e}"))
}

fn to_json(src: &str) -> String {
    match translate(src) {
        Ok(value) => json::to_string(&value, false).expect("value should serialize"),
        Err(e) => panic!("Translation failed:\n{src}\nError: {e:?}"),
    }
}

/// Compares against the expected JSON with whitespace ignored but key order
/// significant.
fn assert_translates_to(conf: &str, expected: &str) {
    let expected: serde_json::Value =
        serde_json::from_str(&read_fixture(expected)).expect("expected output should be JSON");
    let expected = serde_json::to_string(&expected).unwrap();
    assert_eq!(to_json(&read_fixture(conf)), expected);
}

fn assert_failure(src: &str, kind: ErrorKind) {
    match translate(src) {
        Ok(value) => panic!("Translation succeeded with {value} but was expected to fail"),
        Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {e}"),
    }
}

#[test]
fn web_server_config() {
    assert_translates_to("web_server.conf", "web_server.json");
}

#[test]
fn geometry_config() {
    assert_translates_to("geometry.conf", "geometry.json");
}

#[test]
fn game_config() {
    assert_translates_to("game.conf", "game.json");
}

#[test]
fn pretty_output_matches_golden_file_exactly() {
    let src = read_fixture("web_server.conf");
    let value = translate(&src).unwrap();
    let pretty = json::to_string(&value, true).unwrap();
    assert_eq!(pretty + "\n", read_fixture("web_server.json"));
}

#[test]
fn translation_is_deterministic() {
    let src = read_fixture("game.conf");
    assert_eq!(to_json(&src), to_json(&src));
}

#[test]
fn round_trip_examples() {
    assert_eq!(to_json("(def A 2); (def B {* A 3}); B"), "6");
    assert_eq!(to_json("array(1, 2, {+ 1 1})"), "[1,2,2]");
    assert_eq!(to_json("([x: 1, y: {- 0 1}])"), r#"{"x":1,"y":-1}"#);
    assert_eq!(to_json("{chr 65}"), r#""A""#);
    assert_eq!(to_json("{len \"abc\"}"), "3");
    assert_eq!(to_json("{len array(1,2)}"), "2");
}

#[test]
fn order_is_preserved_at_every_depth() {
    assert_eq!(
        to_json("([b: ([z: 1, a: 2]), a: array(([y: 1, x: 2]), 3)])"),
        r#"{"b":{"z":1,"a":2},"a":[{"y":1,"x":2},3]}"#
    );
}

#[test]
fn comments_and_whitespace_do_not_change_the_result() {
    let dense = "(def A 2);(def B {*A 3});([k:array(B,\"x\"),m:{+ A B}])";
    let spaced = "% leading comment\n(def A 2);   % two\n\n\t(def B { * A\n 3 });\n([\n  k : array( B , \"x\" ) , % list\n  m : {+ A B}\n])\n% trailing comment";
    assert_eq!(to_json(dense), to_json(spaced));
}

#[test]
fn sequential_constant_resolution() {
    assert_failure("(def A B); (def B 1); A", ErrorKind::NameError);
    assert_eq!(to_json("(def A 1); (def B A); (def A 5); array(A, B)"), "[5,1]");
}

#[test]
fn operator_arity_and_type_enforcement() {
    assert_failure("{- 1}", ErrorKind::EvaluationError);
    assert_failure("{+ 1 \"a\"}", ErrorKind::EvaluationError);
    match translate("{/ 10 0}") {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::EvaluationError);
            assert_eq!(e.to_string(), "division by zero");
        }
        Ok(value) => panic!("expected division by zero, got {value}"),
    }
}

#[test]
fn missing_colon_is_a_parse_error_at_the_string() {
    let err = translate("([ key \"value\" ])").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert_eq!((err.line(), err.column()), (Some(1), Some(8)));
}

#[test]
fn invalid_fixtures_fail_with_positions() {
    let src = read_fixture("invalid_syntax.conf");
    let err = translate(&src).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert_eq!((err.line(), err.column()), (Some(2), Some(13)));

    let src = read_fixture("invalid_semantics.conf");
    let err = translate(&src).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EvaluationError);
    assert_eq!((err.line(), err.column()), (Some(2), Some(12)));
}

#[test]
fn lexical_errors() {
    assert_failure("([a: 1 # 2])", ErrorKind::LexError);
    assert_failure("\"open", ErrorKind::LexError);
    let err = translate("array(1,\n 2, $)").unwrap_err();
    assert_eq!((err.line(), err.column()), (Some(2), Some(5)));
}

#[test]
fn deep_nesting_is_a_parse_error() {
    let depth = confjson::parse::MAX_DEPTH * 8;
    let src = format!("{}1{}", "array(".repeat(depth), ")".repeat(depth));
    assert_failure(&src, ErrorKind::ParseError);

    let src = format!("{}1{}", "{+ ".repeat(100), "}".repeat(100));
    assert_eq!(to_json(&src), "1");
}

#[test]
fn chr_output_round_trips_unicode() {
    let value = translate("{+ {chr 960} {chr 8960} \"é\"}").unwrap();
    assert!(matches!(value, Value::Text(ref s) if s == "π⌀é"));
    assert_eq!(json::to_string(&value, false).unwrap(), "\"π⌀é\"");
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_confjson"))
        .args(args)
        .output()
        .expect("binary should run")
}

#[test]
fn cli_translates_to_stdout() {
    let path = fixture("geometry.conf");
    let output = run_cli(&["translate", path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(output.stderr.is_empty());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("{\n  \"circle\": {\n"));
    assert!(stdout.contains("\"pi_symbol\": \"π\""));
}

#[test]
fn cli_writes_to_output_file() {
    let out = std::env::temp_dir().join(format!("confjson-{}.json", std::process::id()));
    let path = fixture("web_server.conf");
    let output = run_cli(&[
        "translate",
        path.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
        "--compact",
    ]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let written = fs::read_to_string(&out).unwrap();
    fs::remove_file(&out).ok();
    assert!(written.starts_with(r#"{"server":{"port":80,"#));
    assert!(written.ends_with("}\n"));
}

#[test]
fn cli_reports_errors_on_stderr() {
    let path = fixture("invalid_syntax.conf");
    let output = run_cli(&["--quiet", "translate", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(65));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(
        stderr,
        "[line 2, column 13] ParseError: expected `:`, found key `key`\n"
    );

    let path = fixture("invalid_semantics.conf");
    let output = run_cli(&["translate", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(70));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("[line 2, column 12] EvaluationError: division by zero\n"));
}

#[test]
fn cli_strict_mode_rejects_redefinition() {
    let out = std::env::temp_dir().join(format!("confjson-strict-{}.conf", std::process::id()));
    fs::write(&out, "(def A 1);\n(def A 2);\nA\n").unwrap();
    let lenient = run_cli(&["translate", out.to_str().unwrap()]);
    let strict = run_cli(&["-q", "translate", "--strict", out.to_str().unwrap()]);
    fs::remove_file(&out).ok();

    assert_eq!(String::from_utf8(lenient.stdout).unwrap(), "2\n");
    assert_eq!(strict.status.code(), Some(65));
}

#[test]
fn cli_tokenize_and_parse() {
    let out = std::env::temp_dir().join(format!("confjson-tokens-{}.conf", std::process::id()));
    fs::write(&out, "(def A 1);\n{+   A 2}").unwrap();
    let tokens = run_cli(&["tokenize", out.to_str().unwrap()]);
    let parsed = run_cli(&["parse", out.to_str().unwrap()]);
    fs::remove_file(&out).ok();

    let tokens = String::from_utf8(tokens.stdout).unwrap();
    assert_eq!(tokens.lines().next(), Some("LEFT_PAREN ( 1:1"));
    assert_eq!(tokens.lines().last(), Some("EOF  2:10"));
    assert_eq!(
        String::from_utf8(parsed.stdout).unwrap(),
        "(def A 1);\n{+ A 2}\n"
    );
}

#[test]
fn cli_tokenize_prints_nothing_on_a_lexical_error() {
    let out = std::env::temp_dir().join(format!("confjson-bad-{}.conf", std::process::id()));
    fs::write(&out, "1 2 @").unwrap();
    let output = run_cli(&["-q", "tokenize", out.to_str().unwrap()]);
    fs::remove_file(&out).ok();

    assert_eq!(output.status.code(), Some(65));
    assert!(output.stdout.is_empty());
    assert_eq!(
        String::from_utf8(output.stderr).unwrap(),
        "[line 1, column 5] LexError: unexpected character '@'\n"
    );
}
