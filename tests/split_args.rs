// tests/split_args.rs

use procward::exec::split_args;

fn split(raw: &str) -> Vec<String> {
    split_args(raw)
}

#[test]
fn whitespace_separates_arguments() {
    assert_eq!(split("--port 8080   -v"), vec!["--port", "8080", "-v"]);
    assert_eq!(split("  \t "), Vec::<String>::new());
    assert_eq!(split(""), Vec::<String>::new());
}

#[test]
fn quotes_group_and_are_removed() {
    assert_eq!(
        split(r#"--name "my service" --mode 'a b'"#),
        vec!["--name", "my service", "--mode", "a b"]
    );
    assert_eq!(split(r#"pre"fix suf"fix"#), vec!["prefix suffix"]);
}

#[test]
fn empty_quotes_yield_empty_argument() {
    assert_eq!(split(r#"a "" b"#), vec!["a", "", "b"]);
    assert_eq!(split("''"), vec![""]);
}

#[test]
fn escapes_inside_double_quotes() {
    assert_eq!(split(r#""say \"hi\"""#), vec![r#"say "hi""#]);
    assert_eq!(split(r#""C:\\dir\\""#), vec![r"C:\dir\"]);
    // Backslashes before other characters are kept.
    assert_eq!(split(r#""C:\tools""#), vec![r"C:\tools"]);
    assert_eq!(split(r"C:\tools\run.exe"), vec![r"C:\tools\run.exe"]);
}

#[test]
fn unterminated_quote_runs_to_end() {
    assert_eq!(split(r#"-m "open ended"#), vec!["-m", "open ended"]);
}
