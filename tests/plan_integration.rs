use std::fs;

use wdt::{Bucket, PlanExtractor, extract_plan, render_missing, render_plan};

#[test]
fn mixed_script_is_bucketed_and_rendered() {
    let tmp = tempfile::tempdir().unwrap();
    let script = tmp.path().join("installer.ps1");
    fs::write(
        &script,
        "winget install git\nchoco install -y 7zip\n# comment\npip install requests\nSet-ExecutionPolicy Bypass\n",
    )
    .unwrap();

    let plan = extract_plan(&script).unwrap();
    assert!(plan.is_found());
    assert_eq!(plan.lines(Bucket::Winget), ["winget install git"]);
    assert_eq!(plan.lines(Bucket::Choco), ["choco install -y 7zip"]);
    assert_eq!(plan.lines(Bucket::Pip), ["pip install requests"]);
    assert_eq!(plan.lines(Bucket::Other), ["Set-ExecutionPolicy Bypass"]);

    assert_eq!(
        render_plan(&plan),
        "Winget Packages (1):\n  1. winget install git\n\n\
         Chocolatey Packages (1):\n  1. choco install -y 7zip\n\n\
         Pip / Python Packages (1):\n  1. pip install requests\n\n\
         Other Commands (1):\n  1. Set-ExecutionPolicy Bypass\n"
    );
}

#[test]
fn missing_script_is_not_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let script = tmp.path().join("installer.ps1");

    let plan = extract_plan(&script).unwrap();
    assert!(!plan.is_found());
    assert!(plan.is_empty());

    let message = render_missing(&script);
    assert!(message.starts_with("Could not find installer.ps1 next to the installer."));
    assert!(message.ends_with(&script.display().to_string()));
}

#[test]
fn extraction_is_repeatable_and_keeps_order() {
    let tmp = tempfile::tempdir().unwrap();
    let script = tmp.path().join("installer.ps1");
    fs::write(
        &script,
        "  winget install b\r\nwinget install a\r\n\r\n   # indented comment\r\nwinget install c",
    )
    .unwrap();

    let first = extract_plan(&script).unwrap();
    let second = extract_plan(&script).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.lines(Bucket::Winget),
        ["winget install b", "winget install a", "winget install c"]
    );
    assert_eq!(first.total(), 3);
}

#[test]
fn script_with_only_comments_renders_placeholder() {
    let tmp = tempfile::tempdir().unwrap();
    let script = tmp.path().join("installer.ps1");
    fs::write(&script, "# nothing to do\n\n   \n").unwrap();

    let plan = extract_plan(&script).unwrap();
    assert!(plan.is_found());
    assert!(plan.is_empty());
    assert!(render_plan(&plan).starts_with("No install commands were found in the script."));
}

#[test]
fn custom_comment_marker() {
    let tmp = tempfile::tempdir().unwrap();
    let script = tmp.path().join("installer.cmd");
    fs::write(&script, ";winget install skipped\nwinget install kept\n# not a comment here\n").unwrap();

    let plan = PlanExtractor::new(';').extract(&script).unwrap();
    assert_eq!(plan.lines(Bucket::Winget), ["winget install kept"]);
    assert_eq!(plan.lines(Bucket::Other), ["# not a comment here"]);
}
