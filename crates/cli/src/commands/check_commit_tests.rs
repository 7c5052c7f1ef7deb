use super::*;
use std::io::Write;

#[test]
fn test_valid_message_with_default_rules() {
    assert!(check_message("feat(Core): add replica expiry #42", &RuleSet::default()).is_ok());
}

#[test]
fn test_invalid_message_reports_warning() {
    let result = check_message("Fixed stuff", &RuleSet::default());

    match result {
        Err(CliError::ValidationFailed(warning)) => {
            assert!(warning.contains("Commit Format Warning"))
        }
        other => panic!("Expected a validation failure, got {:?}", other),
    }
}

#[test]
fn test_rules_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "conventional_commits:\n  type_enum:\n    - feat\n  valid_components:\n    - Scheduler"
    )
    .unwrap();

    let rules = load_rules(Some(file.path())).unwrap();

    assert!(check_message("feat(scheduler): faster #1", &rules).is_ok());
    assert!(check_message("fix(Scheduler): faster #1", &rules).is_err());
    assert!(check_message("feat(Core): faster #1", &rules).is_err());
}

#[test]
fn test_missing_config_file() {
    let result = load_rules(Some(Path::new("/does/not/exist/.donkeyops.yml")));

    assert!(matches!(result, Err(CliError::ConfigError(_))));
}

#[test]
fn test_malformed_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "conventional_commits: [unclosed").unwrap();

    let result = load_rules(Some(file.path()));

    assert!(matches!(result, Err(CliError::ConfigError(_))));
}
