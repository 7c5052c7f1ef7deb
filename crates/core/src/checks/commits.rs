//! # Commit Message Validation
//!
//! Commit messages have to follow the shape
//! `type(component): short message #issue_number`, for example
//! `fix(Core): handle empty replica list #1234`.
//!
//! The shape is fixed. Which types and components are accepted comes from the
//! repository's [`RuleSet`](crate::config::RuleSet). Values are compared
//! case-insensitively but reported with the casing the rule set declares.

use indoc::formatdoc;

use donkeyops_developer_platforms::models::Commit;

use crate::config::{RuleSet, COMMIT_MESSAGE_REGEX};

#[cfg(test)]
#[path = "commits_tests.rs"]
mod tests;

/// The outcome of validating one commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,

    /// Markdown explaining what is wrong. Always `None` for valid messages.
    pub warning: Option<String>,
}

impl ValidationOutcome {
    fn invalid(warning: String) -> Self {
        Self {
            valid: false,
            warning: Some(warning),
        }
    }

    fn valid() -> Self {
        Self {
            valid: true,
            warning: None,
        }
    }
}

/// Parts of a structurally valid commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommitMessage<'a> {
    pub commit_type: &'a str,
    pub component: &'a str,
    pub summary: &'a str,
    pub issue_number: &'a str,
}

/// Builds the comment body listing every commit that fails validation.
///
/// Returns `None` when all commits are valid. Commits are reported in the order
/// they are given.
pub fn build_commit_report(commits: &[Commit], rules: &RuleSet) -> Option<String> {
    let findings: Vec<String> = commits
        .iter()
        .filter_map(|commit| {
            let outcome = validate_commit_message(
                &commit.message,
                &rules.types,
                &rules.components,
                &rules.commit_format,
            );
            outcome.warning.map(|warning| {
                formatdoc!(
                    "
                    ### Commit `{sha}`

                    ```
                    {message}
                    ```

                    {warning}",
                    sha = commit.short_sha(),
                    message = commit.message.trim(),
                    warning = warning,
                )
            })
        })
        .collect();

    if findings.is_empty() {
        return None;
    }

    Some(formatdoc!(
        "
        ## Commit Message Check

        Found {count} commit(s) that do not follow the commit message conventions.

        {findings}",
        count = findings.len(),
        findings = findings.join("\n\n"),
    ))
}

/// Finds the entry of `allowed` equal to `value` ignoring case.
pub fn find_case_insensitive<'a>(allowed: &'a [String], value: &str) -> Option<&'a str> {
    let value = value.to_lowercase();
    allowed
        .iter()
        .find(|a| a.to_lowercase() == value)
        .map(String::as_str)
}

/// Splits a commit message into its parts, without checking any values.
///
/// Leading and trailing whitespace of the message is ignored.
pub fn parse_commit_message(message: &str) -> Option<ParsedCommitMessage<'_>> {
    let captures = COMMIT_MESSAGE_REGEX.captures(message.trim())?;

    Some(ParsedCommitMessage {
        commit_type: captures.get(1)?.as_str(),
        component: captures.get(2)?.as_str(),
        summary: captures.get(3)?.as_str(),
        issue_number: captures.get(4)?.as_str(),
    })
}

/// Validates a commit message against the allowed types and components.
///
/// `format` is only used to tell the author what shape is expected.
///
/// # Examples
///
/// ```
/// use donkeyops_core::checks::commits::validate_commit_message;
///
/// let types = vec!["feat".to_string(), "fix".to_string()];
/// let components = vec!["Core".to_string()];
/// let format = "<type>(<component>): <short_message> #<issue_number>";
///
/// assert!(validate_commit_message("FEAT(core): add retries #12", &types, &components, format).valid);
///
/// let outcome = validate_commit_message("add retries", &types, &components, format);
/// assert!(!outcome.valid);
/// assert!(outcome.warning.unwrap().contains(format));
/// ```
pub fn validate_commit_message(
    message: &str,
    allowed_types: &[String],
    allowed_components: &[String],
    format: &str,
) -> ValidationOutcome {
    let Some(parsed) = parse_commit_message(message) else {
        return ValidationOutcome::invalid(formatdoc!(
            "
            **Commit Format Warning**

            The commit message does not follow the required format:

            `{format}`

            Allowed types: {types}

            Allowed components: {components}",
            format = format,
            types = allowed_types.join(", "),
            components = allowed_components.join(", "),
        ));
    };

    if find_case_insensitive(allowed_types, parsed.commit_type).is_none() {
        return ValidationOutcome::invalid(formatdoc!(
            "
            **Invalid Type Warning**

            The commit type `{commit_type}` is not recognized.

            Allowed types: {types}",
            commit_type = parsed.commit_type,
            types = allowed_types.join(", "),
        ));
    }

    if find_case_insensitive(allowed_components, parsed.component).is_none() {
        return ValidationOutcome::invalid(formatdoc!(
            "
            **Invalid Component Warning**

            The component `{component}` is not recognized.

            Allowed components: {components}",
            component = parsed.component,
            components = allowed_components.join(", "),
        ));
    }

    ValidationOutcome::valid()
}
