//! Collaborators that shell out to local tooling
//!
//! Programs are run directly with no shell in between and must be on an
//! allow-list. Arguments go to the program verbatim, so quotes, pipes and
//! semicolons in a `mongosh --eval` script or a JMESPath query survive.
//! The `{uri}` placeholder is replaced with the session's connection URI.

use std::process::Output;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use super::{CheckFuture, Cleanup, VerifyError, VerifyResult, Verifier};
use crate::lab::model::{Step, VerifySpec};

/// Stands in for the MongoDB connection URI in verification arguments
pub const URI_PLACEHOLDER: &str = "{uri}";

/// ANSI escape sequences in tool output
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("valid regex"));

/// Anything that cannot appear in a KMS alias
static ALIAS_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_\-/]").expect("valid regex"));

/// Anything that cannot appear in an AWS profile name
static PROFILE_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_\-]").expect("valid regex"));

/// Drop NUL bytes, which cannot be passed in argv
pub fn sanitize_arg(arg: &str) -> String {
    arg.replace('\0', "")
}

/// Sanitize arguments and fill in the connection URI.
///
/// Fails with a message when an argument needs the URI and none is set.
pub fn prepare_args(args: &[String], connection_uri: Option<&str>) -> Result<Vec<String>, String> {
    args.iter()
        .map(|arg| {
            let arg = sanitize_arg(arg);
            if !arg.contains(URI_PLACEHOLDER) {
                return Ok(arg);
            }
            match connection_uri.filter(|uri| !uri.trim().is_empty()) {
                Some(uri) => Ok(arg.replace(URI_PLACEHOLDER, uri.trim())),
                None => Err("No MongoDB connection URI configured (set mongo_uri or MONGODB_URI)".to_string()),
            }
        })
        .collect()
}

/// Remove terminal escapes and normalise line endings
pub fn clean_output(raw: &str) -> String {
    ANSI_ESCAPE.replace_all(raw, "").replace("\r\n", "\n").trim().to_string()
}

/// Decide pass/fail from a finished command
pub fn evaluate(succeeded: bool, stdout: &str, stderr: &str, expect: Option<&str>) -> VerifyResult {
    let stdout = clean_output(stdout);
    let stderr = clean_output(stderr);

    if !succeeded {
        let detail = if stderr.is_empty() { stdout.as_str() } else { stderr.as_str() };
        return VerifyResult::fail(format!("Command failed: {}", first_line(detail)));
    }

    match expect {
        Some(needle) if !stdout.contains(needle) && !stderr.contains(needle) => {
            VerifyResult::fail(format!("Expected output containing `{needle}`"))
        }
        _ => {
            let shown = if stdout.is_empty() { "Command succeeded" } else { first_line(&stdout) };
            VerifyResult::pass(shown.to_string())
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

async fn run(program: &str, args: &[String]) -> Result<Output, VerifyError> {
    tracing::debug!(program, ?args, "running verification command");
    Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| VerifyError::Spawn { program: program.to_string(), source })
}

/// Verifies steps according to their `VerifySpec`
#[derive(Debug, Clone)]
pub struct ShellVerifier {
    allowed: Vec<String>,
}

impl ShellVerifier {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    fn is_allowed(&self, program: &str) -> bool {
        self.allowed.iter().any(|p| p == program)
    }
}

impl Verifier for ShellVerifier {
    fn verify(&self, step: &Step, connection_uri: Option<&str>) -> CheckFuture {
        let spec = step.verify.clone();
        let connection_uri = connection_uri.map(str::to_string);
        let allowed = spec
            .as_ref()
            .map(|s| match s {
                VerifySpec::Command { program, .. } => self.is_allowed(program),
                VerifySpec::Manual { .. } => true,
            })
            .unwrap_or(true);

        Box::pin(async move {
            match spec {
                None => Ok(VerifyResult::pass("No verification required")),
                Some(VerifySpec::Manual { message }) => Ok(VerifyResult::pass(message)),
                Some(VerifySpec::Command { program, .. }) if !allowed => Ok(VerifyResult::fail(
                    format!("`{program}` is not an allowed verification command"),
                )),
                Some(VerifySpec::Command { program, args, expect }) => {
                    let args = match prepare_args(&args, connection_uri.as_deref()) {
                        Ok(args) => args,
                        Err(message) => return Ok(VerifyResult::fail(message)),
                    };
                    let output = run(&program, &args).await?;
                    Ok(evaluate(
                        output.status.success(),
                        &String::from_utf8_lossy(&output.stdout),
                        &String::from_utf8_lossy(&output.stderr),
                        expect.as_deref(),
                    ))
                }
            }
        })
    }
}

/// Removes the learner's KMS alias and schedules its key for deletion
#[derive(Debug, Clone)]
pub struct KmsAliasCleanup {
    alias: Option<String>,
    profile: String,
}

impl KmsAliasCleanup {
    /// Days AWS waits before deleting a scheduled key
    const PENDING_WINDOW_DAYS: &'static str = "7";

    pub fn new(alias: Option<String>, profile: impl Into<String>) -> Self {
        Self {
            alias: alias.map(|a| ALIAS_UNSAFE.replace_all(&a, "").into_owned()),
            profile: PROFILE_UNSAFE.replace_all(&profile.into(), "").into_owned(),
        }
    }
}

impl Cleanup for KmsAliasCleanup {
    fn cleanup(&self, lab_number: u32, _connection_uri: Option<&str>) -> CheckFuture {
        let alias = self.alias.clone();
        let profile = self.profile.clone();

        Box::pin(async move {
            let Some(alias) = alias.filter(|a| !a.is_empty()) else {
                return Ok(VerifyResult::pass("No KMS alias configured, nothing to clean"));
            };
            if !alias.starts_with("alias/") {
                return Ok(VerifyResult::fail("Invalid alias format. Must start with alias/"));
            }
            tracing::info!(lab_number, %alias, "cleaning up KMS resources");

            let query = format!("Aliases[?AliasName=='{alias}'].TargetKeyId");
            let lookup = run(
                "aws",
                &strings(&["kms", "list-aliases", "--profile", &profile, "--query", &query, "--output", "text"]),
            )
            .await?;
            let key_id = clean_output(&String::from_utf8_lossy(&lookup.stdout));
            if !lookup.status.success() || key_id.is_empty() || key_id == "None" {
                return Ok(VerifyResult::pass(format!("Alias {alias} not found, nothing to clean.")));
            }

            let delete = run(
                "aws",
                &strings(&["kms", "delete-alias", "--alias-name", &alias, "--profile", &profile]),
            )
            .await?;
            if !delete.status.success() {
                tracing::warn!(%alias, "delete-alias failed, scheduling key deletion anyway");
            }

            let schedule = run(
                "aws",
                &strings(&[
                    "kms",
                    "schedule-key-deletion",
                    "--key-id",
                    &key_id,
                    "--pending-window-in-days",
                    Self::PENDING_WINDOW_DAYS,
                    "--profile",
                    &profile,
                ]),
            )
            .await?;
            if !schedule.status.success() {
                let stderr = clean_output(&String::from_utf8_lossy(&schedule.stderr));
                return Ok(VerifyResult::fail(format!(
                    "Deleted alias, but failed to schedule key deletion: {}",
                    first_line(&stderr)
                )));
            }

            Ok(VerifyResult::pass(format!(
                "Resource cleanup complete: alias deleted, key {key_id} scheduled for deletion ({} days).",
                Self::PENDING_WINDOW_DAYS
            )))
        })
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn step(verify: Option<VerifySpec>) -> Step {
        Step {
            id: "tools".into(),
            title: "Check tools".into(),
            description: String::new(),
            code_blocks: Vec::new(),
            verify,
        }
    }

    #[test]
    fn arguments_pass_through_verbatim() {
        let script = "const idx = db.getCollection('__keyVault').getIndexes(); print(idx.some(i => i.unique));";
        assert_eq!(sanitize_arg(script), script);
        assert_eq!(
            sanitize_arg("Aliases[?AliasName=='alias/lab'] | [0].TargetKeyId"),
            "Aliases[?AliasName=='alias/lab'] | [0].TargetKeyId"
        );
        assert_eq!(sanitize_arg("--eval\0x"), "--evalx");
    }

    #[test]
    fn uri_placeholder_is_filled() {
        let args = vec!["{uri}".to_string(), "--quiet".to_string()];
        assert_eq!(
            prepare_args(&args, Some(" mongodb+srv://lab.example.net/ ")).unwrap(),
            vec!["mongodb+srv://lab.example.net/".to_string(), "--quiet".to_string()]
        );
        assert!(prepare_args(&args, None).is_err());
        assert!(prepare_args(&args, Some("  ")).is_err());
        assert_eq!(prepare_args(&args[1..], None).unwrap(), vec!["--quiet".to_string()]);
    }

    #[test]
    fn clean_output_strips_ansi() {
        assert_eq!(clean_output("\x1b[32mok\x1b[0m\r\nnext\r\n"), "ok\nnext");
    }

    #[test]
    fn evaluate_requires_expected_text() {
        let result = evaluate(true, "aws-cli/2.15.0 Python/3.11", "", Some("aws-cli/2"));
        assert_eq!(result, VerifyResult::pass("aws-cli/2.15.0 Python/3.11"));

        let result = evaluate(true, "mongosh 1.0", "", Some("2.3"));
        assert!(!result.success);
    }

    #[test]
    fn evaluate_reports_failures_from_stderr() {
        let result = evaluate(false, "", "An error occurred (NotFoundException)\nmore", None);
        assert_eq!(result, VerifyResult::fail("Command failed: An error occurred (NotFoundException)"));
    }

    #[tokio::test]
    async fn steps_without_spec_pass() {
        let verifier = ShellVerifier::new(Vec::new());
        let result = verifier.verify(&step(None), None).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn manual_steps_pass_with_message() {
        let verifier = ShellVerifier::new(Vec::new());
        let spec = VerifySpec::Manual { message: "Run the script and check output".into() };
        let result = verifier.verify(&step(Some(spec)), None).await.unwrap();
        assert_eq!(result, VerifyResult::pass("Run the script and check output"));
    }

    #[tokio::test]
    async fn disallowed_programs_fail_without_running() {
        let verifier = ShellVerifier::new(vec!["aws".into()]);
        let spec = VerifySpec::Command { program: "rm".into(), args: vec!["-rf".into()], expect: None };
        let result = verifier.verify(&step(Some(spec)), None).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("not an allowed"));
    }

    #[tokio::test]
    async fn missing_uri_fails_without_running() {
        let verifier = ShellVerifier::new(vec!["lab-coach-no-such-tool".into()]);
        let spec = VerifySpec::Command {
            program: "lab-coach-no-such-tool".into(),
            args: vec!["{uri}".into()],
            expect: Some("true".into()),
        };
        let result = verifier.verify(&step(Some(spec)), None).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("connection URI"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let verifier = ShellVerifier::new(vec!["lab-coach-no-such-tool".into()]);
        let spec = VerifySpec::Command {
            program: "lab-coach-no-such-tool".into(),
            args: Vec::new(),
            expect: None,
        };
        let err = verifier.verify(&step(Some(spec)), None).await.unwrap_err();
        assert!(matches!(err, VerifyError::Spawn { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn cleanup_without_alias_is_a_no_op() {
        let cleanup = KmsAliasCleanup::new(None, "default");
        let result = cleanup.cleanup(1, None).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn cleanup_rejects_malformed_alias() {
        let cleanup = KmsAliasCleanup::new(Some("my-key; rm".into()), "default");
        let result = cleanup.cleanup(1, None).await.unwrap();
        assert!(!result.success);
    }
}
