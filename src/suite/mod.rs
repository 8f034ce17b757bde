//! Expectation checks over command results, and the built-in shell suite.
//!
//! A failing expectation is reported and the run moves on to the next test.
//! Stdout/stderr expectations are matched as substrings by default since
//! several commands print environment-dependent extra output; exact matching
//! is available as a policy.

mod builtin;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::exec::{CommandResult, Executor, OutputSink};
use crate::transport::{Channel, FileStore};

pub use builtin::builtin_suite;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    #[default]
    Substring,
    Exact,
}

impl MatchPolicy {
    fn matches(self, actual: &str, expected: &str) -> bool {
        match self {
            MatchPolicy::Substring => actual.contains(expected),
            MatchPolicy::Exact => actual == expected,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            MatchPolicy::Substring => "contain",
            MatchPolicy::Exact => "equal",
        }
    }
}

/// One command plus what its result should look like.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellTest {
    pub desc: String,
    pub cmd: String,
    #[serde(default)]
    pub expected_exit: Option<i32>,
    #[serde(default)]
    pub expected_stdout: Option<String>,
    #[serde(default)]
    pub expected_stderr: Option<String>,
}

impl ShellTest {
    pub fn new(desc: &str, cmd: &str) -> Self {
        Self {
            desc: desc.to_string(),
            cmd: cmd.to_string(),
            expected_exit: None,
            expected_stdout: None,
            expected_stderr: None,
        }
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.expected_exit = Some(code);
        self
    }

    pub fn stdout(mut self, expected: &str) -> Self {
        self.expected_stdout = Some(expected.to_string());
        self
    }

    pub fn stderr(mut self, expected: &str) -> Self {
        self.expected_stderr = Some(expected.to_string());
        self
    }
}

/// Check `result` against every expectation of `test`; one message per miss.
pub fn check(test: &ShellTest, result: &CommandResult, policy: MatchPolicy) -> Vec<String> {
    let mut failures = Vec::new();

    if let Some(expected) = test.expected_exit {
        if result.exit_status != Some(expected) {
            let got = result
                .exit_status
                .map_or_else(|| "None".to_string(), |c| c.to_string());
            failures.push(format!("Expected exit status {expected}, got {got}"));
        }
    }
    if let Some(expected) = &test.expected_stdout {
        if !policy.matches(&result.stdout_text(), expected) {
            failures.push(format!("Expected stdout to {}: {expected}", policy.describe()));
        }
    }
    if let Some(expected) = &test.expected_stderr {
        if !policy.matches(&result.stderr_text(), expected) {
            failures.push(format!("Expected stderr to {}: {expected}", policy.describe()));
        }
    }

    failures
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub seq: u64,
    pub desc: String,
    pub cmd: String,
    pub exit_status: Option<i32>,
    pub failures: Vec<String>,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub outcomes: Vec<TestOutcome>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }
}

#[derive(Deserialize)]
struct SuiteFile {
    #[serde(default, rename = "test")]
    tests: Vec<ShellTest>,
}

/// Parse a suite from TOML made of `[[test]]` tables.
pub fn parse_suite(text: &str) -> Result<Vec<ShellTest>> {
    let file: SuiteFile = toml::from_str(text).context("Invalid suite file")?;
    Ok(file.tests)
}

pub fn load_suite(path: &Path) -> Result<Vec<ShellTest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read suite {}", path.display()))?;
    parse_suite(&text).with_context(|| format!("Failed to load suite {}", path.display()))
}

/// Run every test in order through `executor`.
///
/// Aborted commands count as failures. Only a transport failure stops the run.
pub async fn run_suite<C, S, O, W>(
    executor: &mut Executor<'_, C, S>,
    tests: &[ShellTest],
    policy: MatchPolicy,
    sink: &mut O,
    out: &mut W,
) -> Result<SuiteReport>
where
    C: Channel,
    S: FileStore,
    O: OutputSink,
    W: Write,
{
    let mut report = SuiteReport::default();

    for test in tests {
        let seq = executor.next_seq();
        writeln!(out, "\n--- Test #{seq}: {} ---", test.desc)?;

        let (exit_status, failures) = match executor.run(&test.cmd, sink).await {
            Ok(result) => {
                writeln!(out, "{}", result.summary())?;
                (result.exit_status, check(test, &result, policy))
            }
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| format!("Session lost during test #{seq}"));
            }
            Err(e) => (None, vec![format!("Command aborted: {e}")]),
        };

        if failures.is_empty() {
            writeln!(out, "PASS")?;
        } else {
            for failure in &failures {
                writeln!(out, "FAIL: {failure}")?;
            }
        }

        report.outcomes.push(TestOutcome {
            seq,
            desc: test.desc.clone(),
            cmd: test.cmd.clone(),
            exit_status,
            failures,
        });
    }

    info!(passed = report.passed(), failed = report.failed(), "Suite finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::exec::tests::quick_timing;
    use crate::exec::{Completion, NullSink};
    use crate::session::Session;
    use crate::transport::scripted::{Script, ScriptedRemote};

    fn result(stdout: &str, stderr: &str, exit: Option<i32>) -> CommandResult {
        CommandResult {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            exit_status: exit,
            duration: Duration::ZERO,
            completion: Completion::Completed,
            advisories: Vec::new(),
        }
    }

    #[test]
    fn test_check_passes_with_no_expectations() {
        let t = ShellTest::new("anything", "true");
        assert!(check(&t, &result("", "", None), MatchPolicy::Substring).is_empty());
    }

    #[test]
    fn test_exit_status_is_exact() {
        let t = ShellTest::new("grep", "grep x /dev/null").exit(1);
        assert!(check(&t, &result("", "", Some(1)), MatchPolicy::Substring).is_empty());
        let failures = check(&t, &result("", "", None), MatchPolicy::Substring);
        assert_eq!(failures, vec!["Expected exit status 1, got None".to_string()]);
    }

    #[test]
    fn test_substring_versus_exact() {
        let t = ShellTest::new("echo", "echo $MYVAR").stdout("hello world");
        let r = result("hello world (extra motd)", "", Some(0));
        assert!(check(&t, &r, MatchPolicy::Substring).is_empty());
        assert_eq!(check(&t, &r, MatchPolicy::Exact).len(), 1);
        assert!(check(&t, &result("hello world", "", Some(0)), MatchPolicy::Exact).is_empty());
    }

    #[test]
    fn test_stderr_expectation() {
        let t = ShellTest::new("ls", "ls /nonexistent").exit(2).stderr("No such file");
        let r = result("", "ls: cannot access '/nonexistent': No such file or directory", Some(2));
        assert!(check(&t, &r, MatchPolicy::Substring).is_empty());
        let failures = check(&t, &result("", "", Some(0)), MatchPolicy::Substring);
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn test_parse_suite_toml() {
        let tests = parse_suite(
            r#"
            [[test]]
            desc = "Check whoami"
            cmd = "whoami"
            expected_exit = 0

            [[test]]
            desc = "Echo"
            cmd = "echo hi"
            expected_stdout = "hi"
            "#,
        )
        .unwrap();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0], ShellTest::new("Check whoami", "whoami").exit(0));
        assert_eq!(tests[1].expected_stdout.as_deref(), Some("hi"));
        assert!(parse_suite("[[test]]\ndesc = 1").is_err());
    }

    #[tokio::test]
    async fn test_run_suite_reports_without_aborting() {
        let remote = ScriptedRemote::new();
        remote.script("whoami", Script::ok("alice\n"));
        remote.script("false", Script::failing("", 1));
        remote.script("hang", Script::hanging());
        let session = Session::from_parts("/r", remote.clone(), remote.clone());
        let mut executor = Executor::new(&session, quick_timing());

        let tests = vec![
            ShellTest::new("Check whoami", "whoami").exit(0).stdout("alice"),
            ShellTest::new("Expect success from false", "false").exit(0),
            ShellTest::new("Never finishes", "hang").exit(0),
            ShellTest::new("Still runs", "whoami").exit(0),
        ];
        let mut out = Vec::new();
        let report = run_suite(&mut executor, &tests, MatchPolicy::Substring, &mut NullSink, &mut out)
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed(), 2);
        assert!(report.outcomes[2].failures[0].starts_with("Command aborted"));
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("--- Test #1: Check whoami ---"));
        assert!(out.contains("FAIL: Expected exit status 0, got 1"));
        assert!(out.contains("--- Test #4: Still runs ---"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["desc"], "Check whoami");
    }
}
