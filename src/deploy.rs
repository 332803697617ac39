//! Deploys the publish directory to surge.sh.
//!
//! The dispatcher walks an ordered list of transport strategies — the `surge`
//! binary itself, then `npx surge` for machines where the tool was never
//! installed globally — and for each one runs the same state machine:
//! resolve the executable, check the session with `whoami`, log in
//! non-interactively if needed, then deploy. The first successful deploy is
//! terminal; otherwise every attempt's combined output accumulates into a
//! single transcript handed back to the caller. Adding a third transport is
//! one more entry in [`STRATEGIES`].
//!
//! No subprocess here ever reaches an interactive console: stdio is piped,
//! arguments get no shell interpretation, and every call carries a bounded
//! timeout after which the child is killed.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::DeployCredentials;
use crate::contract::{CommandOutput, CommandRunner, ToolInvocation, ToolLocator};
use crate::toolchain::ToolLocation;

/// One transport for reaching surge: the candidate executable names to
/// resolve, the argv prefix that turns the resolved binary into a surge
/// invocation, and the per-call timeouts.
pub struct Strategy {
    pub label: &'static str,
    pub candidates: &'static [&'static str],
    pub argv_prefix: &'static [&'static str],
    pub status_timeout: Duration,
    pub login_timeout: Duration,
    pub deploy_timeout: Duration,
}

/// Ordered fallback chain; order is the contract.
pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        label: "surge",
        candidates: &["surge"],
        argv_prefix: &[],
        status_timeout: Duration::from_secs(30),
        login_timeout: Duration::from_secs(60),
        deploy_timeout: Duration::from_secs(240),
    },
    Strategy {
        label: "npx surge",
        candidates: &["npx"],
        argv_prefix: &["surge"],
        status_timeout: Duration::from_secs(60),
        login_timeout: Duration::from_secs(120),
        deploy_timeout: Duration::from_secs(300),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Deployed,
    /// No strategy's executable was found anywhere; nothing was spawned.
    ToolNotFound,
    /// Every strategy ran and failed.
    Failed,
}

/// Verdict of one publish cycle's dispatch, delivered exactly once.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub success: bool,
    pub outcome: DispatchOutcome,
    /// Combined output of every subprocess attempted, in order, each segment
    /// tagged with the strategy that produced it.
    pub transcript: String,
}

/// Runs the fallback chain until the first successful deploy or exhaustion.
/// Tool locations are resolved fresh on every call.
pub async fn dispatch(
    locator: &dyn ToolLocator,
    runner: &dyn CommandRunner,
    publish_dir: &Path,
    creds: &DeployCredentials,
) -> DispatchResult {
    let mut transcript = String::new();
    let mut any_tool_found = false;

    for strategy in STRATEGIES {
        let names: Vec<String> = strategy.candidates.iter().map(|n| n.to_string()).collect();
        let location = match locator.resolve(&names) {
            Some(location) => location,
            None => {
                info!(strategy = strategy.label, "[DEPLOY] Executable not found");
                push_note(
                    &mut transcript,
                    strategy.label,
                    "executable not found on PATH or in known install directories",
                );
                continue;
            }
        };
        any_tool_found = true;
        info!(
            strategy = strategy.label,
            path = %location.path.display(),
            found_via = ?location.strategy,
            "[DEPLOY] Resolved deployment tool"
        );

        ensure_session(runner, &location, strategy, creds, &mut transcript).await;

        let deploy = runner
            .run(invocation(
                &location,
                strategy,
                &[
                    publish_dir.display().to_string(),
                    creds.domain.clone(),
                    "--yes".to_string(),
                ],
                None,
                strategy.deploy_timeout,
            ))
            .await;
        push_output(&mut transcript, strategy.label, "deploy", &deploy);

        if deploy.success {
            info!(strategy = strategy.label, domain = %creds.domain, "[DEPLOY] Publish succeeded");
            return DispatchResult {
                success: true,
                outcome: DispatchOutcome::Deployed,
                transcript,
            };
        }
        error!(
            strategy = strategy.label,
            timed_out = deploy.timed_out,
            "[DEPLOY][ERROR] Deploy attempt failed; trying next strategy"
        );
    }

    let outcome = if any_tool_found {
        DispatchOutcome::Failed
    } else {
        DispatchOutcome::ToolNotFound
    };
    error!(?outcome, "[DEPLOY][ERROR] All strategies exhausted");
    DispatchResult {
        success: false,
        outcome,
        transcript,
    }
}

/// Best-effort authentication: `whoami`, then a non-interactive `login`
/// (identity and secret, one per line, on stdin) and a re-check. An
/// unconfirmed session is logged and deployment proceeds anyway — the tool
/// may hold cached credentials the status output does not reveal.
async fn ensure_session(
    runner: &dyn CommandRunner,
    location: &ToolLocation,
    strategy: &Strategy,
    creds: &DeployCredentials,
    transcript: &mut String,
) {
    let status = runner
        .run(invocation(
            location,
            strategy,
            &["whoami".to_string()],
            None,
            strategy.status_timeout,
        ))
        .await;
    push_output(transcript, strategy.label, "whoami", &status);
    if session_authenticated(&status) {
        info!(strategy = strategy.label, "[DEPLOY] Session already authenticated");
        return;
    }

    info!(strategy = strategy.label, "[DEPLOY] Not authenticated; attempting non-interactive login");
    let login = runner
        .run(invocation(
            location,
            strategy,
            &["login".to_string()],
            Some(format!("{}\n{}\n", creds.email, creds.password)),
            strategy.login_timeout,
        ))
        .await;
    push_output(transcript, strategy.label, "login", &login);

    let recheck = runner
        .run(invocation(
            location,
            strategy,
            &["whoami".to_string()],
            None,
            strategy.status_timeout,
        ))
        .await;
    push_output(transcript, strategy.label, "whoami", &recheck);

    if !session_authenticated(&recheck) {
        warn!(
            strategy = strategy.label,
            "[DEPLOY] Could not confirm an authenticated session; deploying anyway"
        );
        push_note(
            transcript,
            strategy.label,
            "session could not be confirmed; deploying anyway",
        );
    }
}

/// Authenticated iff the status call exited cleanly and printed an identity.
/// surge's `whoami` prints the logged-in account's email, which is the one
/// machine-checkable token in its output.
pub fn session_authenticated(status: &CommandOutput) -> bool {
    status.success && identity_token(&status.output).is_some()
}

/// Extracts the email-shaped identity token from status output, if any.
pub fn identity_token(output: &str) -> Option<&str> {
    let pattern = Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    pattern.find(output).map(|m| m.as_str())
}

fn invocation(
    location: &ToolLocation,
    strategy: &Strategy,
    args: &[String],
    input: Option<String>,
    timeout: Duration,
) -> ToolInvocation {
    let mut argv: Vec<String> = strategy.argv_prefix.iter().map(|a| a.to_string()).collect();
    argv.extend(args.iter().cloned());
    ToolInvocation {
        program: location.path.clone(),
        args: argv,
        input,
        timeout,
    }
}

fn push_note(transcript: &mut String, label: &str, note: &str) {
    transcript.push_str(&format!("[{label}] {note}\n"));
}

fn push_output(transcript: &mut String, label: &str, step: &str, out: &CommandOutput) {
    let verdict = if out.timed_out {
        "timed out"
    } else if out.success {
        "ok"
    } else {
        "failed"
    };
    transcript.push_str(&format!("[{label}] {step}: {verdict}\n"));
    if !out.output.is_empty() {
        transcript.push_str(&out.output);
        if !out.output.ends_with('\n') {
            transcript.push('\n');
        }
    }
}

/// Production subprocess runner on `tokio::process`. Timeouts are enforced
/// per call; an expired child is killed via `kill_on_drop` when the wait
/// future is dropped.
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: ToolInvocation) -> CommandOutput {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(if invocation.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutput {
                    success: false,
                    timed_out: false,
                    output: format!("failed to launch {}: {e}", invocation.program.display()),
                }
            }
        };

        if let Some(text) = &invocation.input {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    warn!(error = %e, "[DEPLOY] Could not write to child stdin");
                }
                // dropping stdin closes the pipe so the child sees EOF
            }
        }

        match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(Ok(out)) => {
                let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
                let err = String::from_utf8_lossy(&out.stderr);
                if !err.is_empty() {
                    if !combined.is_empty() && !combined.ends_with('\n') {
                        combined.push('\n');
                    }
                    combined.push_str(&err);
                }
                CommandOutput {
                    success: out.status.success(),
                    timed_out: false,
                    output: combined,
                }
            }
            Ok(Err(e)) => CommandOutput {
                success: false,
                timed_out: false,
                output: format!("command failed: {e}"),
            },
            Err(_) => CommandOutput {
                success: false,
                timed_out: true,
                output: format!(
                    "command timed out after {}s and was terminated",
                    invocation.timeout.as_secs()
                ),
            },
        }
    }
}
