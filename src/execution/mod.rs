//! Adaptive code execution engine.
//!
//! A code unit runs against a persistent binding environment; failures are
//! classified between attempts and the recoverable ones (a symbol that only
//! needs importing, a package that only needs installing) are healed in place
//! before retrying. Terminal states always resolve to a returned value, never
//! a propagated error: the upstream agent loop inspects the outcome and
//! decides whether to request a fix, ask the user, or stop.
//!
//! Because bindings persist, calls are not idempotent: a unit with side
//! effects (a counter, a stage move) observes whatever earlier units left
//! behind.

pub mod capture;
pub mod env;
pub mod prepare;
pub mod resolver;

use std::collections::HashSet;

use anyhow::Result;
use pyo3::prelude::*;
use tracing::{debug, warn};

use self::capture::CapturedStdout;
use self::env::BindingEnv;
use self::resolver::{ExecFailure, PackageInstaller};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    Failed,
}

/// Result of one top-level `run_code` call.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub status: ExecStatus,
    pub output: String,
    pub error_detail: Option<String>,
}

impl ExecOutcome {
    fn success(output: String) -> Self {
        Self { status: ExecStatus::Success, output, error_detail: None }
    }

    fn failed(output: String, detail: String) -> Self {
        Self { status: ExecStatus::Failed, output, error_detail: Some(detail) }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecStatus::Success
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub installer: PackageInstaller,
    pub max_heal_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { installer: PackageInstaller::default(), max_heal_attempts: 8 }
    }
}

impl EngineConfig {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        let mut ec = Self::default();
        if let Some(n) = cfg.get_usize("MAX_HEAL_ATTEMPTS") {
            ec.max_heal_attempts = n;
        }
        if let Some(secs) = cfg.get_usize("PIP_TIMEOUT") {
            ec.installer = PackageInstaller::pip(std::time::Duration::from_secs(secs as u64));
        }
        ec
    }
}

/// Execution supervisor: owns the binding environment and drives the
/// execute / classify / heal / retry loop. Single-caller, single-flight;
/// callers must serialize their own calls.
pub struct Engine {
    env: BindingEnv,
    installer: PackageInstaller,
    max_heal_attempts: usize,
}

impl Engine {
    /// Seed a fresh binding environment with the given bootstrap unit.
    pub fn new(bootstrap_unit: &str, cfg: EngineConfig) -> Result<Self> {
        let env = BindingEnv::new();
        env.bootstrap(bootstrap_unit)?;
        Ok(Self {
            env,
            installer: cfg.installer,
            max_heal_attempts: cfg.max_heal_attempts,
        })
    }

    /// Live execution. Stdout is captured; every terminal state becomes data:
    /// success returns the trimmed captured output, a fatal failure returns
    /// its description, an unresolvable package returns a "Could not install"
    /// message.
    pub fn run_code(&mut self, code: &str) -> ExecOutcome {
        self.supervise(code, true)
    }

    /// Offline validation. No output is captured; the caller only learns
    /// whether the unit executes to completion.
    pub fn test_code(&mut self, code: &str) -> bool {
        self.supervise(code, false).is_success()
    }

    fn supervise(&mut self, code: &str, capture: bool) -> ExecOutcome {
        // Names healed during this call. A name that reappears after healing
        // means classification cannot make progress; treat it as fatal rather
        // than spinning.
        let mut healed: HashSet<String> = HashSet::new();
        loop {
            let failure = match Python::with_gil(|py| self.attempt(py, code, capture)) {
                Ok(output) => return ExecOutcome::success(output),
                Err(f) => f,
            };
            match failure {
                ExecFailure::Fatal(detail) => {
                    warn!(%detail, "execution failed");
                    return ExecOutcome::failed(detail.clone(), detail);
                }
                ExecFailure::MissingBinding(name) => {
                    if let Some(outcome) = heal_budget(&mut healed, &name, self.max_heal_attempts) {
                        return outcome;
                    }
                    let bound = Python::with_gil(|py| {
                        resolver::resolve_missing_binding(py, &name, &self.env)
                    });
                    if let Err(err) = bound {
                        // Import failed after the probe said it would work
                        let detail = err.to_string();
                        warn!(module = %name, %detail, "binding resolution failed");
                        return ExecOutcome::failed(detail.clone(), detail);
                    }
                    debug!(module = %name, "bound importable module");
                }
                ExecFailure::MissingPackage(name) => {
                    if let Some(outcome) = heal_budget(&mut healed, &name, self.max_heal_attempts) {
                        return outcome;
                    }
                    if !self.installer.resolve(&name) {
                        let output = format!("Could not install the module {name}");
                        return ExecOutcome::failed(output.clone(), output);
                    }
                    debug!(module = %name, "resolved missing package");
                }
            }
        }
    }

    fn attempt(&self, py: Python<'_>, code: &str, capture: bool) -> Result<String, ExecFailure> {
        let guard = if capture {
            Some(CapturedStdout::redirect(py).map_err(|e| ExecFailure::Fatal(e.to_string()))?)
        } else {
            None
        };
        match self.env.execute(py, code) {
            Ok(()) => Ok(match &guard {
                Some(g) => g.contents(py).unwrap_or_default(),
                None => String::new(),
            }),
            Err(err) => Err(resolver::classify(py, &err, &self.env)),
        }
    }
}

fn heal_budget(healed: &mut HashSet<String>, name: &str, max: usize) -> Option<ExecOutcome> {
    if !healed.insert(name.to_string()) {
        let detail = format!("Could not resolve the module {name}: failure repeated after healing");
        return Some(ExecOutcome::failed(detail.clone(), detail));
    }
    if healed.len() > max {
        let detail = format!("Could not resolve the module {name}: healing attempt limit reached");
        return Some(ExecOutcome::failed(detail.clone(), detail));
    }
    None
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bench_engine() -> Engine {
        // Installer command that always exits non-zero keeps the tests off
        // the network and off the real registry.
        let cfg = EngineConfig {
            installer: PackageInstaller::new("false", vec![], Duration::from_secs(5)),
            max_heal_attempts: 8,
        };
        Engine::new("", cfg).unwrap()
    }

    #[test]
    fn run_returns_trimmed_printed_output() {
        let _stdout = test_support::stdout_lock();
        let mut engine = bench_engine();
        let outcome = engine.run_code("print('  hello world  ')");
        assert!(outcome.is_success());
        assert_eq!(outcome.output, "hello world");
        assert!(outcome.error_detail.is_none());
    }

    #[test]
    fn silent_unit_yields_empty_output() {
        let _stdout = test_support::stdout_lock();
        let mut engine = bench_engine();
        let outcome = engine.run_code("x = 41 + 1");
        assert!(outcome.is_success());
        assert_eq!(outcome.output, "");
    }

    #[test]
    fn bindings_accumulate_across_calls() {
        let _stdout = test_support::stdout_lock();
        let mut engine = bench_engine();
        assert!(engine.run_code("y = 5").is_success());
        let outcome = engine.run_code("print(y)");
        assert!(outcome.is_success());
        assert_eq!(outcome.output, "5");
    }

    #[test]
    fn missing_binding_heals_in_one_cycle() {
        let _stdout = test_support::stdout_lock();
        let mut engine = bench_engine();
        let outcome = engine.run_code("print(json.dumps([1, 2]))");
        assert!(outcome.is_success());
        assert_eq!(outcome.output, "[1, 2]");
        // the healed binding is durable
        let outcome = engine.run_code("print(json.dumps({}))");
        assert!(outcome.is_success());
    }

    #[test]
    fn fatal_failure_becomes_output_deterministically() {
        let mut engine = bench_engine();
        let first = engine.run_code("1/0");
        assert_eq!(first.status, ExecStatus::Failed);
        assert_eq!(first.output, "ZeroDivisionError: division by zero");
        let second = engine.run_code("1/0");
        assert_eq!(second.output, first.output);
    }

    #[test]
    fn unresolvable_package_named_in_output() {
        let mut engine = bench_engine();
        let outcome = engine.run_code("import mscope_no_such_module");
        assert_eq!(outcome.status, ExecStatus::Failed);
        assert_eq!(outcome.output, "Could not install the module mscope_no_such_module");
    }

    #[test]
    fn repeated_failure_after_heal_terminates() {
        // Installer "succeeds" without installing anything, so the same
        // classification would reappear forever without the guard.
        let cfg = EngineConfig {
            installer: PackageInstaller::new("true", vec![], Duration::from_secs(5)),
            max_heal_attempts: 8,
        };
        let mut engine = Engine::new("", cfg).unwrap();
        let outcome = engine.run_code("import mscope_no_such_module");
        assert_eq!(outcome.status, ExecStatus::Failed);
        assert!(outcome.output.contains("Could not resolve the module mscope_no_such_module"));
    }

    #[test]
    fn test_code_reports_plain_success_and_failure() {
        let mut engine = bench_engine();
        assert!(engine.test_code("x = 1"));
        assert!(!engine.test_code("raise ValueError('nope')"));
        assert!(!engine.test_code("import mscope_no_such_module"));
    }

    #[test]
    fn stdout_restored_after_fatal_run() {
        let _stdout = test_support::stdout_lock();
        let mut engine = bench_engine();
        let _ = engine.run_code("print('before'); 1/0");
        Python::with_gil(|py| {
            let sys = py.import_bound("sys").unwrap();
            let stdout = sys.getattr("stdout").unwrap();
            let original = sys.getattr("__stdout__").unwrap().unbind();
            assert!(stdout.is(&original));
        });
    }

    #[test]
    fn bootstrap_seeds_the_environment() {
        let _stdout = test_support::stdout_lock();
        let cfg = EngineConfig {
            installer: PackageInstaller::new("false", vec![], Duration::from_secs(5)),
            max_heal_attempts: 8,
        };
        let mut engine = Engine::new("hw = {'shutter': 'open'}", cfg).unwrap();
        let outcome = engine.run_code("print(hw['shutter'])");
        assert!(outcome.is_success());
        assert_eq!(outcome.output, "open");
    }
}
