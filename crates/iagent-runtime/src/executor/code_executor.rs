//! Python code execution for the code agent
//!
//! The mode is fixed at construction. A dry-run executor only previews code.
//! An executing one runs it through the local `python3` in isolated mode
//! (`-I`) with a cleared environment, a fresh temporary working directory, an
//! import allow-list and a timeout. Failures come back as data, never as `Err`.

use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_CODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Modules user code may import
pub const ALLOWED_IMPORTS: &[&str] = &[
    "math",
    "json",
    "re",
    "datetime",
    "collections",
    "statistics",
    "itertools",
    "random",
    "time",
    "string",
    "functools",
];

/// Runs `code_file`, then writes the repr of a trailing expression to `result_file`
const HARNESS: &str = r#"
import ast
import builtins
import sys

_ALLOWED = set(sys.argv[3].split(","))
_real_import = builtins.__import__


def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if globals is None or globals.get("__name__") == "__main__":
        if level != 0 or name.split(".")[0] not in _ALLOWED:
            raise ImportError("import of '%s' is not allowed" % name)
    return _real_import(name, globals, locals, fromlist, level)


with open(sys.argv[1], encoding="utf-8") as f:
    _source = f.read()

_tree = ast.parse(_source, filename="<agent>", mode="exec")
_last = None
if _tree.body and isinstance(_tree.body[-1], ast.Expr):
    _last = ast.Expression(_tree.body.pop().value)

_namespace = {"__name__": "__main__", "__builtins__": builtins}
builtins.__import__ = _guarded_import
exec(compile(_tree, "<agent>", "exec"), _namespace)
if _last is not None:
    _value = eval(compile(_last, "<agent>", "eval"), _namespace)
    if _value is not None:
        with open(sys.argv[2], "w", encoding="utf-8") as f:
            f.write(repr(_value))
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Preview,
    Success,
    Error,
}

/// Outcome of one code block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeExecution {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub result: String,
}

impl CodeExecution {
    fn error(stdout: String, message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            stdout,
            result: message.into(),
        }
    }

    /// Text fed back to the model
    pub fn to_observation(&self) -> String {
        match self.status {
            ExecutionStatus::Preview => self.result.clone(),
            ExecutionStatus::Success => {
                let mut out = String::new();
                if !self.stdout.trim().is_empty() {
                    out.push_str("Output:\n");
                    out.push_str(self.stdout.trim_end());
                }
                if !self.result.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str("Result: ");
                    out.push_str(&self.result);
                }
                if out.is_empty() {
                    out.push_str("Code ran successfully with no output.");
                }
                out
            }
            ExecutionStatus::Error => {
                if self.stdout.trim().is_empty() {
                    format!("Error: {}", self.result)
                } else {
                    format!("Output:\n{}\nError: {}", self.stdout.trim_end(), self.result)
                }
            }
        }
    }
}

/// Executes (or previews) model-written Python
#[derive(Debug, Clone)]
pub struct CodeExecutor {
    dry_run: bool,
    timeout: Duration,
}

impl CodeExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            timeout: DEFAULT_CODE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn execute(&self, code: &str) -> CodeExecution {
        if self.dry_run {
            debug!("Previewing code block (dry run)");
            return CodeExecution {
                status: ExecutionStatus::Preview,
                stdout: String::new(),
                result: format!(
                    "Code preview (not executed; run with --execute to run it):\n```python\n{}\n```",
                    code
                ),
            };
        }

        let interpreter = match which::which("python3") {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "python3 interpreter not found");
                return CodeExecution::error(
                    String::new(),
                    format!("python3 interpreter not found: {}", e),
                );
            }
        };

        let workdir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return CodeExecution::error(
                    String::new(),
                    format!("Failed to create working directory: {}", e),
                )
            }
        };

        self.run_in(&interpreter, workdir.path(), code).await
    }

    async fn run_in(&self, interpreter: &Path, workdir: &Path, code: &str) -> CodeExecution {
        let harness_path = workdir.join("harness.py");
        let code_path = workdir.join("agent_code.py");
        let result_path = workdir.join("result.txt");

        if let Err(e) = tokio::fs::write(&harness_path, HARNESS).await {
            return CodeExecution::error(String::new(), format!("Failed to write harness: {}", e));
        }
        if let Err(e) = tokio::fs::write(&code_path, code).await {
            return CodeExecution::error(String::new(), format!("Failed to write code: {}", e));
        }

        let mut command = Command::new(interpreter);
        command
            .arg("-I")
            .arg(&harness_path)
            .arg(&code_path)
            .arg(&result_path)
            .arg(ALLOWED_IMPORTS.join(","))
            .current_dir(workdir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CodeExecution::error(String::new(), format!("Failed to start python3: {}", e))
            }
        };

        debug!(timeout_secs = self.timeout.as_secs(), "Running code block");
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return CodeExecution::error(String::new(), format!("Failed to run python3: {}", e))
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Code execution timed out");
                return CodeExecution::error(
                    String::new(),
                    format!("Execution timed out after {}s", self.timeout.as_secs()),
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return CodeExecution::error(stdout, last_error_line(&stderr));
        }

        let result = tokio::fs::read_to_string(&result_path)
            .await
            .unwrap_or_default();
        CodeExecution {
            status: ExecutionStatus::Success,
            stdout,
            result,
        }
    }
}

/// The exception line of a Python traceback
fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("python3 exited with an error")
        .to_string()
}
