use crate::error::ExecutorError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// A fully specified command: what to run, where, with which environment
/// overlay, and for how long.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub pid: u32,
    pub output: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `command` to completion with no timeout and no environment
    /// overlay, returning its stdout. Used for short-lived tool invocations
    /// such as the ELF patcher.
    pub async fn run(&self, command: &Path, args: &[String]) -> Result<String, ExecutorError> {
        let output = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecutorError::Spawn {
                command: command.display().to_string(),
                source: e,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ExecutorError::NonZeroExit {
                command: command.display().to_string(),
                code: output.status.code().unwrap_or(-1),
                output: combined,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs a command with a working directory, an environment overlay and an
    /// optional wall-clock deadline, capturing combined stdout+stderr.
    ///
    /// The overlay is layered on top of the inherited environment, never
    /// replacing it. A `None` timeout means the process may run unbounded.
    /// When the deadline elapses the child is killed and reaped, not merely
    /// abandoned.
    pub async fn run_with_context(&self, spec: CommandSpec) -> Result<Execution, ExecutorError> {
        let (program, args) = match resolve_command(&spec.command) {
            Some(path) => (path, spec.args.clone()),
            None => {
                // Not on PATH; shell builtins and shell syntax still work
                // when routed through bash.
                let mut line = spec.command.clone();
                for arg in &spec.args {
                    line.push(' ');
                    line.push_str(arg);
                }
                (PathBuf::from("bash"), vec!["-c".to_string(), line])
            }
        };

        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| ExecutorError::Spawn {
            command: spec.command.clone(),
            source: e,
        })?;

        let pid = child.id().unwrap_or_default();
        tracing::debug!(command = %spec.command, pid, "spawned process");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(read_to_string(stdout));
        let stderr_task = tokio::spawn(read_to_string(stderr));

        let status = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited?,
                Err(_) => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    tracing::warn!(command = %spec.command, pid, "killed process on timeout");
                    return Err(ExecutorError::Timeout { pid, limit });
                }
            },
            None => child.wait().await?,
        };

        let mut output = stdout_task.await.unwrap_or_default();
        output.push_str(&stderr_task.await.unwrap_or_default());

        if !status.success() {
            return Err(ExecutorError::NonZeroExit {
                command: spec.command,
                code: status.code().unwrap_or(-1),
                output,
            });
        }

        Ok(Execution { pid, output })
    }
}

async fn read_to_string<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn resolve_command(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if command.contains('/') {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|full| full.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn spec(command: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let executor = ProcessExecutor::new();
        let output = executor
            .run(Path::new("echo"), &["hello".to_string()])
            .await
            .unwrap();
        assert_eq!(output, "hello\n");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let executor = ProcessExecutor::new();
        let result = executor
            .run(Path::new("sh"), &["-c".to_string(), "echo oops; exit 3".to_string()])
            .await;
        match result {
            Err(ExecutorError::NonZeroExit { code, output, .. }) => {
                assert_eq!(code, 3);
                assert!(output.contains("oops"));
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_env_is_layered_not_replaced() {
        let executor = ProcessExecutor::new();
        let mut request = spec("sh", &["-c", "echo $BURROW_TEST_VALUE:$PATH"]);
        request
            .env
            .insert("BURROW_TEST_VALUE".to_string(), "layered".to_string());

        let execution = executor.run_with_context(request).await.unwrap();
        // The overlay value is visible and the inherited PATH survives.
        assert!(execution.output.starts_with("layered:"));
        assert!(execution.output.trim_end().len() > "layered:".len());
    }

    #[tokio::test]
    async fn test_working_directory() {
        let tmp = TempDir::new().unwrap();
        let expected = tmp.path().canonicalize().unwrap();

        let executor = ProcessExecutor::new();
        let mut request = spec("pwd", &[]);
        request.dir = Some(tmp.path().to_path_buf());

        let execution = executor.run_with_context(request).await.unwrap();
        assert_eq!(execution.output.trim_end(), expected.display().to_string());
    }

    #[tokio::test]
    async fn test_shell_fallback_for_builtin_syntax() {
        let executor = ProcessExecutor::new();
        // "true && echo" is not an executable anywhere on PATH.
        let request = spec("true && echo fallback-ok", &[]);
        let execution = executor.run_with_context(request).await.unwrap();
        assert_eq!(execution.output, "fallback-ok\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_the_child() {
        let executor = ProcessExecutor::new();
        let mut request = spec("sleep", &["5"]);
        request.timeout = Some(Duration::from_millis(50));

        let started = Instant::now();
        let result = executor.run_with_context(request).await;
        let elapsed = started.elapsed();

        let pid = match result {
            Err(ExecutorError::Timeout { pid, limit }) => {
                assert_eq!(limit, Duration::from_millis(50));
                pid
            }
            other => panic!("expected Timeout, got {:?}", other),
        };

        assert!(elapsed < Duration::from_secs(2), "timeout took {:?}", elapsed);
        // The child was reaped, not leaked.
        assert!(!Path::new(&format!("/proc/{}", pid)).exists());
    }

    #[tokio::test]
    async fn test_no_timeout_means_unbounded() {
        let executor = ProcessExecutor::new();
        let request = spec("echo", &["unbounded"]);
        let execution = executor.run_with_context(request).await.unwrap();
        assert_eq!(execution.output, "unbounded\n");
        assert!(execution.pid > 0);
    }
}
