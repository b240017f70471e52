//! Remote command execution
//!
//! Every stage talks to the target host through the narrow [`RemoteExecutor`]
//! interface: structured commands in, success/output back. Commands are built
//! from program + argument lists, never from pre-rendered shell strings, so
//! the pipeline can be exercised against a scripted mock in tests.

use anyhow::{Context, Result};
use std::fmt;
use std::process::Command;

use crate::host::HostTarget;

/// A command to run on the remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Directory to run in, when set
    pub cwd: Option<String>,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Render as a shell line with every word quoted
    pub fn render(&self) -> String {
        let mut line = shell_quote(&self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        match &self.cwd {
            Some(dir) => format!("cd {} && {}", shell_quote(dir), line),
            None => line,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Captured result of a remote command; nonzero exit is data, not an error
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Kind of path an existence probe asks about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Dir,
    Any,
}

impl PathKind {
    fn test_flag(self) -> &'static str {
        match self {
            Self::File => "-f",
            Self::Dir => "-d",
            Self::Any => "-e",
        }
    }
}

/// An immediate child of a remote directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: PathKind,
}

/// Executes commands and probes on one selected host.
///
/// `run` fails only on transport problems (could not reach the host at
/// all); a nonzero remote exit comes back as `success: false` and the
/// caller decides what it means.
pub trait RemoteExecutor {
    fn run(&self, cmd: &RemoteCommand) -> Result<ExecOutput>;

    fn exists(&self, path: &str, kind: PathKind) -> Result<bool>;

    /// Immediate children of `path`, split by type
    fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>>;
}

/// Single-quote a word for sh
fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/' | b':' | b'@' | b'=' | b','))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

// ============================================================================
// SSH executor
// ============================================================================

/// Runs commands over ssh against one host
pub struct SshExecutor {
    host: HostTarget,
}

impl SshExecutor {
    pub fn new(host: HostTarget) -> Self {
        Self { host }
    }

    fn invoke(&self, remote_line: &str) -> Result<ExecOutput> {
        let mut ssh = Command::new("ssh");
        ssh.arg("-p").arg(self.host.port.to_string());
        for arg in &self.host.ssh_args {
            // ssh wants "-o Key=value" as one argument per option
            ssh.arg(arg);
        }
        ssh.arg(format!("{}@{}", self.host.user, self.host.address()));
        ssh.arg("--").arg(remote_line);

        log::debug!("[{}] {}", self.host.label, remote_line);

        let output = ssh
            .output()
            .with_context(|| format!("failed to reach {} via ssh", self.host.address()))?;

        Ok(ExecOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        })
    }
}

impl RemoteExecutor for SshExecutor {
    fn run(&self, cmd: &RemoteCommand) -> Result<ExecOutput> {
        self.invoke(&cmd.render())
    }

    fn exists(&self, path: &str, kind: PathKind) -> Result<bool> {
        let cmd = RemoteCommand::new("test").arg(kind.test_flag()).arg(path);
        Ok(self.invoke(&cmd.render())?.success)
    }

    fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        for kind in [PathKind::File, PathKind::Dir] {
            let cmd = RemoteCommand::new("find")
                .arg(path)
                .args(["-mindepth", "1", "-maxdepth", "1", "-type"])
                .arg(match kind {
                    PathKind::File => "f",
                    _ => "d",
                })
                .args(["-printf", "%f\\n"]);
            let out = self.invoke(&cmd.render())?;
            if !out.success {
                continue;
            }
            for name in out.stdout.lines().filter(|l| !l.is_empty()) {
                entries.push(RemoteEntry {
                    name: name.to_string(),
                    kind,
                });
            }
        }
        Ok(entries)
    }
}

// ============================================================================
// Test mock
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_not_quoted() {
        let cmd = RemoteCommand::new("git")
            .arg("clone")
            .arg("git@github.com:example/example.git");
        assert_eq!(cmd.render(), "git clone git@github.com:example/example.git");
    }

    #[test]
    fn special_characters_are_single_quoted() {
        let cmd = RemoteCommand::new("echo").arg("hello world").arg("a'b");
        assert_eq!(cmd.render(), r#"echo 'hello world' 'a'\''b'"#);
    }

    #[test]
    fn empty_arg_is_quoted() {
        let cmd = RemoteCommand::new("touch").arg("");
        assert_eq!(cmd.render(), "touch ''");
    }

    #[test]
    fn cwd_prepends_cd() {
        let cmd = RemoteCommand::new("npm")
            .args(["run", "build"])
            .cwd("/var/www/sites/app/releases/3");
        assert_eq!(
            cmd.render(),
            "cd /var/www/sites/app/releases/3 && npm run build"
        );
    }

    #[test]
    fn path_kind_test_flags() {
        assert_eq!(PathKind::File.test_flag(), "-f");
        assert_eq!(PathKind::Dir.test_flag(), "-d");
        assert_eq!(PathKind::Any.test_flag(), "-e");
    }
}
