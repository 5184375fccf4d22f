use anyhow::{Context, Result};
use distpack_lib::PackError;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error};

/// Runs `program` with `args` in `cwd`, echoing its stdout line by line.
///
/// Returns [`PackError::ArchiverFailed`] when the process exits with a
/// non-zero status. A process killed by a signal reports exit code -1.
pub fn execute_and_stream(program: &str, args: &[String], cwd: &Path) -> Result<()> {
    debug!(program, ?args, cwd = %cwd.display(), "spawning command");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn command: '{program}'"))?;

    let stdout = child
        .stdout
        .take()
        .context("Child process did not have a stdout handle")?;

    // Archivers print file names in the console code page, so output is not
    // necessarily UTF-8.
    let streamed = echo_lossy(BufReader::new(stdout));

    let status = child.wait().context("Failed to wait on child process")?;
    streamed.context("Error reading output from child process")?;

    if status.success() {
        Ok(())
    } else {
        let code = status.code().unwrap_or(-1);
        error!(program, code, "command failed");
        Err(PackError::ArchiverFailed {
            program: program.to_string(),
            code,
        }
        .into())
    }
}

/// Echoes `reader` line by line, replacing invalid UTF-8.
fn echo_lossy(mut reader: impl BufRead) -> std::io::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        println!("{}", line.trim_end_matches(['\r', '\n']));
    }
}

/// Runs a free-form command line through the platform shell.
pub fn execute_shell(command: &str, cwd: &Path) -> Result<()> {
    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    execute_and_stream(shell, &[flag.to_string(), command.to_string()], cwd)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::TempTree;

    #[test]
    fn test_successful_command() {
        let tree = TempTree::new("exec-ok");
        execute_shell("echo hello > out.txt", tree.path()).unwrap();
        let out = std::fs::read_to_string(tree.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_non_utf8_output_does_not_fail_command() {
        let tree = TempTree::new("exec-bytes");
        execute_shell("printf 'Compressing \\377\\n'; printf 'done'; exit 0", tree.path())
            .unwrap();
    }

    #[test]
    fn test_echo_lossy_reads_every_line() {
        let input: &[u8] = b"a\xff\r\nb\nlast";
        echo_lossy(input).unwrap();
    }

    #[test]
    fn test_failing_command_reports_exit_code() {
        let tree = TempTree::new("exec-fail");
        let err = execute_shell("exit 3", tree.path()).unwrap_err();
        match err.downcast_ref::<PackError>() {
            Some(PackError::ArchiverFailed { program, code }) => {
                assert_eq!(program, "sh");
                assert_eq!(*code, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let tree = TempTree::new("exec-missing");
        let err =
            execute_and_stream("distpack-no-such-archiver", &[], tree.path()).unwrap_err();
        assert!(err.downcast_ref::<PackError>().is_none());
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
