//! FFmpeg/ffprobe command builder.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Output, Stdio};

use super::error::{MediaError, MediaResult};

/// Lines of stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// An external media tool invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl FfmpegCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// `-i <path>`
    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path)
    }

    /// Overwrite the output without asking.
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments as lossy strings, for logging and tests.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Run to completion, failing on a non-zero exit.
    pub async fn run(&self) -> MediaResult<Output> {
        let tool = self.tool_name();
        tracing::debug!("Running {}: {}", tool, self.arg_strings().join(" "));

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MediaError::CommandFailed {
                tool,
                exit_code: output.status.code().unwrap_or(-1),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(output)
    }
}

/// Last few lines of a tool's stderr.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_args_in_order() {
        let cmd = FfmpegCommand::new("/usr/bin/ffmpeg")
            .overwrite()
            .input(Path::new("in.mp4"))
            .args(["-frames:v", "1"])
            .arg("out.jpg");
        assert_eq!(cmd.tool_name(), "ffmpeg");
        assert_eq!(
            cmd.arg_strings(),
            vec!["-y", "-i", "in.mp4", "-frames:v", "1", "out.jpg"]
        );
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let long: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let err = FfmpegCommand::new("/nonexistent/ffmpeg-binary")
            .arg("-version")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Spawn { .. }));
    }
}
