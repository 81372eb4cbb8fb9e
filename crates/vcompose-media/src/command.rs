//! FFmpeg command builder and runner.
//!
//! A command is a typed request: ordered inputs (each with its own pre-input
//! options), an optional filter graph, output stream maps and encoding
//! arguments. Nothing is spawned until a [`MediaExecutor`](crate::executor::MediaExecutor)
//! runs it, which keeps graph construction testable without ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use vcompose_models::EncodingProfile;

use crate::error::{MediaError, MediaResult};
use crate::progress::{FfmpegProgress, ProgressParser};

/// One ffmpeg input and the options that precede its `-i`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    /// File path, or a lavfi source description when `args` selects `-f lavfi`
    pub source: PathBuf,
    /// Input arguments (before -i)
    pub args: Vec<String>,
}

impl MediaInput {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            source: path.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// A synthetic lavfi source such as `anullsrc=...`.
    pub fn lavfi(description: impl Into<String>) -> Self {
        Self {
            source: PathBuf::from(description.into()),
            args: vec!["-f".to_string(), "lavfi".to_string()],
        }
    }

    pub fn is_lavfi(&self) -> bool {
        self.args.windows(2).any(|w| w[0] == "-f" && w[1] == "lavfi")
    }
}

/// Filter applied to the command's inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterGraph {
    /// Single-input chain (`-vf`)
    Video(String),
    /// Multi-input graph with labelled outputs (`-filter_complex`)
    Complex(String),
}

impl FilterGraph {
    pub fn as_str(&self) -> &str {
        match self {
            FilterGraph::Video(s) | FilterGraph::Complex(s) => s,
        }
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in index order (`0:v` is the first)
    inputs: Vec<MediaInput>,
    /// Output file path
    output: PathBuf,
    /// Filter graph, if any
    filter: Option<FilterGraph>,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
    /// Directory for an ffmpeg debug report, when enabled
    report_dir: Option<PathBuf>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single file input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![MediaInput::file(input)],
            output: output.as_ref().to_path_buf(),
            filter: None,
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
            report_dir: None,
        }
    }

    /// Append another file input.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(MediaInput::file(path));
        self
    }

    /// Append a lavfi source input.
    pub fn lavfi_input(mut self, description: impl Into<String>) -> Self {
        self.inputs.push(MediaInput::lavfi(description));
        self
    }

    /// Add an input argument to the most recently added input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(last) = self.inputs.last_mut() {
            last.args.push(arg.into());
        }
        self
    }

    /// Loop the most recently added input `loops` additional times.
    pub fn stream_loop(self, loops: u32) -> Self {
        self.input_arg("-stream_loop").input_arg(loops.to_string())
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit the output duration.
    pub fn output_duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(FilterGraph::Video(filter.into()));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(FilterGraph::Complex(filter.into()));
        self
    }

    /// Map a stream specifier or a `[label]` graph output into the output file.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Video encoder settings from a profile.
    pub fn video_encoding(self, profile: &EncodingProfile) -> Self {
        self.output_args(profile.video_args())
    }

    /// Audio encoder settings from a profile.
    pub fn audio_encoding(self, profile: &EncodingProfile) -> Self {
        self.output_args(profile.audio_args())
    }

    /// Copy both video and audio streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.video_codec("copy").audio_codec("copy")
    }

    /// Drop audio from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Drop video from the output.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Stop at the end of the shortest input.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Write a debug-level ffmpeg report into `dir`.
    pub fn debug_report(mut self, dir: impl AsRef<Path>) -> Self {
        self.report_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn inputs(&self) -> &[MediaInput] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn filter(&self) -> Option<&FilterGraph> {
        self.filter.as_ref()
    }

    pub fn report_dir(&self) -> Option<&Path> {
        self.report_dir.as_deref()
    }

    /// True if `arg` appears among the output arguments.
    pub fn has_output_arg(&self, arg: &str) -> bool {
        self.output_args.iter().any(|a| a == arg)
    }

    /// Value following `flag` in the output arguments.
    pub fn output_value(&self, flag: &str) -> Option<&str> {
        self.output_args
            .windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1].as_str())
    }

    /// All values passed to `-map`, in order.
    pub fn maps(&self) -> Vec<&str> {
        self.output_args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect()
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Log level
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());
        args.push("-nostats".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.to_string_lossy().to_string());
        }

        match &self.filter {
            Some(FilterGraph::Video(f)) => {
                args.push("-vf".to_string());
                args.push(f.clone());
            }
            Some(FilterGraph::Complex(f)) => {
                args.push("-filter_complex".to_string());
                args.push(f.clone());
            }
            None => {}
        }

        // Output args
        args.extend(self.output_args.clone());

        // Output file
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and output capture.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command, logging progress at debug level.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let output = cmd.output().display().to_string();
        self.run_with_progress(cmd, move |p| {
            debug!(
                output = %output,
                out_time_ms = p.out_time_ms,
                speed = p.speed,
                "ffmpeg progress"
            );
        })
        .await
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// Stdout and stderr (minus `-progress` key/value lines) are captured and
    /// attached verbatim to the error on failure.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        // Check FFmpeg exists
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut command = Command::new("ffmpeg");
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = cmd.report_dir() {
            tokio::fs::create_dir_all(dir).await?;
            let report = dir.join("ffmpeg-%p-%t.log");
            command.env(
                "FFREPORT",
                format!("file={}:level=48", escape_report_path(&report)),
            );
        }

        let mut child = command.spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stderr not captured"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stdout not captured"))?;

        // Spawn progress parsing task; everything else on stderr is diagnostics
        let stderr_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut parser = ProgressParser::default();
            let mut captured = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if ProgressParser::is_progress_line(&line) {
                    if let Some(progress) = parser.feed(&line) {
                        progress_callback(progress);
                    }
                } else {
                    captured.push_str(&line);
                    captured.push('\n');
                }
            }
            captured
        });

        let stdout_handle = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf).await;
            buf
        });

        let result = self.wait_for_completion(&mut child).await;

        let captured_stderr = stderr_handle.await.unwrap_or_default();
        let captured_stdout = stdout_handle.await.unwrap_or_default();

        let status = result?;
        if status.success() {
            return Ok(());
        }

        Err(exit_status_error(
            "ffmpeg",
            status,
            captured_stdout,
            captured_stderr,
        ))
    }

    /// Wait for child process with optional timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        match self.timeout_secs {
            Some(timeout_secs) => {
                match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
                    Ok(result) => Ok(result?),
                    Err(_) => {
                        // Timeout - kill the process
                        warn!(
                            "FFmpeg timed out after {} seconds, killing process",
                            timeout_secs
                        );
                        let _ = child.kill().await;
                        Err(MediaError::Timeout(timeout_secs))
                    }
                }
            }
            None => Ok(child.wait().await?),
        }
    }
}

/// Map a failed exit status to an external tool failure.
pub(crate) fn exit_status_error(
    tool: &str,
    status: std::process::ExitStatus,
    stdout: String,
    stderr: String,
) -> MediaError {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return MediaError::signal_failure(tool, signal, stdout, stderr);
        }
    }

    MediaError::exit_failure(tool, status.code().unwrap_or(-1), stdout, stderr)
}

/// FFREPORT uses `:` as its option separator.
fn escape_report_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .video_filter("scale=1920:1080")
            .video_codec("libx264")
            .output_arg("-crf")
            .output_arg("18");

        let args = cmd.build_args();
        assert_eq!(&args[..2], &["-y", "-v"]);
        assert!(args.contains(&"-vf".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "output.mp4");
        assert_eq!(cmd.output_value("-crf"), Some("18"));
    }

    #[test]
    fn test_inputs_keep_their_own_options() {
        let cmd = FfmpegCommand::new("main.mp4", "out.mp4")
            .lavfi_input("anullsrc=channel_layout=stereo:sample_rate=44100")
            .input("music.mp3")
            .stream_loop(4)
            .shortest();

        let args = cmd.build_args();
        let pos = |needle: &str| args.iter().position(|a| a == needle).unwrap();

        // -f lavfi precedes the lavfi source, -stream_loop precedes music.mp3
        assert!(pos("lavfi") < pos("anullsrc=channel_layout=stereo:sample_rate=44100"));
        assert!(pos("main.mp4") < pos("lavfi"));
        assert!(pos("-stream_loop") < pos("music.mp3"));
        assert!(pos("anullsrc=channel_layout=stereo:sample_rate=44100") < pos("-stream_loop"));
        assert!(pos("-shortest") > pos("music.mp3"));

        assert!(cmd.inputs()[1].is_lavfi());
        assert!(!cmd.inputs()[0].is_lavfi());
    }

    #[test]
    fn test_filter_complex_and_maps() {
        let cmd = FfmpegCommand::new("a.mp4", "b.mp4")
            .input("c.mp4")
            .filter_complex("[0:v][1:v]concat=n=2:v=1:a=0[vout]")
            .map("[vout]")
            .no_audio();

        let args = cmd.build_args();
        let fc = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[fc + 1], "[0:v][1:v]concat=n=2:v=1:a=0[vout]");
        assert_eq!(cmd.maps(), vec!["[vout]"]);
        assert!(cmd.has_output_arg("-an"));
        assert!(matches!(cmd.filter(), Some(FilterGraph::Complex(_))));
    }

    #[test]
    fn test_output_duration_format() {
        let cmd = FfmpegCommand::new("music.mp3", "track.m4a").output_duration(131.0);
        assert_eq!(cmd.output_value("-t"), Some("131.000"));
    }

    #[test]
    fn test_report_path_escaping() {
        assert_eq!(
            escape_report_path(Path::new("/tmp/c:/ffmpeg-%p.log")),
            "/tmp/c\\:/ffmpeg-%p.log"
        );
    }
}
