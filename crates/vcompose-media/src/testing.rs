//! Recording [`MediaExecutor`] for tests.
//!
//! Commands are recorded instead of spawned. Each run writes a placeholder
//! output file and derives the output's [`StreamProbe`] from the command
//! itself (filters, maps, `-t`, `-shortest`, `-stream_loop`), so stage
//! sequencing and geometry/duration bookkeeping can be asserted without ffmpeg.
//! Probes are keyed by file name.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::command::{FfmpegCommand, FilterGraph, MediaInput};
use crate::error::{MediaError, MediaResult};
use crate::executor::MediaExecutor;
use crate::filters::{AUDIO_OUT, VIDEO_OUT};
use crate::probe::{StreamDescriptor, StreamKind, StreamProbe};

#[derive(Debug, Default)]
pub struct RecordingExecutor {
    commands: Mutex<Vec<FfmpegCommand>>,
    probes: Mutex<HashMap<String, StreamProbe>>,
    failures: Mutex<HashMap<String, String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the probe result for a file name.
    pub fn with_probe(self, file_name: impl Into<String>, probe: StreamProbe) -> Self {
        self.set_probe(file_name, probe);
        self
    }

    pub fn set_probe(&self, file_name: impl Into<String>, probe: StreamProbe) {
        lock(&self.probes).insert(file_name.into(), probe);
    }

    /// Fail the command whose output has this file name, with the given stderr.
    pub fn fail_output(self, file_name: impl Into<String>, stderr: impl Into<String>) -> Self {
        lock(&self.failures).insert(file_name.into(), stderr.into());
        self
    }

    pub fn commands(&self) -> Vec<FfmpegCommand> {
        lock(&self.commands).clone()
    }

    pub fn run_count(&self) -> usize {
        lock(&self.commands).len()
    }

    /// The recorded command that produced `file_name`.
    pub fn command_for(&self, file_name: &str) -> Option<FfmpegCommand> {
        lock(&self.commands)
            .iter()
            .find(|c| file_name_of(c.output()) == file_name)
            .cloned()
    }

    pub fn output_names(&self) -> Vec<String> {
        lock(&self.commands)
            .iter()
            .map(|c| file_name_of(c.output()))
            .collect()
    }

    fn input_probe(&self, input: &MediaInput) -> StreamProbe {
        if input.is_lavfi() {
            // Synthetic sources are endless
            return StreamProbe::audio_only();
        }

        let mut probe = lock(&self.probes)
            .get(&file_name_of(&input.source))
            .cloned()
            .unwrap_or_default();

        if let Some(loops) = arg_value(&input.args, "-stream_loop").and_then(|v| v.parse::<f64>().ok()) {
            probe.duration = probe.duration.map(|d| d * (loops + 1.0));
        }
        probe
    }

    fn simulate(&self, cmd: &FfmpegCommand) -> StreamProbe {
        let inputs: Vec<StreamProbe> = cmd.inputs().iter().map(|i| self.input_probe(i)).collect();
        let durations: Vec<f64> = inputs
            .iter()
            .map(|p| p.duration.unwrap_or(f64::INFINITY))
            .collect();
        let graph = cmd.filter().map(FilterGraph::as_str).unwrap_or_default();
        let maps = cmd.maps();

        let geometry = match cmd.filter() {
            Some(FilterGraph::Video(f)) => pad_geometry(f),
            Some(FilterGraph::Complex(f)) if f.contains(VIDEO_OUT) => {
                inputs.get(1).and_then(first_geometry)
            }
            _ => None,
        }
        .or_else(|| {
            // An explicit `N:v:0` map selects that input's video
            maps.iter()
                .find_map(|m| m.strip_suffix(":v:0"))
                .and_then(|i| i.parse::<usize>().ok())
                .and_then(|i| inputs.get(i))
                .or_else(|| inputs.first())
                .and_then(first_geometry)
        });

        let has_video = !cmd.has_output_arg("-vn") && geometry.is_some();
        let has_audio = !cmd.has_output_arg("-an")
            && (graph.contains(AUDIO_OUT) || inputs.iter().any(StreamProbe::has_audio));

        let duration = if let Some(t) = cmd.output_value("-t").and_then(|t| t.parse::<f64>().ok()) {
            t.min(durations[0])
        } else if graph.contains("concat=n=2:v=1") {
            // overlay(shortest of main, background) followed by outro
            durations[0].min(durations[1]) + durations[2]
        } else if graph.contains("concat=n=2:v=0:a=1") {
            durations[0] + last_atrim(graph).unwrap_or(0.0).min(durations[1])
        } else if graph.contains("duration=first") {
            durations[0]
        } else if cmd.has_output_arg("-shortest") {
            durations.iter().cloned().fold(f64::INFINITY, f64::min)
        } else {
            durations
                .iter()
                .cloned()
                .filter(|d| d.is_finite())
                .fold(0.0, f64::max)
        };

        let mut streams = Vec::new();
        if has_video {
            let (w, h) = geometry.unwrap_or((0, 0));
            streams.push(StreamDescriptor {
                kind: StreamKind::Video,
                codec: Some("h264".to_string()),
                width: Some(w),
                height: Some(h),
            });
        }
        if has_audio {
            streams.push(StreamDescriptor {
                kind: StreamKind::Audio,
                codec: Some("aac".to_string()),
                width: None,
                height: None,
            });
        }

        StreamProbe {
            streams,
            duration: duration.is_finite().then_some(duration),
        }
    }
}

#[async_trait]
impl MediaExecutor for RecordingExecutor {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        lock(&self.commands).push(cmd.clone());

        let name = file_name_of(cmd.output());
        if let Some(stderr) = lock(&self.failures).get(&name).cloned() {
            return Err(MediaError::exit_failure("ffmpeg", 1, "", stderr));
        }

        let probe = self.simulate(cmd);
        tokio::fs::write(cmd.output(), b"recorded").await?;
        self.set_probe(name, probe);
        Ok(())
    }

    async fn probe(&self, path: &Path) -> MediaResult<StreamProbe> {
        lock(&self.probes)
            .get(&file_name_of(path))
            .cloned()
            .ok_or_else(|| MediaError::FileNotFound(path.to_path_buf()))
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn first_geometry(probe: &StreamProbe) -> Option<(u32, u32)> {
    probe.resolution(Path::new("")).ok()
}

/// `pad=W:H` target of a single-input chain.
fn pad_geometry(filter: &str) -> Option<(u32, u32)> {
    let rest = &filter[filter.find("pad=")? + 4..];
    let mut parts = rest.split(':');
    let w = parts.next()?.parse().ok()?;
    let h = parts.next()?.split(',').next()?.parse().ok()?;
    Some((w, h))
}

/// Length of the last `atrim=0:N` window in a graph.
fn last_atrim(graph: &str) -> Option<f64> {
    let rest = &graph[graph.rfind("atrim=0:")? + 8..];
    rest.split(',').next()?.parse().ok()
}
