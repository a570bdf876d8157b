//! Still-image video synthesis.
//!
//! Stills are letterboxed to the target resolution in a scratch directory,
//! listed in an ffconcat file with per-still durations, then encoded in one
//! FFmpeg pass together with optional music and the subtitle track.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{Rgb, RgbImage};

use super::error::{MediaError, MediaResult};
use super::ffmpeg::FfmpegCommand;
use super::probe::probe_media;
use super::scratch::ScratchDir;
use crate::config::VideoSettings;
use crate::models::MediaProbe;

/// Everything one synthesis run needs.
#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub workflow_id: String,
    /// One still per section, in section order.
    pub stills: Vec<PathBuf>,
    /// Seconds per section, index-aligned with `stills`.
    pub section_durations: Vec<f64>,
    pub intro_secs: f64,
    pub conclusion_secs: f64,
    pub subtitles: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Parent of the per-run scratch directory.
    pub scratch_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub video_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub duration_secs: f64,
    pub probe: MediaProbe,
}

/// Encodes stills into an MP4.
#[derive(Debug, Clone)]
pub struct VideoSynthesizer {
    settings: VideoSettings,
}

impl VideoSynthesizer {
    pub fn new(settings: VideoSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    /// Run the whole synthesis. `progress` receives 0-100.
    pub async fn synthesize(
        &self,
        input: &SynthesisInput,
        progress: impl Fn(u8),
    ) -> MediaResult<SynthesisOutput> {
        if input.stills.is_empty() {
            return Err(MediaError::MissingInput("no infographic stills".into()));
        }
        if input.stills.len() != input.section_durations.len() {
            return Err(MediaError::MissingInput(format!(
                "{} stills for {} sections",
                input.stills.len(),
                input.section_durations.len()
            )));
        }

        std::fs::create_dir_all(&input.output_dir)
            .map_err(|e| MediaError::io(&input.output_dir, e))?;
        let scratch = ScratchDir::create(input.scratch_root.join(&input.workflow_id))?;

        let frames = self.normalise_stills(&input.stills, scratch.path()).await?;
        progress(25);

        let durations = still_durations(
            &input.section_durations,
            input.intro_secs,
            input.conclusion_secs,
        );
        let total: f64 = durations.iter().sum();
        let entries: Vec<(PathBuf, f64)> = frames.into_iter().zip(durations).collect();

        let list_path = scratch.join("stills.ffconcat");
        tokio::fs::write(&list_path, concat_list(&entries))
            .await
            .map_err(|e| MediaError::io(&list_path, e))?;

        let video_path = input.output_dir.join(format!("{}.mp4", input.workflow_id));
        self.encode_command(
            &list_path,
            input.subtitles.as_deref(),
            input.music.as_deref(),
            total,
            &video_path,
        )
        .run()
        .await?;
        progress(80);

        let thumbnail_path = input
            .output_dir
            .join(format!("{}_thumb.jpg", input.workflow_id));
        let offset = total * self.settings.thumbnail_offset_pct / 100.0;
        self.thumbnail_command(&video_path, offset, &thumbnail_path)
            .run()
            .await?;
        progress(90);

        let probe = probe_media(&self.settings.ffprobe_path, &video_path).await?;
        progress(100);

        tracing::info!(
            "Synthesized {} ({:.1}s, {} stills)",
            video_path.display(),
            probe.duration_secs,
            entries.len()
        );

        Ok(SynthesisOutput {
            video_path,
            thumbnail_path,
            duration_secs: if probe.duration_secs > 0.0 {
                probe.duration_secs
            } else {
                total
            },
            probe,
        })
    }

    /// Letterbox every still to the output resolution.
    async fn normalise_stills(&self, stills: &[PathBuf], dir: &Path) -> MediaResult<Vec<PathBuf>> {
        let (width, height) = (self.settings.width, self.settings.height);
        let jobs: Vec<(PathBuf, PathBuf)> = stills
            .iter()
            .enumerate()
            .map(|(i, src)| (src.clone(), dir.join(format!("frame_{:03}.png", i))))
            .collect();

        tokio::task::spawn_blocking(move || {
            jobs.into_iter()
                .map(|(src, dst)| {
                    letterbox(&src, &dst, width, height)?;
                    Ok(dst)
                })
                .collect::<MediaResult<Vec<_>>>()
        })
        .await
        .map_err(|e| MediaError::Task(e.to_string()))?
    }

    /// Single-pass encode of the concat list.
    pub fn encode_command(
        &self,
        list: &Path,
        subtitles: Option<&Path>,
        music: Option<&Path>,
        total_secs: f64,
        output: &Path,
    ) -> FfmpegCommand {
        let s = &self.settings;
        let mut cmd = FfmpegCommand::new(&s.ffmpeg_path)
            .overwrite()
            .args(["-f", "concat", "-safe", "0"])
            .input(list);

        let mut next_input = 1;
        let mut music_input = None;
        if let Some(path) = music {
            cmd = cmd.args(["-stream_loop", "-1"]).input(path);
            music_input = Some(next_input);
            next_input += 1;
        }

        let mut subtitle_input = None;
        if let (false, Some(path)) = (s.burn_subtitles, subtitles) {
            cmd = cmd.input(path);
            subtitle_input = Some(next_input);
        }

        let mut filter = format!("scale={}:{},fps={},format=yuv420p", s.width, s.height, s.fps);
        if let (true, Some(path)) = (s.burn_subtitles, subtitles) {
            filter.push_str(&format!(",subtitles='{}'", escape_filter_path(path)));
        }

        cmd = cmd.args(["-map", "0:v"]);
        if let Some(i) = music_input {
            cmd = cmd.arg("-map").arg(format!("{}:a", i));
        }
        if let Some(i) = subtitle_input {
            cmd = cmd.arg("-map").arg(format!("{}:s", i));
        }

        cmd = cmd
            .arg("-vf")
            .arg(&filter)
            .arg("-c:v")
            .arg(&s.codec)
            .arg("-preset")
            .arg(&s.preset)
            .arg("-crf")
            .arg(s.crf.to_string())
            .args(["-pix_fmt", "yuv420p"])
            .arg("-r")
            .arg(s.fps.to_string());

        if music_input.is_some() {
            cmd = cmd.args(["-c:a", "aac", "-b:a", "192k"]);
        }
        if subtitle_input.is_some() {
            cmd = cmd.args(["-c:s", "mov_text"]);
        }

        cmd.arg("-t")
            .arg(format!("{:.3}", total_secs))
            .args(["-movflags", "+faststart"])
            .arg(output)
    }

    pub fn thumbnail_command(
        &self,
        video: &Path,
        offset_secs: f64,
        output: &Path,
    ) -> FfmpegCommand {
        FfmpegCommand::new(&self.settings.ffmpeg_path)
            .overwrite()
            .arg("-ss")
            .arg(format!("{:.3}", offset_secs))
            .input(video)
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(output)
    }
}

/// Per-still durations: intro time goes on the first still, conclusion time
/// on the last.
pub fn still_durations(sections: &[f64], intro_secs: f64, conclusion_secs: f64) -> Vec<f64> {
    let mut durations: Vec<f64> = sections.iter().map(|d| d.max(0.0)).collect();
    if let Some(first) = durations.first_mut() {
        *first += intro_secs.max(0.0);
    }
    if let Some(last) = durations.last_mut() {
        *last += conclusion_secs.max(0.0);
    }
    durations
}

/// ffconcat file body. The final still is listed twice so the demuxer holds
/// it for its full duration.
pub fn concat_list(entries: &[(PathBuf, f64)]) -> String {
    let mut out = String::from("ffconcat version 1.0\n");
    for (path, secs) in entries {
        out.push_str(&format!("file '{}'\n", escape_concat_path(path)));
        out.push_str(&format!("duration {:.3}\n", secs));
    }
    if let Some((last, _)) = entries.last() {
        out.push_str(&format!("file '{}'\n", escape_concat_path(last)));
    }
    out
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', r"\\")
        .replace(':', r"\:")
        .replace('\'', r"\'")
}

/// Fit `src` inside `width`x`height` on a black canvas and save as PNG.
fn letterbox(src: &Path, dst: &Path, width: u32, height: u32) -> MediaResult<()> {
    let img = image::open(src).map_err(|source| MediaError::Image {
        path: src.to_path_buf(),
        source,
    })?;

    let fitted = if img.width() == width && img.height() == height {
        img.to_rgb8()
    } else {
        img.resize(width, height, FilterType::Lanczos3).to_rgb8()
    };

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    let x = (width - fitted.width().min(width)) / 2;
    let y = (height - fitted.height().min(height)) / 2;
    image::imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);

    canvas
        .save_with_format(dst, image::ImageFormat::Png)
        .map_err(|source| MediaError::Image {
            path: dst.to_path_buf(),
            source,
        })
}
