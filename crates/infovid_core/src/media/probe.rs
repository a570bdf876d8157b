//! Output probing with ffprobe.

use std::path::Path;

use serde::Deserialize;

use super::error::{MediaError, MediaResult};
use super::ffmpeg::FfmpegCommand;
use crate::models::{MediaProbe, StreamInfo};

#[derive(Debug, Deserialize)]
struct ProbeJson {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// ffprobe reports numbers in the format section as strings.
#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    bit_rate: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    format_name: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(ffprobe: &str, path: &Path) -> MediaResult<MediaProbe> {
    if !path.exists() {
        return Err(MediaError::MissingInput(format!(
            "nothing to probe at {}",
            path.display()
        )));
    }

    let output = FfmpegCommand::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .run()
        .await?;

    parse_probe_json(&output.stdout)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_json(bytes: &[u8]) -> MediaResult<MediaProbe> {
    let json: ProbeJson =
        serde_json::from_slice(bytes).map_err(|e| MediaError::Probe(e.to_string()))?;

    let duration_secs = json
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(MediaProbe {
        duration_secs,
        bit_rate: json.format.bit_rate.and_then(|b| b.parse().ok()),
        size_bytes: json.format.size.and_then(|s| s.parse().ok()),
        format_name: json.format.format_name.unwrap_or_default(),
        streams: json
            .streams
            .into_iter()
            .map(|s| StreamInfo {
                index: s.index,
                codec_type: s.codec_type.unwrap_or_else(|| "unknown".to_string()),
                codec_name: s.codec_name.unwrap_or_default(),
                width: s.width,
                height: s.height,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080},
            {"index": 1, "codec_name": "aac", "codec_type": "audio", "channels": 2},
            {"index": 2, "codec_name": "mov_text", "codec_type": "subtitle"}
        ],
        "format": {
            "filename": "out.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "130.033333",
            "size": "4812345",
            "bit_rate": "296061"
        }
    }"#;

    #[test]
    fn parses_format_and_streams() {
        let probe = parse_probe_json(SAMPLE.as_bytes()).unwrap();
        assert!((probe.duration_secs - 130.033333).abs() < 1e-6);
        assert_eq!(probe.size_bytes, Some(4_812_345));
        assert_eq!(probe.bit_rate, Some(296_061));
        assert_eq!(probe.streams.len(), 3);

        let video = probe.video_stream().unwrap();
        assert_eq!(video.codec_name, "h264");
        assert_eq!((video.width, video.height), (Some(1920), Some(1080)));
    }

    #[test]
    fn garbage_is_a_probe_error() {
        let err = parse_probe_json(b"not json").unwrap_err();
        assert!(matches!(err, MediaError::Probe(_)));
    }

    #[tokio::test]
    async fn missing_file_is_rejected_before_running() {
        let err = probe_media("ffprobe", Path::new("/no/such/file.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingInput(_)));
    }
}
