//! ffmpeg argument template.

use sitecast_ipc::CaptureMode;

use crate::error::EncoderError;
use crate::{CaptureTarget, EncoderJob, EncoderResult};

/// ffmpeg input device used to grab the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrabDevice {
    /// Windows GDI grabber. Can capture a window by title.
    Gdigrab,

    /// X11 grabber reading from an X display.
    X11grab { display: String },
}

impl GrabDevice {
    /// Grabber for the host OS. `display` is used by X11 only.
    pub fn native(display: impl Into<String>) -> Self {
        if cfg!(windows) {
            Self::Gdigrab
        } else {
            Self::X11grab {
                display: display.into(),
            }
        }
    }

    /// ffmpeg format name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gdigrab => "gdigrab",
            Self::X11grab { .. } => "x11grab",
        }
    }

    /// Whether this grabber can capture `mode`.
    pub fn supports(&self, mode: CaptureMode) -> bool {
        match mode {
            CaptureMode::Desktop => true,
            CaptureMode::Window => matches!(self, Self::Gdigrab),
        }
    }

    fn input(&self, target: &CaptureTarget) -> EncoderResult<String> {
        match (self, target) {
            (Self::Gdigrab, CaptureTarget::Desktop) => Ok("desktop".to_string()),
            (Self::Gdigrab, CaptureTarget::Window { title }) => Ok(format!("title={title}")),
            (Self::X11grab { display }, CaptureTarget::Desktop) => Ok(display.clone()),
            (Self::X11grab { .. }, CaptureTarget::Window { .. }) => {
                Err(EncoderError::UnsupportedCapture {
                    mode: CaptureMode::Window.as_str(),
                    device: self.name(),
                })
            }
        }
    }
}

impl Default for GrabDevice {
    fn default() -> Self {
        Self::native(":0.0")
    }
}

/// Fixed encode settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Screen grabber.
    pub grab: GrabDevice,

    /// Capture frame rate.
    pub framerate: u32,

    /// Video bitrate for desktop capture in kbps.
    pub desktop_bitrate_kbps: u32,

    /// Video bitrate for window capture in kbps.
    pub window_bitrate_kbps: u32,

    /// Keyframe interval in seconds.
    pub keyframe_interval_secs: u32,

    /// AAC bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            grab: GrabDevice::default(),
            framerate: 30,
            desktop_bitrate_kbps: 2500,
            window_bitrate_kbps: 2000,
            keyframe_interval_secs: 2,
            audio_bitrate_kbps: 128,
        }
    }
}

impl EncoderSettings {
    fn video_bitrate_kbps(&self, target: &CaptureTarget) -> u32 {
        match target {
            CaptureTarget::Desktop => self.desktop_bitrate_kbps,
            CaptureTarget::Window { .. } => self.window_bitrate_kbps,
        }
    }
}

/// Build the full ffmpeg command line for `job`. The ingest URL is last.
pub fn ffmpeg_args(settings: &EncoderSettings, job: &EncoderJob) -> EncoderResult<Vec<String>> {
    let input = settings.grab.input(&job.target)?;
    let bitrate = settings.video_bitrate_kbps(&job.target);
    let gop = settings.framerate * settings.keyframe_interval_secs;

    let args = vec![
        "-hide_banner".to_string(),
        // Video source
        "-f".into(),
        settings.grab.name().into(),
        "-framerate".into(),
        settings.framerate.to_string(),
        "-i".into(),
        input,
        // Silent audio track
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        "anullsrc=channel_layout=stereo:sample_rate=44100".into(),
        // Low latency constant bitrate H.264
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "ultrafast".into(),
        "-tune".into(),
        "zerolatency".into(),
        "-b:v".into(),
        format!("{bitrate}k"),
        "-maxrate".into(),
        format!("{bitrate}k"),
        "-bufsize".into(),
        format!("{}k", bitrate * 2),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-g".into(),
        gop.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", settings.audio_bitrate_kbps),
        // FLV over RTMP
        "-f".into(),
        "flv".into(),
        job.ingest_url.clone(),
    ];

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INGEST: &str = "rtmp://a.rtmp.youtube.com/live2/abcd";

    fn job(target: CaptureTarget) -> EncoderJob {
        EncoderJob {
            target,
            ingest_url: INGEST.to_string(),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_desktop_capture_on_windows_grabber() {
        let settings = EncoderSettings {
            grab: GrabDevice::Gdigrab,
            ..Default::default()
        };
        let args = ffmpeg_args(&settings, &job(CaptureTarget::Desktop)).unwrap();

        assert_eq!(value_after(&args, "-f"), vec!["gdigrab", "lavfi", "flv"]);
        assert_eq!(value_after(&args, "-i")[0], "desktop");
        assert_eq!(value_after(&args, "-b:v"), vec!["2500k"]);
        assert_eq!(value_after(&args, "-bufsize"), vec!["5000k"]);
        assert_eq!(value_after(&args, "-g"), vec!["60"]);
        assert_eq!(args.last().unwrap(), INGEST);
    }

    #[test]
    fn test_window_capture_by_title() {
        let settings = EncoderSettings {
            grab: GrabDevice::Gdigrab,
            ..Default::default()
        };
        let target = CaptureTarget::Window {
            title: "sitecast-7 - Google Chrome".into(),
        };
        let args = ffmpeg_args(&settings, &job(target)).unwrap();

        assert_eq!(value_after(&args, "-i")[0], "title=sitecast-7 - Google Chrome");
        assert_eq!(value_after(&args, "-maxrate"), vec!["2000k"]);
        assert_eq!(args.last().unwrap(), INGEST);
    }

    #[test]
    fn test_x11_desktop_reads_display() {
        let settings = EncoderSettings {
            grab: GrabDevice::X11grab {
                display: ":99".into(),
            },
            ..Default::default()
        };
        let args = ffmpeg_args(&settings, &job(CaptureTarget::Desktop)).unwrap();
        assert_eq!(value_after(&args, "-f")[0], "x11grab");
        assert_eq!(value_after(&args, "-i")[0], ":99");
    }

    #[test]
    fn test_x11_rejects_window_capture() {
        let grab = GrabDevice::X11grab {
            display: ":0.0".into(),
        };
        assert!(!grab.supports(CaptureMode::Window));
        let settings = EncoderSettings {
            grab,
            ..Default::default()
        };
        let err = ffmpeg_args(
            &settings,
            &job(CaptureTarget::Window {
                title: "x".into(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, EncoderError::UnsupportedCapture { .. }));
    }
}
