use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Part of the frame that is scanned for burned-in text
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SubtitleRegion {
    /// Lower band where subtitles usually sit: rows 80%-97%, columns 10%-90%
    #[default]
    Bottom,
    /// Upper band, for captions placed at the top of the frame: rows 3%-20%
    Top,
    /// Whole frame
    Full,
}

/// Fractional crop rectangle: (x, y, width, height), each relative to the frame size
type Bounds = (f64, f64, f64, f64);

impl SubtitleRegion {
    fn bounds(&self) -> Bounds {
        match self {
            SubtitleRegion::Bottom => (0.10, 0.80, 0.80, 0.17),
            SubtitleRegion::Top => (0.10, 0.03, 0.80, 0.17),
            SubtitleRegion::Full => (0.0, 0.0, 1.0, 1.0),
        }
    }

    /// Get the FFmpeg video filter that crops this region and converts it to grayscale
    pub fn get_ffmpeg_filter(&self) -> String {
        match self {
            SubtitleRegion::Full => "format=gray".to_string(),
            _ => {
                let (x, y, w, h) = self.bounds();
                format!(
                    "crop=iw*{w:.2}:ih*{h:.2}:iw*{x:.2}:ih*{y:.2},format=gray",
                    w = w,
                    h = h,
                    x = x,
                    y = y
                )
            }
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            SubtitleRegion::Bottom => "Bottom band (classic subtitle position)",
            SubtitleRegion::Top => "Top band",
            SubtitleRegion::Full => "Whole frame",
        }
    }
}
