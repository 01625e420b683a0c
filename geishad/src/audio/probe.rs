//! Track probing using symphonia
//!
//! Opens a track just far enough to know it is playable and how long it is.
//! Duration comes from the container's frame count when present, otherwise
//! from summing packet durations.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::debug;

use crate::error::{Error, Result};

/// What the probe learned about a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Open `path` with symphonia and return its format reader and default track id
pub(crate) fn open_format(path: &Path) -> Result<(Box<dyn FormatReader>, u32)> {
    let file = File::open(path)
        .map_err(|e| Error::Decode(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("Unsupported format for {}: {}", path.display(), e)))?;

    let format = probed.format;
    let track_id = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| t.id)
        .ok_or_else(|| Error::Decode(format!("No audio track in {}", path.display())))?;

    Ok((format, track_id))
}

/// Probe a track for playability and duration
pub fn probe_track(path: &Path) -> Result<TrackInfo> {
    let (mut format, track_id) = open_format(path)?;

    let params = format
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .map(|t| t.codec_params.clone())
        .ok_or_else(|| Error::Decode(format!("Track vanished in {}", path.display())))?;

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| Error::Decode(format!("Unknown sample rate in {}", path.display())))?;
    let channels = params.channels.map(|c| c.count()).unwrap_or(2);
    let time_base = params.time_base.unwrap_or_else(|| TimeBase::new(1, sample_rate));

    let duration = match params.n_frames {
        Some(frames) => Duration::from_secs_f64(frames as f64 / f64::from(sample_rate)),
        None => {
            debug!("No frame count for {}, summing packets", path.display());
            let mut ticks: u64 = 0;
            loop {
                match format.next_packet() {
                    Ok(packet) if packet.track_id() == track_id => ticks += packet.dur,
                    Ok(_) => {}
                    Err(SymphoniaError::IoError(e))
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        break
                    }
                    Err(e) => {
                        return Err(Error::Decode(format!(
                            "Failed reading {}: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
            let time = time_base.calc_time(ticks);
            Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
        }
    };

    Ok(TrackInfo {
        duration,
        sample_rate,
        channels,
    })
}
