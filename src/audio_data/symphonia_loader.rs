use crate::{
    audio_data::AudioFileData,
    error::{Result, SonoraError},
};
use std::fs::File;
use std::path::Path;
use symphonia::{
    core::{
        errors::Error, formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions,
        probe::Hint,
    },
    default::get_probe,
};

/// Reads the length and format of an audio file.
///
/// Uses the container's frame count when it has one and otherwise walks the packets,
/// so nothing is decoded either way.
pub fn probe_audio_file(path: impl AsRef<Path>) -> Result<AudioFileData> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SonoraError::AudioFile(format!("Failed to probe audio format: {:?}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| SonoraError::AudioFile("No default audio track found".to_string()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SonoraError::AudioFile("Sample rate not found".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(0);
    let n_frames = track.codec_params.n_frames;

    let total_frames = match n_frames {
        Some(frames) => frames,
        None => {
            let mut frames = 0;
            loop {
                match format.next_packet() {
                    Ok(packet) if packet.track_id() == track_id => frames += packet.dur,
                    Ok(_) => {}
                    Err(Error::IoError(_)) => break, // end-of-file
                    Err(e) => {
                        return Err(SonoraError::AudioFile(format!(
                            "Error reading packet: {:?}",
                            e
                        )));
                    }
                }
            }
            frames
        }
    };

    Ok(AudioFileData::new(sample_rate, channels, total_frames))
}
