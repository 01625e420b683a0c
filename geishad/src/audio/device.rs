//! Sound device output using cpal
//!
//! Each opened track is decoded in full to interleaved f32 and played by a
//! cpal stream owned by a dedicated thread (cpal streams are not `Send` on
//! every platform). That thread converts the track to the device's sample
//! rate with rubato before the stream starts. The stream callback and the
//! actor share the playhead through a mutex. Channels are mapped per
//! callback: mono spread to every output channel, surplus source channels
//! dropped.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use tracing::{debug, error, info, warn};

use super::probe::open_format;
use super::resampler::resample;
use super::{
    relative_seek_target, AudioHandle, AudioOutput, CompletionGate, CompletionReason,
    CompletionSender,
};
use crate::error::{Error, Result};
use crate::playback::queue::Track;

/// List available audio output devices
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// Resolve a device by name, falling back to the default device
fn select_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    host.default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
}

/// Output backend that plays on a sound device
#[derive(Debug, Clone)]
pub struct DeviceOutput {
    device_name: Option<String>,
}

impl DeviceOutput {
    /// Check that the device can be opened now, so a bad setup fails at startup
    pub fn new(device_name: Option<String>) -> Result<Self> {
        let device = select_device(device_name.as_deref())?;
        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(Self { device_name })
    }
}

impl AudioOutput for DeviceOutput {
    fn open(&self, track: &Track, completion: CompletionSender) -> Result<Arc<dyn AudioHandle>> {
        let pcm = decode_track(track)?;

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
        let device_name = self.device_name.clone();
        thread::Builder::new()
            .name("geisha-audio".to_string())
            .spawn(move || run_stream(device_name, pcm, completion, ready_tx))?;

        let shared = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during startup".to_string()))??;

        debug!("Opened {} on device", track);
        Ok(Arc::new(DeviceHandle { shared }))
    }
}

/// Whole track as interleaved f32
struct Pcm {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

impl Pcm {
    fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// Same audio at `sample_rate`
    fn resampled(self, sample_rate: u32) -> Result<Self> {
        if sample_rate == self.sample_rate {
            return Ok(self);
        }
        let samples = resample(&self.samples, self.channels, self.sample_rate, sample_rate)?;
        Ok(Self {
            samples,
            channels: self.channels,
            sample_rate,
        })
    }
}

fn decode_track(track: &Track) -> Result<Pcm> {
    let (mut format, track_id) = open_format(track.as_path())?;
    let params = format
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .map(|t| t.codec_params.clone())
        .ok_or_else(|| Error::Decode(format!("Track vanished in {}", track)))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Unsupported codec in {}: {}", track, e)))?;

    let mut samples = Vec::new();
    let mut channels = params.channels.map(|c| c.count()).unwrap_or(0);
    let mut sample_rate = params.sample_rate.unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(Error::Decode(format!("Failed reading {}: {}", track, e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                sample_rate = spec.rate;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Corrupt packets are skipped
            Err(SymphoniaError::DecodeError(e)) => warn!("Decode error in {}: {}", track, e),
            Err(e) => return Err(Error::Decode(format!("Failed decoding {}: {}", track, e))),
        }
    }

    if channels == 0 || sample_rate == 0 {
        return Err(Error::Decode(format!("No decodable audio in {}", track)));
    }

    Ok(Pcm {
        samples,
        channels,
        sample_rate,
    })
}

struct Transport {
    /// Next frame to render
    position: usize,
    paused: bool,
}

struct Shared {
    pcm: Pcm,
    transport: Mutex<Transport>,
    gate: CompletionGate,
    stopped: Mutex<bool>,
    stop_signal: Condvar,
}

impl Shared {
    fn new(pcm: Pcm, completion: CompletionSender) -> Self {
        Self {
            pcm,
            transport: Mutex::new(Transport {
                position: 0,
                paused: false,
            }),
            gate: CompletionGate::new(completion),
            stopped: Mutex::new(false),
            stop_signal: Condvar::new(),
        }
    }

    fn transport(&self) -> MutexGuard<'_, Transport> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake the stream thread so it drops the stream
    fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.stop_signal.notify_all();
    }

    fn wait_for_stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            stopped = self
                .stop_signal
                .wait(stopped)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

fn run_stream(
    device_name: Option<String>,
    pcm: Pcm,
    completion: CompletionSender,
    ready: std::sync::mpsc::SyncSender<Result<Arc<Shared>>>,
) {
    let (stream, shared) = match start_stream(device_name.as_deref(), pcm, completion) {
        Ok(started) => started,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(Arc::clone(&shared)));

    shared.wait_for_stop();
    if let Err(e) = stream.pause() {
        debug!("Failed to pause stream on stop: {}", e);
    }
    drop(stream);
    debug!("Audio stream closed");
}

fn start_stream(
    device_name: Option<&str>,
    pcm: Pcm,
    completion: CompletionSender,
) -> Result<(Stream, Arc<Shared>)> {
    let device = select_device(device_name)?;
    let supported = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config = supported.config();

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let shared = Arc::new(Shared::new(pcm.resampled(config.sample_rate.0)?, completion));

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, &shared)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, &shared)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, &shared)?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
    Ok((stream, shared))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, shared: &Arc<Shared>) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let out_channels = usize::from(config.channels);
    let shared = Arc::clone(shared);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let finished = render(&shared, data, out_channels);
                if finished && shared.gate.fire(CompletionReason::Natural) {
                    shared.stop();
                }
            },
            move |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

/// Fill `data` (already at the track's rate); returns true once the
/// playhead has passed the last frame
fn render<T>(shared: &Shared, data: &mut [T], out_channels: usize) -> bool
where
    T: SizedSample + FromSample<f32>,
{
    let pcm = &shared.pcm;
    let frames = pcm.frames();
    let silence = T::from_sample(0.0f32);
    let mut transport = shared.transport();

    if transport.paused {
        data.fill(silence);
        return false;
    }

    for frame in data.chunks_mut(out_channels) {
        if transport.position >= frames {
            frame.fill(silence);
            continue;
        }

        let base = transport.position * pcm.channels;
        for (channel, out) in frame.iter_mut().enumerate() {
            let source = channel.min(pcm.channels - 1);
            *out = T::from_sample(pcm.samples[base + source]);
        }
        transport.position += 1;
    }

    transport.position >= frames
}

/// Handle returned by [`DeviceOutput`]
struct DeviceHandle {
    shared: Arc<Shared>,
}

impl DeviceHandle {
    fn total(&self) -> Duration {
        self.shared.pcm.duration()
    }

    fn elapsed(&self) -> Duration {
        let position = self.shared.transport().position;
        Duration::from_secs_f64(position as f64 / f64::from(self.shared.pcm.sample_rate))
            .min(self.total())
    }

    fn set_position(&self, position: Duration) {
        let pcm = &self.shared.pcm;
        let frame = (position.as_secs_f64() * f64::from(pcm.sample_rate)) as usize;
        self.shared.transport().position = frame.min(pcm.frames());
    }
}

impl AudioHandle for DeviceHandle {
    fn play(&self) {
        self.shared.transport().paused = false;
    }

    fn pause(&self) {
        self.shared.transport().paused = true;
    }

    fn toggle(&self) {
        let mut transport = self.shared.transport();
        transport.paused = !transport.paused;
    }

    fn seek_relative(&self, forward: bool) {
        let target = relative_seek_target(self.elapsed(), self.total(), forward);
        self.set_position(target);
    }

    fn seek_absolute(&self, position: Duration) {
        self.set_position(position);
    }

    fn progress(&self) -> (Duration, Duration) {
        (self.elapsed(), self.total())
    }

    fn is_paused(&self) -> bool {
        self.shared.transport().paused
    }

    fn teardown(&self, reason: CompletionReason) {
        if self.shared.gate.fire(reason) {
            debug!("Device handle torn down ({:?})", reason);
        }
        self.shared.stop();
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.shared.stop();
    }
}
