//! Audio output: a cpal stream whose callback owns the synth

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rtrb::{Consumer, Producer};
use tracing::{error, warn};

use saavy_keys::graph::SoftwareGraph;
use saavy_keys::synth::SynthMessage;
use saavy_keys::{AppContext, Collaborators, SynthConfig, SynthError, MAX_BLOCK_SIZE};

use super::app::Activity;

pub struct AudioOutput {
    _stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Open the default output device and start rendering.
    ///
    /// The graph is built here, before the stream exists, so its noise buffer
    /// and node pool are ready before the first callback. Every queue is
    /// drained at the top of each callback, then finished voices are freed
    /// and the dead-note sweep runs before rendering.
    pub fn start<const N: usize>(
        config: &SynthConfig,
        collaborators: Collaborators,
        mut queues: [Consumer<SynthMessage>; N],
        mut meter: Producer<f32>,
        activity: Arc<Activity>,
    ) -> EyreResult<Self> {
        let mut output = None;
        let mut synth = AppContext::init(
            config,
            || {
                let (device, stream_config) = open_device(config.sample_rate)?;
                let graph = SoftwareGraph::new(stream_config.sample_rate.0 as f32);
                output = Some((device, stream_config));
                Ok(graph)
            },
            collaborators,
        )?;
        let (device, stream_config) =
            output.ok_or_else(|| eyre!("output device missing after start-up"))?;

        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels;
        let stride = channels as usize;
        let mut mono = vec![0.0f32; MAX_BLOCK_SIZE];

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    for queue in queues.iter_mut() {
                        synth.dispatcher_mut().drain_messages(queue);
                    }
                    synth.tick(Instant::now(), activity.as_ref());

                    let total_frames = data.len() / stride;
                    let mut frames_written = 0;
                    while frames_written < total_frames {
                        let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                        let block = &mut mono[..frames];
                        synth.dispatcher_mut().graph_mut().render(block);

                        // Mono to all channels
                        let out_off = frames_written * stride;
                        for (i, &s) in block.iter().enumerate() {
                            let frame = out_off + i * stride;
                            data[frame..frame + stride].fill(s);
                        }

                        // Meter drops samples when the UI falls behind
                        for &s in block.iter() {
                            if meter.push(s).is_err() {
                                break;
                            }
                        }

                        frames_written += frames;
                    }
                },
                |err| error!(%err, "audio stream error"),
                None,
            )
            .wrap_err("failed to build output stream")?;
        stream.play().wrap_err("failed to start output stream")?;

        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Default output device at the preferred rate, or its default config when
/// the preferred rate is not supported.
fn open_device(preferred_rate: u32) -> Result<(cpal::Device, StreamConfig), SynthError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SynthError::AudioUnavailable("no default output device".into()))?;

    let preferred = device
        .supported_output_configs()
        .map_err(unavailable)?
        .filter(|range| range.sample_format() == SampleFormat::F32)
        .find(|range| {
            range.min_sample_rate().0 <= preferred_rate && preferred_rate <= range.max_sample_rate().0
        })
        .map(|range| range.with_sample_rate(SampleRate(preferred_rate)));

    let supported = match preferred {
        Some(config) => config,
        None => {
            let fallback = device.default_output_config().map_err(unavailable)?;
            warn!(
                preferred_rate,
                sample_rate = fallback.sample_rate().0,
                "preferred sample rate unsupported, using device default"
            );
            fallback
        }
    };

    Ok((device, supported.into()))
}

fn unavailable(err: impl Display) -> SynthError {
    SynthError::AudioUnavailable(err.to_string())
}
