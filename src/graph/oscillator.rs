use std::sync::Arc;

use crate::dsp::oscillator::PhaseOscillator;
use crate::dsp::Waveform;
use crate::graph::backend::Param;
use crate::graph::node::{GraphNode, Playback, RenderCtx};
use crate::graph::param::AudioParam;

/*
Audio Sources
=============

Sources ignore their input and produce sound only inside their playback
window (start → stop). Before `start` and after `stop` they write silence.

Periodic oscillator:
  - frequency is an automatable param, evaluated per frame
  - pitch bend lands here as a SetValueAtTime on the frequency

Noise buffer:
  - a pre-rendered buffer of white noise, played in a loop
  - pitchless, so it has no frequency param; the voice narrows it with a
    band-pass filter centered on the note instead
  - the buffer is rendered once when the graph is built and shared (Arc)
    between every noise node; each node keeps its own read position

      buffer: [ n0 n1 n2 ... nN-1 ]
                 ↑ pos           ↺ wraps to 0
*/

pub struct OscNode {
    osc: PhaseOscillator,
    waveform: Waveform,
    frequency: AudioParam,
    playback: Playback,
}

impl OscNode {
    pub fn new(waveform: Waveform, frequency: f32) -> Self {
        Self {
            osc: PhaseOscillator::new(),
            waveform,
            frequency: AudioParam::new(frequency),
            playback: Playback::default(),
        }
    }

}

impl GraphNode for OscNode {
    fn render_block(&mut self, _input: &[f32], out: &mut [f32], ctx: &RenderCtx) {
        // Per-frame frequencies land in `out` and are replaced by samples
        self.frequency.fill(out, ctx.time, ctx.dt());

        for (i, sample) in out.iter_mut().enumerate() {
            *sample = if self.playback.is_playing(ctx.frame_time(i)) {
                self.osc.next_sample(self.waveform, *sample, ctx.sample_rate)
            } else {
                0.0
            };
        }
    }

    fn param(&self, param: Param) -> Option<&AudioParam> {
        matches!(param, Param::Frequency).then_some(&self.frequency)
    }

    fn param_mut(&mut self, param: Param) -> Option<&mut AudioParam> {
        matches!(param, Param::Frequency).then_some(&mut self.frequency)
    }

    fn playback_mut(&mut self) -> Option<&mut Playback> {
        Some(&mut self.playback)
    }
}

pub struct NoiseNode {
    buffer: Arc<[f32]>,
    pos: usize,
    playback: Playback,
}

impl NoiseNode {
    pub fn new(buffer: Arc<[f32]>) -> Self {
        Self {
            buffer,
            pos: 0,
            playback: Playback::default(),
        }
    }
}

impl GraphNode for NoiseNode {
    fn render_block(&mut self, _input: &[f32], out: &mut [f32], ctx: &RenderCtx) {
        let len = self.buffer.len();
        for (i, sample) in out.iter_mut().enumerate() {
            if len == 0 || !self.playback.is_playing(ctx.frame_time(i)) {
                *sample = 0.0;
                continue;
            }
            *sample = self.buffer[self.pos];
            self.pos = (self.pos + 1) % len;
        }
    }

    fn playback_mut(&mut self) -> Option<&mut Playback> {
        Some(&mut self.playback)
    }
}
