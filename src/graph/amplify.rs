use crate::graph::backend::Param;
use crate::graph::node::{GraphNode, RenderCtx};
use crate::graph::param::AudioParam;

/// Multiply the input by an automatable gain, evaluated per frame.
///
/// Envelope stages are gain nodes with automation scheduled on them; a gain
/// node with no events is a plain static multiplier.
pub struct GainNode {
    gain: AudioParam,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: AudioParam::new(gain),
        }
    }
}

impl GraphNode for GainNode {
    fn render_block(&mut self, input: &[f32], out: &mut [f32], ctx: &RenderCtx) {
        // Gains go straight into `out`, then scale in place (RT-safe, no allocation)
        self.gain.fill(out, ctx.time, ctx.dt());
        for (o, &x) in out.iter_mut().zip(input) {
            *o *= x;
        }
    }

    fn param(&self, param: Param) -> Option<&AudioParam> {
        matches!(param, Param::Gain).then_some(&self.gain)
    }

    fn param_mut(&mut self, param: Param) -> Option<&mut AudioParam> {
        matches!(param, Param::Gain).then_some(&mut self.gain)
    }
}
