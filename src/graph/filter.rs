use crate::dsp::filter::BandPass;
use crate::graph::backend::Param;
use crate::graph::node::{GraphNode, RenderCtx};
use crate::graph::param::AudioParam;

/// Band-pass node. The center frequency is read once per block.
pub struct BandPassNode {
    filter: BandPass,
    frequency: AudioParam,
}

impl BandPassNode {
    pub fn new(frequency: f32, q: f32) -> Self {
        Self {
            filter: BandPass::new(q),
            frequency: AudioParam::new(frequency),
        }
    }
}

impl GraphNode for BandPassNode {
    fn render_block(&mut self, input: &[f32], out: &mut [f32], ctx: &RenderCtx) {
        out.copy_from_slice(input);
        let cutoff = self.frequency.value_at(ctx.time);
        self.filter.render(out, cutoff, ctx.sample_rate);
    }

    fn param(&self, param: Param) -> Option<&AudioParam> {
        matches!(param, Param::Frequency).then_some(&self.frequency)
    }

    fn param_mut(&mut self, param: Param) -> Option<&mut AudioParam> {
        matches!(param, Param::Frequency).then_some(&mut self.frequency)
    }
}
