use std::sync::Arc;

use crate::dsp::distortion::shape_buffer;
use crate::graph::node::{GraphNode, RenderCtx};

/// Waveshaper node applying a fixed transfer curve.
///
/// The curve belongs to the tone generator; every shaper built from it
/// holds the same table.
pub struct ShaperNode {
    curve: Arc<[f32]>,
}

impl ShaperNode {
    pub fn new(curve: Arc<[f32]>) -> Self {
        Self { curve }
    }
}

impl GraphNode for ShaperNode {
    fn render_block(&mut self, input: &[f32], out: &mut [f32], _ctx: &RenderCtx) {
        out.copy_from_slice(input);
        shape_buffer(out, &self.curve);
    }
}
