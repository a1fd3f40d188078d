use crate::graph::backend::Param;
use crate::graph::param::AudioParam;

/// Context passed to render nodes for one block.
///
/// - sample_rate: audio sample rate (e.g., 48000.0)
/// - time: audio-clock time of the block's first frame, in seconds
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub time: f64,
}

impl RenderCtx {
    pub fn new(sample_rate: f32, time: f64) -> Self {
        Self { sample_rate, time }
    }

    /// Seconds per frame.
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    /// Audio-clock time of frame `i` within the block.
    #[inline]
    pub fn frame_time(&self, i: usize) -> f64 {
        self.time + i as f64 * self.dt()
    }
}

/// Start/stop window of a source node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Playback {
    start: Option<f64>,
    stop: Option<f64>,
}

impl Playback {
    pub fn start(&mut self, when: f64) {
        self.start = Some(when);
    }

    pub fn stop(&mut self, when: f64) {
        self.stop = Some(when);
    }

    /// Whether the source produces sound at `t`.
    #[inline]
    pub fn is_playing(&self, t: f64) -> bool {
        match self.start {
            Some(start) => t >= start && self.stop.map_or(true, |stop| t < stop),
            None => false,
        }
    }
}

/// Core trait for render nodes inside the software graph.
///
/// `input` holds the sum of every connected upstream node for this block
/// (silence for sources). Nodes write exactly `out.len()` frames.
pub trait GraphNode: Send {
    fn render_block(&mut self, input: &[f32], out: &mut [f32], ctx: &RenderCtx);

    /// Automatable parameter, if the node has one of this kind.
    fn param(&self, _param: Param) -> Option<&AudioParam> {
        None
    }

    fn param_mut(&mut self, _param: Param) -> Option<&mut AudioParam> {
        None
    }

    /// Start/stop window for source nodes. `None` for processors.
    fn playback_mut(&mut self) -> Option<&mut Playback> {
        None
    }

    /// Release automation history older than `t`.
    fn prune(&mut self, t: f64) {
        for param in [Param::Frequency, Param::Gain] {
            if let Some(p) = self.param_mut(param) {
                p.prune(t);
            }
        }
    }
}
