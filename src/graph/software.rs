use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dsp::oscillator::fill_noise;
use crate::graph::amplify::GainNode;
use crate::graph::backend::{
    AudioGraph, Automation, Endpoint, GraphError, NodeKey, NodeSpec, Param,
};
use crate::graph::distortion::ShaperNode;
use crate::graph::filter::BandPassNode;
use crate::graph::node::{GraphNode, RenderCtx};
use crate::graph::oscillator::{NoiseNode, OscNode};
use crate::MAX_BLOCK_SIZE;

/*
Software Graph
==============

An in-process audio graph. Nodes live in a slab; each slot carries a
generation counter so a key for a disposed node never reaches whatever
reuses the slot.

  slots: [ osc v0 ][ gain v0 ][ free v3 ][ gain v1 ] ...
  free:  [ 2 ]

Rendering walks the nodes in topological order (Kahn's algorithm), so every
node sees the finished output of everything connected into it:

  for node in order:
      input = Σ outputs of nodes connected to it
      node.render_block(input → node buffer)
  destination = Σ buffers of nodes connected to the destination

The order is recomputed only after the topology changes. Connections that
would close a cycle are refused, so Kahn's algorithm always drains.

Capture nodes are ordinary nodes that append their input to a buffer which
a recorder drains with `take_capture`.

The clock advances by the frames rendered: current_time = frames / rate.

Voices are built and torn down from the audio thread, so the per-node
storage is recycled rather than allocated on demand:

  pool:   [ buf+outs ][ buf+outs ] ...   NODE_POOL_SIZE up front
  insert: pop from pool (allocate only once it runs dry)
  dispose: clear outputs, push back onto the pool

The noise buffer is rendered once, when the graph is built, and every noise
node reads the same Arc. Topology scratch (in-degrees, queue, search stack)
lives on the graph and is reused between rebuilds.
*/

/// Seconds of white noise rendered when a graph is built.
pub const NOISE_SECONDS: f32 = 10.0;

/// Node buffers preallocated when a graph is built.
pub const NODE_POOL_SIZE: usize = 256;

struct Entry {
    node: Box<dyn GraphNode>,
    outputs: Vec<Endpoint>,
    buffer: Vec<f32>,
    capture: Option<Vec<f32>>,
}

/// Storage kept from a disposed node for the next one.
struct Recycled {
    outputs: Vec<Endpoint>,
    buffer: Vec<f32>,
}

impl Recycled {
    fn fresh() -> Self {
        Self {
            outputs: Vec::with_capacity(2),
            buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

pub struct SoftwareGraph {
    sample_rate: f32,
    frames_rendered: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
    pool: Vec<Recycled>,
    order: Vec<u32>,
    inputs: Vec<Vec<u32>>,
    topology_dirty: bool,
    input_scratch: Vec<f32>,
    in_degree: Vec<usize>,
    ready: VecDeque<u32>,
    search: Vec<NodeKey>,
    seen: Vec<bool>,
    noise: Arc<[f32]>,
}

impl SoftwareGraph {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_rng(sample_rate, StdRng::from_entropy())
    }

    /// Graph with a deterministic noise buffer.
    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        Self::with_rng(sample_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate: f32, mut rng: StdRng) -> Self {
        let mut noise = vec![0.0; (NOISE_SECONDS * sample_rate) as usize];
        fill_noise(&mut noise, &mut rng);

        Self {
            sample_rate,
            frames_rendered: 0,
            slots: Vec::with_capacity(NODE_POOL_SIZE),
            free: Vec::with_capacity(NODE_POOL_SIZE),
            pool: (0..NODE_POOL_SIZE).map(|_| Recycled::fresh()).collect(),
            order: Vec::with_capacity(NODE_POOL_SIZE),
            inputs: Vec::with_capacity(NODE_POOL_SIZE),
            topology_dirty: false,
            input_scratch: vec![0.0; MAX_BLOCK_SIZE],
            in_degree: Vec::with_capacity(NODE_POOL_SIZE),
            ready: VecDeque::with_capacity(NODE_POOL_SIZE),
            search: Vec::with_capacity(NODE_POOL_SIZE),
            seen: Vec::with_capacity(NODE_POOL_SIZE),
            noise: Arc::from(noise),
        }
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    /// Node buffers ready for reuse.
    pub fn pooled_buffers(&self) -> usize {
        self.pool.len()
    }

    /// The white noise every noise node loops over.
    pub fn noise_buffer(&self) -> &Arc<[f32]> {
        &self.noise
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.entry(key).is_ok()
    }

    /// Create a node that records everything connected into it.
    pub fn create_capture(&mut self) -> NodeKey {
        self.insert(Box::new(GainNode::new(1.0)), Some(Vec::new()))
    }

    /// Drain the samples a capture node has recorded so far.
    pub fn take_capture(&mut self, key: NodeKey) -> Result<Vec<f32>, GraphError> {
        let entry = self.entry_mut(key)?;
        Ok(entry.capture.as_mut().map(std::mem::take).unwrap_or_default())
    }

    /// Current value of a node's parameter.
    pub fn param_value(&self, key: NodeKey, param: Param) -> Result<f32, GraphError> {
        let entry = self.entry(key)?;
        let value = entry
            .node
            .param(param)
            .ok_or(GraphError::UnsupportedParam { node: key, param })?
            .value_at(self.current_time());
        Ok(value)
    }

    /// Render mono output, advancing the clock by `out.len()` frames.
    pub fn render(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.render_block(chunk);
        }
    }

    /// Render and discard `frames` frames.
    pub fn advance(&mut self, frames: usize) {
        let mut scratch = [0.0; 256];
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            self.render(&mut scratch[..n]);
            remaining -= n;
        }
    }

    fn render_block(&mut self, out: &mut [f32]) {
        let frames = out.len();
        out.fill(0.0);
        if self.topology_dirty {
            self.rebuild_order();
        }

        let ctx = RenderCtx::new(self.sample_rate, self.current_time());

        for &index in &self.order {
            let i = index as usize;
            let input = &mut self.input_scratch[..frames];
            input.fill(0.0);
            for &src in &self.inputs[i] {
                if let Some(upstream) = self.slots[src as usize].entry.as_ref() {
                    for (acc, &x) in input.iter_mut().zip(&upstream.buffer[..frames]) {
                        *acc += x;
                    }
                }
            }

            let Some(entry) = self.slots[i].entry.as_mut() else {
                continue;
            };
            entry
                .node
                .render_block(input, &mut entry.buffer[..frames], &ctx);
            if let Some(capture) = entry.capture.as_mut() {
                capture.extend_from_slice(&entry.buffer[..frames]);
            }
            if entry.outputs.contains(&Endpoint::Destination) {
                for (o, &x) in out.iter_mut().zip(&entry.buffer[..frames]) {
                    *o += x;
                }
            }
        }

        self.frames_rendered += frames as u64;
        let now = self.current_time();
        for entry in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            entry.node.prune(now);
        }
    }

    fn rebuild_order(&mut self) {
        let n = self.slots.len();
        self.inputs.iter_mut().for_each(Vec::clear);
        self.inputs.resize_with(n, Vec::new);
        self.in_degree.clear();
        self.in_degree.resize(n, 0);

        for (i, slot) in self.slots.iter().enumerate() {
            let Some(entry) = slot.entry.as_ref() else {
                continue;
            };
            for output in &entry.outputs {
                if let Endpoint::Node(target) = output {
                    let t = target.index as usize;
                    self.inputs[t].push(i as u32);
                    self.in_degree[t] += 1;
                }
            }
        }

        self.ready.clear();
        for i in 0..n {
            if self.slots[i].entry.is_some() && self.in_degree[i] == 0 {
                self.ready.push_back(i as u32);
            }
        }

        self.order.clear();
        while let Some(index) = self.ready.pop_front() {
            self.order.push(index);
            let Some(entry) = self.slots[index as usize].entry.as_ref() else {
                continue;
            };
            for output in &entry.outputs {
                if let Endpoint::Node(target) = output {
                    let t = target.index as usize;
                    self.in_degree[t] -= 1;
                    if self.in_degree[t] == 0 {
                        self.ready.push_back(target.index);
                    }
                }
            }
        }

        self.topology_dirty = false;
    }

    fn insert(&mut self, node: Box<dyn GraphNode>, capture: Option<Vec<f32>>) -> NodeKey {
        let Recycled { outputs, buffer } = self.pool.pop().unwrap_or_else(Recycled::fresh);
        let entry = Entry {
            node,
            outputs,
            buffer,
            capture,
        };
        self.topology_dirty = true;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return NodeKey {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        NodeKey {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn entry(&self, key: NodeKey) -> Result<&Entry, GraphError> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(GraphError::UnknownNode(key))
    }

    fn entry_mut(&mut self, key: NodeKey) -> Result<&mut Entry, GraphError> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(GraphError::UnknownNode(key))
    }

    /// Whether `to` can already reach `from` through existing connections.
    fn reaches(&mut self, to: NodeKey, from: NodeKey) -> bool {
        let mut stack = std::mem::take(&mut self.search);
        let mut seen = std::mem::take(&mut self.seen);
        stack.clear();
        stack.push(to);
        seen.clear();
        seen.resize(self.slots.len(), false);

        let mut found = false;
        while let Some(key) = stack.pop() {
            if key == from {
                found = true;
                break;
            }
            let i = key.index as usize;
            if std::mem::replace(&mut seen[i], true) {
                continue;
            }
            if let Ok(entry) = self.entry(key) {
                stack.extend(entry.outputs.iter().filter_map(|o| match o {
                    Endpoint::Node(k) => Some(*k),
                    Endpoint::Destination => None,
                }));
            }
        }

        self.search = stack;
        self.seen = seen;
        found
    }
}

impl AudioGraph for SoftwareGraph {
    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeKey, GraphError> {
        let node: Box<dyn GraphNode> = match spec {
            NodeSpec::Oscillator {
                waveform,
                frequency,
            } => Box::new(OscNode::new(waveform, frequency)),
            NodeSpec::Noise => Box::new(NoiseNode::new(Arc::clone(&self.noise))),
            NodeSpec::BandPass { frequency, q } => Box::new(BandPassNode::new(frequency, q)),
            NodeSpec::Gain { gain } => Box::new(GainNode::new(gain)),
            NodeSpec::Shaper { curve } => Box::new(ShaperNode::new(curve)),
        };
        Ok(self.insert(node, None))
    }

    fn connect(&mut self, from: NodeKey, to: Endpoint) -> Result<(), GraphError> {
        self.entry(from)?;
        if let Endpoint::Node(target) = to {
            self.entry(target)?;
            if self.reaches(target, from) {
                return Err(GraphError::Cycle { from, to: target });
            }
        }

        let entry = self.entry_mut(from)?;
        if !entry.outputs.contains(&to) {
            entry.outputs.push(to);
        }
        self.topology_dirty = true;
        Ok(())
    }

    fn schedule(
        &mut self,
        node: NodeKey,
        param: Param,
        automation: Automation,
    ) -> Result<(), GraphError> {
        let now = self.current_time();
        self.entry_mut(node)?
            .node
            .param_mut(param)
            .ok_or(GraphError::UnsupportedParam { node, param })?
            .schedule(automation, now)
    }

    fn start(&mut self, node: NodeKey, when: f64) -> Result<(), GraphError> {
        self.entry_mut(node)?
            .node
            .playback_mut()
            .ok_or(GraphError::NotASource(node))?
            .start(when);
        Ok(())
    }

    fn stop(&mut self, node: NodeKey, when: f64) -> Result<(), GraphError> {
        self.entry_mut(node)?
            .node
            .playback_mut()
            .ok_or(GraphError::NotASource(node))?
            .stop(when);
        Ok(())
    }

    fn dispose(&mut self, node: NodeKey) -> Result<(), GraphError> {
        self.entry(node)?;
        let slot = &mut self.slots[node.index as usize];
        if let Some(Entry {
            mut outputs,
            buffer,
            ..
        }) = slot.entry.take()
        {
            outputs.clear();
            self.pool.push(Recycled { outputs, buffer });
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(node.index);

        let gone = Endpoint::Node(node);
        for entry in self.slots.iter_mut().filter_map(|s| s.entry.as_mut()) {
            entry.outputs.retain(|o| *o != gone);
        }
        self.topology_dirty = true;
        Ok(())
    }
}
