use crate::graph::backend::{Automation, GraphError};

/*
Parameter Automation
====================

A parameter is a default value plus a timeline of scheduled events on the
audio clock. Two event kinds exist:

  SetValueAtTime(v, t)                 jump to v at t, hold until the next event
  ExponentialRampToValueAtTime(v, t)   glide multiplicatively to v, arriving at t

Evaluation at time t:

  before the first event     → default value (a leading ramp glides from the
                               default, starting when it was scheduled)
  inside a ramp's span       → v0 · (v1 / v0)^((t - t0) / (t1 - t0))
                               where (t0, v0) is the previous event
  after the last event       → the last event's value

    gain
    0.9 ┤        ╭──────╮
        │       ╱        ╲___
        │      ╱             ╲___      sustain
    0.5 ┤     ╱                  ‾‾‾‾‾‾‾‾‾‾‾‾‾
        │   _╱
    0.0 ┼──╯─────────────────────────────────→ t
        set  ramp           ramp

Exponential curves cannot reach or cross zero, so a ramp target <= 0 is
refused at scheduling time. A ramp whose start value is not positive holds
the start value until the ramp's end time.
*/

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Set { value: f32, time: f64 },
    Ramp { value: f32, time: f64, scheduled_at: f64 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::Set { time, .. } | Event::Ramp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Event::Set { value, .. } | Event::Ramp { value, .. } => value,
        }
    }
}

/// An automatable parameter on a render node.
#[derive(Debug, Clone)]
pub struct AudioParam {
    default: f32,
    events: Vec<Event>,
}

impl AudioParam {
    pub fn new(default: f32) -> Self {
        Self {
            default,
            events: Vec::new(),
        }
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Insert an automation event. `now` anchors a ramp that has no earlier event.
    pub fn schedule(&mut self, automation: Automation, now: f64) -> Result<(), GraphError> {
        let event = match automation {
            Automation::SetValueAtTime { value, time } => Event::Set { value, time },
            Automation::ExponentialRampToValueAtTime { value, time } => {
                if !(value > 0.0) {
                    return Err(GraphError::NonPositiveRamp(value));
                }
                Event::Ramp {
                    value,
                    time,
                    scheduled_at: now,
                }
            }
        };

        // Events at the same time keep insertion order
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
        Ok(())
    }

    /// Value at an absolute audio-clock time.
    pub fn value_at(&self, t: f64) -> f32 {
        let next = self.events.partition_point(|e| e.time() <= t);

        let (t0, v0) = match next.checked_sub(1).map(|i| self.events[i]) {
            Some(previous) => (previous.time(), previous.value()),
            None => match self.events.first() {
                Some(Event::Ramp { scheduled_at, .. }) => (*scheduled_at, self.default),
                _ => return self.default,
            },
        };

        match self.events.get(next) {
            Some(&Event::Ramp { value: v1, time: t1, .. }) => exponential(t0, v0, t1, v1, t),
            _ => v0,
        }
    }

    /// Write one value per frame, starting at `start` and stepping by `dt`.
    pub fn fill(&self, out: &mut [f32], start: f64, dt: f64) {
        if self.events.is_empty() {
            out.fill(self.default);
            return;
        }
        for (i, value) in out.iter_mut().enumerate() {
            *value = self.value_at(start + i as f64 * dt);
        }
    }

    /// Drop events that can no longer influence values at or after `t`.
    ///
    /// The most recent event at or before `t` stays as the anchor for any
    /// ramp that follows it.
    pub fn prune(&mut self, t: f64) {
        let next = self.events.partition_point(|e| e.time() <= t);
        if next > 1 {
            self.events.drain(..next - 1);
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

fn exponential(t0: f64, v0: f32, t1: f64, v1: f32, t: f64) -> f32 {
    if v0 <= 0.0 || t1 <= t0 {
        return if t >= t1 { v1 } else { v0 };
    }
    let progress = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
    let ratio = (v1 / v0) as f64;
    (v0 as f64 * ratio.powf(progress)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(value: f32, time: f64) -> Automation {
        Automation::SetValueAtTime { value, time }
    }

    fn ramp(value: f32, time: f64) -> Automation {
        Automation::ExponentialRampToValueAtTime { value, time }
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn holds_default_without_events() {
        let param = AudioParam::new(1.0);
        assert_eq!(param.value_at(0.0), 1.0);
        assert_eq!(param.value_at(100.0), 1.0);
    }

    #[test]
    fn holds_default_before_first_set() {
        let mut param = AudioParam::new(1.0);
        param.schedule(set(0.25, 2.0), 0.0).unwrap();
        assert_eq!(param.value_at(1.0), 1.0);
        assert_eq!(param.value_at(2.0), 0.25);
        assert_eq!(param.value_at(9.0), 0.25);
    }

    #[test]
    fn exponential_ramp_hits_geometric_midpoint() {
        let mut param = AudioParam::new(1.0);
        param.schedule(set(0.01, 0.0), 0.0).unwrap();
        param.schedule(ramp(1.0, 2.0), 0.0).unwrap();

        // Halfway through a 0.01 → 1.0 ramp is sqrt(0.01 * 1.0)
        assert!(close(param.value_at(1.0), 0.1));
        assert!(close(param.value_at(2.0), 1.0));
        assert!(close(param.value_at(5.0), 1.0));
    }

    #[test]
    fn ramp_to_zero_is_rejected() {
        let mut param = AudioParam::new(1.0);
        assert!(matches!(
            param.schedule(ramp(0.0, 1.0), 0.0),
            Err(GraphError::NonPositiveRamp(_))
        ));
        assert!(param.schedule(ramp(-0.5, 1.0), 0.0).is_err());
        assert_eq!(param.event_count(), 0);
    }

    #[test]
    fn leading_ramp_starts_from_default_at_schedule_time() {
        let mut param = AudioParam::new(1.0);
        param.schedule(ramp(0.01, 3.0), 1.0).unwrap();

        assert_eq!(param.value_at(0.5), 1.0);
        assert!(close(param.value_at(2.0), 0.1));
        assert!(close(param.value_at(3.0), 0.01));
    }

    #[test]
    fn envelope_segments_chain() {
        // attack: 0.00001 → 0.9 over 1s, decay: 1.0 at 1s → 0.5 at 2s
        let mut attack = AudioParam::new(1.0);
        attack.schedule(set(0.00001, 0.0), 0.0).unwrap();
        attack.schedule(ramp(0.9, 1.0), 0.0).unwrap();

        let mut decay = AudioParam::new(1.0);
        decay.schedule(set(1.0, 1.0), 0.0).unwrap();
        decay.schedule(ramp(0.5, 2.0), 0.0).unwrap();

        assert!(attack.value_at(0.5) < 0.01);
        assert!(close(attack.value_at(1.5) * decay.value_at(1.0), 0.9));
        assert!(close(decay.value_at(0.5), 1.0));
        assert!(close(decay.value_at(3.0), 0.5));
    }

    #[test]
    fn prune_keeps_anchor_for_following_ramp() {
        let mut param = AudioParam::new(1.0);
        param.schedule(set(0.9, 0.0), 0.0).unwrap();
        param.schedule(set(0.9, 1.0), 0.0).unwrap();
        param.schedule(ramp(0.00001, 3.0), 0.0).unwrap();

        let before = param.value_at(2.0);
        param.prune(2.0);
        assert_eq!(param.event_count(), 2);
        assert_eq!(param.value_at(2.0), before);
    }

    #[test]
    fn fill_steps_through_the_timeline() {
        let mut param = AudioParam::new(0.0);
        param.schedule(set(1.0, 0.5), 0.0).unwrap();
        let mut out = [9.0; 4];
        param.fill(&mut out, 0.0, 0.25);
        assert_eq!(out, [0.0, 0.0, 1.0, 1.0]);
    }
}
