// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Automatable parameters.
//!
//! A parameter holds a timeline of scheduled changes against the output clock.
//! The control side schedules events, the renderer evaluates the timeline once
//! per frame. Curves follow the Web Audio `AudioParam` model so envelopes can be
//! described the same way: set, linear ramp, exponential ramp, exponential
//! approach to a target, and cancellation of everything scheduled after a point.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::AudioError;

/// A single scheduled change.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Automation {
    /// Jump to `value` at `time`.
    SetValue { value: f32, time: f64 },
    /// Ramp linearly from the previous event to `value`, arriving at `end_time`.
    LinearRamp { value: f32, end_time: f64 },
    /// Ramp exponentially from the previous event to `value`, arriving at `end_time`.
    ExponentialRamp { value: f32, end_time: f64 },
    /// Starting at `start_time`, approach `target` with the given time constant.
    SetTarget {
        target: f32,
        start_time: f64,
        time_constant: f64,
    },
}

impl Automation {
    /// The time used to order events on the timeline.
    fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. } => time,
            Automation::LinearRamp { end_time, .. } => end_time,
            Automation::ExponentialRamp { end_time, .. } => end_time,
            Automation::SetTarget { start_time, .. } => start_time,
        }
    }
}

/// The scheduled events of a parameter, kept in time order.
#[derive(Debug)]
pub struct Timeline {
    /// Value before the first event.
    initial: f32,
    events: Vec<Automation>,
}

impl Timeline {
    fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::new(),
        }
    }

    /// Inserts an event after any events at the same time.
    fn insert(&mut self, event: Automation) {
        let at = event.time();
        let index = self.events.partition_point(|e| e.time() <= at);
        self.events.insert(index, event);
    }

    /// Evaluates the parameter at the given output-clock time.
    pub fn value_at(&self, time: f64) -> f32 {
        let mut value = self.initial;
        // Where the current segment starts, and its value there.
        let mut anchor = (0.0f64, self.initial);
        // An active set-target curve, running since the anchor.
        let mut approach: Option<(f32, f64)> = None;

        for event in &self.events {
            let at = event.time();
            if at > time {
                return match *event {
                    Automation::LinearRamp { value, end_time } => {
                        linear(anchor, (end_time, value), time)
                    }
                    Automation::ExponentialRamp { value, end_time } => {
                        exponential(anchor, (end_time, value), time)
                    }
                    _ => match approach {
                        Some((target, tc)) => set_target(anchor, target, tc, time),
                        None => value,
                    },
                };
            }

            let settled = match approach.take() {
                Some((target, tc)) => set_target(anchor, target, tc, at),
                None => value,
            };
            value = match *event {
                Automation::SetValue { value, .. } => value,
                Automation::LinearRamp { value, .. } => value,
                Automation::ExponentialRamp { value, .. } => value,
                Automation::SetTarget {
                    target,
                    time_constant,
                    ..
                } => {
                    approach = Some((target, time_constant));
                    settled
                }
            };
            anchor = (at, value);
        }

        match approach {
            Some((target, tc)) => set_target(anchor, target, tc, time),
            None => value,
        }
    }

    /// Collapses the timeline to its value at `time`. Everything scheduled,
    /// before or after, is dropped and the value holds from then on.
    fn hold(&mut self, time: f64) -> f32 {
        let value = self.value_at(time);
        self.initial = value;
        self.events.clear();
        value
    }

    /// Number of scheduled events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn linear((t0, v0): (f64, f32), (t1, v1): (f64, f32), time: f64) -> f32 {
    if t1 <= t0 || time >= t1 {
        return v1;
    }
    if time <= t0 {
        return v0;
    }
    let progress = ((time - t0) / (t1 - t0)) as f32;
    v0 + (v1 - v0) * progress
}

fn exponential((t0, v0): (f64, f32), (t1, v1): (f64, f32), time: f64) -> f32 {
    if t1 <= t0 || time >= t1 {
        return v1;
    }
    // A curve can't leave zero or cross it; hold the start value until the end.
    if v0 == 0.0 || (v0 < 0.0) != (v1 < 0.0) || time <= t0 {
        return v0;
    }
    let progress = (time - t0) / (t1 - t0);
    (v0 as f64 * (v1 as f64 / v0 as f64).powf(progress)) as f32
}

fn set_target((t0, v0): (f64, f32), target: f32, time_constant: f64, time: f64) -> f32 {
    if time_constant <= 0.0 {
        return target;
    }
    if time <= t0 {
        return v0;
    }
    let decay = (-(time - t0) / time_constant).exp() as f32;
    target + (v0 - target) * decay
}

/// A shareable automatable parameter, such as a gain.
///
/// Clones share the same timeline.
#[derive(Clone, Debug)]
pub struct AudioParam {
    timeline: Arc<Mutex<Timeline>>,
}

impl AudioParam {
    /// Creates a parameter whose value is `initial` until something is scheduled.
    pub fn new(initial: f32) -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline::new(initial))),
        }
    }

    /// Evaluates the parameter at the given time.
    pub fn value_at(&self, time: f64) -> f32 {
        self.timeline.lock().value_at(time)
    }

    /// Locks the timeline for repeated evaluation over a render block.
    pub fn lock(&self) -> MutexGuard<'_, Timeline> {
        self.timeline.lock()
    }

    pub fn set_value_at_time(&self, value: f32, time: f64) {
        self.timeline
            .lock()
            .insert(Automation::SetValue { value, time });
    }

    pub fn linear_ramp_to_value_at_time(&self, value: f32, end_time: f64) {
        self.timeline
            .lock()
            .insert(Automation::LinearRamp { value, end_time });
    }

    /// Schedules an exponential ramp. Exponential curves can't reach zero, so the
    /// target must be strictly positive.
    pub fn exponential_ramp_to_value_at_time(
        &self,
        value: f32,
        end_time: f64,
    ) -> Result<(), AudioError> {
        if value <= 0.0 || !value.is_finite() {
            return Err(AudioError::InvalidRampTarget(value));
        }
        self.timeline
            .lock()
            .insert(Automation::ExponentialRamp { value, end_time });
        Ok(())
    }

    pub fn set_target_at_time(&self, target: f32, start_time: f64, time_constant: f64) {
        self.timeline.lock().insert(Automation::SetTarget {
            target,
            start_time,
            time_constant,
        });
    }

    /// Drops every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&self, time: f64) {
        self.timeline.lock().events.retain(|e| e.time() < time);
    }

    /// Pins the parameter to its value at `time` and forgets its history, so
    /// the timeline doesn't grow with every change. Returns the pinned value.
    pub fn hold_at(&self, time: f64) -> f32 {
        self.timeline.lock().hold(time)
    }

    /// Number of scheduled events.
    pub fn scheduled_len(&self) -> usize {
        self.timeline.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_initial_value() {
        let param = AudioParam::new(0.7);
        assert_eq!(param.value_at(0.0), 0.7);
        assert_eq!(param.value_at(100.0), 0.7);
        assert_eq!(param.scheduled_len(), 0);
    }

    #[test]
    fn test_linear_attack() {
        let param = AudioParam::new(1.0);
        param.set_value_at_time(0.0, 1.0);
        param.linear_ramp_to_value_at_time(1.0, 1.005);

        assert_eq!(param.value_at(0.5), 1.0);
        assert_eq!(param.value_at(1.0), 0.0);
        assert!(close(param.value_at(1.0025), 0.5));
        assert_eq!(param.value_at(1.005), 1.0);
        assert_eq!(param.value_at(3.0), 1.0);
    }

    #[test]
    fn test_exponential_ramp() {
        let param = AudioParam::new(0.0);
        param.set_value_at_time(1.0, 0.0);
        param.exponential_ramp_to_value_at_time(0.25, 2.0).unwrap();

        assert!(close(param.value_at(1.0), 0.5));
        assert_eq!(param.value_at(2.0), 0.25);
    }

    #[test]
    fn test_exponential_ramp_from_zero_holds() {
        let param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.exponential_ramp_to_value_at_time(0.001, 1.0).unwrap();

        assert_eq!(param.value_at(0.5), 0.0);
        assert_eq!(param.value_at(1.0), 0.001);
    }

    #[test]
    fn test_exponential_ramp_rejects_zero() {
        let param = AudioParam::new(1.0);
        assert!(param.exponential_ramp_to_value_at_time(0.0, 1.0).is_err());
        assert!(param.exponential_ramp_to_value_at_time(-0.5, 1.0).is_err());
        assert_eq!(param.scheduled_len(), 0);
    }

    #[test]
    fn test_set_target_glide() {
        let param = AudioParam::new(1.0);
        param.set_target_at_time(0.5, 2.0, 0.1);

        assert_eq!(param.value_at(1.0), 1.0);
        // One time constant in, ~63% of the way there.
        let expected = 0.5 + 0.5 * (-1.0f32).exp();
        assert!(close(param.value_at(2.1), expected));
        assert!(close(param.value_at(4.0), 0.5));
    }

    #[test]
    fn test_hold_collapses_history() {
        let param = AudioParam::new(1.0);
        param.set_target_at_time(0.0, 0.0, 0.1);
        param.linear_ramp_to_value_at_time(1.0, 5.0);
        let expected = param.value_at(0.1);

        let held = param.hold_at(0.1);
        assert!(close(held, expected));
        assert_eq!(param.scheduled_len(), 0);
        assert!(close(param.value_at(0.1), expected));
        assert!(close(param.value_at(10.0), expected));
    }

    #[test]
    fn test_chained_set_targets() {
        let param = AudioParam::new(1.0);
        param.set_target_at_time(0.0, 0.0, 0.1);
        param.set_target_at_time(1.0, 0.1, 0.1);

        let at_second = (-1.0f32).exp();
        assert!(close(param.value_at(0.1), at_second));
        assert!(param.value_at(0.2) > at_second);
        assert!(close(param.value_at(10.0), 1.0));
    }

    #[test]
    fn test_cancel_and_pin() {
        let param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.linear_ramp_to_value_at_time(1.0, 1.0);

        // Release halfway through the attack.
        let current = param.value_at(0.5);
        param.cancel_scheduled_values(0.5);
        param.set_value_at_time(current, 0.5);
        param.exponential_ramp_to_value_at_time(0.001, 1.5).unwrap();

        assert_eq!(param.scheduled_len(), 3);
        assert!(close(param.value_at(0.5), 0.5));
        assert!(param.value_at(1.0) < 0.5);
        assert_eq!(param.value_at(1.5), 0.001);
    }

    #[test]
    fn test_same_time_events_keep_order() {
        let param = AudioParam::new(0.0);
        param.set_value_at_time(0.2, 1.0);
        param.set_value_at_time(0.4, 1.0);
        assert_eq!(param.value_at(1.0), 0.4);
    }
}
