//! Preset navigation state machine.
//!
//! The sequencer owns the committed preset index and the in-flight gate.
//! It decides *whether* a scroll starts a transition and *where* it goes;
//! the [`Showcase`](crate::Showcase) turns an accepted [`Step`] into tweens.

use crate::tween::Easing;

/// Which way the preset list is walked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Reduce a wheel delta to a direction. Zero and NaN give `None`.
    pub fn from_delta(delta: f32) -> Option<Self> {
        if delta > 0.0 {
            Some(Direction::Forward)
        } else if delta < 0.0 {
            Some(Direction::Backward)
        } else {
            None
        }
    }

    /// `+1.0` or `-1.0`.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Circular neighbour of `current` in a list of `len` entries.
pub fn next_index(current: usize, direction: Direction, len: usize) -> usize {
    debug_assert!(len > 0);
    match direction {
        Direction::Forward => (current + 1) % len,
        Direction::Backward => (current + len - 1) % len,
    }
}

/// One accepted move between presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub from: usize,
    pub to: usize,
    pub direction: Direction,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Transitioning {
        from: usize,
        to: usize,
        direction: Direction,
    },
}

/// Committed index plus the gate that keeps transitions from overlapping.
#[derive(Clone, Debug, Default)]
pub struct Sequencer {
    current: usize,
    phase: Phase,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last committed preset index.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::Transitioning { .. })
    }

    /// The preset whose label should be on screen: the target while a
    /// transition is in flight, the committed preset otherwise.
    pub fn featured(&self) -> usize {
        match self.phase {
            Phase::Idle => self.current,
            Phase::Transitioning { to, .. } => to,
        }
    }

    /// Try to start a transition for a wheel `delta` over `len` presets.
    ///
    /// Returns `None` when the delta has no direction or a transition is
    /// already running. Neither case changes any state.
    pub fn begin(&mut self, delta: f32, len: usize) -> Option<Step> {
        let direction = Direction::from_delta(delta)?;
        if let Phase::Transitioning { from, to, .. } = self.phase {
            log::debug!("scroll ignored: transition {from} -> {to} in flight");
            return None;
        }
        if len == 0 {
            return None;
        }

        let from = self.current;
        let to = next_index(from, direction, len);
        self.phase = Phase::Transitioning {
            from,
            to,
            direction,
        };
        Some(Step {
            from,
            to,
            direction,
        })
    }

    /// Finish the in-flight transition: commit its target and open the gate.
    ///
    /// Returns the committed index, or `None` if nothing was in flight.
    pub fn commit(&mut self) -> Option<usize> {
        match self.phase {
            Phase::Transitioning { to, .. } => {
                self.current = to;
                self.phase = Phase::Idle;
                Some(to)
            }
            Phase::Idle => None,
        }
    }
}

/// Timing and curves for one transition batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionSettings {
    /// Duration `T` shared by every tween in a batch, in seconds.
    pub duration: f32,
    /// How far off-centre (world units) labels enter from and exit to.
    pub label_offset: f32,
    /// Curve for labels, rotation, background, shape and material.
    pub ease: Easing,
    /// Curve for the wipe progress.
    pub wipe_ease: Easing,
    /// Value the wipe progress reaches at the end of a transition.
    pub wipe_extent: f32,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            duration: 1.0,
            label_offset: 8.0,
            ease: Easing::CubicInOut,
            wipe_ease: Easing::EaseInOut,
            wipe_extent: 0.5,
        }
    }
}

impl TransitionSettings {
    pub fn duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    pub fn label_offset(mut self, offset: f32) -> Self {
        self.label_offset = offset;
        self
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = ease;
        self
    }

    pub fn wipe_ease(mut self, ease: Easing) -> Self {
        self.wipe_ease = ease;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_uses_sign_only() {
        assert_eq!(Direction::from_delta(120.0), Some(Direction::Forward));
        assert_eq!(Direction::from_delta(0.01), Some(Direction::Forward));
        assert_eq!(Direction::from_delta(-3.0), Some(Direction::Backward));
        assert_eq!(Direction::from_delta(0.0), None);
        assert_eq!(Direction::from_delta(-0.0), None);
        assert_eq!(Direction::from_delta(f32::NAN), None);
    }

    #[test]
    fn next_index_wraps_both_ways() {
        assert_eq!(next_index(0, Direction::Forward, 17), 1);
        assert_eq!(next_index(16, Direction::Forward, 17), 0);
        assert_eq!(next_index(0, Direction::Backward, 17), 16);
        assert_eq!(next_index(0, Direction::Forward, 1), 0);
        for len in 1..6 {
            for i in 0..len {
                for dir in [Direction::Forward, Direction::Backward] {
                    let n = next_index(i, dir, len);
                    assert!(n < len);
                    assert_eq!(next_index(n, dir.reversed(), len), i);
                }
            }
        }
    }

    #[test]
    fn gate_drops_input_while_transitioning() {
        let mut seq = Sequencer::new();
        let step = seq.begin(1.0, 17).unwrap();
        assert_eq!(
            step,
            Step {
                from: 0,
                to: 1,
                direction: Direction::Forward
            }
        );
        assert!(seq.is_animating());

        let phase = seq.phase();
        assert!(seq.begin(-1.0, 17).is_none());
        assert_eq!(seq.phase(), phase);
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.featured(), 1);

        assert_eq!(seq.commit(), Some(1));
        assert!(!seq.is_animating());
        assert_eq!(seq.current(), 1);
        assert_eq!(seq.commit(), None);
    }

    #[test]
    fn zero_delta_does_not_close_gate() {
        let mut seq = Sequencer::new();
        assert!(seq.begin(0.0, 17).is_none());
        assert_eq!(seq.phase(), Phase::Idle);
    }
}
