//! Time-driven property interpolation.
//!
//! A [`Tween`] animates fields of some state `S` (reached through lens
//! closures) from whatever value they hold when the tween first ticks to a
//! fixed end value. A [`TweenEngine`] owns any number of tweens and advances
//! them together from the frame clock; they are independent of each other.

/// Easing functions for smooth transitions.
///
/// These control the acceleration curve of transition animations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    /// Constant speed throughout.
    #[default]
    Linear,
    /// Start slow, accelerate.
    EaseIn,
    /// Start fast, decelerate.
    EaseOut,
    /// Quadratic: start slow, speed up, then slow down.
    EaseInOut,
    /// Cubic in-out. Steeper in the middle than [`Easing::EaseInOut`].
    CubicInOut,
    /// Cubic: start fast, decelerate hard.
    CubicOut,
}

impl Easing {
    /// Apply the easing function to a linear progress value (0.0 to 1.0).
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
        }
    }
}

type ScalarLens<S> = Box<dyn Fn(&mut S) -> &mut f32>;
type FlagLens<S> = Box<dyn Fn(&mut S) -> &mut bool>;
type Callback<S> = Box<dyn FnOnce(&mut S)>;

enum Track<S> {
    Scalar {
        lens: ScalarLens<S>,
        start: Option<f32>,
        end: f32,
    },
    /// Booleans can't be interpolated: they flip to `end` as soon as eased
    /// progress leaves zero.
    Flag {
        lens: FlagLens<S>,
        start: Option<bool>,
        end: bool,
    },
}

impl<S> Track<S> {
    fn capture(&mut self, state: &mut S) {
        match self {
            Track::Scalar { lens, start, .. } => *start = Some(*lens(state)),
            Track::Flag { lens, start, .. } => *start = Some(*lens(state)),
        }
    }

    fn write(&self, state: &mut S, eased: f32) {
        match self {
            Track::Scalar { lens, start, end } => {
                let from = start.unwrap_or(*end);
                *lens(state) = if eased >= 1.0 {
                    *end
                } else {
                    from + (end - from) * eased
                };
            }
            Track::Flag { lens, start, end } => {
                *lens(state) = if eased > 0.0 {
                    *end
                } else {
                    start.unwrap_or(*end)
                };
            }
        }
    }
}

/// Handle to a tween owned by a [`TweenEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TweenId(u64);

/// A single timed animation over one or more properties of `S`.
///
/// # Example
///
/// ```ignore
/// let fade = Tween::new(0.5, Easing::EaseOut)
///     .scalar(|s: &mut Overlay| &mut s.alpha, 0.0)
///     .on_complete(|s| s.visible = false);
/// engine.add(fade);
/// ```
pub struct Tween<S> {
    name: &'static str,
    duration: f32,
    easing: Easing,
    elapsed: f32,
    started: bool,
    tracks: Vec<Track<S>>,
    on_start: Option<Callback<S>>,
    on_complete: Option<Callback<S>>,
}

impl<S> Tween<S> {
    /// Create an empty tween lasting `duration` seconds.
    pub fn new(duration: f32, easing: Easing) -> Self {
        Self {
            name: "tween",
            duration,
            easing,
            elapsed: 0.0,
            started: false,
            tracks: Vec::new(),
            on_start: None,
            on_complete: None,
        }
    }

    /// Label used in log output.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Animate the `f32` reached through `lens` towards `end`.
    pub fn scalar<L>(mut self, lens: L, end: f32) -> Self
    where
        L: Fn(&mut S) -> &mut f32 + 'static,
    {
        self.tracks.push(Track::Scalar {
            lens: Box::new(lens),
            start: None,
            end,
        });
        self
    }

    /// Switch the `bool` reached through `lens` to `end` once the tween moves.
    pub fn flag<L>(mut self, lens: L, end: bool) -> Self
    where
        L: Fn(&mut S) -> &mut bool + 'static,
    {
        self.tracks.push(Track::Flag {
            lens: Box::new(lens),
            start: None,
            end,
        });
        self
    }

    /// Run `f` on the first tick, right after start values are captured.
    pub fn on_start(mut self, f: impl FnOnce(&mut S) + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    /// Run `f` once, on the tick that reaches the end.
    pub fn on_complete(mut self, f: impl FnOnce(&mut S) + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            if self.started { 1.0 } else { 0.0 }
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    /// Advance by `dt` and write the interpolated values into `state`.
    ///
    /// Returns `true` once the tween has finished; its completion callback
    /// has then already run.
    fn step(&mut self, dt: f32, state: &mut S) -> bool {
        if !self.started {
            self.started = true;
            for track in &mut self.tracks {
                track.capture(state);
            }
            if let Some(f) = self.on_start.take() {
                f(state);
            }
        }

        self.elapsed += dt.max(0.0);
        let ratio = self.progress();
        let eased = if ratio >= 1.0 {
            1.0
        } else {
            self.easing.apply(ratio)
        };
        for track in &self.tracks {
            track.write(state, eased);
        }

        if ratio >= 1.0 {
            if let Some(f) = self.on_complete.take() {
                f(state);
            }
            true
        } else {
            false
        }
    }
}

/// Owns and advances a set of concurrent tweens over the same state.
pub struct TweenEngine<S> {
    tweens: Vec<(TweenId, Tween<S>)>,
    next_id: u64,
}

impl<S> Default for TweenEngine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TweenEngine<S> {
    pub fn new() -> Self {
        Self {
            tweens: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedule a tween. It starts on the next [`tick`](Self::tick).
    pub fn add(&mut self, tween: Tween<S>) -> TweenId {
        let id = TweenId(self.next_id);
        self.next_id += 1;
        log::trace!("tween '{}' scheduled ({:.2}s)", tween.name, tween.duration);
        self.tweens.push((id, tween));
        id
    }

    /// Advance every tween by `dt` seconds, in the order they were added.
    pub fn tick(&mut self, dt: f32, state: &mut S) {
        self.tweens.retain_mut(|(_, tween)| !tween.step(dt, state));
    }

    /// Drop a tween without running its completion callback.
    ///
    /// Returns `false` if the tween already finished or never existed.
    pub fn cancel(&mut self, id: TweenId) -> bool {
        let before = self.tweens.len();
        self.tweens.retain(|(tid, _)| *tid != id);
        self.tweens.len() != before
    }

    pub fn is_active(&self, id: TweenId) -> bool {
        self.tweens.iter().any(|(tid, _)| *tid == id)
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        x: f32,
        flag: bool,
        started: u32,
        completed: u32,
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn easings_hit_endpoints_and_midpoint() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::CubicInOut,
            Easing::CubicOut,
        ] {
            assert!(approx(easing.apply(0.0), 0.0), "{easing:?}");
            assert!(approx(easing.apply(1.0), 1.0), "{easing:?}");
        }
        assert!(approx(Easing::EaseInOut.apply(0.5), 0.5));
        assert!(approx(Easing::CubicInOut.apply(0.5), 0.5));
        assert!(approx(Easing::CubicInOut.apply(0.25), 0.0625));
        assert!(approx(Easing::EaseInOut.apply(0.25), 0.125));
    }

    #[test]
    fn start_value_is_captured_on_first_tick() {
        let mut engine = TweenEngine::new();
        let mut probe = Probe::default();
        engine.add(Tween::new(1.0, Easing::Linear).scalar(|p: &mut Probe| &mut p.x, 10.0));

        // Changed after scheduling but before the first tick.
        probe.x = 6.0;
        engine.tick(0.5, &mut probe);
        assert!(approx(probe.x, 8.0));
        engine.tick(0.5, &mut probe);
        assert_eq!(probe.x, 10.0);
        assert!(engine.is_empty());
    }

    #[test]
    fn callbacks_fire_once() {
        let mut engine = TweenEngine::new();
        let mut probe = Probe::default();
        engine.add(
            Tween::new(0.2, Easing::EaseOut)
                .scalar(|p: &mut Probe| &mut p.x, 1.0)
                .on_start(|p| p.started += 1)
                .on_complete(|p| p.completed += 1),
        );

        engine.tick(0.0, &mut probe);
        assert_eq!((probe.started, probe.completed), (1, 0));
        assert_eq!(probe.x, 0.0);
        for _ in 0..10 {
            engine.tick(0.1, &mut probe);
        }
        assert_eq!((probe.started, probe.completed), (1, 1));
        assert_eq!(probe.x, 1.0);
    }

    #[test]
    fn flag_flips_once_progress_moves() {
        let mut engine = TweenEngine::new();
        let mut probe = Probe::default();
        engine.add(Tween::new(1.0, Easing::CubicInOut).flag(|p: &mut Probe| &mut p.flag, true));

        engine.tick(0.0, &mut probe);
        assert!(!probe.flag);
        engine.tick(0.1, &mut probe);
        assert!(probe.flag);
    }

    #[test]
    fn zero_duration_completes_on_first_tick() {
        let mut engine = TweenEngine::new();
        let mut probe = Probe::default();
        engine.add(
            Tween::new(0.0, Easing::Linear)
                .scalar(|p: &mut Probe| &mut p.x, 3.0)
                .on_complete(|p| p.completed += 1),
        );
        engine.tick(0.0, &mut probe);
        assert_eq!(probe.x, 3.0);
        assert_eq!(probe.completed, 1);
        assert!(engine.is_empty());
    }

    #[test]
    fn cancel_skips_completion() {
        let mut engine = TweenEngine::new();
        let mut probe = Probe::default();
        let id = engine.add(
            Tween::new(1.0, Easing::Linear)
                .scalar(|p: &mut Probe| &mut p.x, 1.0)
                .on_complete(|p| p.completed += 1),
        );
        engine.tick(0.5, &mut probe);
        assert!(engine.is_active(id));
        assert!(engine.cancel(id));
        assert!(!engine.cancel(id));
        engine.tick(1.0, &mut probe);
        assert_eq!(probe.completed, 0);
        assert!(approx(probe.x, 0.5));
    }

    #[test]
    fn concurrent_tweens_are_independent() {
        let mut engine = TweenEngine::new();
        let mut probe = Probe::default();
        engine.add(Tween::new(0.5, Easing::Linear).scalar(|p: &mut Probe| &mut p.x, 1.0));
        engine.add(
            Tween::new(1.0, Easing::Linear)
                .flag(|p: &mut Probe| &mut p.flag, true)
                .on_complete(|p| p.completed += 1),
        );
        engine.tick(0.5, &mut probe);
        assert_eq!(engine.len(), 1);
        assert_eq!(probe.completed, 0);
        engine.tick(0.5, &mut probe);
        assert!(engine.is_empty());
        assert_eq!(probe.completed, 1);
    }
}
