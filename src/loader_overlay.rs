//! The start-up loading screen.
//!
//! A cosmetic counter runs from 0 to 100 on its own timer, with a progress
//! bar that tracks it. It does not wait for assets. Once it reaches 100 the
//! overlay holds, fades out and is gone for good.

use crate::color::Color;
use crate::draw2d::Draw2d;

/// Seconds between counter increments.
pub const TICK: f32 = 0.020;
/// Seconds the full counter stays up before fading.
pub const HOLD: f32 = 0.5;
/// Seconds the fade takes.
pub const FADE: f32 = 0.5;
pub const MAX_COUNT: u32 = 100;

const BACKDROP: Color = Color::hex(0x0A0A0A);
const BAR_TRACK: Color = Color::rgba(1.0, 1.0, 1.0, 0.15);
const COUNTER_SIZE: f32 = 96.0;
const BAR_HEIGHT: f32 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderPhase {
    Counting,
    Holding,
    Fading,
    Hidden,
}

#[derive(Clone, Debug)]
pub struct LoaderOverlay {
    phase: LoaderPhase,
    count: u32,
    /// Time banked toward the current phase's next step.
    elapsed: f32,
}

impl Default for LoaderOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderOverlay {
    pub fn new() -> Self {
        Self {
            phase: LoaderPhase::Counting,
            count: 0,
            elapsed: 0.0,
        }
    }

    pub fn phase(&self) -> LoaderPhase {
        self.phase
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Progress bar fill, `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        self.count as f32 / MAX_COUNT as f32
    }

    pub fn is_visible(&self) -> bool {
        self.phase != LoaderPhase::Hidden
    }

    /// Overall opacity.
    pub fn alpha(&self) -> f32 {
        match self.phase {
            LoaderPhase::Counting | LoaderPhase::Holding => 1.0,
            LoaderPhase::Fading => (1.0 - self.elapsed / FADE).clamp(0.0, 1.0),
            LoaderPhase::Hidden => 0.0,
        }
    }

    /// Advance the timers by `dt` seconds. Long frames carry over from one
    /// phase into the next.
    pub fn update(&mut self, dt: f32) {
        self.elapsed += dt.max(0.0);
        loop {
            match self.phase {
                LoaderPhase::Counting => {
                    while self.count < MAX_COUNT && self.elapsed >= TICK {
                        self.elapsed -= TICK;
                        self.count += 1;
                    }
                    if self.count < MAX_COUNT {
                        return;
                    }
                    self.phase = LoaderPhase::Holding;
                }
                LoaderPhase::Holding => {
                    if self.elapsed < HOLD {
                        return;
                    }
                    self.elapsed -= HOLD;
                    self.phase = LoaderPhase::Fading;
                    log::debug!("loader overlay fading out");
                }
                LoaderPhase::Fading => {
                    if self.elapsed < FADE {
                        return;
                    }
                    self.elapsed = 0.0;
                    self.phase = LoaderPhase::Hidden;
                }
                LoaderPhase::Hidden => return,
            }
        }
    }

    /// Queue the backdrop, counter and bar for a `width` x `height` surface.
    pub fn draw(&self, draw: &mut Draw2d, width: f32, height: f32) {
        if !self.is_visible() {
            return;
        }
        let alpha = self.alpha();
        let fade = |c: Color| c.with_alpha(c.a * alpha);

        draw.rect(0.0, 0.0, width, height, fade(BACKDROP));

        let label = self.count.to_string();
        if let Some(text_width) = draw.text_width(COUNTER_SIZE, &label) {
            let x = (width - text_width) * 0.5;
            let y = (height - COUNTER_SIZE) * 0.5;
            draw.text(x, y, COUNTER_SIZE, &label, fade(Color::WHITE));
        }

        let bar_y = height - BAR_HEIGHT;
        draw.rect(0.0, bar_y, width, BAR_HEIGHT, fade(BAR_TRACK));
        draw.rect(0.0, bar_y, width * self.progress(), BAR_HEIGHT, fade(Color::WHITE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(overlay: &mut LoaderOverlay, seconds: f32, step: f32) {
        let frames = (seconds / step).round() as usize;
        for _ in 0..frames {
            overlay.update(step);
        }
    }

    #[test]
    fn counts_one_per_tick() {
        let mut overlay = LoaderOverlay::new();
        overlay.update(0.019);
        assert_eq!(overlay.count(), 0);
        overlay.update(0.002);
        assert_eq!(overlay.count(), 1);
        overlay.update(0.1);
        assert_eq!(overlay.count(), 6);
        assert!((overlay.progress() - 0.06).abs() < 1e-6);
    }

    #[test]
    fn reaches_hundred_then_holds_fully_opaque() {
        let mut overlay = LoaderOverlay::new();
        run(&mut overlay, 2.05, 0.01);
        assert_eq!(overlay.count(), MAX_COUNT);
        assert_eq!(overlay.phase(), LoaderPhase::Holding);
        assert_eq!(overlay.alpha(), 1.0);
    }

    #[test]
    fn fades_after_hold_and_hides() {
        let mut overlay = LoaderOverlay::new();
        overlay.update(2.0 + HOLD + FADE * 0.5 + 1e-4);
        assert_eq!(overlay.phase(), LoaderPhase::Fading);
        assert!((overlay.alpha() - 0.5).abs() < 1e-2);

        overlay.update(FADE);
        assert_eq!(overlay.phase(), LoaderPhase::Hidden);
        assert!(!overlay.is_visible());
        assert_eq!(overlay.alpha(), 0.0);

        overlay.update(10.0);
        assert_eq!(overlay.count(), MAX_COUNT);
        assert!(!overlay.is_visible());
    }

    #[test]
    fn negative_time_is_ignored() {
        let mut overlay = LoaderOverlay::new();
        overlay.update(-1.0);
        assert_eq!(overlay.count(), 0);
        assert_eq!(overlay.phase(), LoaderPhase::Counting);
    }
}
