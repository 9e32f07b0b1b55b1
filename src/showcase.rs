//! Turns scroll input into coordinated preset transitions.
//!
//! [`Showcase`] is the context object that owns the catalog, the stage and
//! the tween engine. An accepted scroll issues one batch of independent
//! tweens; only the wipe tween's completion commits the new preset and
//! reopens the gate. The other tweens are cosmetic.

use std::f32::consts::TAU;

use crate::catalog::Catalog;
use crate::sequencer::{Step, TransitionSettings};
use crate::stage::Stage;
use crate::tween::{Easing, Tween, TweenEngine, TweenId};

fn tween(duration: f32, easing: Easing) -> Tween<Stage> {
    Tween::new(duration, easing)
}

pub struct Showcase {
    catalog: Catalog,
    stage: Stage,
    tweens: TweenEngine<Stage>,
    settings: TransitionSettings,
    wipe: Option<TweenId>,
}

impl Showcase {
    pub fn new(catalog: Catalog, settings: TransitionSettings) -> Self {
        let stage = Stage::new(&catalog);
        Self {
            catalog,
            stage,
            tweens: TweenEngine::new(),
            settings,
            wipe: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn settings(&self) -> &TransitionSettings {
        &self.settings
    }

    /// The committed preset index.
    pub fn current(&self) -> usize {
        self.stage.sequencer.current()
    }

    pub fn is_animating(&self) -> bool {
        self.stage.sequencer.is_animating()
    }

    /// Number of tweens still running.
    pub fn active_tweens(&self) -> usize {
        self.tweens.len()
    }

    /// Handle a wheel event. Only the sign of `delta` matters.
    ///
    /// Returns `true` if a transition started. Input arriving while one is in
    /// flight is dropped, not queued.
    pub fn scroll(&mut self, delta: f32) -> bool {
        let Some(step) = self.stage.sequencer.begin(delta, self.catalog.len()) else {
            return false;
        };
        log::debug!(
            "transition {} -> {}: '{}' -> '{}'",
            step.from,
            step.to,
            self.catalog.preset(step.from).name,
            self.catalog.preset(step.to).name
        );
        self.issue(step);
        true
    }

    /// Advance every running tween by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.tweens.tick(dt, &mut self.stage);
        if self.wipe.is_some_and(|id| !self.tweens.is_active(id)) {
            self.wipe = None;
        }
    }

    /// Set the shader clock, in seconds since the render loop started.
    pub fn set_time(&mut self, time: f32) {
        self.stage.time = time;
    }

    /// Drop the in-flight wipe tween without completing it.
    ///
    /// The transition can then never commit, so the gate stays closed for
    /// the rest of the session.
    pub fn cancel_wipe(&mut self) -> bool {
        match self.wipe.take() {
            Some(id) => {
                log::warn!("wipe tween cancelled; transitions are now blocked");
                self.tweens.cancel(id)
            }
            None => false,
        }
    }

    fn issue(&mut self, step: Step) {
        let Step {
            from,
            to,
            direction,
        } = step;
        let TransitionSettings {
            duration,
            label_offset,
            ease,
            wipe_ease,
            wipe_extent,
        } = self.settings;
        let sign = direction.sign();
        let target = *self.catalog.preset(to);

        // Incoming label jumps off-screen on the scroll side.
        let incoming = &mut self.stage.labels[to];
        incoming.scale = 1.0;
        incoming.position.x = sign * label_offset;
        self.stage.wipe.direction = sign;

        self.tweens.add(
            tween(duration, ease)
                .named("label-in")
                .scalar(move |s| &mut s.labels[to].position.x, 0.0),
        );

        // With a single preset the outgoing label is the incoming one.
        if from != to {
            self.tweens.add(
                tween(duration, ease)
                    .named("label-out")
                    .scalar(move |s| &mut s.labels[from].position.x, -sign * label_offset)
                    .on_complete(move |s| {
                        if s.sequencer.featured() != from {
                            s.labels[from].scale = 0.0;
                        }
                    }),
            );
        }

        let rotation = self.stage.blob.rotation_y - sign * TAU;
        self.tweens.add(
            tween(duration, ease)
                .named("rotation")
                .scalar(|s| &mut s.blob.rotation_y, rotation),
        );

        let bg = target.background;
        self.tweens.add(
            tween(duration, ease)
                .named("background")
                .scalar(|s| &mut s.background.r, bg.r)
                .scalar(|s| &mut s.background.g, bg.g)
                .scalar(|s| &mut s.background.b, bg.b),
        );

        let wipe = self.tweens.add(
            tween(duration, wipe_ease)
                .named("wipe")
                .scalar(|s| &mut s.wipe.progress, wipe_extent)
                .on_complete(|s| {
                    if let Some(index) = s.sequencer.commit() {
                        log::debug!("committed preset {} '{}'", index, s.labels[index].text);
                    }
                    s.wipe.progress = 0.0;
                }),
        );
        self.wipe = Some(wipe);

        let shape = target.shape;
        let material = target.material;
        self.tweens.add(
            tween(duration, ease)
                .named("material")
                .on_start(move |s| s.blob.material.map = material.map)
                .scalar(|s| &mut s.blob.shape.position_frequency, shape.position_frequency)
                .scalar(|s| &mut s.blob.shape.position_strength, shape.position_strength)
                .scalar(
                    |s| &mut s.blob.shape.small_wave_position_frequency,
                    shape.small_wave_position_frequency,
                )
                .scalar(
                    |s| &mut s.blob.shape.small_wave_position_strength,
                    shape.small_wave_position_strength,
                )
                .scalar(|s| &mut s.blob.material.roughness, material.roughness)
                .scalar(|s| &mut s.blob.material.metalness, material.metalness)
                .scalar(|s| &mut s.blob.material.env_map_intensity, material.env_map_intensity)
                .scalar(|s| &mut s.blob.material.clearcoat, material.clearcoat)
                .scalar(
                    |s| &mut s.blob.material.clearcoat_roughness,
                    material.clearcoat_roughness,
                )
                .scalar(|s| &mut s.blob.material.transmission, material.transmission)
                .flag(|s| &mut s.blob.material.flat_shading, material.flat_shading)
                .flag(|s| &mut s.blob.material.wireframe, material.wireframe),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PRESETS;

    fn showcase() -> Showcase {
        Showcase::new(Catalog::builtin(), TransitionSettings::default())
    }

    /// Run a full default-length transition in exact binary steps.
    fn settle(show: &mut Showcase) {
        for _ in 0..4 {
            show.advance(0.25);
        }
    }

    fn assert_single_label(show: &Showcase) {
        let stage = show.stage();
        let visible: Vec<_> = stage.visible_labels().collect();
        assert_eq!(visible, vec![show.current()]);
        assert_eq!(stage.labels[show.current()].position.x, 0.0);
        assert_eq!(stage.labels[show.current()].scale, 1.0);
    }

    #[test]
    fn forward_scroll_runs_full_batch() {
        let mut show = showcase();
        let target = PRESETS[1];

        assert!(show.scroll(120.0));
        assert!(show.is_animating());
        assert_eq!(show.current(), 0);
        assert_eq!(show.active_tweens(), 6);
        {
            let stage = show.stage();
            assert_eq!(stage.labels[1].scale, 1.0);
            assert_eq!(stage.labels[1].position.x, 8.0);
            assert_eq!(stage.wipe.direction, 1.0);
        }

        show.advance(0.5);
        {
            let stage = show.stage();
            assert!((stage.labels[1].position.x - 4.0).abs() < 1e-5);
            assert!((stage.labels[0].position.x + 4.0).abs() < 1e-5);
            assert!((stage.wipe.progress - 0.25).abs() < 1e-5);
            assert!(show.is_animating());
        }

        show.advance(0.5);
        let stage = show.stage();
        assert!(!show.is_animating());
        assert_eq!(show.current(), 1);
        assert_eq!(stage.wipe.progress, 0.0);
        assert_eq!(stage.labels[1].position.x, 0.0);
        assert_eq!(stage.labels[0].position.x, -8.0);
        assert_eq!(stage.labels[0].scale, 0.0);
        assert_eq!(stage.blob.rotation_y, -TAU);
        assert_eq!(stage.background, target.background);
        assert_eq!(stage.blob.material, target.material);
        assert_eq!(stage.blob.shape, target.shape);
        assert_eq!(show.active_tweens(), 0);
    }

    #[test]
    fn gradient_swaps_when_tween_starts() {
        let mut show = showcase();
        let before = show.stage().blob.material.roughness;

        show.scroll(1.0);
        show.advance(0.0);

        let material = show.stage().blob.material;
        assert_eq!(material.map, PRESETS[1].material.map);
        assert_eq!(material.roughness, before);
    }

    #[test]
    fn backward_from_first_wraps_to_last_and_back() {
        let mut show = showcase();

        assert!(show.scroll(-1.0));
        assert_eq!(show.stage().labels[16].position.x, -8.0);
        settle(&mut show);
        assert_eq!(show.current(), 16);
        assert_eq!(show.stage().blob.rotation_y, TAU);
        assert_single_label(&show);

        assert!(show.scroll(1.0));
        settle(&mut show);
        assert_eq!(show.current(), 0);
        assert_single_label(&show);
    }

    #[test]
    fn rapid_second_scroll_is_dropped() {
        let mut single = showcase();
        single.scroll(1.0);
        settle(&mut single);

        let mut double = showcase();
        assert!(double.scroll(1.0));
        double.advance(0.25);
        let tweens = double.active_tweens();
        assert!(!double.scroll(1.0));
        assert!(!double.scroll(-1.0));
        assert_eq!(double.active_tweens(), tweens);
        assert_eq!(double.current(), 0);
        for _ in 0..3 {
            double.advance(0.25);
        }
        settle(&mut double);

        assert_eq!(double.current(), 1);
        assert_eq!(double.stage().labels, single.stage().labels);
        assert_eq!(double.stage().blob, single.stage().blob);
    }

    #[test]
    fn forward_then_backward_returns_home() {
        let mut show = showcase();
        show.scroll(1.0);
        settle(&mut show);
        show.scroll(-1.0);
        settle(&mut show);

        assert_eq!(show.current(), 0);
        assert_eq!(show.stage().blob.rotation_y, 0.0);
        assert_eq!(show.stage().background, PRESETS[0].background);
        assert_single_label(&show);
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let mut show = showcase();
        assert!(!show.scroll(0.0));
        assert!(!show.is_animating());
        assert_eq!(show.active_tweens(), 0);
    }

    #[test]
    fn one_label_shown_after_every_step() {
        let mut show = showcase();
        for i in 1..=20 {
            assert!(show.scroll(1.0));
            settle(&mut show);
            assert_eq!(show.current(), i % 17);
            assert_single_label(&show);
        }
    }

    #[test]
    fn flat_shading_flips_once_progress_moves() {
        let catalog = Catalog::new(vec![PRESETS[3], PRESETS[4]]).unwrap();
        let mut show = Showcase::new(catalog, TransitionSettings::default());
        assert!(!show.stage().blob.material.flat_shading);

        show.scroll(1.0);
        show.advance(0.0);
        assert!(!show.stage().blob.material.flat_shading);
        show.advance(0.25);
        assert!(show.stage().blob.material.flat_shading);
    }

    #[test]
    fn single_preset_catalog_keeps_its_label() {
        let catalog = Catalog::new(vec![PRESETS[0]]).unwrap();
        let mut show = Showcase::new(catalog, TransitionSettings::default());
        assert!(show.scroll(1.0));
        settle(&mut show);
        assert_eq!(show.current(), 0);
        assert_single_label(&show);
    }

    #[test]
    fn cancelled_wipe_blocks_forever() {
        let mut show = showcase();
        show.scroll(1.0);
        show.advance(0.25);
        assert!(show.cancel_wipe());
        settle(&mut show);
        settle(&mut show);

        assert!(show.is_animating());
        assert_eq!(show.current(), 0);
        assert!(!show.scroll(1.0));
    }
}
