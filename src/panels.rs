use std::{collections::BTreeMap, f64::consts::PI, time::Duration};

use crate::{
    anim::{Tween, progress},
    anim_ease::Ease,
    composer::PanelDirector,
    core::{TargetId, Vec2, secs},
    error::{CutsceneError, CutsceneResult},
    layout::LayoutState,
    stage::Stage,
};

/// How a panel enters when revealed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InEffect {
    None,
    #[default]
    SlideFromLeft,
    SlideFromRight,
    SlideFromTop,
    SlideFromBottom,
    FadeIn,
    ScaleIn,
    PunchScale,
}

fn default_duration() -> f64 {
    0.35
}

fn default_ease() -> Ease {
    Ease::OutCubic
}

fn default_slide_offset() -> Vec2 {
    Vec2::new(500.0, 500.0)
}

fn default_start_scale() -> f64 {
    0.85
}

fn default_punch_strength() -> f64 {
    0.12
}

fn default_punch_vibrato() -> u32 {
    10
}

fn default_punch_elasticity() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PanelSpec {
    pub id: String,
    pub target: TargetId,
    #[serde(default)]
    pub in_effect: InEffect,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_ease")]
    pub ease: Ease,
    #[serde(default)]
    pub delay: f64,
    /// Slide effects use `|x|` horizontally and `|y|` vertically.
    #[serde(default = "default_slide_offset")]
    pub slide_offset: Vec2,
    #[serde(default = "default_start_scale")]
    pub start_scale: f64,
    #[serde(default = "default_punch_strength")]
    pub punch_strength: f64,
    #[serde(default = "default_punch_vibrato")]
    pub punch_vibrato: u32,
    #[serde(default = "default_punch_elasticity")]
    pub punch_elasticity: f64,
}

impl PanelSpec {
    pub fn new(id: impl Into<String>, target: impl Into<TargetId>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            in_effect: InEffect::default(),
            duration: default_duration(),
            ease: default_ease(),
            delay: 0.0,
            slide_offset: default_slide_offset(),
            start_scale: default_start_scale(),
            punch_strength: default_punch_strength(),
            punch_vibrato: default_punch_vibrato(),
            punch_elasticity: default_punch_elasticity(),
        }
    }

    pub fn with_effect(mut self, in_effect: InEffect) -> Self {
        self.in_effect = in_effect;
        self
    }

    pub fn validate(&self) -> CutsceneResult<()> {
        if self.id.trim().is_empty() {
            return Err(CutsceneError::validation("panel id must be non-empty"));
        }
        let numbers = [
            ("duration", self.duration),
            ("delay", self.delay),
            ("slide_offset.x", self.slide_offset.x),
            ("slide_offset.y", self.slide_offset.y),
            ("start_scale", self.start_scale),
            ("punch_strength", self.punch_strength),
            ("punch_elasticity", self.punch_elasticity),
        ];
        for (field, v) in numbers {
            if !v.is_finite() {
                return Err(CutsceneError::validation(format!(
                    "panel '{}': {field} must be finite",
                    self.id
                )));
            }
        }
        Ok(())
    }

    fn slide_delta(&self) -> Option<Vec2> {
        let (x, y) = (self.slide_offset.x.abs(), self.slide_offset.y.abs());
        match self.in_effect {
            InEffect::SlideFromLeft => Some(Vec2::new(-x, 0.0)),
            InEffect::SlideFromRight => Some(Vec2::new(x, 0.0)),
            InEffect::SlideFromTop => Some(Vec2::new(0.0, y)),
            InEffect::SlideFromBottom => Some(Vec2::new(0.0, -y)),
            _ => None,
        }
    }
}

/// Damped oscillation around zero; `elasticity` scales the backswing.
fn punch_offset(u: f64, strength: f64, vibrato: u32, elasticity: f64) -> f64 {
    let wave = (u * f64::from(vibrato.max(1)) * PI).sin();
    let v = strength * (1.0 - u) * wave;
    if v < 0.0 { v * elasticity } else { v }
}

#[derive(Clone, Debug)]
struct Panel {
    spec: PanelSpec,
    base_layout: LayoutState,
    base_scale: f64,
}

#[derive(Clone, Debug)]
enum Effect {
    Hold,
    Fade(Tween<f64>),
    Scale(Tween<f64>),
    Punch { duration: Duration },
    Slide(Tween<LayoutState>),
}

impl Effect {
    fn duration(&self) -> Duration {
        match self {
            Self::Hold => Duration::ZERO,
            Self::Fade(t) | Self::Scale(t) => t.duration,
            Self::Punch { duration } => *duration,
            Self::Slide(t) => t.duration,
        }
    }
}

#[derive(Clone, Debug)]
struct Playing {
    panel: String,
    effect: Effect,
    delay: Duration,
    elapsed: Duration,
}

/// Panel reveal collaborator over stage targets.
///
/// One effect plays at a time; `play_in` kills whatever was running without finishing it.
#[derive(Clone, Debug, Default)]
pub struct PanelBoard {
    panels: BTreeMap<String, Panel>,
    playing: Option<Playing>,
}

impl PanelBoard {
    /// Caches each panel's base layout and scale from the stage. Panels whose target is
    /// not on the stage are left out.
    pub fn attach(specs: &[PanelSpec], stage: &Stage) -> Self {
        let mut panels = BTreeMap::new();
        for spec in specs {
            let Some(target) = stage.get(&spec.target) else {
                tracing::warn!(panel = %spec.id, target = %spec.target, "panel target is not on the stage");
                continue;
            };
            let panel = Panel {
                spec: spec.clone(),
                base_layout: LayoutState::capture(target),
                base_scale: target.scale(),
            };
            if panels.insert(spec.id.clone(), panel).is_some() {
                tracing::warn!(panel = %spec.id, "duplicate panel id; the last one wins");
            }
        }
        Self {
            panels,
            playing: None,
        }
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.panels.contains_key(id)
    }

    /// Hides one panel without touching the others.
    pub fn hide(&mut self, stage: &mut Stage, id: &str) {
        let Some(panel) = self.panels.get(id) else {
            return;
        };
        if let Some(target) = stage.get_mut(&panel.spec.target) {
            target.set_active(false);
            target.set_opacity(0.0);
        }
    }

    fn kill(&mut self) {
        if let Some(playing) = self.playing.take() {
            tracing::trace!(panel = %playing.panel, "effect killed");
        }
    }

    fn write(&self, stage: &mut Stage, playing: &Playing) -> bool {
        let Some(panel) = self.panels.get(&playing.panel) else {
            return false;
        };
        let Some(target) = stage.get_mut(&panel.spec.target) else {
            return false;
        };
        let t = playing.elapsed.saturating_sub(playing.delay);
        match &playing.effect {
            Effect::Hold => {}
            Effect::Fade(tween) => target.set_opacity(tween.sample(t)),
            Effect::Scale(tween) => target.set_scale(tween.sample(t)),
            Effect::Punch { duration } => {
                let scale = if t >= *duration {
                    panel.base_scale
                } else {
                    let s = &panel.spec;
                    let u = progress(t, *duration);
                    panel.base_scale
                        + punch_offset(u, s.punch_strength, s.punch_vibrato, s.punch_elasticity)
                };
                target.set_scale(scale);
            }
            Effect::Slide(tween) => tween.sample(t).apply_to(target),
        }
        true
    }
}

impl PanelDirector for PanelBoard {
    fn play_in(&mut self, stage: &mut Stage, id: &str) {
        if !self.panels.contains_key(id) {
            tracing::warn!(panel = id, "unknown panel id");
            return;
        }
        self.kill();
        let Some(panel) = self.panels.get(id) else {
            return;
        };

        let spec = &panel.spec;
        let Some(target) = stage.get_mut(&spec.target) else {
            tracing::warn!(panel = id, target = %spec.target, "panel target left the stage");
            return;
        };

        target.set_active(true);
        panel.base_layout.apply_to(target);
        target.set_scale(panel.base_scale);
        target.set_opacity(1.0);
        target.set_interactive(true);

        let duration = secs(spec.duration);
        let effect = match spec.in_effect {
            InEffect::None => Effect::Hold,
            InEffect::FadeIn => {
                target.set_opacity(0.0);
                Effect::Fade(Tween::new(0.0, 1.0, duration, spec.ease))
            }
            InEffect::ScaleIn => {
                let from = panel.base_scale * spec.start_scale;
                target.set_scale(from);
                Effect::Scale(Tween::new(from, panel.base_scale, duration, spec.ease))
            }
            InEffect::PunchScale => Effect::Punch { duration },
            InEffect::SlideFromLeft
            | InEffect::SlideFromRight
            | InEffect::SlideFromTop
            | InEffect::SlideFromBottom => {
                let delta = spec.slide_delta().unwrap_or(Vec2::ZERO);
                let from = panel.base_layout.shifted(delta);
                from.apply_to(target);
                Effect::Slide(Tween::new(from, panel.base_layout, duration, spec.ease))
            }
        };

        let playing = Playing {
            panel: id.to_string(),
            delay: secs(spec.delay),
            effect,
            elapsed: Duration::ZERO,
        };
        if playing.delay.saturating_add(playing.effect.duration()).is_zero() {
            self.write(stage, &playing);
            return;
        }
        tracing::debug!(panel = id, effect = ?spec.in_effect, "panel play_in");
        self.playing = Some(playing);
    }

    fn is_busy(&self) -> bool {
        self.playing.is_some()
    }

    fn reset_all(&mut self, stage: &mut Stage, immediate: bool) {
        self.kill();
        for panel in self.panels.values() {
            let Some(target) = stage.get_mut(&panel.spec.target) else {
                continue;
            };
            target.set_active(true);
            target.set_opacity(0.0);
            panel.base_layout.apply_to(target);
            target.set_scale(panel.base_scale);
            if immediate {
                target.set_active(false);
            }
        }
    }

    fn tick(&mut self, stage: &mut Stage, dt: Duration) {
        let Some(mut playing) = self.playing.take() else {
            return;
        };
        playing.elapsed += dt;
        if !self.write(stage, &playing) {
            tracing::warn!(panel = %playing.panel, "panel target left the stage");
            return;
        }
        if playing.elapsed < playing.delay.saturating_add(playing.effect.duration()) {
            self.playing = Some(playing);
        }
    }
}
