//! Two-phase presentation: a step run, then a dialogue.
//!
//! When the step scheduler finishes, the comic root fades out and stops accepting
//! input, and after a short hold the dialogue collaborator starts. That is either a
//! macro-step composer or a line-by-line dialogue panel.

use std::time::Duration;

use crate::{
    anim::{Tween, fade},
    bubbles::BubbleBoard,
    clock::{Clock, InputSource},
    composer::{CinematicComposer, MacroOutcome},
    core::{TargetId, secs},
    dialogue::DialoguePanel,
    error::{CutsceneError, CutsceneResult},
    model::Script,
    panels::PanelBoard,
    pulse::PulseSlot,
    scheduler::{StepScheduler, TickOutcome},
    stage::Stage,
};

fn default_comic_fade_out() -> f64 {
    0.25
}

fn default_delay_after_switch() -> f64 {
    0.05
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlowConfig {
    /// Target faded out when the step run finishes. Only that root, not a parent of
    /// the dialogue targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comic_root: Option<TargetId>,
    #[serde(default = "default_comic_fade_out")]
    pub comic_fade_out: f64,
    #[serde(default = "default_delay_after_switch")]
    pub delay_after_switch: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            comic_root: None,
            comic_fade_out: default_comic_fade_out(),
            delay_after_switch: default_delay_after_switch(),
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> CutsceneResult<()> {
        if !(self.comic_fade_out.is_finite() && self.delay_after_switch.is_finite()) {
            return Err(CutsceneError::validation(
                "flow: comic_fade_out and delay_after_switch must be finite",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum Phase {
    Comic,
    FadingOut,
    Holding,
    Dialogue,
    Done,
    /// The step run finished but there is no dialogue to hand off to.
    Stalled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowTick {
    pub comic: TickOutcome,
    pub dialogue: MacroOutcome,
    /// Set on the tick a new phase was entered.
    pub entered: Option<Phase>,
}

/// What the flow hands off to once the step run is over.
#[derive(Debug)]
pub enum Dialogue {
    Composer(CinematicComposer),
    Panel(DialoguePanel),
}

impl From<CinematicComposer> for Dialogue {
    fn from(composer: CinematicComposer) -> Self {
        Self::Composer(composer)
    }
}

impl From<DialoguePanel> for Dialogue {
    fn from(panel: DialoguePanel) -> Self {
        Self::Panel(panel)
    }
}

impl Dialogue {
    /// Puts the collaborator in its hidden, not-started state.
    pub fn hide(&mut self, stage: &mut Stage) {
        match self {
            Self::Composer(composer) => composer.reset(stage),
            Self::Panel(panel) => panel.hide_instant(stage),
        }
    }

    pub fn begin(&mut self, stage: &mut Stage) {
        match self {
            Self::Composer(composer) => {
                composer.reset(stage);
                composer.advance(stage);
            }
            Self::Panel(panel) => panel.begin(stage),
        }
    }

    pub fn trigger(&self) {
        match self {
            Self::Composer(composer) => composer.trigger(),
            Self::Panel(panel) => panel.trigger(),
        }
    }

    pub fn tick(&mut self, stage: &mut Stage, dt: Duration) -> MacroOutcome {
        match self {
            Self::Composer(composer) => composer.tick(stage, dt),
            Self::Panel(panel) => panel.tick(stage, dt),
        }
    }
}

pub struct PhaseFlow {
    config: FlowConfig,
    scheduler: StepScheduler,
    dialogue: Option<Dialogue>,
    input: PulseSlot,
    phase: Phase,
    fade: Option<Tween<f64>>,
    elapsed: Duration,
}

impl std::fmt::Debug for PhaseFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseFlow")
            .field("phase", &self.phase)
            .field("scheduler", &self.scheduler)
            .field("dialogue", &self.dialogue)
            .finish_non_exhaustive()
    }
}

impl PhaseFlow {
    pub fn new(
        config: FlowConfig,
        scheduler: StepScheduler,
        dialogue: Option<Dialogue>,
    ) -> Self {
        Self {
            config,
            scheduler,
            dialogue,
            input: PulseSlot::new(),
            phase: Phase::Comic,
            fade: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Wires a script's step list and its dialogue. A `dialogue` block selects the
    /// dialogue panel; otherwise the macro steps drive a composer whose panels attach to
    /// the targets already on `stage`.
    pub fn from_script(script: &Script, stage: &Stage) -> Self {
        let scheduler = StepScheduler::new(script.steps.clone(), script.config.clone());
        if let Some(dialogue) = &script.dialogue {
            let panel = DialoguePanel::new(dialogue.clone());
            return Self::new(script.flow.clone(), scheduler, Some(panel.into()));
        }
        let mut composer = CinematicComposer::new(script.macro_steps.clone());
        if !script.panels.is_empty() {
            composer = composer.with_panels(PanelBoard::attach(&script.panels, stage));
        }
        if let Some(bubbles) = &script.bubbles {
            composer = composer.with_bubbles(BubbleBoard::new(bubbles.clone()));
        }
        Self::new(script.flow.clone(), scheduler, Some(composer.into()))
    }

    /// Input side; pulses go to whichever phase is accepting them.
    pub fn pulse(&self) -> PulseSlot {
        self.input.clone()
    }

    pub fn trigger(&self) {
        self.input.raise();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scheduler(&self) -> &StepScheduler {
        &self.scheduler
    }

    pub fn dialogue(&self) -> Option<&Dialogue> {
        self.dialogue.as_ref()
    }

    pub fn composer(&self) -> Option<&CinematicComposer> {
        match self.dialogue.as_ref()? {
            Dialogue::Composer(composer) => Some(composer),
            Dialogue::Panel(_) => None,
        }
    }

    pub fn dialogue_panel(&self) -> Option<&DialoguePanel> {
        match self.dialogue.as_ref()? {
            Dialogue::Panel(panel) => Some(panel),
            Dialogue::Composer(_) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Stalled)
    }

    /// Shows the comic root, hides the dialogue and poses the step run.
    pub fn awake(&mut self, stage: &mut Stage) {
        if let Some(root) = self.config.comic_root.as_ref()
            && let Some(target) = stage.get_mut(root)
        {
            target.set_opacity(1.0);
            target.set_interactive(true);
        }
        if let Some(dialogue) = self.dialogue.as_mut() {
            dialogue.hide(stage);
        }
        self.scheduler.awake(stage);
    }

    pub fn tick(&mut self, stage: &mut Stage, dt: Duration) -> FlowTick {
        let mut out = FlowTick::default();
        if self.input.take() {
            match self.phase {
                Phase::Comic => self.scheduler.trigger(),
                Phase::Dialogue => {
                    if let Some(dialogue) = self.dialogue.as_ref() {
                        dialogue.trigger();
                    }
                }
                _ => tracing::trace!(phase = ?self.phase, "pulse dropped"),
            }
        }

        match self.phase {
            Phase::Comic => {
                out.comic = self.scheduler.tick(stage, dt);
                if out.comic.finished {
                    out.entered = Some(self.hand_off(stage));
                }
            }
            Phase::FadingOut => {
                self.elapsed += dt;
                let Some(tween) = self.fade.as_ref() else {
                    out.entered = Some(self.enter(Phase::Holding));
                    return out;
                };
                let opacity = tween.sample(self.elapsed);
                let complete = tween.is_complete(self.elapsed);
                if let Some(root) = self.config.comic_root.as_ref()
                    && let Some(target) = stage.get_mut(root)
                {
                    target.set_opacity(opacity);
                    if complete {
                        target.set_interactive(false);
                    }
                }
                if complete {
                    self.fade = None;
                    out.entered = Some(self.enter(Phase::Holding));
                }
            }
            Phase::Holding => {
                self.elapsed += dt;
                if self.elapsed >= secs(self.config.delay_after_switch) {
                    if let Some(dialogue) = self.dialogue.as_mut() {
                        dialogue.begin(stage);
                    }
                    out.entered = Some(self.enter(Phase::Dialogue));
                }
            }
            Phase::Dialogue => {
                if let Some(dialogue) = self.dialogue.as_mut() {
                    out.dialogue = dialogue.tick(stage, dt);
                    if out.dialogue.finished {
                        out.entered = Some(self.enter(Phase::Done));
                    }
                }
            }
            Phase::Done | Phase::Stalled => {}
        }
        out
    }

    pub fn drive(
        &mut self,
        stage: &mut Stage,
        clock: &mut dyn Clock,
        input: &mut dyn InputSource,
    ) -> FlowTick {
        if input.poll_trigger_pulse() {
            self.input.raise();
        }
        let dt = clock.elapsed_since_last_tick();
        self.tick(stage, dt)
    }

    fn enter(&mut self, phase: Phase) -> Phase {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
        self.elapsed = Duration::ZERO;
        phase
    }

    fn hand_off(&mut self, stage: &mut Stage) -> Phase {
        if self.dialogue.is_none() {
            let err = CutsceneError::collaborator("no dialogue to hand the flow to");
            tracing::error!(error = %err, "flow stalled");
            return self.enter(Phase::Stalled);
        }
        let Some(root) = self.config.comic_root.as_ref() else {
            tracing::warn!("comic_root is not set; skipping the fade out");
            return self.enter(Phase::Holding);
        };
        let Some(target) = stage.get_mut(root) else {
            tracing::warn!(target = %root, "comic_root is not on the stage; skipping the fade out");
            return self.enter(Phase::Holding);
        };
        target.set_opacity(1.0);
        target.set_interactive(true);
        self.fade = Some(fade(1.0, 0.0, secs(self.config.comic_fade_out)));
        self.enter(Phase::FadingOut)
    }
}
