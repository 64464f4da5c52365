//! Visual-novel dialogue panel.
//!
//! `begin` fades the root, background, character and dialogue box in one after another,
//! then types the first line. A click while a line is typing reveals the rest of it; a
//! click on a fully shown line switches to the next one, optionally fading the character
//! and box out and back in around the switch. A click on the last line finishes the panel.

use std::{collections::VecDeque, task::Poll, time::Duration};

use crate::{
    anim::{Tween, Typewriter, VISIBLE_EPSILON, fade},
    composer::MacroOutcome,
    core::{TargetId, secs},
    error::{CutsceneError, CutsceneResult},
    pulse::PulseSlot,
    stage::Stage,
    task::{Task, TickCtx},
};

fn default_root_fade_in() -> f64 {
    0.35
}

fn default_part_fade_in() -> f64 {
    0.25
}

fn default_box_fade_in() -> f64 {
    0.2
}

fn default_chars_per_second() -> f64 {
    35.0
}

fn default_switch_fade() -> f64 {
    0.12
}

fn default_switch_hold() -> f64 {
    0.02
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DialogueLine {
    /// Sprite key for the character target. `None` keeps whatever is showing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl DialogueLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            character: None,
            text: text.into(),
        }
    }

    pub fn with_character(mut self, sprite: impl Into<String>) -> Self {
        self.character = Some(sprite.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DialogueConfig {
    pub root: TargetId,
    #[serde(default = "default_root_fade_in")]
    pub root_fade_in: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<TargetId>,
    #[serde(default = "default_part_fade_in")]
    pub background_fade_in: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<TargetId>,
    #[serde(default = "default_part_fade_in")]
    pub character_fade_in: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_box: Option<TargetId>,
    #[serde(default = "default_box_fade_in")]
    pub box_fade_in: f64,
    /// Text target the lines are typed into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TargetId>,
    /// Non-positive rates show each line at once.
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: f64,
    #[serde(default)]
    pub lines: Vec<DialogueLine>,
    /// Fade the character and box out and back in when switching lines.
    #[serde(default = "default_true")]
    pub fade_between_lines: bool,
    #[serde(default = "default_switch_fade")]
    pub switch_fade_out: f64,
    #[serde(default = "default_switch_fade")]
    pub switch_fade_in: f64,
    #[serde(default = "default_switch_hold")]
    pub switch_hold: f64,
}

impl DialogueConfig {
    pub fn new(root: impl Into<TargetId>) -> Self {
        Self {
            root: root.into(),
            root_fade_in: default_root_fade_in(),
            background: None,
            background_fade_in: default_part_fade_in(),
            character: None,
            character_fade_in: default_part_fade_in(),
            dialogue_box: None,
            box_fade_in: default_box_fade_in(),
            text: None,
            chars_per_second: default_chars_per_second(),
            lines: Vec::new(),
            fade_between_lines: true,
            switch_fade_out: default_switch_fade(),
            switch_fade_in: default_switch_fade(),
            switch_hold: default_switch_hold(),
        }
    }

    pub fn validate(&self) -> CutsceneResult<()> {
        if self.root.as_str().trim().is_empty() {
            return Err(CutsceneError::validation("dialogue: root must be non-empty"));
        }
        let numbers = [
            ("root_fade_in", self.root_fade_in),
            ("background_fade_in", self.background_fade_in),
            ("character_fade_in", self.character_fade_in),
            ("box_fade_in", self.box_fade_in),
            ("chars_per_second", self.chars_per_second),
            ("switch_fade_out", self.switch_fade_out),
            ("switch_fade_in", self.switch_fade_in),
            ("switch_hold", self.switch_hold),
        ];
        for (field, v) in numbers {
            if !v.is_finite() {
                return Err(CutsceneError::validation(format!(
                    "dialogue: {field} must be finite"
                )));
            }
        }
        Ok(())
    }

    /// Every target whose opacity the panel drives, root first.
    fn faded_parts(&self) -> impl Iterator<Item = &TargetId> {
        std::iter::once(&self.root)
            .chain(self.background.as_ref())
            .chain(self.character.as_ref())
            .chain(self.dialogue_box.as_ref())
    }
}

#[derive(Clone, Debug)]
enum Cue {
    /// `from: None` starts at the target's current opacity.
    Fade {
        target: TargetId,
        from: Option<f64>,
        to: f64,
        seconds: f64,
    },
    Hold(f64),
    Line(usize),
    Type,
}

#[derive(Debug)]
enum Beat {
    Fade {
        target: TargetId,
        tween: Tween<f64>,
        elapsed: Duration,
    },
    Hold {
        remaining: Duration,
    },
    Type {
        target: TargetId,
        writer: Typewriter,
        elapsed: Duration,
    },
}

impl<'a> Task<TickCtx<'a>> for Beat {
    fn poll(&mut self, cx: &mut TickCtx<'a>) -> Poll<()> {
        let done = match self {
            Self::Fade {
                target,
                tween,
                elapsed,
            } => {
                *elapsed += cx.dt;
                let Some(t) = cx.stage.get_mut(target) else {
                    return Poll::Ready(());
                };
                t.set_opacity(tween.sample(*elapsed));
                let done = tween.is_complete(*elapsed);
                if done {
                    t.set_interactive(tween.to > VISIBLE_EPSILON);
                }
                done
            }
            Self::Hold { remaining } => {
                *remaining = remaining.saturating_sub(cx.dt);
                remaining.is_zero()
            }
            Self::Type {
                target,
                writer,
                elapsed,
            } => {
                *elapsed += cx.dt;
                let Some(buffer) = cx.stage.get_mut(target).and_then(|t| t.text()) else {
                    return Poll::Ready(());
                };
                buffer.set_visible_character_count(writer.visible_at(*elapsed));
                writer.is_complete(*elapsed)
            }
        };
        if done { Poll::Ready(()) } else { Poll::Pending }
    }
}

/// Click-driven dialogue panel over stage targets.
///
/// Beats run strictly one after another; a beat started on a tick is first advanced on
/// the next one.
pub struct DialoguePanel {
    config: DialogueConfig,
    cues: VecDeque<Cue>,
    active: Option<Beat>,
    pulse: PulseSlot,
    line: usize,
    playing: bool,
    finished: bool,
    outcome: MacroOutcome,
    listeners: Vec<Box<dyn FnMut()>>,
}

impl std::fmt::Debug for DialoguePanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialoguePanel")
            .field("line", &self.line)
            .field("line_count", &self.config.lines.len())
            .field("playing", &self.playing)
            .field("finished", &self.finished)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl DialoguePanel {
    /// Parts that point at the root itself are dropped so one target is not faded twice.
    pub fn new(mut config: DialogueConfig) -> Self {
        let root = config.root.clone();
        for (name, part) in [
            ("background", &mut config.background),
            ("character", &mut config.character),
            ("dialogue_box", &mut config.dialogue_box),
        ] {
            if part.as_ref() == Some(&root) {
                tracing::warn!(part = name, %root, "dialogue part is the root; ignoring it");
                *part = None;
            }
        }
        Self {
            config,
            cues: VecDeque::new(),
            active: None,
            pulse: PulseSlot::new(),
            line: 0,
            playing: false,
            finished: false,
            outcome: MacroOutcome::default(),
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.config
    }

    pub fn pulse(&self) -> PulseSlot {
        self.pulse.clone()
    }

    pub fn trigger(&self) {
        self.pulse.raise();
    }

    /// Index of the line currently shown.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn line_count(&self) -> usize {
        self.config.lines.len()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_typing(&self) -> bool {
        matches!(self.active, Some(Beat::Type { .. }))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn on_finished(&mut self, listener: impl FnMut() + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Stops everything and hides every part; the root is deactivated.
    #[tracing::instrument(skip_all)]
    pub fn hide_instant(&mut self, stage: &mut Stage) {
        self.cues.clear();
        self.active = None;
        self.pulse.clear();
        self.line = 0;
        self.playing = false;
        self.finished = false;
        self.outcome = MacroOutcome::default();

        for id in self.config.faded_parts() {
            if let Some(target) = stage.get_mut(id) {
                target.set_opacity(0.0);
                target.set_interactive(false);
            }
        }
        self.clear_text(stage);
        if let Some(root) = stage.get_mut(&self.config.root) {
            root.set_active(false);
        }
    }

    /// Shows the panel and starts on the first line. Ignored while already playing.
    pub fn begin(&mut self, stage: &mut Stage) {
        if self.playing {
            return;
        }
        let cfg = &self.config;
        if stage.get(&cfg.root).is_none() {
            tracing::warn!(root = %cfg.root, "dialogue root is not on the stage");
        }
        for id in cfg.faded_parts().chain(cfg.text.as_ref()) {
            if let Some(target) = stage.get_mut(id) {
                target.set_active(true);
            }
        }
        for id in cfg.faded_parts() {
            if let Some(target) = stage.get_mut(id) {
                target.set_opacity(0.0);
                target.set_interactive(false);
            }
        }
        self.clear_text(stage);

        self.playing = true;
        self.finished = false;
        self.line = 0;
        self.active = None;
        self.cues.clear();

        let cfg = &self.config;
        let mut cues = vec![fade_in(&cfg.root, cfg.root_fade_in)];
        cues.extend(cfg.background.as_ref().map(|id| fade_in(id, cfg.background_fade_in)));
        if !cfg.lines.is_empty() {
            cues.push(Cue::Line(0));
        }
        cues.extend(cfg.character.as_ref().map(|id| fade_in(id, cfg.character_fade_in)));
        cues.extend(cfg.dialogue_box.as_ref().map(|id| fade_in(id, cfg.box_fade_in)));
        if !cfg.lines.is_empty() {
            cues.push(Cue::Type);
        }
        self.cues.extend(cues);

        tracing::debug!(lines = self.config.lines.len(), "dialogue begin");
        self.start_ready(stage);
    }

    pub fn tick(&mut self, stage: &mut Stage, dt: Duration) -> MacroOutcome {
        if let Some(beat) = self.active.as_mut() {
            let typing = matches!(beat, Beat::Type { .. });
            let mut cx = TickCtx {
                stage: &mut *stage,
                dt,
                pulse: &self.pulse,
            };
            if beat.poll(&mut cx).is_ready() {
                self.active = None;
                if typing {
                    self.outcome.completed = Some(self.line);
                }
                self.start_ready(stage);
            }
        }

        if self.pulse.take() {
            self.click(stage);
        }
        std::mem::take(&mut self.outcome)
    }

    fn click(&mut self, stage: &mut Stage) {
        if !self.playing || self.finished {
            tracing::trace!("pulse dropped: dialogue is not playing");
            return;
        }
        if let Some(Beat::Type { target, writer, .. }) = self.active.as_ref() {
            if let Some(buffer) = stage.get_mut(target).and_then(|t| t.text()) {
                buffer.set_visible_character_count(writer.total);
            }
            tracing::debug!(line = self.line, "typing skipped");
            self.active = None;
            self.outcome.completed = Some(self.line);
            self.start_ready(stage);
            return;
        }
        if self.active.is_some() || !self.cues.is_empty() {
            tracing::trace!(line = self.line, "pulse dropped: line is switching");
            return;
        }
        self.advance(stage);
    }

    fn advance(&mut self, stage: &mut Stage) {
        let next = self.line + 1;
        if next >= self.config.lines.len() {
            self.finish();
            return;
        }

        let cfg = &self.config;
        let switched: Vec<&TargetId> = if cfg.fade_between_lines {
            cfg.character.iter().chain(cfg.dialogue_box.iter()).collect()
        } else {
            Vec::new()
        };
        let mut cues = Vec::new();
        for id in &switched {
            cues.push(Cue::Fade {
                target: (*id).clone(),
                from: None,
                to: 0.0,
                seconds: cfg.switch_fade_out,
            });
        }
        if cfg.fade_between_lines {
            cues.push(Cue::Hold(cfg.switch_hold));
        }
        cues.push(Cue::Line(next));
        for id in &switched {
            cues.push(fade_in(id, cfg.switch_fade_in));
        }
        cues.push(Cue::Type);
        self.cues.extend(cues);
        self.start_ready(stage);
    }

    fn finish(&mut self) {
        self.finished = true;
        self.playing = false;
        self.outcome.finished = true;
        tracing::info!(lines = self.config.lines.len(), "dialogue finished");
        for listener in &mut self.listeners {
            listener();
        }
    }

    /// Starts queued cues until one of them needs time to run.
    fn start_ready(&mut self, stage: &mut Stage) {
        while self.active.is_none() {
            let Some(cue) = self.cues.pop_front() else {
                return;
            };
            self.active = self.start(cue, stage);
        }
    }

    fn start(&mut self, cue: Cue, stage: &mut Stage) -> Option<Beat> {
        match cue {
            Cue::Fade {
                target,
                from,
                to,
                seconds,
            } => {
                let Some(t) = stage.get_mut(&target) else {
                    tracing::warn!(part = %target, "dialogue part is not on the stage");
                    return None;
                };
                let from = from.unwrap_or_else(|| t.opacity());
                let tween = fade(from, to, secs(seconds));
                if tween.is_instant() {
                    t.set_opacity(to);
                    t.set_interactive(to > VISIBLE_EPSILON);
                    return None;
                }
                t.set_opacity(from);
                t.set_interactive(true);
                Some(Beat::Fade {
                    target,
                    tween,
                    elapsed: Duration::ZERO,
                })
            }
            Cue::Hold(seconds) => {
                let remaining = secs(seconds);
                (!remaining.is_zero()).then_some(Beat::Hold { remaining })
            }
            Cue::Line(index) => {
                self.line = index;
                let sprite = self.config.lines.get(index).and_then(|l| l.character.as_ref());
                if let Some(id) = self.config.character.as_ref()
                    && let Some(sprite) = sprite
                    && let Some(t) = stage.get_mut(id)
                {
                    t.set_sprite(sprite);
                }
                self.clear_text(stage);
                tracing::debug!(line = index, "dialogue line");
                self.outcome.started = Some(index);
                None
            }
            Cue::Type => {
                let text = self
                    .config
                    .lines
                    .get(self.line)
                    .map_or("", |l| l.text.as_str());
                let Some(id) = self.config.text.as_ref() else {
                    self.outcome.completed = Some(self.line);
                    return None;
                };
                let Some(buffer) = stage.get_mut(id).and_then(|t| t.text()) else {
                    tracing::warn!(part = %id, "dialogue text target has no text buffer");
                    self.outcome.completed = Some(self.line);
                    return None;
                };
                buffer.set_full_text(text);
                let writer = Typewriter::new(buffer.character_count(), self.config.chars_per_second);
                if writer.is_instant() {
                    buffer.set_visible_character_count(writer.total);
                    self.outcome.completed = Some(self.line);
                    return None;
                }
                buffer.set_visible_character_count(0);
                Some(Beat::Type {
                    target: id.clone(),
                    writer,
                    elapsed: Duration::ZERO,
                })
            }
        }
    }

    fn clear_text(&self, stage: &mut Stage) {
        if let Some(id) = self.config.text.as_ref()
            && let Some(buffer) = stage.get_mut(id).and_then(|t| t.text())
        {
            buffer.set_full_text("");
            buffer.set_visible_character_count(0);
        }
    }
}

fn fade_in(target: &TargetId, seconds: f64) -> Cue {
    Cue::Fade {
        target: target.clone(),
        from: Some(0.0),
        to: 1.0,
        seconds,
    }
}
