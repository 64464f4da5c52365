use std::collections::BTreeMap;

use crate::{
    bubbles::BubbleConfig,
    core::{Direction, TargetId},
    dialogue::DialogueConfig,
    error::{CutsceneError, CutsceneResult},
    flow::FlowConfig,
    headless::HeadlessTarget,
    panels::PanelSpec,
    stage::Stage,
};

fn default_duration() -> f64 {
    0.35
}

fn default_distance() -> f64 {
    500.0
}

fn default_chars_per_second() -> f64 {
    35.0
}

fn default_wait() -> f64 {
    0.5
}

fn default_direction() -> Direction {
    Direction::Left
}

fn default_half() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GroupMode {
    /// Starts a new click-triggered batch (the batch leader).
    #[default]
    AfterPrevious,
    /// Runs together with the preceding leader.
    WithPrevious,
}

/// What a step does. Each variant carries only the parameters it needs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    SlideIn {
        #[serde(default = "default_direction")]
        direction: Direction,
        #[serde(default = "default_distance")]
        distance: f64,
        #[serde(default = "default_duration")]
        duration: f64,
    },
    SlideOut {
        #[serde(default = "default_direction")]
        direction: Direction,
        #[serde(default = "default_distance")]
        distance: f64,
        #[serde(default = "default_duration")]
        duration: f64,
    },
    FadeIn {
        #[serde(default = "default_duration")]
        duration: f64,
    },
    FadeOut {
        #[serde(default = "default_duration")]
        duration: f64,
    },
    TypeText {
        #[serde(default)]
        text: String,
        #[serde(default = "default_chars_per_second")]
        chars_per_second: f64,
    },
    WaitSeconds {
        #[serde(default = "default_wait")]
        seconds: f64,
    },
    WaitClick,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SlideIn { .. } => "SlideIn",
            Self::SlideOut { .. } => "SlideOut",
            Self::FadeIn { .. } => "FadeIn",
            Self::FadeOut { .. } => "FadeOut",
            Self::TypeText { .. } => "TypeText",
            Self::WaitSeconds { .. } => "WaitSeconds",
            Self::WaitClick => "WaitClick",
        }
    }

    pub fn needs_target(&self) -> bool {
        !matches!(self, Self::WaitSeconds { .. } | Self::WaitClick)
    }

    /// Slides read endpoints from the layout snapshot store.
    pub fn needs_layout(&self) -> bool {
        matches!(self, Self::SlideIn { .. } | Self::SlideOut { .. })
    }

    pub fn is_fade(&self) -> bool {
        matches!(self, Self::FadeIn { .. } | Self::FadeOut { .. })
    }

    fn numbers(&self) -> Vec<(&'static str, f64)> {
        match self {
            Self::SlideIn {
                distance, duration, ..
            }
            | Self::SlideOut {
                distance, duration, ..
            } => vec![("distance", *distance), ("duration", *duration)],
            Self::FadeIn { duration } | Self::FadeOut { duration } => {
                vec![("duration", *duration)]
            }
            Self::TypeText {
                chars_per_second, ..
            } => vec![("chars_per_second", *chars_per_second)],
            Self::WaitSeconds { seconds } => vec![("seconds", *seconds)],
            Self::WaitClick => vec![],
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetId>,
    #[serde(flatten)]
    pub action: Action,
    #[serde(default)]
    pub group: GroupMode,
}

impl Step {
    pub fn new(target: Option<TargetId>, action: Action) -> Self {
        Self {
            target,
            action,
            group: GroupMode::AfterPrevious,
        }
    }

    pub fn with_previous(mut self) -> Self {
        self.group = GroupMode::WithPrevious;
        self
    }

    pub fn validate(&self, index: usize) -> CutsceneResult<()> {
        for (field, v) in self.action.numbers() {
            if !v.is_finite() {
                return Err(CutsceneError::validation(format!(
                    "step {index} ({}): {field} must be finite",
                    self.action.name()
                )));
            }
        }
        if let Some(target) = &self.target
            && target.as_str().trim().is_empty()
        {
            return Err(CutsceneError::validation(format!(
                "step {index}: target key must be non-empty"
            )));
        }
        Ok(())
    }
}

pub fn validate_steps(steps: &[Step]) -> CutsceneResult<()> {
    for (i, step) in steps.iter().enumerate() {
        step.validate(i)?;
    }
    Ok(())
}

/// Coarse-grained instruction delegated to a collaborator.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "step")]
pub enum MacroStep {
    RevealPanel {
        panel_id: String,
    },
    ShowBubble {
        #[serde(default = "default_half")]
        x01: f64,
        #[serde(default = "default_half")]
        y01: f64,
        #[serde(default)]
        text: String,
    },
    WaitSeconds {
        #[serde(default = "default_wait")]
        seconds: f64,
    },
    ClearBubbles,
    ResetPanels,
}

impl MacroStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RevealPanel { .. } => "RevealPanel",
            Self::ShowBubble { .. } => "ShowBubble",
            Self::WaitSeconds { .. } => "WaitSeconds",
            Self::ClearBubbles => "ClearBubbles",
            Self::ResetPanels => "ResetPanels",
        }
    }

    pub fn validate(&self, index: usize) -> CutsceneResult<()> {
        let bad = match self {
            Self::ShowBubble { x01, y01, .. } => !(x01.is_finite() && y01.is_finite()),
            Self::WaitSeconds { seconds } => !seconds.is_finite(),
            _ => false,
        };
        if bad {
            return Err(CutsceneError::validation(format!(
                "macro step {index} ({}): numbers must be finite",
                self.name()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SchedulerConfig {
    /// When false, pulses only feed `WaitClick` steps and the host advances explicitly.
    #[serde(default = "default_true")]
    pub click_to_advance: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            click_to_advance: true,
        }
    }
}

/// A complete authored presentation: headless targets, the step list, an optional
/// dialogue phase, and a click timeline for offline simulation.
///
/// The dialogue phase is driven either by `macro_steps` or by a `dialogue` panel, never
/// both.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: SchedulerConfig,
    #[serde(default)]
    pub targets: BTreeMap<TargetId, HeadlessTarget>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub macro_steps: Vec<MacroStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<PanelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bubbles: Option<BubbleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<DialogueConfig>,
    #[serde(default)]
    pub flow: FlowConfig,
    /// Click times in seconds from the start of the simulation.
    #[serde(default)]
    pub clicks: Vec<f64>,
}

impl Script {
    pub fn from_json(s: &str) -> CutsceneResult<Self> {
        let script: Self = serde_json::from_str(s)?;
        script.validate()?;
        Ok(script)
    }

    pub fn to_json_pretty(&self) -> CutsceneResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> CutsceneResult<()> {
        validate_steps(&self.steps)?;
        for (i, step) in self.macro_steps.iter().enumerate() {
            step.validate(i)?;
        }
        for panel in &self.panels {
            panel.validate()?;
        }
        if let Some(bubbles) = &self.bubbles {
            bubbles.validate()?;
        }
        if let Some(dialogue) = &self.dialogue {
            if !self.macro_steps.is_empty() {
                return Err(CutsceneError::validation(
                    "macro_steps and dialogue are mutually exclusive",
                ));
            }
            dialogue.validate()?;
        }
        self.flow.validate()?;
        if let Some(bad) = self.clicks.iter().find(|c| !c.is_finite() || **c < 0.0) {
            return Err(CutsceneError::validation(format!(
                "click time {bad} must be finite and >= 0"
            )));
        }
        Ok(())
    }

    /// A fresh stage holding a copy of every scripted target.
    pub fn build_stage(&self) -> Stage {
        let mut stage = Stage::new();
        for (key, target) in &self.targets {
            stage.insert(key.clone(), target.clone());
        }
        stage
    }

    /// Step targets with no matching entry in `targets`. These steps will be skipped at
    /// run time, which is tolerated but usually an authoring mistake.
    pub fn unresolved_targets(&self) -> Vec<(usize, TargetId)> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let id = s.target.as_ref()?;
                (!self.targets.contains_key(id)).then(|| (i, id.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_json_uses_flat_action_tag() {
        let step: Step = serde_json::from_str(
            r#"{ "target": "hero", "action": "SlideIn", "direction": "Right", "group": "WithPrevious" }"#,
        )
        .unwrap();
        assert_eq!(step.target, Some(TargetId::from("hero")));
        assert_eq!(step.group, GroupMode::WithPrevious);
        assert_eq!(
            step.action,
            Action::SlideIn {
                direction: Direction::Right,
                distance: 500.0,
                duration: 0.35,
            }
        );
    }

    #[test]
    fn wait_click_needs_no_target() {
        let step: Step = serde_json::from_str(r#"{ "action": "WaitClick" }"#).unwrap();
        assert!(step.target.is_none());
        assert!(!step.action.needs_target());
        assert_eq!(step.group, GroupMode::AfterPrevious);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let step = Step::new(
            Some(TargetId::from("a")),
            Action::FadeIn {
                duration: f64::INFINITY,
            },
        );
        let err = validate_steps(&[step]).unwrap_err();
        assert!(err.to_string().contains("duration must be finite"));
    }

    #[test]
    fn negative_durations_are_valid() {
        let step = Step::new(Some(TargetId::from("a")), Action::FadeOut { duration: -1.0 });
        assert!(step.validate(0).is_ok());
    }

    #[test]
    fn unresolved_targets_are_reported() {
        let script = Script::from_json(
            r#"{
                "targets": { "a": {} },
                "steps": [
                    { "target": "a", "action": "FadeIn" },
                    { "target": "ghost", "action": "FadeIn" },
                    { "action": "WaitSeconds" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(
            script.unresolved_targets(),
            vec![(1, TargetId::from("ghost"))]
        );
    }

    #[test]
    fn negative_click_times_fail_validation() {
        let err = Script::from_json(r#"{ "clicks": [0.5, -1.0] }"#).unwrap_err();
        assert!(matches!(err, CutsceneError::Validation(_)));
    }

    #[test]
    fn dialogue_block_parses_and_excludes_macro_steps() {
        let script = Script::from_json(
            r#"{
                "dialogue": {
                    "root": "gal",
                    "text": "line",
                    "lines": [{ "text": "hello" }, { "character": "sad", "text": "bye" }]
                }
            }"#,
        )
        .unwrap();
        let dialogue = script.dialogue.as_ref().unwrap();
        assert_eq!(dialogue.lines.len(), 2);
        assert_eq!(dialogue.lines[1].character.as_deref(), Some("sad"));

        let err = Script::from_json(
            r#"{
                "macro_steps": [{ "step": "WaitSeconds", "seconds": 1.0 }],
                "dialogue": { "root": "gal" }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CutsceneError::Validation(_)));
    }

    #[test]
    fn macro_steps_parse_with_defaults() {
        let step: MacroStep =
            serde_json::from_str(r#"{ "step": "ShowBubble", "text": "hi" }"#).unwrap();
        assert_eq!(
            step,
            MacroStep::ShowBubble {
                x01: 0.5,
                y01: 0.5,
                text: "hi".to_string()
            }
        );
    }
}
