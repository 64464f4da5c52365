use std::collections::BTreeMap;

use crate::{
    bubbles::BubbleConfig,
    core::{Direction, TargetId},
    dialogue::DialogueConfig,
    error::{CutsceneError, CutsceneResult},
    flow::FlowConfig,
    headless::HeadlessTarget,
    model::{Action, GroupMode, MacroStep, SchedulerConfig, Script, Step, validate_steps},
    panels::PanelSpec,
};

pub struct ScriptBuilder {
    config: SchedulerConfig,
    targets: BTreeMap<TargetId, HeadlessTarget>,
    steps: Vec<Step>,
    macro_steps: Vec<MacroStep>,
    panels: Vec<PanelSpec>,
    bubbles: Option<BubbleConfig>,
    dialogue: Option<DialogueConfig>,
    flow: FlowConfig,
    clicks: Vec<f64>,
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            targets: BTreeMap::new(),
            steps: Vec::new(),
            macro_steps: Vec::new(),
            panels: Vec::new(),
            bubbles: None,
            dialogue: None,
            flow: FlowConfig::default(),
            clicks: Vec::new(),
        }
    }

    pub fn click_to_advance(mut self, on: bool) -> Self {
        self.config.click_to_advance = on;
        self
    }

    pub fn target(
        mut self,
        key: impl Into<TargetId>,
        target: HeadlessTarget,
    ) -> CutsceneResult<Self> {
        let key = key.into();
        if self.targets.contains_key(&key) {
            return Err(CutsceneError::validation(format!(
                "duplicate target key '{key}'"
            )));
        }
        self.targets.insert(key, target);
        Ok(self)
    }

    pub fn steps(mut self, steps: Vec<Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn macro_step(mut self, step: MacroStep) -> Self {
        self.macro_steps.push(step);
        self
    }

    pub fn panel(mut self, panel: PanelSpec) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn bubbles(mut self, config: BubbleConfig) -> Self {
        self.bubbles = Some(config);
        self
    }

    pub fn dialogue(mut self, config: DialogueConfig) -> Self {
        self.dialogue = Some(config);
        self
    }

    pub fn flow(mut self, flow: FlowConfig) -> Self {
        self.flow = flow;
        self
    }

    pub fn click_at(mut self, seconds: f64) -> Self {
        self.clicks.push(seconds);
        self
    }

    pub fn build(self) -> CutsceneResult<Script> {
        let script = Script {
            config: self.config,
            targets: self.targets,
            steps: self.steps,
            macro_steps: self.macro_steps,
            panels: self.panels,
            bubbles: self.bubbles,
            dialogue: self.dialogue,
            flow: self.flow,
            clicks: self.clicks,
        };
        script.validate()?;
        Ok(script)
    }
}

/// Fluent step-list authoring. `with_previous` joins the most recent step to the batch
/// before it.
#[derive(Default)]
pub struct SequenceBuilder {
    steps: Vec<Step>,
    dangling_with_previous: bool,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    fn targeted(self, target: impl Into<TargetId>, action: Action) -> Self {
        self.step(Step::new(Some(target.into()), action))
    }

    pub fn slide_in(
        self,
        target: impl Into<TargetId>,
        direction: Direction,
        distance: f64,
        duration: f64,
    ) -> Self {
        self.targeted(
            target,
            Action::SlideIn {
                direction,
                distance,
                duration,
            },
        )
    }

    pub fn slide_out(
        self,
        target: impl Into<TargetId>,
        direction: Direction,
        distance: f64,
        duration: f64,
    ) -> Self {
        self.targeted(
            target,
            Action::SlideOut {
                direction,
                distance,
                duration,
            },
        )
    }

    pub fn fade_in(self, target: impl Into<TargetId>, duration: f64) -> Self {
        self.targeted(target, Action::FadeIn { duration })
    }

    pub fn fade_out(self, target: impl Into<TargetId>, duration: f64) -> Self {
        self.targeted(target, Action::FadeOut { duration })
    }

    pub fn type_text(
        self,
        target: impl Into<TargetId>,
        text: impl Into<String>,
        chars_per_second: f64,
    ) -> Self {
        self.targeted(
            target,
            Action::TypeText {
                text: text.into(),
                chars_per_second,
            },
        )
    }

    pub fn wait(self, seconds: f64) -> Self {
        self.step(Step::new(None, Action::WaitSeconds { seconds }))
    }

    pub fn wait_click(self) -> Self {
        self.step(Step::new(None, Action::WaitClick))
    }

    pub fn with_previous(mut self) -> Self {
        match self.steps.last_mut() {
            Some(last) => last.group = GroupMode::WithPrevious,
            None => self.dangling_with_previous = true,
        }
        self
    }

    pub fn build(self) -> CutsceneResult<Vec<Step>> {
        if self.dangling_with_previous {
            return Err(CutsceneError::validation(
                "with_previous() called before any step",
            ));
        }
        validate_steps(&self.steps)?;
        Ok(self.steps)
    }
}
