//! Macro-step composer.
//!
//! Each macro step is delegated to an external collaborator (a panel director or a
//! bubble director) and completes when that collaborator reports it is no longer busy.
//! Exactly one macro step runs at a time.

use std::{task::Poll, time::Duration};

use crate::{
    core::secs,
    error::CutsceneError,
    model::MacroStep,
    pulse::PulseSlot,
    stage::Stage,
    task::{Task, TaskGroup},
};

/// Reveals panels by id.
pub trait PanelDirector {
    fn play_in(&mut self, stage: &mut Stage, id: &str);
    fn is_busy(&self) -> bool;
    /// Back to the base pose with opacity 0; `immediate` also deactivates each panel.
    fn reset_all(&mut self, stage: &mut Stage, immediate: bool);
    fn tick(&mut self, _stage: &mut Stage, _dt: Duration) {}
}

/// Spawns speech bubbles that type out their text.
pub trait BubbleDirector {
    /// `x01`/`y01` are normalized coordinates inside the spawn area.
    fn spawn(&mut self, stage: &mut Stage, x01: f64, y01: f64, text: &str);
    fn is_typing(&self) -> bool;
    /// Fast-forwards the current bubble; true if it was still typing.
    fn skip_if_typing(&mut self, stage: &mut Stage) -> bool;
    fn clear_all(&mut self, stage: &mut Stage);
    fn tick(&mut self, _stage: &mut Stage, _dt: Duration) {}
}

/// Snapshot of the collaborators' busy flags for one poll.
#[derive(Clone, Copy, Debug, Default)]
struct Cast {
    dt: Duration,
    panels_busy: bool,
    bubbles_typing: bool,
}

#[derive(Debug)]
enum MacroTask {
    AwaitPanels,
    AwaitTyping,
    Wait { remaining: Duration },
}

impl Task<Cast> for MacroTask {
    fn poll(&mut self, cast: &mut Cast) -> Poll<()> {
        let done = match self {
            Self::AwaitPanels => !cast.panels_busy,
            Self::AwaitTyping => !cast.bubbles_typing,
            Self::Wait { remaining } => {
                *remaining = remaining.saturating_sub(cast.dt);
                remaining.is_zero()
            }
        };
        if done { Poll::Ready(()) } else { Poll::Pending }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacroOutcome {
    pub started: Option<usize>,
    pub completed: Option<usize>,
    pub finished: bool,
}

pub struct CinematicComposer {
    steps: Vec<MacroStep>,
    index: usize,
    current: Option<usize>,
    panels: Option<Box<dyn PanelDirector>>,
    bubbles: Option<Box<dyn BubbleDirector>>,
    running: TaskGroup<MacroTask>,
    pulse: PulseSlot,
    finished_emitted: bool,
    listeners: Vec<Box<dyn FnMut()>>,
}

impl std::fmt::Debug for CinematicComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CinematicComposer")
            .field("index", &self.index)
            .field("step_count", &self.steps.len())
            .field("current", &self.current)
            .field("has_panels", &self.panels.is_some())
            .field("has_bubbles", &self.bubbles.is_some())
            .finish_non_exhaustive()
    }
}

impl CinematicComposer {
    pub fn new(steps: Vec<MacroStep>) -> Self {
        Self {
            steps,
            index: 0,
            current: None,
            panels: None,
            bubbles: None,
            running: TaskGroup::new(),
            pulse: PulseSlot::new(),
            finished_emitted: false,
            listeners: Vec::new(),
        }
    }

    pub fn with_panels(mut self, panels: impl PanelDirector + 'static) -> Self {
        self.panels = Some(Box::new(panels));
        self
    }

    pub fn with_bubbles(mut self, bubbles: impl BubbleDirector + 'static) -> Self {
        self.bubbles = Some(Box::new(bubbles));
        self
    }

    pub fn panels(&self) -> Option<&dyn PanelDirector> {
        self.panels.as_deref()
    }

    pub fn bubbles(&self) -> Option<&dyn BubbleDirector> {
        self.bubbles.as_deref()
    }

    pub fn pulse(&self) -> PulseSlot {
        self.pulse.clone()
    }

    pub fn trigger(&self) {
        self.pulse.raise();
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_busy(&self) -> bool {
        !self.running.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.steps.len() && !self.is_busy()
    }

    pub fn on_finished(&mut self, listener: impl FnMut() + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Back to the first macro step with every panel hidden and every bubble cleared.
    #[tracing::instrument(skip_all, fields(index = self.index))]
    pub fn reset(&mut self, stage: &mut Stage) {
        self.running.cancel();
        self.index = 0;
        self.current = None;
        self.pulse.clear();
        self.finished_emitted = false;
        if let Some(bubbles) = self.bubbles.as_mut() {
            bubbles.clear_all(stage);
        }
        if let Some(panels) = self.panels.as_mut() {
            panels.reset_all(stage, true);
        }
    }

    /// One advance request. A bubble that is still typing swallows it; otherwise the
    /// next macro step starts if nothing is running. Returns the started step.
    pub fn advance(&mut self, stage: &mut Stage) -> Option<usize> {
        if let Some(bubbles) = self.bubbles.as_mut()
            && bubbles.skip_if_typing(stage)
        {
            tracing::debug!("advance skipped typing");
            return None;
        }
        if self.is_busy() || self.index >= self.steps.len() {
            return None;
        }
        let index = self.index;
        self.index += 1;
        self.start(index, stage);
        Some(index)
    }

    pub fn tick(&mut self, stage: &mut Stage, dt: Duration) -> MacroOutcome {
        let mut outcome = MacroOutcome::default();

        if let Some(panels) = self.panels.as_mut() {
            panels.tick(stage, dt);
        }
        if let Some(bubbles) = self.bubbles.as_mut() {
            bubbles.tick(stage, dt);
        }

        let was_busy = self.is_busy();
        if self.pulse.take() {
            outcome.started = self.advance(stage);
        }

        // A step started on this tick is not polled until the next one. Steps with
        // nothing to wait on settle right away.
        let settled = if was_busy {
            let mut cast = self.cast(dt);
            self.running.poll_all(&mut cast).is_ready()
        } else {
            self.running.is_empty()
        };
        if settled && let Some(done) = self.current.take() {
            tracing::debug!(index = done, "macro step complete");
            outcome.completed = Some(done);
        }

        outcome.finished = self.emit_finished_if_due();
        outcome
    }

    fn cast(&self, dt: Duration) -> Cast {
        Cast {
            dt,
            panels_busy: self.panels.as_ref().is_some_and(|p| p.is_busy()),
            bubbles_typing: self.bubbles.as_ref().is_some_and(|b| b.is_typing()),
        }
    }

    #[tracing::instrument(skip_all, fields(index = index, step = self.steps[index].name()))]
    fn start(&mut self, index: usize, stage: &mut Stage) {
        self.current = Some(index);
        let task = match &self.steps[index] {
            MacroStep::RevealPanel { panel_id } => match self.panels.as_mut() {
                None => {
                    missing_collaborator(index, "RevealPanel needs a panel director");
                    None
                }
                Some(_) if panel_id.trim().is_empty() => {
                    missing_collaborator(index, "RevealPanel panel_id is empty");
                    None
                }
                Some(panels) => {
                    panels.play_in(stage, panel_id);
                    Some(MacroTask::AwaitPanels)
                }
            },
            MacroStep::ShowBubble { x01, y01, text } => match self.bubbles.as_mut() {
                None => {
                    missing_collaborator(index, "ShowBubble needs a bubble director");
                    None
                }
                Some(bubbles) => {
                    bubbles.spawn(stage, *x01, *y01, text);
                    Some(MacroTask::AwaitTyping)
                }
            },
            MacroStep::WaitSeconds { seconds } => {
                let remaining = secs(*seconds);
                (!remaining.is_zero()).then_some(MacroTask::Wait { remaining })
            }
            MacroStep::ClearBubbles => {
                if let Some(bubbles) = self.bubbles.as_mut() {
                    bubbles.clear_all(stage);
                }
                None
            }
            MacroStep::ResetPanels => {
                if let Some(panels) = self.panels.as_mut() {
                    panels.reset_all(stage, true);
                }
                None
            }
        };
        if let Some(task) = task {
            self.running.spawn(task);
        }
    }

    fn emit_finished_if_due(&mut self) -> bool {
        if self.finished_emitted || !self.is_finished() {
            return false;
        }
        self.finished_emitted = true;
        tracing::info!(steps = self.steps.len(), "macro sequence finished");
        for listener in &mut self.listeners {
            listener();
        }
        true
    }
}

fn missing_collaborator(index: usize, what: &str) {
    let err = CutsceneError::collaborator(what);
    tracing::error!(error = %err, index, "macro step completes immediately");
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
        busy_ticks: u32,
        typing_ticks: u32,
    }

    #[derive(Clone, Default)]
    struct FakePanels(Rc<RefCell<Log>>);

    impl PanelDirector for FakePanels {
        fn play_in(&mut self, _stage: &mut Stage, id: &str) {
            let mut log = self.0.borrow_mut();
            log.calls.push(format!("play_in {id}"));
            log.busy_ticks = 2;
        }

        fn is_busy(&self) -> bool {
            self.0.borrow().busy_ticks > 0
        }

        fn reset_all(&mut self, _stage: &mut Stage, immediate: bool) {
            self.0.borrow_mut().calls.push(format!("reset_all {immediate}"));
        }

        fn tick(&mut self, _stage: &mut Stage, _dt: Duration) {
            let mut log = self.0.borrow_mut();
            log.busy_ticks = log.busy_ticks.saturating_sub(1);
        }
    }

    #[derive(Clone, Default)]
    struct FakeBubbles(Rc<RefCell<Log>>);

    impl BubbleDirector for FakeBubbles {
        fn spawn(&mut self, _stage: &mut Stage, _x01: f64, _y01: f64, text: &str) {
            let mut log = self.0.borrow_mut();
            log.calls.push(format!("spawn {text}"));
            log.typing_ticks = 3;
        }

        fn is_typing(&self) -> bool {
            self.0.borrow().typing_ticks > 0
        }

        fn skip_if_typing(&mut self, _stage: &mut Stage) -> bool {
            let mut log = self.0.borrow_mut();
            if log.typing_ticks == 0 {
                return false;
            }
            log.typing_ticks = 0;
            log.calls.push("skip".to_string());
            true
        }

        fn clear_all(&mut self, _stage: &mut Stage) {
            self.0.borrow_mut().calls.push("clear_all".to_string());
        }

        fn tick(&mut self, _stage: &mut Stage, _dt: Duration) {
            let mut log = self.0.borrow_mut();
            log.typing_ticks = log.typing_ticks.saturating_sub(1);
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn bubble(text: &str) -> MacroStep {
        MacroStep::ShowBubble {
            x01: 0.5,
            y01: 0.5,
            text: text.to_string(),
        }
    }

    #[test]
    fn skip_typing_preempts_advance() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![bubble("one"), bubble("two")])
            .with_bubbles(FakeBubbles(Rc::clone(&log)));

        c.trigger();
        assert_eq!(c.tick(&mut stage, ms(16)).started, Some(0));
        assert!(c.is_busy());

        c.trigger();
        let out = c.tick(&mut stage, ms(16));
        assert_eq!(out.started, None);
        assert_eq!(out.completed, Some(0));
        assert_eq!(c.index(), 1);

        c.trigger();
        assert_eq!(c.tick(&mut stage, ms(16)).started, Some(1));
        assert_eq!(log.borrow().calls, vec!["spawn one", "skip", "spawn two"]);
    }

    #[test]
    fn advance_is_ignored_while_a_step_runs() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![
            MacroStep::RevealPanel {
                panel_id: "p1".to_string(),
            },
            MacroStep::RevealPanel {
                panel_id: "p2".to_string(),
            },
        ])
        .with_panels(FakePanels(Rc::clone(&log)));

        assert_eq!(c.advance(&mut stage), Some(0));
        assert_eq!(c.advance(&mut stage), None);
        c.tick(&mut stage, ms(16));
        assert!(c.is_busy());
        let out = c.tick(&mut stage, ms(16));
        assert_eq!(out.completed, Some(0));
        assert_eq!(c.advance(&mut stage), Some(1));
        assert_eq!(log.borrow().calls, vec!["play_in p1", "play_in p2"]);
    }

    #[test]
    fn missing_collaborators_complete_instantly() {
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![
            MacroStep::RevealPanel {
                panel_id: "p1".to_string(),
            },
            bubble("hello"),
            MacroStep::ClearBubbles,
            MacroStep::ResetPanels,
        ]);
        let mut completed = Vec::new();
        let mut finished = 0;
        for _ in 0..4 {
            c.trigger();
            let out = c.tick(&mut stage, ms(16));
            assert_eq!(out.started, out.completed);
            completed.extend(out.completed);
            finished += usize::from(out.finished);
        }
        assert_eq!(completed, vec![0, 1, 2, 3]);
        assert_eq!(finished, 1);
        assert!(c.is_finished());
    }

    #[test]
    fn empty_panel_id_completes_instantly() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![MacroStep::RevealPanel {
            panel_id: "  ".to_string(),
        }])
        .with_panels(FakePanels(Rc::clone(&log)));
        c.trigger();
        assert!(c.tick(&mut stage, ms(16)).finished);
        assert!(log.borrow().calls.is_empty());
    }

    #[test]
    fn wait_seconds_counts_down() {
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![MacroStep::WaitSeconds { seconds: 0.1 }]);
        assert_eq!(c.advance(&mut stage), Some(0));
        assert!(!c.tick(&mut stage, ms(50)).finished);
        assert!(c.tick(&mut stage, ms(50)).finished);
    }

    #[test]
    fn huge_wait_saturates() {
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![MacroStep::WaitSeconds { seconds: 1e300 }]);
        assert_eq!(c.advance(&mut stage), Some(0));
        assert!(!c.tick(&mut stage, Duration::from_secs(86_400)).finished);
        assert!(c.is_busy());
    }

    #[test]
    fn instant_step_started_outside_tick_reports_completion() {
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![
            MacroStep::ClearBubbles,
            MacroStep::WaitSeconds { seconds: 0.1 },
        ]);
        assert_eq!(c.advance(&mut stage), Some(0));
        let out = c.tick(&mut stage, ms(16));
        assert_eq!(out.started, None);
        assert_eq!(out.completed, Some(0));
        assert!(!out.finished);
    }

    #[test]
    fn reset_returns_to_the_first_step() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut stage = Stage::new();
        let mut c = CinematicComposer::new(vec![MacroStep::ClearBubbles])
            .with_panels(FakePanels(Rc::clone(&log)))
            .with_bubbles(FakeBubbles(Rc::clone(&log)));
        c.advance(&mut stage);
        assert!(c.tick(&mut stage, ms(16)).finished);

        c.reset(&mut stage);
        assert_eq!(c.index(), 0);
        assert!(!c.is_finished());
        assert_eq!(
            log.borrow().calls,
            vec!["clear_all", "clear_all", "reset_all true"]
        );
    }
}
