//! Click-advanced step scheduler.
//!
//! The scheduler walks a fixed step list one batch at a time. A batch is a leader step
//! plus the `WithPrevious` steps that directly follow it; every member is dispatched on
//! the same tick and the batch resolves when all of them have completed.

use std::{collections::BTreeSet, time::Duration};

use crate::{
    anim::VISIBLE_EPSILON,
    clock::{Clock, InputSource},
    core::TargetId,
    layout::LayoutSnapshotStore,
    model::{Action, GroupMode, SchedulerConfig, Step},
    pulse::PulseSlot,
    stage::Stage,
    task::{StepTask, TaskGroup, TickCtx},
};

/// Half-open range of step indices dispatched together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch {
    pub start: usize,
    pub end: usize,
}

/// What happened during one `tick`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub started: Option<Batch>,
    pub completed: Option<Batch>,
    /// The one-shot `Finished` notification fired on this tick.
    pub finished: bool,
}

pub struct StepScheduler {
    steps: Vec<Step>,
    config: SchedulerConfig,
    step_index: usize,
    running: TaskGroup<StepTask>,
    batch: Option<Batch>,
    pulse: PulseSlot,
    layouts: LayoutSnapshotStore,
    finished_emitted: bool,
    listeners: Vec<Box<dyn FnMut()>>,
}

impl std::fmt::Debug for StepScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepScheduler")
            .field("step_index", &self.step_index)
            .field("step_count", &self.steps.len())
            .field("batch", &self.batch)
            .field("running", &self.running.len())
            .field("finished_emitted", &self.finished_emitted)
            .finish_non_exhaustive()
    }
}

impl StepScheduler {
    pub fn new(steps: Vec<Step>, config: SchedulerConfig) -> Self {
        Self {
            steps,
            config,
            step_index: 0,
            running: TaskGroup::new(),
            batch: None,
            pulse: PulseSlot::new(),
            layouts: LayoutSnapshotStore::new(),
            finished_emitted: false,
            listeners: Vec::new(),
        }
    }

    /// Handle for the input side. Clones share the same slot.
    pub fn pulse(&self) -> PulseSlot {
        self.pulse.clone()
    }

    pub fn trigger(&self) {
        self.pulse.raise();
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn layouts(&self) -> &LayoutSnapshotStore {
        &self.layouts
    }

    pub fn is_busy(&self) -> bool {
        !self.running.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.step_index >= self.steps.len() && !self.is_busy()
    }

    /// Registers a listener for the one-shot `Finished` notification.
    pub fn on_finished(&mut self, listener: impl FnMut() + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Captures resting layouts and puts every revealed target into its hidden pose.
    ///
    /// Only the first layout step and the first opacity step of each target decide its
    /// starting pose; a target whose first slide is a `SlideOut` starts shown.
    pub fn awake(&mut self, stage: &mut Stage) {
        let mut posed: BTreeSet<TargetId> = BTreeSet::new();
        let mut faded: BTreeSet<TargetId> = BTreeSet::new();

        for (index, step) in self.steps.iter().enumerate() {
            let Some(id) = step.target.as_ref() else {
                continue;
            };
            if !(step.action.needs_layout() || step.action.is_fade()) {
                continue;
            }
            let Some(target) = stage.get_mut(id) else {
                tracing::warn!(step = index, target = %id, "awake: target is not on the stage");
                continue;
            };

            match &step.action {
                Action::SlideIn {
                    direction,
                    distance,
                    ..
                } => {
                    let resting = self.layouts.capture(id, &*target);
                    if posed.insert(id.clone()) {
                        LayoutSnapshotStore::derive_offset(resting, *direction, *distance)
                            .apply_to(target);
                    }
                }
                Action::SlideOut { .. } => {
                    self.layouts.capture(id, &*target);
                    posed.insert(id.clone());
                }
                Action::FadeIn { .. } => {
                    self.layouts.capture_opacity(id, &*target);
                    if faded.insert(id.clone()) {
                        target.set_opacity(0.0);
                        target.set_interactive(false);
                    }
                }
                Action::FadeOut { .. } => {
                    let opacity = self.layouts.capture_opacity(id, &*target);
                    if faded.insert(id.clone()) {
                        target.set_interactive(opacity > VISIBLE_EPSILON);
                    }
                }
                _ => {}
            }
        }

        tracing::debug!(
            layouts = self.layouts.len(),
            hidden = posed.len() + faded.len(),
            "awake"
        );
    }

    /// Cancels the run and returns to the starting layout with `step_index = 0`.
    ///
    /// Resting layouts are written back before the memo is dropped, so a reset in the
    /// middle of an animation re-captures the true resting pose.
    #[tracing::instrument(skip_all, fields(step_index = self.step_index))]
    pub fn reset_sequence(&mut self, stage: &mut Stage) {
        self.running.cancel();
        self.batch = None;
        self.step_index = 0;
        self.pulse.clear();
        self.finished_emitted = false;
        self.layouts.restore_all(stage);
        self.layouts.clear();
        self.awake(stage);
    }

    /// Starts the next batch without a pulse. Same guards as a pulse: nothing happens
    /// while a batch is running or after the list is exhausted.
    pub fn advance_one_click(&mut self, stage: &mut Stage) -> Option<Batch> {
        if self.is_busy() || self.is_finished() {
            tracing::debug!(
                busy = self.is_busy(),
                step_index = self.step_index,
                "advance ignored"
            );
            return None;
        }
        let batch = self.dispatch(stage);
        if !self.is_busy() {
            self.complete_batch();
            self.emit_finished_if_due();
        }
        Some(batch)
    }

    pub fn tick(&mut self, stage: &mut Stage, dt: Duration) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if self.is_busy() {
            let mut cx = TickCtx {
                stage,
                dt,
                pulse: &self.pulse,
            };
            let joined = self.running.poll_all(&mut cx).is_ready();
            // Whatever a WaitClick member did not consume is dropped.
            self.pulse.clear();
            if joined {
                outcome.completed = self.complete_batch();
            }
            outcome.finished = self.emit_finished_if_due();
            return outcome;
        }

        if !self.config.click_to_advance {
            self.pulse.clear();
        } else if self.pulse.take() {
            if self.is_finished() {
                tracing::trace!("pulse dropped: sequence finished");
            } else {
                outcome.started = Some(self.dispatch(stage));
                if !self.is_busy() {
                    outcome.completed = self.complete_batch();
                }
            }
        }
        outcome.finished = self.emit_finished_if_due();
        outcome
    }

    /// One host frame: forward an input edge into the slot, then tick by the clock.
    pub fn drive(
        &mut self,
        stage: &mut Stage,
        clock: &mut dyn Clock,
        input: &mut dyn InputSource,
    ) -> TickOutcome {
        if input.poll_trigger_pulse() {
            self.pulse.raise();
        }
        let dt = clock.elapsed_since_last_tick();
        self.tick(stage, dt)
    }

    #[tracing::instrument(skip_all, fields(leader = self.step_index))]
    fn dispatch(&mut self, stage: &mut Stage) -> Batch {
        let start = self.step_index;
        self.step_index += 1;
        while self
            .steps
            .get(self.step_index)
            .is_some_and(|s| s.group == GroupMode::WithPrevious)
        {
            self.step_index += 1;
        }
        let batch = Batch {
            start,
            end: self.step_index,
        };

        for index in batch.start..batch.end {
            let step = &self.steps[index];
            if let Some(task) = StepTask::start(index, step, stage, &mut self.layouts) {
                self.running.spawn(task);
            }
        }

        tracing::debug!(
            start = batch.start,
            end = batch.end,
            running = self.running.len(),
            "batch started"
        );
        self.batch = Some(batch);
        batch
    }

    fn complete_batch(&mut self) -> Option<Batch> {
        let batch = self.batch.take()?;
        tracing::debug!(start = batch.start, end = batch.end, "batch complete");
        Some(batch)
    }

    fn emit_finished_if_due(&mut self) -> bool {
        if self.finished_emitted || !self.is_finished() {
            return false;
        }
        self.finished_emitted = true;
        tracing::info!(steps = self.steps.len(), "sequence finished");
        for listener in &mut self.listeners {
            listener();
        }
        true
    }
}
