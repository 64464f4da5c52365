//! Cooperative step tasks.
//!
//! Every running step is a small state machine polled once per host tick. A task
//! suspends only while waiting for elapsed time, an external busy flag, or the next
//! trigger pulse.

use std::{task::Poll, time::Duration};

use crate::{
    anim::{self, Tween, Typewriter, VISIBLE_EPSILON},
    core::{TargetId, secs},
    error::CutsceneError,
    layout::{LayoutSnapshotStore, LayoutState},
    model::{Action, Step},
    pulse::PulseSlot,
    stage::{Stage, VisualTarget},
};

pub trait Task<C> {
    fn poll(&mut self, cx: &mut C) -> Poll<()>;
}

/// Spawn N tasks, poll them together, join when all are done.
///
/// There is no completion order between members; finished members are dropped on the
/// poll that completes them.
#[derive(Debug)]
pub struct TaskGroup<T> {
    members: Vec<T>,
}

impl<T> Default for TaskGroup<T> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
        }
    }
}

impl<T> TaskGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, task: T) {
        self.members.push(task);
    }

    pub fn poll_all<C>(&mut self, cx: &mut C) -> Poll<()>
    where
        T: Task<C>,
    {
        self.members.retain_mut(|t| t.poll(cx).is_pending());
        if self.members.is_empty() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }

    /// Drops every in-flight member without letting it run another tick.
    pub fn cancel(&mut self) {
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

pub struct TickCtx<'a> {
    pub stage: &'a mut Stage,
    pub dt: Duration,
    pub pulse: &'a PulseSlot,
}

#[derive(Debug)]
pub(crate) enum StepTask {
    Slide {
        target: TargetId,
        tween: Tween<LayoutState>,
        elapsed: Duration,
    },
    Fade {
        target: TargetId,
        tween: Tween<f64>,
        elapsed: Duration,
    },
    Type {
        target: TargetId,
        writer: Typewriter,
        elapsed: Duration,
    },
    Wait {
        duration: Duration,
        elapsed: Duration,
    },
    WaitClick,
}

fn skip_missing<T>(index: usize, step: &Step, why: &str) -> Option<T> {
    let target = step
        .target
        .as_ref()
        .map_or("<none>", |t| t.as_str())
        .to_string();
    let err = CutsceneError::missing_target(index, target);
    tracing::warn!(error = %err, action = step.action.name(), why, "skipping step");
    None
}

fn resolve<'s>(
    index: usize,
    step: &'s Step,
    stage: &'s mut Stage,
) -> Option<(&'s TargetId, &'s mut (dyn VisualTarget + 'static))> {
    let Some(id) = step.target.as_ref() else {
        return skip_missing(index, step, "step has no target");
    };
    let Some(target) = stage.get_mut(id) else {
        return skip_missing(index, step, "target is not on the stage");
    };
    Some((id, target))
}

fn write_opacity(stage: &mut Stage, id: &TargetId, opacity: f64, interactive: bool) -> bool {
    let Some(target) = stage.get_mut(id) else {
        return false;
    };
    target.set_opacity(opacity);
    target.set_interactive(interactive);
    true
}

impl StepTask {
    /// Writes the step's starting pose and returns the task that finishes it.
    ///
    /// Returns `None` when the step completed synchronously: degenerate durations,
    /// instant reveals, and skipped steps with a missing target.
    pub(crate) fn start(
        index: usize,
        step: &Step,
        stage: &mut Stage,
        layouts: &mut LayoutSnapshotStore,
    ) -> Option<Self> {
        match &step.action {
            Action::SlideIn {
                direction,
                distance,
                duration,
            }
            | Action::SlideOut {
                direction,
                distance,
                duration,
            } => {
                let (id, target) = resolve(index, step, stage)?;
                let resting = layouts.capture(id, &*target);
                let hidden = LayoutSnapshotStore::derive_offset(resting, *direction, *distance);
                let (from, to) = match step.action {
                    Action::SlideIn { .. } => (hidden, resting),
                    _ => (resting, hidden),
                };
                let tween = anim::slide(from, to, secs(*duration));
                if tween.is_instant() {
                    to.apply_to(target);
                    return None;
                }
                from.apply_to(target);
                Some(Self::Slide {
                    target: id.clone(),
                    tween,
                    elapsed: Duration::ZERO,
                })
            }
            Action::FadeIn { duration } | Action::FadeOut { duration } => {
                let (id, target) = resolve(index, step, stage)?;
                let (a, b) = match step.action {
                    Action::FadeIn { .. } => (0.0, 1.0),
                    _ => (1.0, 0.0),
                };
                let tween = anim::fade(a, b, secs(*duration));
                let interactive = b > VISIBLE_EPSILON;
                if tween.is_instant() {
                    target.set_opacity(b);
                    target.set_interactive(interactive);
                    return None;
                }
                target.set_opacity(a);
                target.set_interactive(interactive);
                Some(Self::Fade {
                    target: id.clone(),
                    tween,
                    elapsed: Duration::ZERO,
                })
            }
            Action::TypeText {
                text,
                chars_per_second,
            } => {
                let (id, target) = resolve(index, step, stage)?;
                let Some(buffer) = target.text() else {
                    return skip_missing(index, step, "target has no text buffer");
                };
                buffer.set_full_text(text);
                let writer = Typewriter::new(buffer.character_count(), *chars_per_second);
                if writer.is_instant() {
                    buffer.set_visible_character_count(writer.total);
                    return None;
                }
                buffer.set_visible_character_count(0);
                Some(Self::Type {
                    target: id.clone(),
                    writer,
                    elapsed: Duration::ZERO,
                })
            }
            Action::WaitSeconds { seconds } => {
                let duration = secs(*seconds);
                (!duration.is_zero()).then_some(Self::Wait {
                    duration,
                    elapsed: Duration::ZERO,
                })
            }
            Action::WaitClick => Some(Self::WaitClick),
        }
    }
}

impl<'a> Task<TickCtx<'a>> for StepTask {
    fn poll(&mut self, cx: &mut TickCtx<'a>) -> Poll<()> {
        match self {
            Self::Slide {
                target,
                tween,
                elapsed,
            } => {
                *elapsed += cx.dt;
                let Some(t) = cx.stage.get_mut(target) else {
                    tracing::warn!(%target, "slide target left the stage");
                    return Poll::Ready(());
                };
                tween.sample(*elapsed).apply_to(t);
                if tween.is_complete(*elapsed) {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
            Self::Fade {
                target,
                tween,
                elapsed,
            } => {
                *elapsed += cx.dt;
                let interactive = tween.to > VISIBLE_EPSILON;
                if !write_opacity(cx.stage, target, tween.sample(*elapsed), interactive) {
                    tracing::warn!(%target, "fade target left the stage");
                    return Poll::Ready(());
                }
                if tween.is_complete(*elapsed) {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
            Self::Type {
                target,
                writer,
                elapsed,
            } => {
                *elapsed += cx.dt;
                let Some(buffer) = cx.stage.get_mut(target).and_then(|t| t.text()) else {
                    tracing::warn!(%target, "text target left the stage");
                    return Poll::Ready(());
                };
                buffer.set_visible_character_count(writer.visible_at(*elapsed));
                if writer.is_complete(*elapsed) {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
            Self::Wait { duration, elapsed } => {
                *elapsed += cx.dt;
                if *elapsed >= *duration {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
            Self::WaitClick => {
                if cx.pulse.take() {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::Vec2, headless::HeadlessTarget};

    struct Countdown(u32);

    impl Task<Vec<u32>> for Countdown {
        fn poll(&mut self, log: &mut Vec<u32>) -> Poll<()> {
            log.push(self.0);
            if self.0 == 0 {
                Poll::Ready(())
            } else {
                self.0 -= 1;
                Poll::Pending
            }
        }
    }

    #[test]
    fn group_joins_when_all_members_finish() {
        let mut group = TaskGroup::new();
        group.spawn(Countdown(0));
        group.spawn(Countdown(2));
        let mut log = Vec::new();
        assert!(group.poll_all(&mut log).is_pending());
        assert_eq!(group.len(), 1);
        assert!(group.poll_all(&mut log).is_pending());
        assert!(group.poll_all(&mut log).is_ready());
        assert!(group.is_empty());
    }

    #[test]
    fn cancel_drops_members() {
        let mut group = TaskGroup::new();
        group.spawn(Countdown(5));
        group.cancel();
        assert!(group.is_empty());
    }

    #[test]
    fn degenerate_duration_completes_synchronously() {
        let mut stage = Stage::new();
        stage.insert("a", HeadlessTarget::anchored(Vec2::new(0.0, 0.0)));
        let mut layouts = LayoutSnapshotStore::new();

        let step = Step::new(
            Some(TargetId::from("a")),
            Action::SlideOut {
                direction: crate::core::Direction::Down,
                distance: 100.0,
                duration: 0.0,
            },
        );
        assert!(StepTask::start(0, &step, &mut stage, &mut layouts).is_none());
        assert_eq!(
            stage.get(&TargetId::from("a")).unwrap().anchored_position(),
            Vec2::new(0.0, -100.0)
        );

        let fade = Step::new(Some(TargetId::from("a")), Action::FadeOut { duration: -2.0 });
        assert!(StepTask::start(1, &fade, &mut stage, &mut layouts).is_none());
        assert_eq!(stage.get(&TargetId::from("a")).unwrap().opacity(), 0.0);
    }

    #[test]
    fn missing_targets_are_skipped() {
        let mut stage = Stage::new();
        let mut layouts = LayoutSnapshotStore::new();
        let step = Step::new(Some(TargetId::from("ghost")), Action::FadeIn { duration: 1.0 });
        assert!(StepTask::start(0, &step, &mut stage, &mut layouts).is_none());

        stage.insert("plain", HeadlessTarget::default());
        let typed = Step::new(
            Some(TargetId::from("plain")),
            Action::TypeText {
                text: "hello".to_string(),
                chars_per_second: 10.0,
            },
        );
        assert!(StepTask::start(1, &typed, &mut stage, &mut layouts).is_none());
    }

    #[test]
    fn wait_click_consumes_one_pulse() {
        let mut stage = Stage::new();
        let pulse = PulseSlot::new();
        let mut task = StepTask::WaitClick;
        let mut cx = TickCtx {
            stage: &mut stage,
            dt: Duration::from_millis(16),
            pulse: &pulse,
        };
        assert!(task.poll(&mut cx).is_pending());
        pulse.raise();
        assert!(task.poll(&mut cx).is_ready());
        assert!(!pulse.is_raised());
    }
}
