use std::collections::BTreeMap;

use crate::{
    anim::Lerp,
    core::{Direction, TargetId, Vec2},
    stage::{Stage, VisualTarget},
};

/// Resting (fully shown) layout of one target.
///
/// The variant is chosen once, at capture time, from `VisualTarget::is_stretched`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode")]
pub enum LayoutState {
    Anchored { position: Vec2 },
    Stretched { offset_min: Vec2, offset_max: Vec2 },
}

impl LayoutState {
    pub fn capture(target: &dyn VisualTarget) -> Self {
        if target.is_stretched() {
            let (offset_min, offset_max) = target.offsets();
            Self::Stretched {
                offset_min,
                offset_max,
            }
        } else {
            Self::Anchored {
                position: target.anchored_position(),
            }
        }
    }

    pub fn shifted(self, delta: Vec2) -> Self {
        match self {
            Self::Anchored { position } => Self::Anchored {
                position: position + delta,
            },
            Self::Stretched {
                offset_min,
                offset_max,
            } => Self::Stretched {
                offset_min: offset_min + delta,
                offset_max: offset_max + delta,
            },
        }
    }

    /// Writes only the representation this state was captured in.
    pub fn apply_to(&self, target: &mut dyn VisualTarget) {
        match *self {
            Self::Anchored { position } => target.set_anchored_position(position),
            Self::Stretched {
                offset_min,
                offset_max,
            } => target.set_offsets(offset_min, offset_max),
        }
    }
}

impl Lerp for LayoutState {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        match (a, b) {
            (Self::Anchored { position: pa }, Self::Anchored { position: pb }) => Self::Anchored {
                position: <Vec2 as Lerp>::lerp(pa, pb, t),
            },
            (
                Self::Stretched {
                    offset_min: a_min,
                    offset_max: a_max,
                },
                Self::Stretched {
                    offset_min: b_min,
                    offset_max: b_max,
                },
            ) => Self::Stretched {
                offset_min: <Vec2 as Lerp>::lerp(a_min, b_min, t),
                offset_max: <Vec2 as Lerp>::lerp(a_max, b_max, t),
            },
            // Mixed modes cannot be blended; hold the start until the end snaps in.
            _ => {
                if t >= 1.0 {
                    *b
                } else {
                    *a
                }
            }
        }
    }
}

/// Memoized resting layouts, keyed by target.
///
/// A captured entry is never re-sampled from the live target until [`Self::clear`], so
/// targets that have since been animated away from rest keep their original layout.
#[derive(Clone, Debug, Default)]
pub struct LayoutSnapshotStore {
    resting: BTreeMap<TargetId, LayoutState>,
    opacity: BTreeMap<TargetId, f64>,
}

impl LayoutSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, id: &TargetId, target: &dyn VisualTarget) -> LayoutState {
        *self
            .resting
            .entry(id.clone())
            .or_insert_with(|| LayoutState::capture(target))
    }

    pub fn capture_opacity(&mut self, id: &TargetId, target: &dyn VisualTarget) -> f64 {
        *self
            .opacity
            .entry(id.clone())
            .or_insert_with(|| target.opacity())
    }

    pub fn resting(&self, id: &TargetId) -> Option<LayoutState> {
        self.resting.get(id).copied()
    }

    pub fn derive_offset(resting: LayoutState, direction: Direction, distance: f64) -> LayoutState {
        resting.shifted(direction.unit() * distance)
    }

    pub fn apply(target: &mut dyn VisualTarget, state: LayoutState) {
        state.apply_to(target);
    }

    /// Puts every captured target back at its resting layout and opacity.
    pub fn restore_all(&self, stage: &mut Stage) {
        for (id, state) in &self.resting {
            if let Some(target) = stage.get_mut(id) {
                state.apply_to(target);
            }
        }
        for (id, &opacity) in &self.opacity {
            if let Some(target) = stage.get_mut(id) {
                target.set_opacity(opacity);
                target.set_interactive(opacity > crate::anim::VISIBLE_EPSILON);
            }
        }
    }

    pub fn clear(&mut self) {
        self.resting.clear();
        self.opacity.clear();
    }

    pub fn len(&self) -> usize {
        self.resting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resting.is_empty()
    }
}
