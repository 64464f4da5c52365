use std::collections::BTreeMap;

use crate::core::{TargetId, Vec2};

/// Text buffer with a progressive-reveal cursor.
pub trait TextTarget {
    fn set_full_text(&mut self, text: &str);
    fn character_count(&self) -> usize;
    fn visible_character_count(&self) -> usize;
    fn set_visible_character_count(&mut self, n: usize);
}

/// Renderer handle for one animated object.
///
/// A target lays out either around an anchor point (`anchored_position`) or stretched
/// between anchors (`offsets`). Which one applies is reported by `is_stretched` and is
/// sampled once, when the target's resting layout is captured.
pub trait VisualTarget {
    fn is_stretched(&self) -> bool;

    fn anchored_position(&self) -> Vec2;
    fn set_anchored_position(&mut self, position: Vec2);

    fn offsets(&self) -> (Vec2, Vec2);
    fn set_offsets(&mut self, min: Vec2, max: Vec2);

    fn opacity(&self) -> f64;
    fn set_opacity(&mut self, opacity: f64);

    fn scale(&self) -> f64;
    fn set_scale(&mut self, scale: f64);

    /// Whether the target should receive pointer input.
    fn set_interactive(&mut self, _interactive: bool) {}

    fn set_active(&mut self, _active: bool) {}

    /// Swaps the displayed image by key. Targets without images ignore it.
    fn set_sprite(&mut self, _sprite: &str) {}

    fn sprite(&self) -> Option<&str> {
        None
    }

    /// Size of the target's own rect, used for bounds clamping.
    fn size(&self) -> Vec2 {
        Vec2::ZERO
    }

    fn text(&mut self) -> Option<&mut dyn TextTarget> {
        None
    }
}

/// Registry of targets addressed by [`TargetId`].
///
/// The stage is owned by the host; schedulers borrow it for the duration of a call.
#[derive(Default)]
pub struct Stage {
    targets: BTreeMap<TargetId, Box<dyn VisualTarget>>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        id: impl Into<TargetId>,
        target: impl VisualTarget + 'static,
    ) -> Option<Box<dyn VisualTarget>> {
        self.targets.insert(id.into(), Box::new(target))
    }

    pub fn remove(&mut self, id: &TargetId) -> Option<Box<dyn VisualTarget>> {
        self.targets.remove(id)
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.contains_key(id)
    }

    pub fn get(&self, id: &TargetId) -> Option<&(dyn VisualTarget + 'static)> {
        self.targets.get(id).map(Box::as_ref)
    }

    pub fn get_mut(&mut self, id: &TargetId) -> Option<&mut (dyn VisualTarget + 'static)> {
        self.targets.get_mut(id).map(Box::as_mut)
    }

    pub fn ids(&self) -> impl Iterator<Item = &TargetId> {
        self.targets.keys()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessTarget;

    #[test]
    fn lookup_is_by_key() {
        let mut stage = Stage::new();
        stage.insert("a", HeadlessTarget::anchored(Vec2::new(1.0, 2.0)));
        assert!(stage.contains(&TargetId::from("a")));
        assert!(stage.get(&TargetId::from("b")).is_none());

        stage
            .get_mut(&TargetId::from("a"))
            .unwrap()
            .set_opacity(0.5);
        assert_eq!(stage.get(&TargetId::from("a")).unwrap().opacity(), 0.5);
        assert_eq!(stage.len(), 1);
    }
}
