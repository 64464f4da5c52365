use std::time::Duration;

use crate::{
    anim::{Tween, Typewriter},
    anim_ease::Ease,
    composer::BubbleDirector,
    core::{Size, TargetId, Vec2, secs},
    error::{CutsceneError, CutsceneResult},
    headless::HeadlessTarget,
    stage::{Stage, VisualTarget},
};

fn default_spawn_area() -> Size {
    Size::new(1920.0, 1080.0)
}

fn default_bubble_size() -> Size {
    Size::new(400.0, 160.0)
}

fn default_appear_duration() -> f64 {
    0.25
}

fn default_appear_ease() -> Ease {
    Ease::OutBack
}

fn default_start_scale() -> f64 {
    0.85
}

fn default_chars_per_second() -> f64 {
    40.0
}

fn default_id_prefix() -> String {
    "bubble".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BubbleConfig {
    /// Size of the area bubbles are placed in; its center is the anchored origin.
    #[serde(default = "default_spawn_area")]
    pub spawn_area: Size,
    #[serde(default = "default_true")]
    pub clamp_to_bounds: bool,
    #[serde(default = "default_bubble_size")]
    pub bubble_size: Size,
    #[serde(default = "default_appear_duration")]
    pub appear_duration: f64,
    #[serde(default = "default_appear_ease")]
    pub appear_ease: Ease,
    #[serde(default = "default_start_scale")]
    pub start_scale: f64,
    /// Rates below one character per second are raised to one.
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: f64,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            spawn_area: default_spawn_area(),
            clamp_to_bounds: true,
            bubble_size: default_bubble_size(),
            appear_duration: default_appear_duration(),
            appear_ease: default_appear_ease(),
            start_scale: default_start_scale(),
            chars_per_second: default_chars_per_second(),
            id_prefix: default_id_prefix(),
        }
    }
}

impl BubbleConfig {
    pub fn validate(&self) -> CutsceneResult<()> {
        let numbers = [
            ("spawn_area.width", self.spawn_area.width),
            ("spawn_area.height", self.spawn_area.height),
            ("bubble_size.width", self.bubble_size.width),
            ("bubble_size.height", self.bubble_size.height),
            ("appear_duration", self.appear_duration),
            ("start_scale", self.start_scale),
            ("chars_per_second", self.chars_per_second),
        ];
        for (field, v) in numbers {
            if !v.is_finite() {
                return Err(CutsceneError::validation(format!(
                    "bubbles: {field} must be finite"
                )));
            }
        }
        if self.id_prefix.trim().is_empty() {
            return Err(CutsceneError::validation(
                "bubbles: id_prefix must be non-empty",
            ));
        }
        Ok(())
    }

    /// Maps `[0, 1]²` onto the spawn area, centered on the origin.
    pub fn normalized_to_anchored(&self, x01: f64, y01: f64) -> Vec2 {
        Vec2::new(
            (x01.clamp(0.0, 1.0) - 0.5) * self.spawn_area.width,
            (y01.clamp(0.0, 1.0) - 0.5) * self.spawn_area.height,
        )
    }

    /// Keeps a bubble of `bubble_size` inside the spawn area. A bubble larger than the
    /// area pins to the low edge.
    pub fn clamp_inside(&self, desired: Vec2) -> Vec2 {
        let half_w = self.bubble_size.width * 0.5;
        let half_h = self.bubble_size.height * 0.5;
        let area_w = self.spawn_area.width * 0.5;
        let area_h = self.spawn_area.height * 0.5;
        Vec2::new(
            clamp_loose(desired.x, -area_w + half_w, area_w - half_w),
            clamp_loose(desired.y, -area_h + half_h, area_h - half_h),
        )
    }
}

// `f64::clamp` panics when min > max.
fn clamp_loose(v: f64, min: f64, max: f64) -> f64 {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

#[derive(Clone, Debug)]
struct Bubble {
    id: TargetId,
    fade: Tween<f64>,
    grow: Tween<f64>,
    writer: Typewriter,
    elapsed: Duration,
    typing: bool,
}

/// Speech-bubble collaborator that spawns headless text targets onto the stage.
#[derive(Clone, Debug, Default)]
pub struct BubbleBoard {
    config: BubbleConfig,
    bubbles: Vec<Bubble>,
    spawned: u64,
}

impl BubbleBoard {
    pub fn new(config: BubbleConfig) -> Self {
        Self {
            config,
            bubbles: Vec::new(),
            spawned: 0,
        }
    }

    pub fn config(&self) -> &BubbleConfig {
        &self.config
    }

    /// Stage ids of the live bubbles, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &TargetId> {
        self.bubbles.iter().map(|b| &b.id)
    }

    pub fn current(&self) -> Option<&TargetId> {
        self.bubbles.last().map(|b| &b.id)
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }
}

impl BubbleDirector for BubbleBoard {
    fn spawn(&mut self, stage: &mut Stage, x01: f64, y01: f64, text: &str) {
        let cfg = &self.config;
        let mut position = cfg.normalized_to_anchored(x01, y01);
        if cfg.clamp_to_bounds {
            position = cfg.clamp_inside(position);
        }

        let mut target = HeadlessTarget::anchored(position)
            .with_size(Vec2::new(cfg.bubble_size.width, cfg.bubble_size.height))
            .with_text();
        target.set_opacity(0.0);
        target.set_scale(cfg.start_scale);
        let writer = match target.text() {
            Some(buffer) => {
                buffer.set_full_text(text);
                buffer.set_visible_character_count(0);
                Typewriter::new(buffer.character_count(), cfg.chars_per_second.max(1.0))
            }
            None => Typewriter::new(0, cfg.chars_per_second),
        };

        let appear = secs(cfg.appear_duration);
        let bubble = Bubble {
            id: TargetId::new(format!("{}-{}", cfg.id_prefix, self.spawned)),
            fade: Tween::new(0.0, 1.0, appear, Ease::OutCubic),
            grow: Tween::new(cfg.start_scale, 1.0, appear, cfg.appear_ease),
            typing: !writer.is_instant(),
            writer,
            elapsed: Duration::ZERO,
        };
        if let Some(buffer) = target.text()
            && !bubble.typing
        {
            buffer.set_visible_character_count(bubble.writer.total);
        }

        tracing::debug!(bubble = %bubble.id, x = position.x, y = position.y, "bubble spawned");
        self.spawned += 1;
        stage.insert(bubble.id.clone(), target);
        self.bubbles.push(bubble);
    }

    fn is_typing(&self) -> bool {
        self.bubbles.last().is_some_and(|b| b.typing)
    }

    fn skip_if_typing(&mut self, stage: &mut Stage) -> bool {
        let Some(bubble) = self.bubbles.last_mut() else {
            return false;
        };
        if !bubble.typing {
            return false;
        }
        bubble.typing = false;
        if let Some(buffer) = stage.get_mut(&bubble.id).and_then(|t| t.text()) {
            buffer.set_visible_character_count(bubble.writer.total);
        }
        tracing::debug!(bubble = %bubble.id, "typing skipped");
        true
    }

    fn clear_all(&mut self, stage: &mut Stage) {
        for bubble in self.bubbles.drain(..) {
            stage.remove(&bubble.id);
        }
    }

    fn tick(&mut self, stage: &mut Stage, dt: Duration) {
        for bubble in &mut self.bubbles {
            bubble.elapsed += dt;
            let Some(target) = stage.get_mut(&bubble.id) else {
                bubble.typing = false;
                continue;
            };
            target.set_opacity(bubble.fade.sample(bubble.elapsed));
            target.set_scale(bubble.grow.sample(bubble.elapsed));
            if bubble.typing
                && let Some(buffer) = target.text()
            {
                buffer.set_visible_character_count(bubble.writer.visible_at(bubble.elapsed));
                bubble.typing = !bubble.writer.is_complete(bubble.elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn visible(stage: &mut Stage, id: &TargetId) -> usize {
        stage
            .get_mut(id)
            .and_then(|t| t.text())
            .map(|t| t.visible_character_count())
            .unwrap()
    }

    #[test]
    fn normalized_coordinates_are_centered() {
        let cfg = BubbleConfig::default();
        assert_eq!(cfg.normalized_to_anchored(0.5, 0.5), Vec2::ZERO);
        assert_eq!(cfg.normalized_to_anchored(0.0, 1.0), Vec2::new(-960.0, 540.0));
        assert_eq!(cfg.normalized_to_anchored(-3.0, 2.0), Vec2::new(-960.0, 540.0));
    }

    #[test]
    fn clamping_keeps_bubbles_inside() {
        let cfg = BubbleConfig::default();
        assert_eq!(
            cfg.clamp_inside(Vec2::new(-960.0, 540.0)),
            Vec2::new(-760.0, 460.0)
        );

        let tiny = BubbleConfig {
            spawn_area: Size::new(100.0, 100.0),
            ..BubbleConfig::default()
        };
        assert_eq!(tiny.clamp_inside(Vec2::new(30.0, -30.0)), Vec2::new(150.0, 30.0));
    }

    #[test]
    fn spawn_appears_and_types() {
        let mut stage = Stage::new();
        let mut board = BubbleBoard::new(BubbleConfig {
            chars_per_second: 10.0,
            ..BubbleConfig::default()
        });
        board.spawn(&mut stage, 0.5, 0.5, "abc");
        let id = board.current().unwrap().clone();
        assert_eq!(id.as_str(), "bubble-0");
        assert!(board.is_typing());
        assert_eq!(stage.get(&id).unwrap().opacity(), 0.0);
        assert_eq!(stage.get(&id).unwrap().scale(), 0.85);

        for _ in 0..3 {
            board.tick(&mut stage, ms(100));
        }
        assert_eq!(stage.get(&id).unwrap().opacity(), 1.0);
        assert_eq!(stage.get(&id).unwrap().scale(), 1.0);
        assert_eq!(visible(&mut stage, &id), 3);
        assert!(!board.is_typing());
    }

    #[test]
    fn skip_reveals_everything() {
        let mut stage = Stage::new();
        let mut board = BubbleBoard::default();
        board.spawn(&mut stage, 0.2, 0.8, "hello there");
        board.tick(&mut stage, ms(50));
        assert!(board.skip_if_typing(&mut stage));
        assert!(!board.is_typing());
        let id = board.current().unwrap().clone();
        assert_eq!(visible(&mut stage, &id), 11);
        assert!(!board.skip_if_typing(&mut stage));
    }

    #[test]
    fn empty_text_is_not_typing() {
        let mut stage = Stage::new();
        let mut board = BubbleBoard::default();
        board.spawn(&mut stage, 0.5, 0.5, "");
        assert!(!board.is_typing());
    }

    #[test]
    fn clear_all_removes_targets() {
        let mut stage = Stage::new();
        let mut board = BubbleBoard::default();
        board.spawn(&mut stage, 0.1, 0.1, "a");
        board.spawn(&mut stage, 0.9, 0.9, "b");
        assert_eq!(stage.len(), 2);
        assert_eq!(board.ids().count(), 2);
        board.clear_all(&mut stage);
        assert!(stage.is_empty());
        assert!(board.is_empty());

        board.spawn(&mut stage, 0.5, 0.5, "c");
        assert_eq!(board.current().unwrap().as_str(), "bubble-2");
    }
}
