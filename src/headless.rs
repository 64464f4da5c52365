//! In-memory targets with no renderer behind them.
//!
//! Used by the CLI to simulate scripts and by tests to observe what a sequence wrote.

use crate::{
    core::Vec2,
    stage::{TextTarget, VisualTarget},
};

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HeadlessText {
    pub full_text: String,
    pub visible: usize,
}

impl TextTarget for HeadlessText {
    fn set_full_text(&mut self, text: &str) {
        self.full_text = text.to_string();
    }

    fn character_count(&self) -> usize {
        self.full_text.chars().count()
    }

    fn visible_character_count(&self) -> usize {
        self.visible
    }

    fn set_visible_character_count(&mut self, n: usize) {
        self.visible = n;
    }
}

impl HeadlessText {
    /// The currently revealed prefix.
    pub fn visible_text(&self) -> String {
        self.full_text.chars().take(self.visible).collect()
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeadlessTarget {
    pub stretched: bool,
    pub anchored_position: Vec2,
    pub offset_min: Vec2,
    pub offset_max: Vec2,
    pub size: Vec2,
    pub opacity: f64,
    pub scale: f64,
    pub interactive: bool,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<HeadlessText>,
}

impl Default for HeadlessTarget {
    fn default() -> Self {
        Self {
            stretched: false,
            anchored_position: Vec2::ZERO,
            offset_min: Vec2::ZERO,
            offset_max: Vec2::ZERO,
            size: Vec2::ZERO,
            opacity: 1.0,
            scale: 1.0,
            interactive: true,
            active: true,
            sprite: None,
            text: None,
        }
    }
}

impl HeadlessTarget {
    pub fn anchored(position: Vec2) -> Self {
        Self {
            anchored_position: position,
            ..Self::default()
        }
    }

    pub fn stretched(offset_min: Vec2, offset_max: Vec2) -> Self {
        Self {
            stretched: true,
            offset_min,
            offset_max,
            ..Self::default()
        }
    }

    pub fn with_text(mut self) -> Self {
        self.text = Some(HeadlessText::default());
        self
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }
}

impl VisualTarget for HeadlessTarget {
    fn is_stretched(&self) -> bool {
        self.stretched
    }

    fn anchored_position(&self) -> Vec2 {
        self.anchored_position
    }

    fn set_anchored_position(&mut self, position: Vec2) {
        self.anchored_position = position;
    }

    fn offsets(&self) -> (Vec2, Vec2) {
        (self.offset_min, self.offset_max)
    }

    fn set_offsets(&mut self, min: Vec2, max: Vec2) {
        self.offset_min = min;
        self.offset_max = max;
    }

    fn opacity(&self) -> f64 {
        self.opacity
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity;
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn set_sprite(&mut self, sprite: &str) {
        self.sprite = Some(sprite.to_string());
    }

    fn sprite(&self) -> Option<&str> {
        self.sprite.as_deref()
    }

    fn size(&self) -> Vec2 {
        self.size
    }

    fn text(&mut self) -> Option<&mut dyn TextTarget> {
        self.text.as_mut().map(|t| t as &mut dyn TextTarget)
    }
}
