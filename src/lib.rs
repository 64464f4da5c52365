#![forbid(unsafe_code)]

pub mod anim;
pub mod anim_ease;
pub mod bubbles;
pub mod clock;
pub mod composer;
pub mod core;
pub mod dialogue;
pub mod dsl;
pub mod error;
pub mod flow;
pub mod headless;
pub mod layout;
pub mod model;
pub mod panels;
pub mod pulse;
pub mod scheduler;
pub mod stage;
pub mod task;

pub use anim::{Tween, Typewriter};
pub use anim_ease::Ease;
pub use bubbles::{BubbleBoard, BubbleConfig};
pub use clock::{Clock, FixedClock, InputSource, ScriptedInput, SystemClock};
pub use composer::{BubbleDirector, CinematicComposer, MacroOutcome, PanelDirector};
pub use core::{Direction, Fps, Size, TargetId, Vec2};
pub use dialogue::{DialogueConfig, DialogueLine, DialoguePanel};
pub use dsl::{ScriptBuilder, SequenceBuilder};
pub use error::{CutsceneError, CutsceneResult};
pub use flow::{Dialogue, FlowConfig, FlowTick, Phase, PhaseFlow};
pub use headless::{HeadlessTarget, HeadlessText};
pub use layout::{LayoutSnapshotStore, LayoutState};
pub use model::{Action, GroupMode, MacroStep, SchedulerConfig, Script, Step};
pub use panels::{InEffect, PanelBoard, PanelSpec};
pub use pulse::PulseSlot;
pub use scheduler::{Batch, StepScheduler, TickOutcome};
pub use stage::{Stage, TextTarget, VisualTarget};
