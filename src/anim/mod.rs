//! Surface animation: immutable definitions plus the periodic engine that
//! advances active instances and reports frames and completions.

pub mod catalog;
pub mod engine;

pub use catalog::{parse_surface_table, AnimationDefinition, AnimationPattern, TriggerInterval};
pub use engine::{
    AnimCommand, AnimEvent, AnimationEngine, AnimationHandle, AnimationSet, Frame, GhostId,
};
