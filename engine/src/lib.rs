#![cfg_attr(not(test), no_std)]

//! The ChromaDMX effect engine.
//!
//! Each frame the engine evaluates a stack of beat-synchronized effect layers
//! at every fixture's 3D position, composites them with blend modes, applies
//! the master dimmer and publishes one [`Color`] per fixture into a lock-free
//! triple buffer. The DMX pipeline consumes the read slot at its own rate.
//!
//! Effects are a closed sum type of pure functions; all time dependence
//! enters through [`beat::BeatState`], which a clock worker derives from tap
//! tempo or an external mesh session.

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

extern crate alloc;

pub mod beat;
mod buffer;
mod color;
pub mod effect;
mod engine;
mod fixture;
mod output;
mod params;
mod presets;
mod stack;

pub use buffer::{FrameBuffers, FrameReader, FrameWriter};
pub use color::Color;
pub use effect::Effect;
pub use engine::{ColorFrame, EffectEngine, ENGINE_FRAME_RATE_HZ};
pub use fixture::{
    builtin_profile, builtin_profiles, check_patch, Channel, ChannelType, ColorMixing, Fixture,
    Fixture3d, FixtureProfile, PatchError, PhysicalTraits, RenderHint, Vec3,
    GENERIC_RGB_PROFILE_ID,
};
pub use output::{BlendMode, FixtureOutput};
pub use params::{EffectParams, ParamValue};
pub use presets::builtin_presets;
pub use stack::{EffectLayer, EffectStack, Scene};
