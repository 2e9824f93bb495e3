//! The effect library.
//!
//! Effects are a closed sum type with one total `evaluate` per variant. They
//! are stateless by contract: the same position, beat snapshot and parameters
//! always produce the same output, which makes layer stacks trivially
//! serializable and frames parallelizable.

use crate::beat::BeatState;
use crate::{Color, EffectParams, FixtureOutput, Vec3};

#[allow(unused_imports)]
use micromath::F32Ext;

/// Well-known parameter keys.
pub mod keys {
    /// Single color, used by Solid, Wave3d, Strobe and Pulse
    pub const COLOR: &str = "color";
    /// Color palette, used by Gradient3d and Chase3d
    pub const COLORS: &str = "colors";
    /// Spatial axis: 0 = x, 1 = y, 2 = z
    pub const AXIS: &str = "axis";
    /// Metres per palette span (Gradient3d)
    pub const SCALE: &str = "scale";
    /// Beats per step/cycle, effect dependent
    pub const SPEED: &str = "speed";
    /// Metres between chase slots (Chase3d)
    pub const SPACING: &str = "spacing";
    /// Metres per wave cycle (Wave3d)
    pub const WAVELENGTH: &str = "wavelength";
    /// Flashes per beat (Strobe)
    pub const RATE: &str = "rate";
    /// On fraction of a flash (Strobe)
    pub const DUTY: &str = "duty";
}

const DEFAULT_PALETTE: [Color; 2] = [Color::RED, Color::BLUE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// One flat color everywhere
    Solid,
    /// A palette gradient along a spatial axis, scrolling with the beat
    Gradient3d,
    /// Palette colors stepping through space on each beat
    Chase3d,
    /// A brightness sine wave travelling along an axis
    Wave3d,
    /// Hard on/off flashes locked to the beat
    Strobe,
    /// Full brightness on the downbeat, decaying over the beat
    Pulse,
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Solid => "solid",
            Effect::Gradient3d => "gradient-3d",
            Effect::Chase3d => "chase-3d",
            Effect::Wave3d => "wave-3d",
            Effect::Strobe => "strobe",
            Effect::Pulse => "pulse",
        }
    }

    /// Evaluate this effect at one fixture.
    pub fn evaluate(
        &self,
        position: Vec3,
        pixel_index: usize,
        beat: &BeatState,
        params: &EffectParams,
    ) -> FixtureOutput {
        let color = match self {
            Effect::Solid => params.get_color(keys::COLOR, Color::WHITE),
            Effect::Gradient3d => gradient(position, beat, params),
            Effect::Chase3d => chase(position, pixel_index, beat, params),
            Effect::Wave3d => wave(position, beat, params),
            Effect::Strobe => strobe(beat, params),
            Effect::Pulse => pulse(beat, params),
        };
        FixtureOutput::with_color(color)
    }
}

fn axis_coord(position: Vec3, axis: i32) -> f32 {
    match axis {
        0 => position.x,
        1 => position.y,
        _ => position.z,
    }
}

/// Sample a palette at `t`, wrapping and interpolating between entries.
fn sample_palette(colors: &[Color], t: f32) -> Color {
    if colors.len() < 2 {
        return colors.first().copied().unwrap_or(Color::BLACK);
    }
    let t = t - t.floor();
    let pos = t * colors.len() as f32;
    let index = (pos as usize) % colors.len();
    let next = (index + 1) % colors.len();
    colors[index].lerp(colors[next], pos - pos.floor())
}

fn gradient(position: Vec3, beat: &BeatState, params: &EffectParams) -> Color {
    let palette = params.get_colors(keys::COLORS, &DEFAULT_PALETTE);
    let axis = params.get_i32(keys::AXIS, 0);
    let scale = params.get_f32(keys::SCALE, 2.0).max(0.01);
    let speed = params.get_f32(keys::SPEED, 0.25);

    let t = axis_coord(position, axis) / scale + beat.beats() * speed;
    sample_palette(palette, t)
}

fn chase(position: Vec3, pixel_index: usize, beat: &BeatState, params: &EffectParams) -> Color {
    let palette = params.get_colors(keys::COLORS, &DEFAULT_PALETTE);
    let axis = params.get_i32(keys::AXIS, 0);
    let spacing = params.get_f32(keys::SPACING, 1.0).max(0.01);
    let speed = params.get_f32(keys::SPEED, 1.0);

    let step = (beat.beats() * speed).floor();
    let slot = step + (axis_coord(position, axis) / spacing).floor() + pixel_index as f32;
    let len = palette.len() as f32;
    let wrapped = slot % len;
    let wrapped = if wrapped < 0.0 { wrapped + len } else { wrapped };
    palette[(wrapped as usize).min(palette.len() - 1)]
}

fn wave(position: Vec3, beat: &BeatState, params: &EffectParams) -> Color {
    let color = params.get_color(keys::COLOR, Color::WHITE);
    let axis = params.get_i32(keys::AXIS, 2);
    let wavelength = params.get_f32(keys::WAVELENGTH, 2.0).max(0.01);
    let speed = params.get_f32(keys::SPEED, 1.0);

    let phase = axis_coord(position, axis) / wavelength - beat.beats() * speed;
    let level = 0.5 + 0.5 * (phase * core::f32::consts::TAU).sin();
    color * level
}

fn strobe(beat: &BeatState, params: &EffectParams) -> Color {
    let color = params.get_color(keys::COLOR, Color::WHITE);
    let rate = params.get_f32(keys::RATE, 4.0).max(0.01);
    let duty = params.get_f32(keys::DUTY, 0.1).clamp(0.0, 1.0);

    let flash = beat.beats() * rate;
    if flash - flash.floor() < duty {
        color
    } else {
        Color::BLACK
    }
}

fn pulse(beat: &BeatState, params: &EffectParams) -> Color {
    let color = params.get_color(keys::COLOR, Color::WHITE);
    let level = 1.0 - beat.beat_phase;
    color * (level * level)
}
