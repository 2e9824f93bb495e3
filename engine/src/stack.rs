use alloc::string::String;
use alloc::vec::Vec;

use crate::beat::BeatState;
use crate::{BlendMode, Color, Effect, EffectParams, Fixture3d, FixtureOutput, Vec3};

/// One effect with its parameters and compositing settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectLayer {
    pub effect: Effect,
    pub params: EffectParams,
    pub blend_mode: BlendMode,
    pub opacity: f32,
    pub enabled: bool,
}

impl EffectLayer {
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            params: EffectParams::new(),
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            enabled: true,
        }
    }

    pub fn with_params(mut self, params: EffectParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }
}

/// The ordered layer stack, bottom first, plus the master dimmer.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectStack {
    pub layers: Vec<EffectLayer>,
    pub master_dimmer: f32,
}

impl Default for EffectStack {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectStack {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            master_dimmer: 1.0,
        }
    }

    /// Composite every enabled layer at one fixture, then apply the master
    /// dimmer to the color.
    pub fn evaluate(&self, position: Vec3, pixel_index: usize, beat: &BeatState) -> FixtureOutput {
        let mut out = FixtureOutput::BLACK;
        for layer in self.layers.iter().filter(|l| l.enabled) {
            let layer_out = layer
                .effect
                .evaluate(position, pixel_index, beat, &layer.params);
            out = out.blend_with(&layer_out, layer.blend_mode, layer.opacity);
        }
        out.color = out.color * self.master_dimmer;
        out
    }

    /// Render the whole fixture list into `colors`, one entry per fixture.
    pub fn render(&self, fixtures: &[Fixture3d], beat: &BeatState, colors: &mut Vec<Color>) {
        colors.clear();
        colors.extend(
            fixtures
                .iter()
                .enumerate()
                .map(|(index, fixture)| self.evaluate(fixture.position, index, beat).color),
        );
    }
}

/// A captured look: the layer stack and master dimmer at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub name: String,
    pub layers: Vec<EffectLayer>,
    pub master_dimmer: f32,
}
