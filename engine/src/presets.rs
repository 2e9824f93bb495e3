use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::effect::keys;
use crate::{BlendMode, Color, Effect, EffectLayer, EffectParams, Scene};

/// The built-in looks. Applied through the engine's scene API like any
/// captured scene.
pub fn builtin_presets() -> Vec<Scene> {
    vec![
        Scene {
            name: String::from("Rainbow Wash"),
            layers: vec![EffectLayer::new(Effect::Gradient3d).with_params(
                EffectParams::new()
                    .with(
                        keys::COLORS,
                        vec![
                            Color::RED,
                            Color::new(1.0, 0.5, 0.0),
                            Color::new(1.0, 1.0, 0.0),
                            Color::GREEN,
                            Color::BLUE,
                            Color::new(0.5, 0.0, 1.0),
                        ],
                    )
                    .with(keys::SCALE, 4.0f32)
                    .with(keys::SPEED, 0.125f32),
            )],
            master_dimmer: 1.0,
        },
        Scene {
            name: String::from("Club Chase"),
            layers: vec![
                EffectLayer::new(Effect::Chase3d).with_params(
                    EffectParams::new()
                        .with(keys::COLORS, vec![Color::RED, Color::BLACK, Color::BLUE])
                        .with(keys::SPEED, 1.0f32),
                ),
                EffectLayer::new(Effect::Pulse)
                    .with_params(EffectParams::new().with(keys::COLOR, Color::WHITE))
                    .with_blend_mode(BlendMode::Additive)
                    .with_opacity(0.4),
            ],
            master_dimmer: 1.0,
        },
        Scene {
            name: String::from("Slow Ocean"),
            layers: vec![EffectLayer::new(Effect::Wave3d).with_params(
                EffectParams::new()
                    .with(keys::COLOR, Color::new(0.0, 0.4, 1.0))
                    .with(keys::WAVELENGTH, 3.0f32)
                    .with(keys::SPEED, 0.25f32),
            )],
            master_dimmer: 0.8,
        },
        Scene {
            name: String::from("Blinder Strobe"),
            layers: vec![EffectLayer::new(Effect::Strobe).with_params(
                EffectParams::new()
                    .with(keys::RATE, 2.0f32)
                    .with(keys::DUTY, 0.15f32),
            )],
            master_dimmer: 1.0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_well_formed() {
        let presets = builtin_presets();
        assert!(!presets.is_empty());
        for preset in &presets {
            assert!(!preset.name.is_empty());
            assert!(!preset.layers.is_empty());
            assert!((0.0..=1.0).contains(&preset.master_dimmer));
            for layer in &preset.layers {
                assert!((0.0..=1.0).contains(&layer.opacity));
                assert!(layer.enabled);
            }
        }
    }
}
