use crate::Color;

/// How a layer composites over the layers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Overlay,
}

/// What one effect wants a fixture to do: a color plus optional movement
/// channels. `None` means "no opinion", which blending preserves from the
/// base.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixtureOutput {
    pub color: Color,
    pub pan: Option<f32>,
    pub tilt: Option<f32>,
    pub gobo: Option<i32>,
    pub focus: Option<f32>,
    pub zoom: Option<f32>,
    pub strobe_rate: Option<f32>,
}

impl FixtureOutput {
    pub const BLACK: FixtureOutput = FixtureOutput {
        color: Color::BLACK,
        pan: None,
        tilt: None,
        gobo: None,
        focus: None,
        zoom: None,
        strobe_rate: None,
    };

    pub const fn with_color(color: Color) -> Self {
        FixtureOutput {
            color,
            ..FixtureOutput::BLACK
        }
    }

    /// Composite `overlay` over `self`.
    ///
    /// Colors blend per component. Float movement channels blend the same
    /// way, with a null overlay preserving the base and a null base treated
    /// as zero. The integer gobo slot is replaced, not interpolated, whenever
    /// the overlay has an opinion and the layer is visible at all.
    pub fn blend_with(&self, overlay: &FixtureOutput, mode: BlendMode, opacity: f32) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        FixtureOutput {
            color: Color::new(
                blend_component(self.color.r, overlay.color.r, mode, opacity),
                blend_component(self.color.g, overlay.color.g, mode, opacity),
                blend_component(self.color.b, overlay.color.b, mode, opacity),
            ),
            pan: blend_channel(self.pan, overlay.pan, mode, opacity),
            tilt: blend_channel(self.tilt, overlay.tilt, mode, opacity),
            gobo: blend_gobo(self.gobo, overlay.gobo, opacity),
            focus: blend_channel(self.focus, overlay.focus, mode, opacity),
            zoom: blend_channel(self.zoom, overlay.zoom, mode, opacity),
            strobe_rate: blend_channel(self.strobe_rate, overlay.strobe_rate, mode, opacity),
        }
    }

    /// Like [`blend_with`](Self::blend_with) but the base color always wins.
    pub fn blend_movement_only(&self, overlay: &FixtureOutput, mode: BlendMode, opacity: f32) -> Self {
        FixtureOutput {
            color: self.color,
            ..self.blend_with(overlay, mode, opacity)
        }
    }
}

fn blend_component(base: f32, overlay: f32, mode: BlendMode, opacity: f32) -> f32 {
    let blended = match mode {
        BlendMode::Normal => overlay,
        BlendMode::Additive => (base + overlay).clamp(0.0, 1.0),
        BlendMode::Multiply => base * overlay,
        BlendMode::Overlay => {
            if base < 0.5 {
                2.0 * base * overlay
            } else {
                1.0 - 2.0 * (1.0 - base) * (1.0 - overlay)
            }
        }
    };
    base + (blended - base) * opacity
}

fn blend_channel(base: Option<f32>, overlay: Option<f32>, mode: BlendMode, opacity: f32) -> Option<f32> {
    match overlay {
        None => base,
        Some(overlay) => Some(blend_component(base.unwrap_or(0.0), overlay, mode, opacity)),
    }
}

fn blend_gobo(base: Option<i32>, overlay: Option<i32>, opacity: f32) -> Option<i32> {
    match overlay {
        Some(_) if opacity > 0.0 => overlay,
        _ => base,
    }
}
