use alloc::string::String;
use alloc::vec::Vec;

#[allow(unused_imports)]
use micromath::F32Ext;

/// The role of one byte inside a fixture's channel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelType {
    Red,
    Green,
    Blue,
    White,
    Dimmer,
    Pan,
    PanFine,
    Tilt,
    TiltFine,
    Gobo,
    ColorWheel,
    Strobe,
    Focus,
    Zoom,
    Speed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: &'static str,
    pub channel_type: ChannelType,
    /// Offset from the fixture's start address, 0-based
    pub offset: u16,
    pub default_value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorMixing {
    None,
    Rgb,
    Rgbw,
    Cmy,
}

/// How a visualizer should draw this fixture. The engine itself only uses it
/// as an opaque tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RenderHint {
    Point,
    Bar,
    BeamCone,
    Wash,
    Strip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalTraits {
    pub beam_angle_deg: f32,
    pub pan_range_deg: f32,
    pub tilt_range_deg: f32,
    pub pixel_count: u16,
}

impl PhysicalTraits {
    pub const PAR: PhysicalTraits = PhysicalTraits {
        beam_angle_deg: 25.0,
        pan_range_deg: 0.0,
        tilt_range_deg: 0.0,
        pixel_count: 1,
    };
}

/// Describes a fixture model: its channel layout and capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub fixture_type: &'static str,
    pub channels: &'static [Channel],
    pub has_movement: bool,
    pub color_mixing: ColorMixing,
    pub physical: PhysicalTraits,
    pub render_hint: RenderHint,
}

impl FixtureProfile {
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// The first channel of the given type, if the profile has one.
    pub fn channel(&self, channel_type: ChannelType) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.channel_type == channel_type)
    }
}

pub const GENERIC_RGB_PROFILE_ID: &str = "generic-rgb";

const GENERIC_RGB: FixtureProfile = FixtureProfile {
    id: GENERIC_RGB_PROFILE_ID,
    name: "Generic RGB Par",
    fixture_type: "par",
    channels: &[
        Channel {
            name: "Red",
            channel_type: ChannelType::Red,
            offset: 0,
            default_value: 0,
        },
        Channel {
            name: "Green",
            channel_type: ChannelType::Green,
            offset: 1,
            default_value: 0,
        },
        Channel {
            name: "Blue",
            channel_type: ChannelType::Blue,
            offset: 2,
            default_value: 0,
        },
    ],
    has_movement: false,
    color_mixing: ColorMixing::Rgb,
    physical: PhysicalTraits::PAR,
    render_hint: RenderHint::Point,
};

const GENERIC_RGBW: FixtureProfile = FixtureProfile {
    id: "generic-rgbw",
    name: "Generic RGBW Par",
    fixture_type: "par",
    channels: &[
        Channel {
            name: "Red",
            channel_type: ChannelType::Red,
            offset: 0,
            default_value: 0,
        },
        Channel {
            name: "Green",
            channel_type: ChannelType::Green,
            offset: 1,
            default_value: 0,
        },
        Channel {
            name: "Blue",
            channel_type: ChannelType::Blue,
            offset: 2,
            default_value: 0,
        },
        Channel {
            name: "White",
            channel_type: ChannelType::White,
            offset: 3,
            default_value: 0,
        },
    ],
    has_movement: false,
    color_mixing: ColorMixing::Rgbw,
    physical: PhysicalTraits::PAR,
    render_hint: RenderHint::Point,
};

const MOVING_HEAD_RGB: FixtureProfile = FixtureProfile {
    id: "moving-head-rgb",
    name: "Moving Head RGB Spot",
    fixture_type: "moving-head",
    channels: &[
        Channel {
            name: "Red",
            channel_type: ChannelType::Red,
            offset: 0,
            default_value: 0,
        },
        Channel {
            name: "Green",
            channel_type: ChannelType::Green,
            offset: 1,
            default_value: 0,
        },
        Channel {
            name: "Blue",
            channel_type: ChannelType::Blue,
            offset: 2,
            default_value: 0,
        },
        Channel {
            name: "Pan",
            channel_type: ChannelType::Pan,
            offset: 3,
            default_value: 128,
        },
        Channel {
            name: "Tilt",
            channel_type: ChannelType::Tilt,
            offset: 4,
            default_value: 128,
        },
        Channel {
            name: "Dimmer",
            channel_type: ChannelType::Dimmer,
            offset: 5,
            default_value: 255,
        },
        Channel {
            name: "Gobo",
            channel_type: ChannelType::Gobo,
            offset: 6,
            default_value: 0,
        },
    ],
    has_movement: true,
    color_mixing: ColorMixing::Rgb,
    physical: PhysicalTraits {
        beam_angle_deg: 14.0,
        pan_range_deg: 540.0,
        tilt_range_deg: 270.0,
        pixel_count: 1,
    },
    render_hint: RenderHint::BeamCone,
};

/// The process-lifetime table of built-in profiles.
pub const fn builtin_profiles() -> &'static [FixtureProfile] {
    &[GENERIC_RGB, GENERIC_RGBW, MOVING_HEAD_RGB]
}

pub fn builtin_profile(id: &str) -> Option<&'static FixtureProfile> {
    builtin_profiles().iter().find(|p| p.id == id)
}

/// A patched fixture: a profile instance at a DMX address.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub id: String,
    pub name: String,
    /// 1-based DMX start address
    pub channel_start: u16,
    pub channel_count: u16,
    /// 0-based universe number
    pub universe: u16,
    pub profile_id: String,
}

impl Fixture {
    pub fn new(id: impl Into<String>, name: impl Into<String>, channel_start: u16) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            channel_start,
            channel_count: 3,
            universe: 0,
            profile_id: String::from(GENERIC_RGB_PROFILE_ID),
        }
    }

    /// First DMX address past this fixture's window, 1-based exclusive.
    pub fn channel_end(&self) -> u16 {
        self.channel_start + self.channel_count
    }

    pub fn overlaps(&self, other: &Fixture) -> bool {
        self.universe == other.universe
            && self.channel_start < other.channel_end()
            && other.channel_start < self.channel_end()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatchError {
    /// The fixture's channel window does not fit a 512 channel universe
    WindowExceedsUniverse,
    /// Two fixtures on one universe claim overlapping channel windows
    Overlap,
}

/// Validate the channel-window invariants over a fixture list.
pub fn check_patch(fixtures: &[Fixture]) -> Result<(), PatchError> {
    for fixture in fixtures {
        if fixture.channel_start == 0 || fixture.channel_end() > 513 {
            return Err(PatchError::WindowExceedsUniverse);
        }
    }
    for (i, a) in fixtures.iter().enumerate() {
        for b in &fixtures[i + 1..] {
            if a.overlaps(b) {
                return Err(PatchError::Overlap);
            }
        }
    }
    Ok(())
}

/// A point in rig space, metres, z up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z).length()
    }
}

/// A fixture placed in rig space.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture3d {
    pub fixture: Fixture,
    pub position: Vec3,
    pub group_id: Option<String>,
}

impl Fixture3d {
    pub fn new(fixture: Fixture, position: Vec3) -> Self {
        Self {
            fixture,
            position,
            group_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_lookup() {
        let profile = builtin_profile(GENERIC_RGB_PROFILE_ID).unwrap();
        assert_eq!(3, profile.channel_count());
        assert!(builtin_profile("no-such-profile").is_none());
    }

    #[test]
    fn channel_lookup_returns_first_match() {
        let profile = builtin_profile("moving-head-rgb").unwrap();
        assert_eq!(3, profile.channel(ChannelType::Pan).unwrap().offset);
        assert_eq!(0, profile.channel(ChannelType::Red).unwrap().offset);
        assert!(profile.channel(ChannelType::Focus).is_none());
    }

    #[test]
    fn overlap_is_per_universe() {
        let mut a = Fixture::new("a", "A", 1);
        let mut b = Fixture::new("b", "B", 3);
        assert!(a.overlaps(&b));

        b.universe = 1;
        assert!(!a.overlaps(&b));

        b.universe = 0;
        a.channel_start = 10;
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn check_patch_accepts_adjacent_windows() {
        let a = Fixture::new("a", "A", 1);
        let b = Fixture::new("b", "B", 4);
        assert_eq!(Ok(()), check_patch(&[a, b]));
    }

    #[test]
    fn check_patch_flags_window_past_512() {
        let mut f = Fixture::new("f", "F", 511);
        assert_eq!(
            Err(PatchError::WindowExceedsUniverse),
            check_patch(core::slice::from_ref(&f))
        );
        f.channel_start = 510;
        assert_eq!(Ok(()), check_patch(core::slice::from_ref(&f)));
    }

    #[test]
    fn check_patch_flags_overlap() {
        let a = Fixture::new("a", "A", 1);
        let b = Fixture::new("b", "B", 2);
        assert_eq!(Err(PatchError::Overlap), check_patch(&[a, b]));
    }
}
