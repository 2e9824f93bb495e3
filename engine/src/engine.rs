use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};

use crate::beat::{BeatState, BeatWatch};
use crate::effect::keys;
use crate::{BlendMode, Color, EffectLayer, EffectStack, Fixture3d, FrameWriter, Scene};

/// Target render rate, decoupled from the 40 Hz DMX rate.
pub const ENGINE_FRAME_RATE_HZ: u32 = 60;

/// One rendered frame: a color per fixture, in fixture-list order.
pub type ColorFrame = Vec<Color>;

/// The layered effect evaluator.
///
/// Holds an immutable fixture snapshot and the layer stack; the render loop
/// samples the beat watch, evaluates the stack at every fixture position and
/// publishes one [`ColorFrame`] per tick into the frame buffers. Control
/// plane mutations land between frames; a frame always sees a consistent
/// stack snapshot.
pub struct EffectEngine {
    fixtures: Mutex<CriticalSectionRawMutex, Arc<Vec<Fixture3d>>>,
    stack: Mutex<CriticalSectionRawMutex, EffectStack>,
    tempo_multiplier_bits: AtomicU32,
    frame_rate_hz: u32,
}

impl Default for EffectEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectEngine {
    pub fn new() -> Self {
        Self::with_frame_rate(ENGINE_FRAME_RATE_HZ)
    }

    pub fn with_frame_rate(frame_rate_hz: u32) -> Self {
        Self {
            fixtures: Mutex::new(Arc::new(Vec::new())),
            stack: Mutex::new(EffectStack::new()),
            tempo_multiplier_bits: AtomicU32::new(1.0f32.to_bits()),
            frame_rate_hz: frame_rate_hz.max(1),
        }
    }

    /// Replace the fixture snapshot the render loop evaluates.
    pub async fn set_fixtures(&self, fixtures: Vec<Fixture3d>) {
        *self.fixtures.lock().await = Arc::new(fixtures);
    }

    pub async fn fixtures(&self) -> Arc<Vec<Fixture3d>> {
        self.fixtures.lock().await.clone()
    }

    pub async fn push_layer(&self, layer: EffectLayer) {
        self.stack.lock().await.layers.push(layer);
    }

    /// Replace the layer at `index`. Returns false when out of range.
    pub async fn set_layer(&self, index: usize, layer: EffectLayer) -> bool {
        let mut stack = self.stack.lock().await;
        match stack.layers.get_mut(index) {
            Some(slot) => {
                *slot = layer;
                true
            }
            None => false,
        }
    }

    pub async fn remove_layer(&self, index: usize) -> Option<EffectLayer> {
        let mut stack = self.stack.lock().await;
        if index < stack.layers.len() {
            Some(stack.layers.remove(index))
        } else {
            None
        }
    }

    pub async fn set_blend_mode(&self, index: usize, blend_mode: BlendMode) -> bool {
        let mut stack = self.stack.lock().await;
        match stack.layers.get_mut(index) {
            Some(layer) => {
                layer.blend_mode = blend_mode;
                true
            }
            None => false,
        }
    }

    pub async fn set_layer_enabled(&self, index: usize, enabled: bool) -> bool {
        let mut stack = self.stack.lock().await;
        match stack.layers.get_mut(index) {
            Some(layer) => {
                layer.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub async fn set_master_dimmer(&self, dimmer: f32) {
        self.stack.lock().await.master_dimmer = dimmer.clamp(0.0, 1.0);
    }

    pub async fn master_dimmer(&self) -> f32 {
        self.stack.lock().await.master_dimmer
    }

    /// Apply a palette of `#RRGGBB` strings to every layer. Unparseable
    /// entries are dropped; an empty result leaves the stack untouched.
    pub async fn set_palette(&self, hex_colors: &[&str]) {
        let palette: Vec<Color> = hex_colors.iter().filter_map(|s| Color::from_hex(s)).collect();
        if palette.is_empty() {
            warn!("palette contained no parseable colors");
            return;
        }
        let first = palette[0];
        let mut stack = self.stack.lock().await;
        for layer in &mut stack.layers {
            layer.params = layer
                .params
                .with(keys::COLORS, palette.clone())
                .with(keys::COLOR, first);
        }
    }

    /// Scale the tempo the effects see, without touching the clock.
    pub fn set_tempo_multiplier(&self, multiplier: f32) {
        let clamped = multiplier.clamp(0.25, 4.0);
        self.tempo_multiplier_bits
            .store(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn tempo_multiplier(&self) -> f32 {
        f32::from_bits(self.tempo_multiplier_bits.load(Ordering::Relaxed))
    }

    pub async fn capture_scene(&self, name: &str) -> Scene {
        let stack = self.stack.lock().await;
        Scene {
            name: name.into(),
            layers: stack.layers.clone(),
            master_dimmer: stack.master_dimmer,
        }
    }

    pub async fn apply_scene(&self, scene: &Scene) {
        let mut stack = self.stack.lock().await;
        stack.layers = scene.layers.clone();
        stack.master_dimmer = scene.master_dimmer;
        info!("applied scene");
    }

    /// The render loop. Runs forever; spawn it on the engine worker.
    ///
    /// A tick that overruns its deadline simply drops that frame's sleep;
    /// there is no catch-up burst.
    pub async fn run(&self, mut writer: FrameWriter<'_, ColorFrame>, beat: &BeatWatch) -> ! {
        let mut beat_rx = beat.receiver().unwrap();
        let interval = Duration::from_hz(self.frame_rate_hz as u64);
        info!("effect engine running at {} Hz", self.frame_rate_hz);

        loop {
            let started = Instant::now();

            let state = beat_rx
                .try_get()
                .unwrap_or(BeatState::IDLE)
                .with_multiplier(self.tempo_multiplier());
            let fixtures = self.fixtures.lock().await.clone();
            let stack = self.stack.lock().await.clone();

            stack.render(&fixtures, &state, writer.slot());
            writer.publish();

            let elapsed = started.elapsed();
            let rest = if elapsed < interval {
                interval - elapsed
            } else {
                trace!("render tick overran: {} us", elapsed.as_micros());
                Duration::from_ticks(0)
            };
            Timer::after(rest).await;
        }
    }
}
