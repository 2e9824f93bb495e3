use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Index bits of the back slot.
const INDEX: u8 = 0b011;
/// Set when the back slot holds a frame the reader has not seen yet.
const FRESH: u8 = 0b100;

/// A lock-free triple buffer for frame handoff.
///
/// Three fixed slots rotate between a writer, a reader and a shared "back"
/// slot. The writer renders into its private slot and publishes it with one
/// atomic swap; the reader claims the freshest published slot the same way.
/// Neither side ever blocks, and the reader always observes a completely
/// written frame.
pub struct FrameBuffers<T> {
    slots: [UnsafeCell<T>; 3],
    back: AtomicU8,
    split: AtomicBool,
}

// Slots are only ever touched through the single Writer/Reader pair, which
// the swap protocol keeps on disjoint indices.
unsafe impl<T: Send> Sync for FrameBuffers<T> {}

impl<T: Clone> FrameBuffers<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slots: [
                UnsafeCell::new(initial.clone()),
                UnsafeCell::new(initial.clone()),
                UnsafeCell::new(initial),
            ],
            back: AtomicU8::new(2),
            split: AtomicBool::new(false),
        }
    }
}

impl<T> FrameBuffers<T> {
    /// Split into the writer and reader endpoints. Panics when called twice;
    /// the buffer supports exactly one producer and one consumer.
    pub fn split(&self) -> (FrameWriter<'_, T>, FrameReader<'_, T>) {
        assert!(
            !self.split.swap(true, Ordering::AcqRel),
            "frame buffers already split"
        );
        (
            FrameWriter { buffers: self, index: 0 },
            FrameReader { buffers: self, index: 1 },
        )
    }
}

pub struct FrameWriter<'a, T> {
    buffers: &'a FrameBuffers<T>,
    index: u8,
}

impl<T> FrameWriter<'_, T> {
    /// Exclusive access to the current write slot.
    pub fn slot(&mut self) -> &mut T {
        unsafe { &mut *self.buffers.slots[self.index as usize].get() }
    }

    /// Publish the write slot and take over the previous back slot.
    pub fn publish(&mut self) {
        let old = self
            .buffers
            .back
            .swap(self.index | FRESH, Ordering::AcqRel);
        self.index = old & INDEX;
    }
}

pub struct FrameReader<'a, T> {
    buffers: &'a FrameBuffers<T>,
    index: u8,
}

impl<T> FrameReader<'_, T> {
    /// The most recently published frame. Stable until the next call.
    pub fn latest(&mut self) -> &T {
        if self.buffers.back.load(Ordering::Acquire) & FRESH != 0 {
            let old = self.buffers.back.swap(self.index, Ordering::AcqRel);
            self.index = old & INDEX;
        }
        unsafe { &*self.buffers.slots[self.index as usize].get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_starts_with_initial_frame() {
        let buffers = FrameBuffers::new(0u32);
        let (_, mut reader) = buffers.split();
        assert_eq!(0, *reader.latest());
    }

    #[test]
    fn published_frame_reaches_reader() {
        let buffers = FrameBuffers::new(0u32);
        let (mut writer, mut reader) = buffers.split();

        *writer.slot() = 7;
        writer.publish();

        assert_eq!(7, *reader.latest());
        // Re-reading without a new publish returns the same frame
        assert_eq!(7, *reader.latest());
    }

    #[test]
    fn reader_sees_only_the_newest_frame() {
        let buffers = FrameBuffers::new(0u32);
        let (mut writer, mut reader) = buffers.split();

        for frame in 1..=5u32 {
            *writer.slot() = frame;
            writer.publish();
        }

        assert_eq!(5, *reader.latest());
    }

    #[test]
    fn interleaved_writes_and_reads() {
        let buffers = FrameBuffers::new(0u32);
        let (mut writer, mut reader) = buffers.split();

        for frame in 1..=100u32 {
            *writer.slot() = frame;
            writer.publish();
            assert_eq!(frame, *reader.latest());
        }
    }

    #[test]
    #[should_panic(expected = "already split")]
    fn split_twice_panics() {
        let buffers = FrameBuffers::new(0u32);
        let _pair = buffers.split();
        let _second = buffers.split();
    }

    #[test]
    fn concurrent_writer_and_reader() {
        let buffers = FrameBuffers::new([0u64; 64]);
        let (mut writer, mut reader) = buffers.split();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                for frame in 1..=10_000u64 {
                    let slot = writer.slot();
                    // Every word of a frame carries the same value; a torn
                    // frame would mix values.
                    slot.fill(frame);
                    writer.publish();
                }
            });

            scope.spawn(move || {
                let mut last = 0;
                for _ in 0..10_000 {
                    let frame = reader.latest();
                    let first = frame[0];
                    assert!(frame.iter().all(|&w| w == first), "torn frame");
                    assert!(first >= last, "frame went backwards");
                    last = first;
                }
            });
        });
    }
}
