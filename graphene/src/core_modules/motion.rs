// THEORY:
// The `motion` module decides when a frame is worth sending to the extractor.
// Running scene-graph inference on every frame is far too slow, so the
// acquisition side waits on a `MotionGate` and only hands a frame over once
// the scene has visibly changed.
//
// Key architectural principles:
// 1.  **Spatial Pooling**: The frame is cut into a grid of chunks and each chunk
//     is reduced to its average luminance. Single-pixel sensor noise cancels out
//     inside a chunk; a person walking through does not.
// 2.  **Frame-to-Frame Comparison**: The gate keeps the previous frame's chunk
//     averages and compares the new frame against them. A chunk "moved" when its
//     luminance shifted by more than the threshold.
// 3.  **Warm-Up**: Cameras adjust exposure for a few frames after opening. The
//     gate ignores those frames and only learns from them.

use image::RgbaImage;

/// Tunables for the motion gate.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
    /// Width of a chunk in pixels.
    pub chunk_width: u32,
    /// Height of a chunk in pixels.
    pub chunk_height: u32,
    /// Minimum change in a chunk's average luminance (0-255 scale) to count as movement.
    pub threshold: f64,
    /// How many chunks must move in the same frame to trigger.
    pub min_changed_chunks: usize,
    /// Frames to observe after (re)start before the gate may trigger.
    pub warmup_frames: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            chunk_width: 16,
            chunk_height: 16,
            threshold: 5.0,
            min_changed_chunks: 1,
            warmup_frames: 5,
        }
    }
}

/// Frame-differencing motion detector over a chunk grid.
pub struct MotionGate {
    config: MotionConfig,
    /// Chunk luminance averages of the previous frame, row-major.
    baseline: Vec<f64>,
    /// Dimensions the baseline was computed for.
    dimensions: Option<(u32, u32)>,
    frames_seen: u32,
}

impl MotionGate {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            baseline: Vec::new(),
            dimensions: None,
            frames_seen: 0,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Forgets the baseline; the next frames re-enter warm-up.
    pub fn reset(&mut self) {
        self.baseline.clear();
        self.dimensions = None;
        self.frames_seen = 0;
    }

    /// Feeds one frame and reports whether it shows motion relative to the previous one.
    pub fn observe(&mut self, frame: &RgbaImage) -> bool {
        let dimensions = frame.dimensions();
        if self.dimensions != Some(dimensions) {
            self.reset();
            self.dimensions = Some(dimensions);
        }

        let averages = self.chunk_luminance(frame);
        self.frames_seen = self.frames_seen.saturating_add(1);

        let triggered = if self.frames_seen <= self.config.warmup_frames.max(1) {
            false
        } else {
            self.changed_chunks(&averages) >= self.config.min_changed_chunks.max(1)
        };

        self.baseline = averages;
        triggered
    }

    fn changed_chunks(&self, averages: &[f64]) -> usize {
        self.baseline
            .iter()
            .zip(averages)
            .filter(|(before, after)| (*after - *before).abs() > self.config.threshold)
            .count()
    }

    /// Average luminance of every chunk, row-major. Edge chunks that do not fill
    /// a whole chunk are averaged over the pixels they do have.
    fn chunk_luminance(&self, frame: &RgbaImage) -> Vec<f64> {
        let (width, height) = frame.dimensions();
        let chunk_w = self.config.chunk_width.max(1);
        let chunk_h = self.config.chunk_height.max(1);
        let grid_w = width.div_ceil(chunk_w);
        let grid_h = height.div_ceil(chunk_h);

        let mut sums = vec![0.0f64; (grid_w * grid_h) as usize];
        let mut counts = vec![0u32; sums.len()];

        for (x, y, pixel) in frame.enumerate_pixels() {
            let index = ((y / chunk_h) * grid_w + (x / chunk_w)) as usize;
            let [r, g, b, _] = pixel.0;
            sums[index] += 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            counts[index] += 1;
        }

        sums.iter()
            .zip(&counts)
            .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn flat(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    fn gate() -> MotionGate {
        MotionGate::new(MotionConfig {
            chunk_width: 10,
            chunk_height: 10,
            threshold: 5.0,
            min_changed_chunks: 1,
            warmup_frames: 1,
        })
    }

    #[test]
    fn first_frame_never_triggers() {
        let mut gate = gate();
        assert!(!gate.observe(&flat(40, 40, 0)));
    }

    #[test]
    fn static_scene_does_not_trigger() {
        let mut gate = gate();
        for _ in 0..10 {
            assert!(!gate.observe(&flat(40, 40, 100)));
        }
    }

    #[test]
    fn small_flicker_stays_below_threshold() {
        let mut gate = gate();
        gate.observe(&flat(40, 40, 100));
        assert!(!gate.observe(&flat(40, 40, 104)));
    }

    #[test]
    fn local_change_triggers() {
        let mut gate = gate();
        gate.observe(&flat(40, 40, 100));

        let mut moved = flat(40, 40, 100);
        for y in 10..20 {
            for x in 10..20 {
                moved.put_pixel(x, y, Rgba([200, 200, 200, 255]));
            }
        }
        assert!(gate.observe(&moved));
        // Once the change has settled the gate goes quiet again.
        assert!(!gate.observe(&moved));
    }

    #[test]
    fn warmup_frames_are_ignored() {
        let mut gate = MotionGate::new(MotionConfig {
            warmup_frames: 3,
            chunk_width: 10,
            chunk_height: 10,
            ..MotionConfig::default()
        });
        assert!(!gate.observe(&flat(20, 20, 0)));
        assert!(!gate.observe(&flat(20, 20, 255)));
        assert!(!gate.observe(&flat(20, 20, 0)));
        assert!(gate.observe(&flat(20, 20, 255)));
    }

    #[test]
    fn resolution_change_restarts_warmup() {
        let mut gate = gate();
        gate.observe(&flat(40, 40, 0));
        assert!(!gate.observe(&flat(30, 30, 255)));
        assert!(gate.observe(&flat(30, 30, 0)));
    }

    #[test]
    fn min_changed_chunks_requires_wider_motion() {
        let mut gate = MotionGate::new(MotionConfig {
            chunk_width: 10,
            chunk_height: 10,
            threshold: 5.0,
            min_changed_chunks: 2,
            warmup_frames: 1,
        });
        gate.observe(&flat(20, 10, 0));

        let mut one_chunk = flat(20, 10, 0);
        for y in 0..10 {
            for x in 0..10 {
                one_chunk.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        assert!(!gate.observe(&one_chunk));
        assert!(gate.observe(&flat(20, 10, 128)));
    }
}
