//! The density grid and the frame history that drives it.
//!
//! Each magnitude frame becomes one Z slice of the grid. The most recent
//! frame is mapped to `z = 0`, so the surface scrolls backwards through time
//! along +Z. Inside a slice, bin `x` raises a column whose height is the bin's
//! magnitude scaled against the loudest bin of that frame; the density at a
//! lattice point falls linearly from 1 at the floor to 0 at the column top.

use glam::{UVec3, Vec3};

use crate::error::Result;
use crate::options::FieldOptions;
use crate::tables;

/// A lattice point of the scalar field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    /// Grid-space position, `coord * voxel_size`. Never changes after construction.
    pub position: Vec3,
    /// Current density; frame-driven updates keep it in `[0, 1]`. Replaced on
    /// every update, never accumulated.
    pub density: f32,
}

/// Fixed-capacity FIFO of magnitude frames.
///
/// Frames live in a ring of byte slots that are allocated once and recycled:
/// pushing onto a full history overwrites the slot of the oldest frame.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    slots: Vec<Vec<u8>>,
    head: usize,
    len: usize,
}

impl FrameHistory {
    /// Creates an empty history holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Vec::new(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of frames retained.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of frames currently retained.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no frame has been pushed since the last clear.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a copy of `frame`, evicting the oldest frame when full.
    pub fn push(&mut self, frame: &[u8]) {
        let capacity = self.capacity();
        let slot = if self.len == capacity {
            let oldest = self.head;
            self.head = (self.head + 1) % capacity;
            oldest
        } else {
            self.len += 1;
            (self.head + self.len - 1) % capacity
        };
        let buf = &mut self.slots[slot];
        buf.clear();
        buf.extend_from_slice(frame);
    }

    /// Returns the `i`-th retained frame, oldest first.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        (i < self.len).then(|| self.slots[(self.head + i) % self.capacity()].as_slice())
    }

    /// Returns the frame pushed `age` pushes ago; `age == 0` is the newest.
    pub fn recent(&self, age: usize) -> Option<&[u8]> {
        self.len.checked_sub(age + 1).and_then(|i| self.get(i))
    }

    /// Iterates frames from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Forgets every frame. Slot contents are zero-filled and their
    /// allocations kept for reuse.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.fill(0);
        }
        self.head = 0;
        self.len = 0;
    }
}

/// A fixed-size 3D density grid fed by magnitude frames.
#[derive(Debug, Clone)]
pub struct ScalarField {
    options: FieldOptions,
    points: Vec<GridPoint>,
    history: FrameHistory,
}

impl ScalarField {
    /// Lays out the lattice with all densities at zero.
    ///
    /// # Errors
    ///
    /// Fails if the options describe an unusable grid or the lookup tables
    /// are malformed.
    pub fn new(options: FieldOptions) -> Result<Self> {
        options.validate()?;
        tables::validate()?;

        let UVec3 { x: nx, y: ny, z: nz } = options.dimensions;
        let mut points = Vec::with_capacity(options.num_points());
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    points.push(GridPoint {
                        position: UVec3::new(x, y, z).as_vec3() * options.voxel_size,
                        density: 0.0,
                    });
                }
            }
        }

        log::debug!(
            "scalar field {nx}x{ny}x{nz} ({} points), voxel size {}",
            points.len(),
            options.voxel_size
        );

        Ok(Self {
            options,
            points,
            history: FrameHistory::new(nz as usize),
        })
    }

    /// Returns the options the field was built with.
    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    /// Returns the number of lattice points along each axis.
    pub fn dimensions(&self) -> UVec3 {
        self.options.dimensions
    }

    /// Flattens a lattice coordinate: `x + dimX * (y + dimY * z)`.
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        let d = self.options.dimensions;
        x as usize + d.x as usize * (y as usize + d.y as usize * z as usize)
    }

    /// Returns the lattice point at a coordinate.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside the grid.
    #[inline]
    pub fn point(&self, x: u32, y: u32, z: u32) -> &GridPoint {
        &self.points[self.index(x, y, z)]
    }

    /// Returns every lattice point in index order.
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Returns the frame history.
    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    /// Pushes a new magnitude frame, evicting the oldest at capacity.
    pub fn ingest(&mut self, frame: &[u8]) {
        self.history.push(frame);
    }

    /// Height of column `x` for a frame whose loudest bin is `peak`.
    ///
    /// Bins past the end of the frame have height 0.
    pub fn raw_height(&self, frame: &[u8], peak: u8, x: u32) -> f32 {
        match frame.get(x as usize) {
            Some(&m) if peak > 0 => f32::from(m) / f32::from(peak) * self.options.max_height(),
            _ => 0.0,
        }
    }

    /// Recomputes densities for every slice that has a frame.
    ///
    /// Slices without a frame, and slices whose frame is completely silent,
    /// keep their previous densities.
    pub fn recompute(&mut self) {
        let UVec3 { x: nx, y: ny, z: nz } = self.options.dimensions;
        let slices = (nz as usize).min(self.history.len());

        for z in 0..slices {
            let Some(frame) = self.history.recent(z) else {
                continue;
            };
            let peak = frame.iter().copied().max().unwrap_or(0);
            if peak == 0 {
                continue;
            }

            // z < nz, so the cast is lossless
            #[allow(clippy::cast_possible_truncation)]
            let z = z as u32;
            for x in 0..nx {
                let height = self.raw_height(frame, peak, x);
                for y in 0..ny {
                    let i = self.index(x, y, z);
                    let point = &mut self.points[i];
                    let value = height - point.position.y;
                    point.density = if value < 0.0 || height == 0.0 {
                        0.0
                    } else {
                        value / height
                    };
                }
            }
        }
    }

    /// Overwrites densities in index order. Extra values are ignored.
    #[cfg(test)]
    pub(crate) fn set_densities(&mut self, densities: impl IntoIterator<Item = f32>) {
        for (point, density) in self.points.iter_mut().zip(densities) {
            point.density = density;
        }
    }

    /// Drops the history and zeroes every density. Positions are kept.
    pub fn reset(&mut self) {
        self.history.clear();
        for point in &mut self.points {
            point.density = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpectroError;

    fn small_field() -> ScalarField {
        ScalarField::new(FieldOptions::new(UVec3::new(4, 6, 3), 1.0)).unwrap()
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = FrameHistory::new(3);
        for i in 0..5u8 {
            history.push(&[i]);
        }
        assert_eq!(history.len(), 3);
        let frames: Vec<u8> = history.iter().map(|f| f[0]).collect();
        assert_eq!(frames, vec![2, 3, 4]);
        assert_eq!(history.recent(0), Some(&[4u8][..]));
        assert_eq!(history.recent(2), Some(&[2u8][..]));
        assert_eq!(history.recent(3), None);
    }

    #[test]
    fn test_history_keeps_frame_lengths() {
        let mut history = FrameHistory::new(2);
        history.push(&[1, 2, 3, 4]);
        history.push(&[5]);
        history.push(&[6, 7]);
        assert_eq!(history.recent(0), Some(&[6u8, 7][..]));
        assert_eq!(history.recent(1), Some(&[5u8][..]));
    }

    #[test]
    fn test_history_clear() {
        let mut history = FrameHistory::new(2);
        history.push(&[9, 9]);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.get(0), None);
        history.push(&[1]);
        assert_eq!(history.recent(0), Some(&[1u8][..]));
    }

    #[test]
    fn test_layout_and_index() {
        let field = small_field();
        assert_eq!(field.points().len(), 4 * 6 * 3);
        for z in 0..3 {
            for y in 0..6 {
                for x in 0..4 {
                    let i = field.index(x, y, z);
                    assert_eq!(i, (x + 4 * (y + 6 * z)) as usize);
                    let p = field.point(x, y, z);
                    assert_eq!(p.position, Vec3::new(x as f32, y as f32, z as f32));
                    assert_eq!(p.density, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_voxel_size_scales_positions() {
        let field = ScalarField::new(FieldOptions::new(UVec3::new(3, 3, 3), 2.0)).unwrap();
        assert_eq!(field.point(2, 1, 2).position, Vec3::new(4.0, 2.0, 4.0));
    }

    #[test]
    fn test_invalid_options_are_fatal() {
        let result = ScalarField::new(FieldOptions::new(UVec3::new(4, 0, 4), 1.0));
        assert!(matches!(result, Err(SpectroError::InvalidDimensions { .. })));

        // too many points to address
        let result = ScalarField::new(FieldOptions::new(UVec3::new(u32::MAX, u32::MAX, 2), 1.0));
        assert!(matches!(result, Err(SpectroError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_single_spike() {
        let mut field = small_field();
        let max_height = field.options().max_height();
        let frame = [0, 255, 0];

        assert_eq!(field.raw_height(&frame, 255, 1), max_height);
        assert_eq!(field.raw_height(&frame, 255, 0), 0.0);
        assert_eq!(field.raw_height(&frame, 255, 2), 0.0);
        assert_eq!(field.raw_height(&frame, 255, 3), 0.0);

        field.ingest(&frame);
        field.recompute();

        // spike column: density falls from 1 at the floor
        for y in 0..6 {
            let expected = (max_height - y as f32) / max_height;
            assert!((field.point(1, y, 0).density - expected).abs() < 1e-6);
        }
        // silent and missing columns stay at zero
        for x in [0, 2, 3] {
            for y in 0..6 {
                assert_eq!(field.point(x, y, 0).density, 0.0);
            }
        }
    }

    #[test]
    fn test_column_height_scales_with_peak() {
        let mut field = small_field();
        field.ingest(&[100, 50]);
        field.recompute();

        // bin 1 is half of the peak: height 3, so y = 3 sits on the surface
        assert!((field.point(1, 0, 0).density - 1.0).abs() < 1e-6);
        assert!((field.point(1, 1, 0).density - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(field.point(1, 3, 0).density, 0.0);
        assert_eq!(field.point(1, 5, 0).density, 0.0);
    }

    #[test]
    fn test_newest_frame_maps_to_front_slice() {
        let mut field = small_field();
        field.ingest(&[255, 0, 0, 0]);
        field.ingest(&[0, 0, 0, 255]);
        field.recompute();

        assert!(field.point(3, 0, 0).density > 0.0);
        assert_eq!(field.point(0, 0, 0).density, 0.0);
        assert!(field.point(0, 0, 1).density > 0.0);
        assert_eq!(field.point(3, 0, 1).density, 0.0);
        // no frame for z = 2 yet
        assert_eq!(field.point(0, 0, 2).density, 0.0);
    }

    #[test]
    fn test_silent_slice_keeps_previous_densities() {
        let mut field = small_field();
        field.ingest(&[255, 128, 64, 32]);
        field.recompute();
        let before: Vec<f32> = field.points().iter().map(|p| p.density).collect();
        assert!(before.iter().any(|&d| d > 0.0));

        // the loud frame moves to z = 1, the silent one lands on z = 0
        field.ingest(&[0, 0, 0, 0]);
        field.recompute();

        for y in 0..6 {
            for x in 0..4 {
                let i = field.index(x, y, 0);
                assert_eq!(field.points()[i].density, before[i], "({x}, {y}, 0)");
                let moved = field.point(x, y, 1).density;
                assert_eq!(moved, before[i], "({x}, {y}, 1)");
            }
        }
    }

    #[test]
    fn test_history_capacity_is_depth() {
        let mut field = small_field();
        for i in 0..10u8 {
            field.ingest(&[i + 1]);
        }
        assert_eq!(field.history().len(), 3);
        assert_eq!(field.history().recent(0), Some(&[10u8][..]));
    }

    #[test]
    fn test_reset() {
        let mut field = small_field();
        field.ingest(&[255]);
        field.recompute();
        field.reset();
        assert!(field.history().is_empty());
        assert!(field.points().iter().all(|p| p.density == 0.0));
        assert_eq!(field.point(1, 2, 1).position, Vec3::new(1.0, 2.0, 1.0));
    }
}
