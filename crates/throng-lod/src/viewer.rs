//! Viewer descriptors and the per-frame viewer cache shared by the collector
//! and the calculator.

use glam::{Vec3, Vec4};

use crate::lod::MAX_VIEWERS;

/// Stable identity of a viewer (camera or player).
///
/// Slot reuse is detected by comparing handles, so a recycled `index` must
/// come with a new `serial`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewerHandle {
    /// Slot in the external viewer registry.
    pub index: u32,
    /// Generation of the slot; zero means invalid.
    pub serial: u32,
}

impl ViewerHandle {
    /// The handle of an empty slot.
    pub const INVALID: ViewerHandle = ViewerHandle {
        index: u32::MAX,
        serial: 0,
    };

    /// Create a valid handle. `serial` must be non-zero.
    pub fn new(index: u32, serial: u32) -> Self {
        debug_assert!(serial != 0, "serial 0 is reserved for invalid handles");
        Self { index, serial }
    }

    /// Whether this handle refers to a live viewer.
    pub fn is_valid(&self) -> bool {
        self.serial != 0
    }
}

impl Default for ViewerHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Set of planes bounding a view volume. No near or far plane.
///
/// Each plane is stored as `(normal, d)` with the normal pointing out of the
/// volume, so a point `p` is outside a plane when `normal.dot(p) > d`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvexVolume {
    /// Outward-facing planes.
    pub planes: Vec<Vec4>,
}

impl ConvexVolume {
    /// Build a volume from outward-facing planes.
    pub fn new(planes: Vec<Vec4>) -> Self {
        Self { planes }
    }

    /// Largest signed distance from `point` to any plane.
    ///
    /// Negative inside the volume, positive outside. An empty volume contains
    /// everything.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.planes
            .iter()
            .map(|plane| plane.truncate().dot(point) - plane.w)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Whether `point` lies inside or on the volume.
    pub fn contains(&self, point: Vec3) -> bool {
        self.signed_distance(point) <= 0.0
    }
}

/// One observation point for a frame.
#[derive(Clone, Debug)]
pub struct Viewer {
    /// Identity of the viewer.
    pub handle: ViewerHandle,
    /// World location.
    pub location: Vec3,
    /// Forward direction, unit length.
    pub direction: Vec3,
    /// Exact view volume, for consumers that need plane culling.
    pub frustum: Option<ConvexVolume>,
    /// Disabled viewers are ignored for the frame.
    pub enabled: bool,
    /// Viewer belongs to this process (not a remote client).
    pub is_local: bool,
}

impl Viewer {
    /// An enabled local viewer without a frustum.
    pub fn new(handle: ViewerHandle, location: Vec3, direction: Vec3) -> Self {
        Self {
            handle,
            location,
            direction: direction.normalize_or_zero(),
            frustum: None,
            enabled: true,
            is_local: true,
        }
    }
}

/// Fixed-size cache of the viewers relevant for the current frame.
#[derive(Clone, Debug)]
pub struct ViewerCache {
    handles: [ViewerHandle; MAX_VIEWERS],
    locations: [Vec3; MAX_VIEWERS],
    directions: [Vec3; MAX_VIEWERS],
    needs_clear: [bool; MAX_VIEWERS],
    local_only: bool,
}

impl ViewerCache {
    /// Create an empty cache. With `local_only`, remote viewers are ignored.
    pub fn new(local_only: bool) -> Self {
        Self {
            handles: [ViewerHandle::INVALID; MAX_VIEWERS],
            locations: [Vec3::ZERO; MAX_VIEWERS],
            directions: [Vec3::ZERO; MAX_VIEWERS],
            needs_clear: [false; MAX_VIEWERS],
            local_only,
        }
    }

    /// Refresh the cache from this frame's ordered viewer list.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_VIEWERS`] viewers are supplied.
    pub fn cache_viewer_information(&mut self, viewers: &[Viewer]) {
        assert!(
            viewers.len() <= MAX_VIEWERS,
            "at most {MAX_VIEWERS} viewers are supported, got {}",
            viewers.len()
        );

        for slot in 0..MAX_VIEWERS {
            let viewer = viewers
                .get(slot)
                .filter(|v| v.enabled && (!self.local_only || v.is_local));
            let handle = viewer.map_or(ViewerHandle::INVALID, |v| v.handle);

            self.needs_clear[slot] = handle != self.handles[slot];
            self.handles[slot] = handle;

            if let Some(viewer) = viewer.filter(|v| v.handle.is_valid()) {
                self.locations[slot] = viewer.location;
                self.directions[slot] = viewer.direction;
            }
        }
    }

    /// Whether the slot holds a valid viewer this frame.
    pub fn is_valid(&self, slot: usize) -> bool {
        self.handles[slot].is_valid()
    }

    /// Whether the slot changed owner since the previous frame.
    pub fn needs_clear(&self, slot: usize) -> bool {
        self.needs_clear[slot]
    }

    /// Handle cached in the slot.
    pub fn handle(&self, slot: usize) -> ViewerHandle {
        self.handles[slot]
    }

    /// Location cached in the slot. Meaningless unless [`Self::is_valid`].
    pub fn location(&self, slot: usize) -> Vec3 {
        self.locations[slot]
    }

    /// Direction cached in the slot. Meaningless unless [`Self::is_valid`].
    pub fn direction(&self, slot: usize) -> Vec3 {
        self.directions[slot]
    }

    /// Indices of valid slots.
    pub fn valid_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_VIEWERS).filter(|&slot| self.is_valid(slot))
    }

    /// Number of valid slots.
    pub fn valid_count(&self) -> usize {
        self.valid_slots().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(index: u32, serial: u32, x: f32) -> Viewer {
        Viewer::new(ViewerHandle::new(index, serial), Vec3::new(x, 0.0, 0.0), Vec3::X)
    }

    #[test]
    fn test_caches_valid_viewers() {
        let mut cache = ViewerCache::new(false);
        cache.cache_viewer_information(&[viewer(0, 1, 10.0), viewer(1, 1, 20.0)]);

        assert!(cache.is_valid(0));
        assert!(cache.is_valid(1));
        assert!(!cache.is_valid(2));
        assert_eq!(cache.location(1), Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(cache.direction(0), Vec3::X);
        assert_eq!(cache.valid_count(), 2);
    }

    /// The first frame marks newly occupied slots for clearing, the second does not.
    #[test]
    fn test_needs_clear_only_on_handle_change() {
        let mut cache = ViewerCache::new(false);
        let viewers = [viewer(0, 1, 0.0)];
        cache.cache_viewer_information(&viewers);
        assert!(cache.needs_clear(0));
        assert!(!cache.needs_clear(1));

        cache.cache_viewer_information(&viewers);
        assert!(!cache.needs_clear(0));

        // Same slot reused by a different viewer.
        cache.cache_viewer_information(&[viewer(0, 2, 0.0)]);
        assert!(cache.needs_clear(0));
    }

    #[test]
    fn test_disabled_and_remote_viewers_are_invalid() {
        let mut disabled = viewer(0, 1, 0.0);
        disabled.enabled = false;
        let mut remote = viewer(1, 1, 0.0);
        remote.is_local = false;

        let mut cache = ViewerCache::new(true);
        cache.cache_viewer_information(&[disabled.clone(), remote.clone()]);
        assert_eq!(cache.valid_count(), 0);

        let mut cache = ViewerCache::new(false);
        cache.cache_viewer_information(&[disabled, remote]);
        assert!(!cache.is_valid(0));
        assert!(cache.is_valid(1));
    }

    /// A viewer disappearing frees its slot and flags it.
    #[test]
    fn test_viewer_removed_flags_slot() {
        let mut cache = ViewerCache::new(false);
        cache.cache_viewer_information(&[viewer(0, 1, 0.0)]);
        cache.cache_viewer_information(&[]);
        assert!(!cache.is_valid(0));
        assert!(cache.needs_clear(0));
        assert_eq!(cache.handle(0), ViewerHandle::INVALID);
    }

    #[test]
    #[should_panic(expected = "viewers are supported")]
    fn test_too_many_viewers_panics() {
        let viewers: Vec<_> = (0..=MAX_VIEWERS as u32).map(|i| viewer(i, 1, 0.0)).collect();
        ViewerCache::new(false).cache_viewer_information(&viewers);
    }

    #[test]
    fn test_convex_volume_distance() {
        // Unit box around the origin, without near/far along z.
        let volume = ConvexVolume::new(vec![
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(-1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
            Vec4::new(0.0, -1.0, 0.0, 1.0),
        ]);
        assert!(volume.contains(Vec3::new(0.5, 0.5, 100.0)));
        assert!(!volume.contains(Vec3::new(3.0, 0.0, 0.0)));
        assert!((volume.signed_distance(Vec3::new(3.0, 0.0, 0.0)) - 2.0).abs() < 1e-6);
        assert!(ConvexVolume::default().contains(Vec3::splat(1.0e6)));
    }
}
