use std::collections::VecDeque;

use log::{debug, warn};

use crate::sim::{Float3, Pose};

use super::config::AnchorTemplate;

/// Stable index of a segment in the pool's arena.
/// C-compatible layout for FFI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u32);

impl SegmentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Connector strip closing the seam between two consecutive segments.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bridge {
    /// Midpoint between the anchors, looking from the older tail to the newer head.
    pub pose: Pose,
    /// Distance between the anchors, floored at the template's minimum.
    pub length: f32,
}

/// Plain-data segment handle. What it looks like is up to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub active: bool,
    pub pose: Pose,
    pub head_anchor: Float3,
    pub tail_anchor: Float3,
    /// Arc length actually covered (may be shorter than nominal in turns).
    pub length: f32,
    pub arc_start: f64,
    pub arc_end: f64,
    pub bridge: Option<Bridge>,
}

impl Segment {
    fn new(id: SegmentId) -> Self {
        Self {
            id,
            active: false,
            pose: Pose::IDENTITY,
            head_anchor: Float3::ZERO,
            tail_anchor: Float3::ZERO,
            length: 0.0,
            arc_start: 0.0,
            arc_end: 0.0,
            bridge: None,
        }
    }

    /// Places the segment and recomputes its world-space anchors.
    pub fn set_pose(&mut self, pose: Pose, anchors: &AnchorTemplate) {
        self.pose = pose;
        self.head_anchor = pose.transform_point(anchors.head_offset());
        self.tail_anchor = pose.transform_point(anchors.tail_offset());
    }

    pub fn set_arc_range(&mut self, arc_start: f64, arc_end: f64) {
        self.arc_start = arc_start;
        self.arc_end = arc_end;
        self.length = (arc_end - arc_start) as f32;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if !active {
            self.bridge = None;
        }
    }
}

/// Bounded-by-caller pool of reusable segments.
///
/// Segments live in an arena indexed by [`SegmentId`]; inactive ones sit in a
/// FIFO free list. `get` never fails: an empty free list grows the arena.
#[derive(Debug, Clone)]
pub struct SegmentPool {
    segments: Vec<Segment>,
    free: VecDeque<SegmentId>,
    prewarmed: usize,
}

impl SegmentPool {
    /// Pool with `initial` inactive segments ready for use.
    pub fn new(initial: usize) -> Self {
        let mut pool = Self {
            segments: Vec::with_capacity(initial),
            free: VecDeque::with_capacity(initial),
            prewarmed: initial,
        };
        for _ in 0..initial {
            let id = pool.create();
            pool.free.push_back(id);
        }
        pool
    }

    fn create(&mut self) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        self.segments.push(Segment::new(id));
        id
    }

    /// Hands out an inactive segment, activated.
    pub fn get(&mut self) -> SegmentId {
        let id = match self.free.pop_front() {
            Some(id) => id,
            None => {
                let id = self.create();
                if self.segments.len() > self.prewarmed {
                    debug!(
                        "Segment pool grew to {} (pre-warmed {})",
                        self.segments.len(),
                        self.prewarmed
                    );
                }
                id
            }
        };
        self.segments[id.index()].set_active(true);
        id
    }

    /// Deactivates `id` and returns it to the free list.
    ///
    /// Returns `false` (and changes nothing) for unknown ids and for segments
    /// that are already free.
    pub fn release(&mut self, id: SegmentId) -> bool {
        let Some(segment) = self.segments.get_mut(id.index()) else {
            warn!("Ignoring release of unknown segment {id:?}");
            return false;
        };
        if !segment.active {
            warn!("Ignoring double release of segment {id:?}");
            return false;
        }

        segment.set_active(false);
        self.free.push_back(id);
        true
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.index())
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(id.index())
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Total segments ever constructed (free + in use).
    pub fn capacity(&self) -> usize {
        self.segments.len()
    }

    pub fn free_ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.free.iter().copied()
    }

    pub fn is_free(&self, id: SegmentId) -> bool {
        self.segment(id).is_some_and(|s| !s.active)
    }
}
