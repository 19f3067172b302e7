//! C ABI for hosts that drive the track pipeline from another runtime.
//!
//! Functions:
//! - `trk_default_config` - fill a config with defaults
//! - `trk_create` / `trk_free` - pipeline lifetime
//! - `trk_reset` / `trk_tick` - drive the pipeline
//! - `trk_active_count` / `trk_copy_segments` - read back placed segments
//!
//! # Error Codes
//! - `0`: Success
//! - `-1`: Null pointer
//! - `-2`: Invalid configuration
//! - `-3`: Buffer too small (resize and retry)

use log::warn;

use crate::sim::{Float3, Pose};
use crate::track::{
    AnchorTemplate, Bridge, DeferReason, SampleOutcome, SamplerParams, Segment, SpawnerParams,
    StartParams, TickReport, TrackConfig, TrackPipeline,
};

pub const TRK_OK: i32 = 0;
pub const TRK_NULL_POINTER: i32 = -1;
pub const TRK_INVALID_CONFIG: i32 = -2;
pub const TRK_BUFFER_TOO_SMALL: i32 = -3;

/// Opaque pipeline handle.
pub type TrkHandle = *mut std::ffi::c_void;

/// Flattened [`TrackConfig`].
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct TrkConfig {
    pub sample_spacing: f32,
    pub max_samples: u32,
    pub warmup_seconds: f32,
    pub teleport_threshold: f32,

    pub segment_length: f32,
    pub min_segment_length: f32,
    pub max_angle_per_segment_deg: f32,
    pub max_active_segments: u32,
    pub gravity_up_bias: f32,
    pub max_segments_per_frame: u32,
    pub initial_pool_size: u32,

    /// Nonzero to use the anchor fields below instead of centred anchors.
    pub has_anchors: u8,
    pub anchor_head: Float3,
    pub anchor_tail: Float3,
    pub bridge_min_length: f32,

    pub spawn_delay_seconds: f32,
    pub spawn_height: f32,
}

impl From<&TrackConfig> for TrkConfig {
    fn from(config: &TrackConfig) -> Self {
        let s = &config.sampler;
        let p = &config.spawner;
        let anchors = p.anchor_template();
        Self {
            sample_spacing: s.sample_spacing,
            max_samples: saturate_u32(s.max_samples),
            warmup_seconds: s.warmup_seconds,
            teleport_threshold: s.teleport_threshold,
            segment_length: p.segment_length,
            min_segment_length: p.min_segment_length,
            max_angle_per_segment_deg: p.max_angle_per_segment_deg,
            max_active_segments: saturate_u32(p.max_active_segments),
            gravity_up_bias: p.gravity_up_bias,
            max_segments_per_frame: saturate_u32(p.max_segments_per_frame),
            initial_pool_size: saturate_u32(p.initial_pool_size),
            has_anchors: u8::from(p.anchors.is_some()),
            anchor_head: anchors.head_offset(),
            anchor_tail: anchors.tail_offset(),
            bridge_min_length: anchors.bridge_min_length,
            spawn_delay_seconds: config.start.spawn_delay_seconds,
            spawn_height: config.start.spawn_height,
        }
    }
}

impl From<&TrkConfig> for TrackConfig {
    fn from(c: &TrkConfig) -> Self {
        let anchors = (c.has_anchors != 0).then(|| AnchorTemplate {
            head: [c.anchor_head.x, c.anchor_head.y, c.anchor_head.z],
            tail: [c.anchor_tail.x, c.anchor_tail.y, c.anchor_tail.z],
            bridge_min_length: c.bridge_min_length,
        });
        Self {
            sampler: SamplerParams::new(
                c.sample_spacing,
                c.max_samples as usize,
                c.warmup_seconds,
                c.teleport_threshold,
            ),
            spawner: SpawnerParams {
                segment_length: c.segment_length,
                min_segment_length: c.min_segment_length,
                max_angle_per_segment_deg: c.max_angle_per_segment_deg,
                max_active_segments: c.max_active_segments as usize,
                gravity_up_bias: c.gravity_up_bias,
                max_segments_per_frame: c.max_segments_per_frame as usize,
                initial_pool_size: c.initial_pool_size as usize,
                anchors,
            },
            start: StartParams {
                spawn_delay_seconds: c.spawn_delay_seconds,
                spawn_height: c.spawn_height,
            },
        }
    }
}

/// Flattened [`TickReport`].
///
/// `sample_outcome`: 0 warming up, 1 armed, 2 sampled, 3 teleport rejected.
/// `deferred`: 0 none, 1 span unavailable, 2 clamped span unavailable.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct TrkTickReport {
    pub sample_outcome: i32,
    pub appended: u32,
    pub teleport_distance: f32,
    pub spawned: u32,
    pub recycled: u32,
    pub clamped: u32,
    pub deferred: i32,
    pub cap_hit: u8,
    pub has_spawn_point: u8,
    pub spawn_point: Pose,
}

impl From<&TickReport> for TrkTickReport {
    fn from(report: &TickReport) -> Self {
        let (sample_outcome, appended, teleport_distance) = match report.sample {
            SampleOutcome::WarmingUp => (0, 0, 0.0),
            SampleOutcome::Armed => (1, 0, 0.0),
            SampleOutcome::Sampled { appended } => (2, saturate_u32(appended), 0.0),
            SampleOutcome::TeleportRejected { distance } => (3, 0, distance),
        };
        let spawn = &report.spawn;
        Self {
            sample_outcome,
            appended,
            teleport_distance,
            spawned: saturate_u32(spawn.spawned),
            recycled: saturate_u32(spawn.recycled),
            clamped: saturate_u32(spawn.clamped),
            deferred: match spawn.deferred {
                None => 0,
                Some(DeferReason::SpanUnavailable) => 1,
                Some(DeferReason::ClampedSpanUnavailable) => 2,
            },
            cap_hit: u8::from(spawn.cap_hit),
            has_spawn_point: u8::from(report.spawn_point.is_some()),
            spawn_point: report.spawn_point.unwrap_or_default(),
        }
    }
}

/// Flattened active [`Segment`].
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct TrkSegment {
    pub id: u32,
    pub pose: Pose,
    pub head_anchor: Float3,
    pub tail_anchor: Float3,
    pub length: f32,
    pub arc_start: f64,
    pub arc_end: f64,
    pub has_bridge: u8,
    pub bridge: Bridge,
}

impl From<&Segment> for TrkSegment {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id.0,
            pose: segment.pose,
            head_anchor: segment.head_anchor,
            tail_anchor: segment.tail_anchor,
            length: segment.length,
            arc_start: segment.arc_start,
            arc_end: segment.arc_end,
            has_bridge: u8::from(segment.bridge.is_some()),
            bridge: segment.bridge.unwrap_or(Bridge {
                pose: Pose::IDENTITY,
                length: 0.0,
            }),
        }
    }
}

fn saturate_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Fill `out` with the default configuration.
///
/// # Safety
/// - `out` must be a valid pointer or null
#[no_mangle]
pub unsafe extern "C" fn trk_default_config(out: *mut TrkConfig) -> i32 {
    if out.is_null() {
        return TRK_NULL_POINTER;
    }
    *out = TrkConfig::from(&TrackConfig::default());
    TRK_OK
}

/// Create a pipeline seeded at `position` facing `forward`.
///
/// Writes a handle to `out_handle` on success; release it with `trk_free`.
///
/// # Safety
/// - `config` must point to a valid `TrkConfig`
/// - `out_handle` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn trk_create(
    config: *const TrkConfig,
    position: Float3,
    forward: Float3,
    out_handle: *mut TrkHandle,
) -> i32 {
    if config.is_null() || out_handle.is_null() {
        return TRK_NULL_POINTER;
    }

    match TrackPipeline::new(TrackConfig::from(&*config), position, forward) {
        Ok(pipeline) => {
            *out_handle = Box::into_raw(Box::new(pipeline)) as TrkHandle;
            TRK_OK
        }
        Err(err) => {
            warn!("trk_create rejected config: {err}");
            *out_handle = std::ptr::null_mut();
            TRK_INVALID_CONFIG
        }
    }
}

/// Free a pipeline handle.
///
/// # Safety
/// - `handle` must be a handle returned by `trk_create`, or null
#[no_mangle]
pub unsafe extern "C" fn trk_free(handle: TrkHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut TrackPipeline));
    }
}

/// Restart the track at `position`.
///
/// # Safety
/// - `handle` must be a valid handle from `trk_create`
#[no_mangle]
pub unsafe extern "C" fn trk_reset(handle: TrkHandle, position: Float3, forward: Float3) -> i32 {
    if handle.is_null() {
        return TRK_NULL_POINTER;
    }
    let pipeline = &mut *(handle as *mut TrackPipeline);
    pipeline.reset(position, forward);
    TRK_OK
}

/// Advance the pipeline by one step of `dt` seconds.
///
/// # Safety
/// - `handle` must be a valid handle from `trk_create`
/// - `report` must be a valid pointer or null (report discarded)
#[no_mangle]
pub unsafe extern "C" fn trk_tick(
    handle: TrkHandle,
    position: Float3,
    forward: Float3,
    dt: f32,
    report: *mut TrkTickReport,
) -> i32 {
    if handle.is_null() {
        return TRK_NULL_POINTER;
    }
    let pipeline = &mut *(handle as *mut TrackPipeline);
    let result = pipeline.tick(position, forward, dt);
    if !report.is_null() {
        *report = TrkTickReport::from(&result);
    }
    TRK_OK
}

/// Number of active segments, or -1 for a null handle.
///
/// # Safety
/// - `handle` must be a valid handle from `trk_create`, or null
#[no_mangle]
pub unsafe extern "C" fn trk_active_count(handle: TrkHandle) -> i64 {
    if handle.is_null() {
        return i64::from(TRK_NULL_POINTER);
    }
    let pipeline = &*(handle as *const TrackPipeline);
    pipeline.spawner().active_len() as i64
}

/// Copy active segments, oldest first, into `out`.
///
/// `count` always receives the number of active segments; when it exceeds
/// `capacity` nothing is copied and -3 is returned.
///
/// # Safety
/// - `handle` must be a valid handle from `trk_create`
/// - `out` must be valid for `capacity` writes
/// - `count` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn trk_copy_segments(
    handle: TrkHandle,
    out: *mut TrkSegment,
    capacity: usize,
    count: *mut usize,
) -> i32 {
    if handle.is_null() || count.is_null() {
        return TRK_NULL_POINTER;
    }
    let pipeline = &*(handle as *const TrackPipeline);
    let active = pipeline.spawner().active_len();
    *count = active;

    if active > capacity {
        return TRK_BUFFER_TOO_SMALL;
    }
    if active > 0 && out.is_null() {
        return TRK_NULL_POINTER;
    }

    for (i, segment) in pipeline.segments().enumerate() {
        *out.add(i) = TrkSegment::from(segment);
    }
    TRK_OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn create(config: &TrkConfig) -> TrkHandle {
        let mut handle: TrkHandle = ptr::null_mut();
        let code = unsafe { trk_create(config, Float3::ZERO, Float3::FORWARD, &mut handle) };
        assert_eq!(code, TRK_OK);
        assert!(!handle.is_null());
        handle
    }

    fn default_config() -> TrkConfig {
        let mut config = TrkConfig::from(&TrackConfig::default());
        assert_eq!(unsafe { trk_default_config(&mut config) }, TRK_OK);
        config.warmup_seconds = 0.0;
        config
    }

    #[test]
    fn config_converts_both_ways() {
        let config = TrackConfig::default();
        assert_eq!(TrackConfig::from(&TrkConfig::from(&config)), config);
    }

    #[test]
    fn null_pointers_are_rejected() {
        unsafe {
            assert_eq!(trk_default_config(ptr::null_mut()), TRK_NULL_POINTER);
            assert_eq!(trk_reset(ptr::null_mut(), Float3::ZERO, Float3::FORWARD), TRK_NULL_POINTER);
            assert_eq!(trk_active_count(ptr::null_mut()), -1);
            trk_free(ptr::null_mut());
        }
    }

    #[test]
    fn invalid_config_returns_error_code() {
        let mut config = default_config();
        config.segment_length = 0.5;
        let mut handle: TrkHandle = ptr::null_mut();
        let code = unsafe { trk_create(&config, Float3::ZERO, Float3::FORWARD, &mut handle) };
        assert_eq!(code, TRK_INVALID_CONFIG);
        assert!(handle.is_null());
    }

    #[test]
    fn tick_and_copy_segments() {
        let handle = create(&default_config());
        let mut report = TrkTickReport::default();

        unsafe {
            for i in 0..60 {
                let pos = Float3::new(0.0, 0.0, i as f32 / 3.0);
                assert_eq!(trk_tick(handle, pos, Float3::FORWARD, 1.0 / 60.0, &mut report), TRK_OK);
            }
            let active = trk_active_count(handle);
            assert_eq!(active, 6);

            let mut count = 0usize;
            let mut small = vec![TrkSegment::from(&dummy_segment()); 2];
            let code = trk_copy_segments(handle, small.as_mut_ptr(), small.len(), &mut count);
            assert_eq!(code, TRK_BUFFER_TOO_SMALL);
            assert_eq!(count, 6);

            let mut buffer = vec![TrkSegment::from(&dummy_segment()); count];
            let code = trk_copy_segments(handle, buffer.as_mut_ptr(), buffer.len(), &mut count);
            assert_eq!(code, TRK_OK);
            assert_eq!(buffer[0].has_bridge, 0);
            assert_eq!(buffer[1].has_bridge, 1);
            assert!(buffer.windows(2).all(|w| w[0].arc_end <= w[1].arc_start + 1e-9));

            assert_eq!(trk_reset(handle, Float3::ZERO, Float3::FORWARD), TRK_OK);
            assert_eq!(trk_active_count(handle), 0);
            trk_free(handle);
        }
    }

    fn dummy_segment() -> Segment {
        let mut pool = crate::track::SegmentPool::new(1);
        let id = pool.get();
        pool.segment(id).cloned().unwrap()
    }
}
