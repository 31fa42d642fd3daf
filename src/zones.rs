//! Zone boundary derivation
//!
//! Study staff enter five heart-rate zones per subject, and adjacent zones
//! rarely meet cleanly. The deriver replaces each boundary with the midpoint
//! between the two zones, snapped to a grid, so the result is contiguous.
//!
//! Midpoints are rounded half to even: `122.5 / 5 = 24.5` snaps to `24 * 5 = 120`,
//! while `127.5 / 5 = 25.5` snaps to `26 * 5 = 130`.

use crate::error::QcError;
use crate::types::{RawZoneTable, ZoneBoundarySet, ZoneRange, ZONE_COUNT};
use std::collections::HashMap;

/// Default snap granularity (bpm)
pub const DEFAULT_SNAP_TO: i32 = 5;

/// Source of raw zone rows keyed by subject
pub trait ZoneTableSource {
    /// Raw zone row for `subject`, or [`QcError::Lookup`] if absent
    fn lookup(&self, subject: &str) -> Result<RawZoneTable, QcError>;
}

/// Midpoint-snap zone deriver
pub struct ZoneBoundaryDeriver;

impl ZoneBoundaryDeriver {
    /// Derive contiguous zone boundaries from a raw zone table
    pub fn derive(raw: &RawZoneTable, snap_to: i32) -> Result<ZoneBoundarySet, QcError> {
        if snap_to < 1 {
            return Err(QcError::Input(format!(
                "snap granularity must be at least 1, got {}",
                snap_to
            )));
        }

        let mut zones = raw.zones;
        for i in 1..ZONE_COUNT {
            let (lower_end, upper_start) = (raw.zones[i - 1].end, raw.zones[i].start);
            let start = snap_midpoint(lower_end, upper_start, snap_to)
                .and_then(|mid| Some((mid, mid.checked_add(1)?)));
            let Some((mid, start)) = start else {
                return Err(QcError::Input(format!(
                    "zone {} boundary between {} and {} is out of range",
                    i, lower_end, upper_start
                )));
            };
            zones[i - 1].end = mid;
            zones[i].start = start;
        }

        Ok(ZoneBoundarySet::from_zones(zones))
    }
}

/// Snapped midpoint, or `None` when it does not fit an `i32`
fn snap_midpoint(lower_end: i32, upper_start: i32, snap_to: i32) -> Option<i32> {
    let raw_mid = (lower_end as f64 + upper_start as f64) / 2.0;
    let snapped = (raw_mid / snap_to as f64).round_ties_even() * snap_to as f64;
    (snapped >= i32::MIN as f64 && snapped <= i32::MAX as f64).then_some(snapped as i32)
}

/// Numeric key for a subject identifier such as `sub07` or `1234`
pub fn subject_key(subject: &str) -> Result<i64, QcError> {
    let digits = subject.trim().trim_start_matches(|c: char| !c.is_ascii_digit());
    digits
        .parse::<i64>()
        .map_err(|_| QcError::Lookup(format!("{} has no numeric subject id", subject)))
}

/// Per-subject cache of derived zones.
///
/// Each subject's zones are derived on first request and reused for every
/// recording that belongs to that subject.
#[derive(Debug, Clone)]
pub struct ZoneCache {
    snap_to: i32,
    entries: HashMap<String, ZoneBoundarySet>,
}

impl Default for ZoneCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAP_TO)
    }
}

impl ZoneCache {
    pub fn new(snap_to: i32) -> Self {
        Self {
            snap_to,
            entries: HashMap::new(),
        }
    }

    /// Cached zones for `subject`, deriving them from `source` on first use
    pub fn get_or_derive(
        &mut self,
        subject: &str,
        source: &dyn ZoneTableSource,
    ) -> Result<ZoneBoundarySet, QcError> {
        if let Some(zones) = self.entries.get(subject) {
            return Ok(*zones);
        }

        let raw = source.lookup(subject)?;
        let zones = ZoneBoundaryDeriver::derive(&raw, self.snap_to)?;
        self.entries.insert(subject.to_string(), zones);
        Ok(zones)
    }

    pub fn get(&self, subject: &str) -> Option<&ZoneBoundarySet> {
        self.entries.get(subject)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Zone placeholder used when a recording is checked without a subject table
pub fn placeholder_zones() -> ZoneBoundarySet {
    ZoneBoundarySet::from_zones([
        ZoneRange::new(0, 99),
        ZoneRange::new(100, 119),
        ZoneRange::new(120, 139),
        ZoneRange::new(140, 159),
        ZoneRange::new(160, 250),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn sub07_raw() -> RawZoneTable {
        RawZoneTable::from_pairs([(100, 120), (125, 140), (145, 160), (165, 180), (185, 200)])
    }

    fn assert_contiguous(raw: &RawZoneTable, set: &ZoneBoundarySet) {
        let zones = set.zones();
        for i in 0..ZONE_COUNT - 1 {
            assert_eq!(zones[i].end + 1, zones[i + 1].start);
        }
        assert_eq!(zones[0].start, raw.zones[0].start);
        assert_eq!(zones[4].end, raw.zones[4].end);
    }

    struct CountingSource {
        raw: RawZoneTable,
        calls: Cell<usize>,
    }

    impl ZoneTableSource for CountingSource {
        fn lookup(&self, subject: &str) -> Result<RawZoneTable, QcError> {
            self.calls.set(self.calls.get() + 1);
            if subject_key(subject)? == 7 {
                Ok(self.raw)
            } else {
                Err(QcError::Lookup(subject.to_string()))
            }
        }
    }

    #[test]
    fn test_sub07_half_even_snap() {
        let raw = sub07_raw();
        let set = ZoneBoundaryDeriver::derive(&raw, 5).unwrap();

        // Midpoints 122.5, 142.5, 162.5, 182.5 all land on x.5 steps and go to the even step
        assert_eq!(
            set.zones(),
            &[
                ZoneRange::new(100, 120),
                ZoneRange::new(121, 140),
                ZoneRange::new(141, 160),
                ZoneRange::new(161, 180),
                ZoneRange::new(181, 200),
            ]
        );
        assert_contiguous(&raw, &set);
    }

    #[test]
    fn test_ties_round_to_even_step() {
        // 127.5 / 5 = 25.5 rounds up to 26
        assert_eq!(snap_midpoint(125, 130, 5), Some(130));
        // 122.5 / 5 = 24.5 rounds down to 24
        assert_eq!(snap_midpoint(120, 125, 5), Some(120));
        // non-tie rounds to nearest
        assert_eq!(snap_midpoint(120, 127, 5), Some(125));
        assert_eq!(snap_midpoint(120, 121, 1), Some(120));
        assert_eq!(snap_midpoint(121, 122, 1), Some(122));
    }

    #[test]
    fn test_overlapping_zones_are_made_contiguous() {
        let raw =
            RawZoneTable::from_pairs([(90, 118), (112, 135), (130, 152), (150, 171), (168, 195)]);
        for snap in [1, 2, 5, 10] {
            let set = ZoneBoundaryDeriver::derive(&raw, snap).unwrap();
            assert_contiguous(&raw, &set);
        }
    }

    #[test]
    fn test_snap_only_moves_inner_boundaries() {
        let raw = sub07_raw();
        let five = ZoneBoundaryDeriver::derive(&raw, 5).unwrap();
        let ten = ZoneBoundaryDeriver::derive(&raw, 10).unwrap();

        assert_eq!(five.zones()[0].start, ten.zones()[0].start);
        assert_eq!(five.zones()[4].end, ten.zones()[4].end);
        assert_eq!(ten.zones()[0].end, 120);
        assert_eq!(ZoneBoundaryDeriver::derive(&raw, 5).unwrap(), five);
    }

    #[test]
    fn test_invalid_snap_rejected() {
        let result = ZoneBoundaryDeriver::derive(&sub07_raw(), 0);
        assert!(matches!(result, Err(QcError::Input(_))));
    }

    #[test]
    fn test_boundary_past_i32_range_is_input_error() {
        let raw = RawZoneTable::from_pairs([
            (0, i32::MAX),
            (i32::MAX, i32::MAX),
            (1, 2),
            (3, 4),
            (5, 6),
        ]);
        let result = ZoneBoundaryDeriver::derive(&raw, 1);
        assert!(matches!(result, Err(QcError::Input(_))));

        // snapping up past i32::MAX
        assert_eq!(snap_midpoint(i32::MAX - 1, i32::MAX, 10), None);
    }

    #[test]
    fn test_subject_key_strips_prefix() {
        assert_eq!(subject_key("sub07").unwrap(), 7);
        assert_eq!(subject_key("1234").unwrap(), 1234);
        assert_eq!(subject_key("sub-1021").unwrap(), 1021);
        assert!(matches!(subject_key("pilot"), Err(QcError::Lookup(_))));
    }

    #[test]
    fn test_cache_derives_once_per_subject() {
        let source = CountingSource {
            raw: sub07_raw(),
            calls: Cell::new(0),
        };
        let mut cache = ZoneCache::new(5);

        let first = cache.get_or_derive("sub07", &source).unwrap();
        let second = cache.get_or_derive("sub07", &source).unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.get(), 1);
        assert_eq!(cache.len(), 1);

        let missing = cache.get_or_derive("sub08", &source);
        assert!(matches!(missing, Err(QcError::Lookup(_))));
        assert!(cache.get("sub08").is_none());
    }
}
