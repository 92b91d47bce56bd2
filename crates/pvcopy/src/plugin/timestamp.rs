use std::time::{SystemTime, UNIX_EPOCH};

use pvdata::{BitSet, FieldKind, PVStructure, PVValue, ScalarType, ScalarValue};

use super::{FilterContext, FilterField, PVFilter, PVPlugin};

const SECONDS: [&str; 2] = ["secondsPastEpoch", "sec"];
const NANOSECONDS: [&str; 2] = ["nanoseconds", "nsec"];

/// `timestamp=current` on time-stamp structures: the field is stamped with
/// the current time instead of being copied. `timestamp=copy` leaves the
/// default copy in place.
///
/// The filter owns the whole structure. Any set bit inside it refreshes
/// both seconds and nanoseconds, and a put stamps the master with the
/// wall clock whatever the copy held.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampPlugin;

impl PVPlugin for TimestampPlugin {
    fn create(&self, value: &str, ctx: &FilterContext<'_>) -> Option<Box<dyn PVFilter>> {
        if value != "current" {
            return None;
        }
        let seconds = integer_child(ctx, &SECONDS)?;
        let nanoseconds = integer_child(ctx, &NANOSECONDS)?;
        Some(Box::new(TimestampFilter {
            seconds,
            nanoseconds,
        }))
    }
}

/// Offset relative to the time-stamp structure, and type, of the first
/// integer child named in `names`.
fn integer_child(ctx: &FilterContext<'_>, names: &[&str]) -> Option<(usize, ScalarType)> {
    names.iter().find_map(|name| {
        let offset = ctx.master.child_offset(ctx.master_offset, name)?;
        match ctx.master.entry(offset)?.kind() {
            FieldKind::Scalar(t) if t.is_integer() => Some((offset - ctx.master_offset, *t)),
            _ => None,
        }
    })
}

struct TimestampFilter {
    seconds: (usize, ScalarType),
    nanoseconds: (usize, ScalarType),
}

impl TimestampFilter {
    fn stamp(&self, structure: &mut PVStructure, offset: usize) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let (seconds, seconds_type) = self.seconds;
        let (nanoseconds, nanoseconds_type) = self.nanoseconds;
        let (Some(secs), Some(nanos)) = (
            ScalarValue::from_i64(seconds_type, now.as_secs() as i64),
            ScalarValue::from_i64(nanoseconds_type, i64::from(now.subsec_nanos())),
        ) else {
            return false;
        };
        structure
            .set_value(offset + seconds, PVValue::Scalar(secs))
            .and_then(|_| structure.set_value(offset + nanoseconds, PVValue::Scalar(nanos)))
            .is_ok()
    }
}

impl PVFilter for TimestampFilter {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn filter(&self, field: &mut FilterField<'_, '_>, bitset: &mut BitSet, to_copy: bool) -> bool {
        if field.move_subtree().is_err() {
            return false;
        }
        let (target, offset) = if to_copy {
            let offset = field.copy_offset();
            (field.copy_mut(), offset)
        } else {
            let offset = field.master_offset();
            (field.master_mut(), offset)
        };
        let stamped = target.is_some_and(|structure| self.stamp(structure, offset));
        if stamped && to_copy {
            bitset.set(offset);
        }
        stamped
    }
}
