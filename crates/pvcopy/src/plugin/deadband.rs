use pvdata::{BitSet, FieldKind, PVValue};

use super::{FilterContext, FilterField, PVFilter, PVPlugin};

/// Minimum change that is passed on to the copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deadband {
    /// Absolute difference.
    Absolute(f64),
    /// Percentage of the value the copy holds.
    Relative(f64),
}

impl Deadband {
    /// Parses `abs:X` or `rel:P`.
    pub fn parse(text: &str) -> Option<Self> {
        let (kind, amount) = text.split_once(':')?;
        let amount: f64 = amount.parse().ok()?;
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        match kind {
            "abs" => Some(Self::Absolute(amount)),
            "rel" => Some(Self::Relative(amount)),
            _ => None,
        }
    }

    /// Whether moving from `last` to `value` is large enough to report.
    pub fn exceeded(&self, last: f64, value: f64) -> bool {
        let threshold = match *self {
            Self::Absolute(amount) => amount,
            Self::Relative(percent) => last.abs() * percent / 100.0,
        };
        (value - last).abs() > threshold
    }
}

/// `deadband=abs:X` or `deadband=rel:P` on numeric scalar fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadbandPlugin;

impl PVPlugin for DeadbandPlugin {
    fn create(&self, value: &str, ctx: &FilterContext<'_>) -> Option<Box<dyn PVFilter>> {
        match ctx.entry()?.kind() {
            FieldKind::Scalar(t) if t.is_numeric() => {}
            _ => return None,
        }
        Some(Box::new(DeadbandFilter {
            deadband: Deadband::parse(value)?,
        }))
    }
}

/// Measures each change against the value already in the copy, so every
/// copy instance keeps its own baseline. A full update (bit 0) always
/// copies.
struct DeadbandFilter {
    deadband: Deadband,
}

impl PVFilter for DeadbandFilter {
    fn name(&self) -> &str {
        "deadband"
    }

    fn filter(&self, field: &mut FilterField<'_, '_>, bitset: &mut BitSet, to_copy: bool) -> bool {
        if !to_copy {
            return false;
        }
        let Some(value) = field
            .master_value()
            .and_then(PVValue::as_scalar)
            .and_then(|v| v.as_f64())
        else {
            return false;
        };
        let last = field
            .copy_value()
            .and_then(PVValue::as_scalar)
            .and_then(|v| v.as_f64());
        let report = bitset.get(0)
            || last.map_or(true, |last| self.deadband.exceeded(last, value));
        let copy_offset = field.copy_offset();
        if !report {
            bitset.clear(copy_offset);
            return true;
        }
        if field.move_subtree().is_err() {
            return false;
        }
        bitset.set(copy_offset);
        true
    }
}
