use pvdata::{BitSet, FieldKind, PVValue, ScalarValue};

use super::{FilterContext, FilterField, PVFilter, PVPlugin};

/// Index range `start:increment:end` over an array. Negative `start` and
/// `end` count from the end, `-1` being the last element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySlice {
    pub start: i64,
    pub increment: usize,
    pub end: i64,
}

impl ArraySlice {
    /// Parses `start`, `start:end` or `start:increment:end`.
    ///
    /// ```
    /// use pvcopy::plugin::ArraySlice;
    ///
    /// let slice = ArraySlice::parse("1:2:-1").unwrap();
    /// assert_eq!(slice.indices(6), vec![1, 3, 5]);
    /// assert_eq!(ArraySlice::parse("-2").unwrap().indices(6), vec![4, 5]);
    /// assert!(ArraySlice::parse("1:0:3").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split(':').collect();
        let (start, increment, end) = match parts.as_slice() {
            [start] => (*start, "1", "-1"),
            [start, end] => (*start, "1", *end),
            [start, increment, end] => (*start, *increment, *end),
            _ => return None,
        };
        let increment: usize = increment.parse().ok()?;
        if increment == 0 {
            return None;
        }
        Some(Self {
            start: start.parse().ok()?,
            increment,
            end: end.parse().ok()?,
        })
    }

    fn resolve(index: i64, len: usize) -> i64 {
        if index < 0 {
            len as i64 + index
        } else {
            index
        }
    }

    /// Selected indices of an array of `len` elements.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let start = Self::resolve(self.start, len).max(0);
        let end = Self::resolve(self.end, len).min(len as i64 - 1);
        if start > end {
            return Vec::new();
        }
        (start as usize..=end as usize)
            .step_by(self.increment)
            .collect()
    }

    /// Indices `count` elements are written to in an array of `len`
    /// elements. Negative bounds resolve against `len`; a non-negative
    /// `end` may reach past it, but the array never grows by more than
    /// `count` elements.
    fn put_indices(&self, len: usize, count: usize) -> Vec<usize> {
        let start = Self::resolve(self.start, len);
        let end = Self::resolve(self.end, len);
        if start < 0 || end < 0 {
            return Vec::new();
        }
        let Some(last) = len.saturating_add(count).checked_sub(1) else {
            return Vec::new();
        };
        let limit = (end as usize).min(last);
        let mut indices = Vec::new();
        let mut index = start as usize;
        while indices.len() < count && index <= limit {
            indices.push(index);
            match index.checked_add(self.increment) {
                Some(next) => index = next,
                None => break,
            }
        }
        indices
    }
}

/// `array=start:increment:end` on scalar-array fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayPlugin;

impl PVPlugin for ArrayPlugin {
    fn create(&self, value: &str, ctx: &FilterContext<'_>) -> Option<Box<dyn PVFilter>> {
        let entry = ctx.entry()?;
        let FieldKind::ScalarArray(element_type) = entry.kind() else {
            return None;
        };
        let slice = ArraySlice::parse(value)?;
        Some(Box::new(ArrayFilter {
            slice,
            default: ScalarValue::default_for(*element_type),
        }))
    }
}

struct ArrayFilter {
    slice: ArraySlice,
    default: ScalarValue,
}

impl ArrayFilter {
    fn to_copy(&self, field: &mut FilterField<'_, '_>, bitset: &mut BitSet) -> bool {
        let Some(source) = field.master_value().and_then(PVValue::as_scalar_array) else {
            return false;
        };
        let selected: Vec<ScalarValue> = self
            .slice
            .indices(source.len())
            .into_iter()
            .map(|i| source[i].clone())
            .collect();
        if field.copy_value().and_then(PVValue::as_scalar_array) == Some(selected.as_slice()) {
            return true;
        }
        let copy_offset = field.copy_offset();
        let Some(copy) = field.copy_mut() else {
            return false;
        };
        if copy
            .set_value(copy_offset, PVValue::ScalarArray(selected))
            .is_err()
        {
            return false;
        }
        bitset.set(copy_offset);
        true
    }

    fn to_master(&self, field: &mut FilterField<'_, '_>) -> bool {
        let Some(source) = field.copy_value().and_then(PVValue::as_scalar_array) else {
            return false;
        };
        let source = source.to_vec();
        let Some(mut target) = field
            .master_value()
            .and_then(PVValue::as_scalar_array)
            .map(<[ScalarValue]>::to_vec)
        else {
            return false;
        };
        for (i, value) in self
            .slice
            .put_indices(target.len(), source.len())
            .into_iter()
            .zip(source)
        {
            if i >= target.len() {
                target.resize(i + 1, self.default.clone());
            }
            target[i] = value;
        }
        let master_offset = field.master_offset();
        match field.master_mut() {
            Some(master) => master
                .set_value(master_offset, PVValue::ScalarArray(target))
                .is_ok(),
            None => false,
        }
    }
}

impl PVFilter for ArrayFilter {
    fn name(&self) -> &str {
        "array"
    }

    fn filter(&self, field: &mut FilterField<'_, '_>, bitset: &mut BitSet, to_copy: bool) -> bool {
        if to_copy {
            self.to_copy(field, bitset)
        } else {
            self.to_master(field)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            ArraySlice::parse("2:5"),
            Some(ArraySlice {
                start: 2,
                increment: 1,
                end: 5
            })
        );
        assert_eq!(ArraySlice::parse("a:5"), None);
        assert_eq!(ArraySlice::parse("1:2:3:4"), None);
        assert_eq!(ArraySlice::parse("1:-2:3"), None);
    }

    #[test]
    fn test_indices_clamp() {
        let slice = ArraySlice::parse("2:10").unwrap();
        assert_eq!(slice.indices(5), vec![2, 3, 4]);
        assert_eq!(slice.indices(2), Vec::<usize>::new());
        assert_eq!(ArraySlice::parse("-10:1").unwrap().indices(4), vec![0, 1]);
        assert_eq!(ArraySlice::parse("0").unwrap().indices(0), Vec::<usize>::new());
    }

    #[test]
    fn test_put_indices() {
        let slice = ArraySlice::parse("1:2:-1").unwrap();
        assert_eq!(slice.put_indices(6, 3), vec![1, 3, 5]);
        assert_eq!(slice.put_indices(3, 3), vec![1]);
        let growing = ArraySlice::parse("4:2:9").unwrap();
        assert_eq!(growing.put_indices(6, 2), vec![4, 6]);
        assert_eq!(growing.put_indices(6, 5), vec![4, 6, 8]);
        let capped = ArraySlice::parse("1:2").unwrap();
        assert_eq!(capped.put_indices(10, 5), vec![1, 2]);
        assert_eq!(ArraySlice::parse("-5").unwrap().put_indices(2, 1), Vec::<usize>::new());
    }

    #[test]
    fn test_put_indices_with_huge_increment() {
        let wrapping = ArraySlice::parse("1:18446744073709551615:-1").unwrap();
        assert_eq!(wrapping.put_indices(6, 3), vec![1]);
        let sparse = ArraySlice::parse("1:1000000000:-1").unwrap();
        assert_eq!(sparse.put_indices(6, 2), vec![1]);
        let far = ArraySlice::parse("0:1000000000:2000000000").unwrap();
        assert_eq!(far.put_indices(6, 2), vec![0]);
    }
}
