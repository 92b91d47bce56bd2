//! Structure instances addressed by pre-order offset.
//!
//! A [`PVStructure`] stores one [`PVValue`] slot per field of its schema,
//! in pre-order: the root is offset 0, a structure is followed immediately
//! by its children, and every field records the `next_offset` of the first
//! field outside its own subtree. The per-offset metadata lives in a
//! [`Layout`] shared by every instance of the same schema, so creating a new
//! instance only allocates the slot vector.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::PvDataError;
use crate::field::{Field, FieldKind};
use crate::value::{PVValue, ScalarValue};

/// Metadata for the field at one offset.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    name: String,
    full_name: String,
    offset: usize,
    next_offset: usize,
    parent: Option<usize>,
    field: Arc<Field>,
}

impl FieldEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root, e.g. `alarm.severity`; empty for the root.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    /// Offsets covered by this field's subtree.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.next_offset
    }

    pub fn number_fields(&self) -> usize {
        self.next_offset - self.offset
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn kind(&self) -> &FieldKind {
        self.field.kind()
    }
}

/// Offset table for one schema, shared between instances.
#[derive(Debug, PartialEq)]
pub struct Layout {
    entries: Vec<FieldEntry>,
    defaults: Vec<PVValue>,
}

impl Layout {
    fn build(root: &Field) -> Self {
        let mut layout = Self {
            entries: Vec::with_capacity(root.number_fields()),
            defaults: Vec::with_capacity(root.number_fields()),
        };
        layout.push(root, String::new(), None);
        layout
    }

    fn push(&mut self, field: &Field, full_name: String, parent: Option<usize>) {
        let offset = self.entries.len();
        self.entries.push(FieldEntry {
            name: field.name().to_string(),
            full_name: full_name.clone(),
            offset,
            next_offset: offset + 1,
            parent,
            field: Arc::new(field.clone()),
        });
        self.defaults.push(PVValue::default_for(field.kind()));
        for child in field.children() {
            let child_name = if full_name.is_empty() {
                child.name().to_string()
            } else {
                format!("{}.{}", full_name, child.name())
            };
            self.push(child, child_name, Some(offset));
        }
        self.entries[offset].next_offset = self.entries.len();
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }
}

/// A value tree conforming to a structure [`Field`].
#[derive(Debug, Clone)]
pub struct PVStructure {
    layout: Arc<Layout>,
    values: Vec<PVValue>,
}

impl PVStructure {
    /// Creates an instance with every field at its default value.
    ///
    /// Fails if `field` is not a structure or repeats a name within one
    /// structure.
    pub fn new(field: Field) -> Result<Self, PvDataError> {
        if !field.is_structure() {
            return Err(PvDataError::NotAStructure(field.name().to_string()));
        }
        if let Some(dup) = field.find_duplicate() {
            return Err(PvDataError::DuplicateField(dup));
        }
        let layout = Arc::new(Layout::build(&field));
        Ok(Self::from_layout(layout))
    }

    fn from_layout(layout: Arc<Layout>) -> Self {
        let values = layout.defaults.clone();
        Self { layout, values }
    }

    /// Fresh default-valued instance sharing this instance's layout.
    pub fn new_instance(&self) -> Self {
        Self::from_layout(Arc::clone(&self.layout))
    }

    /// Whether both instances were created from the same layout allocation.
    pub fn shares_layout(&self, other: &PVStructure) -> bool {
        Arc::ptr_eq(&self.layout, &other.layout)
    }

    pub fn field(&self) -> &Field {
        self.layout.entries[0].field()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Total number of offsets, i.e. the root's `next_offset`.
    pub fn number_fields(&self) -> usize {
        self.values.len()
    }

    pub fn entry(&self, offset: usize) -> Option<&FieldEntry> {
        self.layout.entries.get(offset)
    }

    fn checked_entry(&self, offset: usize) -> Result<&FieldEntry, PvDataError> {
        self.entry(offset).ok_or(PvDataError::OffsetOutOfRange {
            offset,
            len: self.values.len(),
        })
    }

    /// Offsets of the immediate children of the structure at `offset`.
    pub fn child_offsets(&self, offset: usize) -> ChildOffsets<'_> {
        let end = self.entry(offset).map_or(offset, FieldEntry::next_offset);
        ChildOffsets {
            entries: &self.layout.entries,
            next: offset + 1,
            end,
        }
    }

    pub fn child_offset(&self, offset: usize, name: &str) -> Option<usize> {
        self.child_offsets(offset)
            .find(|&child| self.layout.entries[child].name == name)
    }

    /// Resolves a dotted path such as `"alarm.severity"` to its offset.
    ///
    /// The empty path resolves to the root.
    pub fn offset_of(&self, path: &str) -> Option<usize> {
        if path.is_empty() {
            return Some(0);
        }
        let mut current = 0;
        for step in path.split('.') {
            current = self.child_offset(current, step)?;
        }
        Some(current)
    }

    fn resolve(&self, path: &str) -> Result<usize, PvDataError> {
        self.offset_of(path)
            .ok_or_else(|| PvDataError::UnknownField(path.to_string()))
    }

    pub fn value(&self, offset: usize) -> Option<&PVValue> {
        self.values.get(offset)
    }

    /// Slot values in pre-order.
    pub fn values(&self) -> &[PVValue] {
        &self.values
    }

    pub fn get(&self, path: &str) -> Option<&PVValue> {
        self.value(self.offset_of(path)?)
    }

    pub fn scalar(&self, path: &str) -> Option<&ScalarValue> {
        self.get(path)?.as_scalar()
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.scalar(path)?.as_f64()
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.scalar(path)?.as_i64()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.scalar(path)?.as_str()
    }

    /// Stores `value` at `offset` after checking it conforms to the field.
    pub fn set_value(&mut self, offset: usize, value: PVValue) -> Result<(), PvDataError> {
        let entry = self.checked_entry(offset)?;
        if !value.conforms_to(entry.kind()) {
            return Err(PvDataError::TypeMismatch {
                field: entry.full_name.clone(),
                expected: entry.field.type_name(),
                found: value.describe(),
            });
        }
        self.values[offset] = value;
        Ok(())
    }

    pub fn set(&mut self, path: &str, value: PVValue) -> Result<(), PvDataError> {
        let offset = self.resolve(path)?;
        self.set_value(offset, value)
    }

    pub fn set_scalar(
        &mut self,
        path: &str,
        value: impl Into<ScalarValue>,
    ) -> Result<(), PvDataError> {
        self.set(path, PVValue::Scalar(value.into()))
    }

    pub fn set_scalar_array(
        &mut self,
        path: &str,
        values: Vec<ScalarValue>,
    ) -> Result<(), PvDataError> {
        self.set(path, PVValue::ScalarArray(values))
    }

    /// Default-valued element for the structure array at `path`.
    pub fn new_element(&self, path: &str) -> Result<PVStructure, PvDataError> {
        let offset = self.resolve(path)?;
        match self.layout.entries[offset].kind() {
            FieldKind::StructureArray(element) => PVStructure::new(element.as_ref().clone()),
            _ => Err(PvDataError::TypeMismatch {
                field: path.to_string(),
                expected: "structure[]".to_string(),
                found: self.layout.entries[offset].field.type_name(),
            }),
        }
    }

    /// Whether the subtree at `offset` has the same shape and values as the
    /// subtree of `other` at `other_offset`.
    pub fn subtree_equals(&self, offset: usize, other: &PVStructure, other_offset: usize) -> bool {
        match (self.entry(offset), other.entry(other_offset)) {
            (Some(a), Some(b)) => {
                a.kind() == b.kind() && self.values[a.range()] == other.values[b.range()]
            }
            _ => false,
        }
    }

    /// Copies the subtree of `src` at `src_offset` over the subtree at
    /// `dst_offset`. Both subtrees must have the same shape.
    pub fn copy_subtree(
        &mut self,
        dst_offset: usize,
        src: &PVStructure,
        src_offset: usize,
    ) -> Result<(), PvDataError> {
        let dst = self.checked_entry(dst_offset)?;
        let src_entry = src.checked_entry(src_offset)?;
        if dst.kind() != src_entry.kind() {
            return Err(PvDataError::ShapeMismatch {
                dst: dst.full_name.clone(),
                src: src_entry.full_name.clone(),
            });
        }
        let range = dst.range();
        self.values[range].clone_from_slice(&src.values[src_entry.range()]);
        Ok(())
    }

    /// Appends `field` as the last child of the structure at `parent_path`
    /// and returns its offset.
    ///
    /// Offsets at and beyond the insertion point shift by the width of the
    /// new field; existing values move with their fields.
    pub fn append_field(&mut self, parent_path: &str, field: Field) -> Result<usize, PvDataError> {
        let parent = self.resolve(parent_path)?;
        let parent_entry = &self.layout.entries[parent];
        if !parent_entry.field.is_structure() {
            return Err(PvDataError::NotAStructure(parent_path.to_string()));
        }
        if parent_entry.field.child(field.name()).is_some() {
            return Err(PvDataError::DuplicateField(field.name().to_string()));
        }
        if let Some(dup) = field.find_duplicate() {
            return Err(PvDataError::DuplicateField(dup));
        }
        let insert_at = parent_entry.next_offset;
        let steps: Vec<&str> = if parent_path.is_empty() {
            Vec::new()
        } else {
            parent_path.split('.').collect()
        };
        let root = with_child_appended(self.field(), &steps, &field);
        let layout = Arc::new(Layout::build(&root));
        let inserted = layout.defaults[insert_at..insert_at + field.number_fields()].to_vec();
        self.values.splice(insert_at..insert_at, inserted);
        self.layout = layout;
        Ok(insert_at)
    }

    fn write_value(&self, f: &mut fmt::Formatter<'_>, offset: usize, depth: usize) -> fmt::Result {
        let entry = &self.layout.entries[offset];
        write!(f, "{:indent$}{}", "", entry.field.type_name(), indent = depth * 4)?;
        if !entry.name.is_empty() {
            write!(f, " {}", entry.name)?;
        }
        match &self.values[offset] {
            PVValue::Scalar(v) => write!(f, " {}", v)?,
            PVValue::ScalarArray(items) => {
                let joined = items
                    .iter()
                    .map(ScalarValue::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, " [{}]", joined)?;
            }
            PVValue::Structure => {
                for child in self.child_offsets(offset) {
                    writeln!(f)?;
                    self.write_value(f, child, depth + 1)?;
                }
            }
            PVValue::StructureArray(items) => {
                for item in items {
                    writeln!(f)?;
                    item.write_value(f, 0, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

fn with_child_appended(field: &Field, steps: &[&str], child: &Field) -> Field {
    let mut children = field.children().to_vec();
    match steps.split_first() {
        None => children.push(child.clone()),
        Some((head, rest)) => {
            for existing in &mut children {
                if existing.name() == *head {
                    *existing = with_child_appended(existing, rest, child);
                }
            }
        }
    }
    Field::structure(field.name(), children)
}

impl PartialEq for PVStructure {
    fn eq(&self, other: &Self) -> bool {
        self.field() == other.field() && self.values == other.values
    }
}

impl fmt::Display for PVStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_value(f, 0, 0)
    }
}

/// Iterator over the offsets of a structure's immediate children.
#[derive(Debug, Clone)]
pub struct ChildOffsets<'a> {
    entries: &'a [FieldEntry],
    next: usize,
    end: usize,
}

impl Iterator for ChildOffsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next = self.entries[current].next_offset;
        Some(current)
    }
}
