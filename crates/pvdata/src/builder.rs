//! Fluent construction of structure schemas.

use crate::error::PvDataError;
use crate::field::{Field, FieldKind, ScalarType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Structure,
    StructureArray,
}

/// Builder for structure [`Field`]s.
///
/// Nested structures are opened with [`FieldBuilder::add_nested_structure`]
/// (or the structure-array variant) and closed with
/// [`FieldBuilder::end_nested`], which hands back the enclosing builder.
///
/// ```
/// use pvdata::{FieldBuilder, ScalarType};
///
/// let field = FieldBuilder::new()
///     .add("value", ScalarType::Double)
///     .add_nested_structure("alarm")
///     .add("severity", ScalarType::Int)
///     .end_nested()
///     .unwrap()
///     .create_structure()
///     .unwrap();
/// assert_eq!(field.find("alarm.severity").unwrap().name(), "severity");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldBuilder {
    name: String,
    fields: Vec<Field>,
    parent: Option<(Box<FieldBuilder>, Nesting)>,
}

impl FieldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for a structure carrying a name, e.g. when building a
    /// sub-structure to pass to [`FieldBuilder::add_field`].
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add(mut self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.fields.push(Field::scalar(name, scalar_type));
        self
    }

    pub fn add_array(mut self, name: impl Into<String>, scalar_type: ScalarType) -> Self {
        self.fields.push(Field::scalar_array(name, scalar_type));
        self
    }

    pub fn add_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_nested_structure(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            parent: Some((Box::new(self), Nesting::Structure)),
        }
    }

    /// Opens the element schema of a structure array named `name`.
    pub fn add_nested_structure_array(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            parent: Some((Box::new(self), Nesting::StructureArray)),
        }
    }

    pub fn end_nested(self) -> Result<Self, PvDataError> {
        let Some((parent, nesting)) = self.parent else {
            return Err(PvDataError::Builder("end_nested without a nested structure"));
        };
        let structure = Field::structure("", self.fields);
        if let Some(dup) = structure.find_duplicate() {
            return Err(PvDataError::DuplicateField(dup));
        }
        let field = match nesting {
            Nesting::Structure => Field::new(self.name, structure.kind().clone()),
            Nesting::StructureArray => Field::structure_array(self.name, structure),
        };
        Ok(parent.add_field(field))
    }

    pub fn create_structure(self) -> Result<Field, PvDataError> {
        if self.parent.is_some() {
            return Err(PvDataError::Builder("nested structure was not closed"));
        }
        let field = Field::new(self.name, FieldKind::Structure(self.fields));
        if let Some(dup) = field.find_duplicate() {
            return Err(PvDataError::DuplicateField(dup));
        }
        Ok(field)
    }
}
