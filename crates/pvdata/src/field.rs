//! Introspection: the immutable schema of a structure.
//!
//! A [`Field`] is a named node that is either a scalar, an array of scalars,
//! a nested structure or an array of structures. Structures keep their
//! children in declaration order, and that order defines the pre-order
//! offsets used by [`crate::PVStructure`].

use std::fmt;

/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    UByte,
    UShort,
    UInt,
    ULong,
    Float,
    Double,
    String,
}

impl ScalarType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::UByte => "ubyte",
            Self::UShort => "ushort",
            Self::UInt => "uint",
            Self::ULong => "ulong",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean | Self::String)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::UByte
                | Self::UShort
                | Self::UInt
                | Self::ULong
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarType),
    ScalarArray(ScalarType),
    Structure(Vec<Field>),
    /// Array whose elements all conform to the boxed structure field.
    StructureArray(Box<Field>),
}

/// A named schema node.
///
/// Two fields are equal when their names and kinds are equal, recursively.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn scalar(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self::new(name, FieldKind::Scalar(scalar_type))
    }

    pub fn scalar_array(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self::new(name, FieldKind::ScalarArray(scalar_type))
    }

    pub fn structure(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self::new(name, FieldKind::Structure(fields))
    }

    /// Array of structures; `element` is the schema every element conforms to.
    pub fn structure_array(name: impl Into<String>, element: Field) -> Self {
        Self::new(name, FieldKind::StructureArray(Box::new(element)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Returns a copy of this field under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: self.kind.clone(),
        }
    }

    pub fn is_structure(&self) -> bool {
        matches!(self.kind, FieldKind::Structure(_))
    }

    pub fn is_structure_array(&self) -> bool {
        matches!(self.kind, FieldKind::StructureArray(_))
    }

    /// Immediate children; empty for anything but a structure.
    pub fn children(&self) -> &[Field] {
        match &self.kind {
            FieldKind::Structure(fields) => fields,
            _ => &[],
        }
    }

    pub fn child(&self, name: &str) -> Option<&Field> {
        self.children().iter().find(|f| f.name == name)
    }

    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.children().iter().position(|f| f.name == name)
    }

    /// Looks up a descendant by dotted path, e.g. `"alarm.severity"`.
    ///
    /// The empty path names the field itself.
    pub fn find(&self, path: &str) -> Option<&Field> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for step in path.split('.') {
            current = current.child(step)?;
        }
        Some(current)
    }

    /// Number of offsets this field occupies: itself plus every nested field.
    pub fn number_fields(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(Field::number_fields)
            .sum::<usize>()
    }

    /// Type label used in dumps: `double`, `int[]`, `structure`, `structure[]`.
    pub fn type_name(&self) -> String {
        match &self.kind {
            FieldKind::Scalar(t) => t.as_str().to_string(),
            FieldKind::ScalarArray(t) => format!("{}[]", t),
            FieldKind::Structure(_) => "structure".to_string(),
            FieldKind::StructureArray(_) => "structure[]".to_string(),
        }
    }

    /// First name that occurs twice among the children of any structure in
    /// this subtree, including structure-array element schemas.
    pub fn find_duplicate(&self) -> Option<String> {
        match &self.kind {
            FieldKind::Structure(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if fields[..i].iter().any(|f| f.name == field.name) {
                        return Some(field.name.clone());
                    }
                }
                fields.iter().find_map(Field::find_duplicate)
            }
            FieldKind::StructureArray(element) => element.find_duplicate(),
            _ => None,
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.type_name(), indent = depth * 4)?;
        if !self.name.is_empty() {
            write!(f, " {}", self.name)?;
        }
        match &self.kind {
            FieldKind::Structure(fields) => {
                for field in fields {
                    writeln!(f)?;
                    field.write_indented(f, depth + 1)?;
                }
            }
            FieldKind::StructureArray(element) => {
                for field in element.children() {
                    writeln!(f)?;
                    field.write_indented(f, depth + 1)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Field {
        Field::structure(
            "",
            vec![
                Field::scalar("value", ScalarType::Double),
                Field::structure(
                    "alarm",
                    vec![
                        Field::scalar("severity", ScalarType::Int),
                        Field::scalar("message", ScalarType::String),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_number_fields_counts_structures() {
        assert_eq!(sample().number_fields(), 5);
        assert_eq!(sample().child("alarm").unwrap().number_fields(), 3);
    }

    #[test]
    fn test_find_dotted_path() {
        let field = sample();
        assert_eq!(field.find("alarm.message").unwrap().name(), "message");
        assert!(field.find("alarm.status").is_none());
        assert!(field.find("value.x").is_none());
        assert_eq!(field.find("").unwrap(), &field);
    }

    #[test]
    fn test_equality_is_structural() {
        assert_eq!(sample(), sample());
        assert_ne!(sample(), sample().renamed("other"));
        let reordered = Field::structure(
            "",
            vec![
                sample().child("alarm").unwrap().clone(),
                Field::scalar("value", ScalarType::Double),
            ],
        );
        assert_ne!(sample(), reordered);
    }

    #[test]
    fn test_find_duplicate() {
        assert_eq!(sample().find_duplicate(), None);
        let dup = Field::structure(
            "",
            vec![
                Field::scalar("a", ScalarType::Int),
                Field::structure(
                    "s",
                    vec![
                        Field::scalar("b", ScalarType::Int),
                        Field::scalar("b", ScalarType::Long),
                    ],
                ),
            ],
        );
        assert_eq!(dup.find_duplicate(), Some("b".to_string()));
    }

    #[test]
    fn test_display() {
        let text = sample().to_string();
        assert_eq!(
            text,
            "structure\n    double value\n    structure alarm\n        int severity\n        string message"
        );
    }
}
