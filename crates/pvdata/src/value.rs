//! Data held in structure slots.

use std::fmt;
use std::sync::Arc;

use crate::field::{FieldKind, ScalarType};
use crate::structure::PVStructure;

/// One scalar datum, tagged with its [`ScalarType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    UByte(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl ScalarValue {
    pub fn default_for(scalar_type: ScalarType) -> Self {
        match scalar_type {
            ScalarType::Boolean => Self::Boolean(false),
            ScalarType::Byte => Self::Byte(0),
            ScalarType::Short => Self::Short(0),
            ScalarType::Int => Self::Int(0),
            ScalarType::Long => Self::Long(0),
            ScalarType::UByte => Self::UByte(0),
            ScalarType::UShort => Self::UShort(0),
            ScalarType::UInt => Self::UInt(0),
            ScalarType::ULong => Self::ULong(0),
            ScalarType::Float => Self::Float(0.0),
            ScalarType::Double => Self::Double(0.0),
            ScalarType::String => Self::String(String::new()),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Boolean(_) => ScalarType::Boolean,
            Self::Byte(_) => ScalarType::Byte,
            Self::Short(_) => ScalarType::Short,
            Self::Int(_) => ScalarType::Int,
            Self::Long(_) => ScalarType::Long,
            Self::UByte(_) => ScalarType::UByte,
            Self::UShort(_) => ScalarType::UShort,
            Self::UInt(_) => ScalarType::UInt,
            Self::ULong(_) => ScalarType::ULong,
            Self::Float(_) => ScalarType::Float,
            Self::Double(_) => ScalarType::Double,
            Self::String(_) => ScalarType::String,
        }
    }

    /// Numeric value widened to `f64`; `None` for booleans and strings.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Byte(v) => Some(v as f64),
            Self::Short(v) => Some(v as f64),
            Self::Int(v) => Some(v as f64),
            Self::Long(v) => Some(v as f64),
            Self::UByte(v) => Some(v as f64),
            Self::UShort(v) => Some(v as f64),
            Self::UInt(v) => Some(v as f64),
            Self::ULong(v) => Some(v as f64),
            Self::Float(v) => Some(v as f64),
            Self::Double(v) => Some(v),
            Self::Boolean(_) | Self::String(_) => None,
        }
    }

    /// Integer value widened to `i64`; `None` for non-integers and for
    /// `ULong` values above `i64::MAX`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Byte(v) => Some(v as i64),
            Self::Short(v) => Some(v as i64),
            Self::Int(v) => Some(v as i64),
            Self::Long(v) => Some(v),
            Self::UByte(v) => Some(v as i64),
            Self::UShort(v) => Some(v as i64),
            Self::UInt(v) => Some(v as i64),
            Self::ULong(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Builds a numeric value of `scalar_type` from an `f64`, truncating
    /// toward zero for integer types. `None` for boolean and string types.
    pub fn from_f64(scalar_type: ScalarType, v: f64) -> Option<Self> {
        let value = match scalar_type {
            ScalarType::Byte => Self::Byte(v as i8),
            ScalarType::Short => Self::Short(v as i16),
            ScalarType::Int => Self::Int(v as i32),
            ScalarType::Long => Self::Long(v as i64),
            ScalarType::UByte => Self::UByte(v as u8),
            ScalarType::UShort => Self::UShort(v as u16),
            ScalarType::UInt => Self::UInt(v as u32),
            ScalarType::ULong => Self::ULong(v as u64),
            ScalarType::Float => Self::Float(v as f32),
            ScalarType::Double => Self::Double(v),
            ScalarType::Boolean | ScalarType::String => return None,
        };
        Some(value)
    }

    /// Builds an integer value of `scalar_type` from an `i64`. `None` for
    /// non-integer types and for values out of the type's range.
    pub fn from_i64(scalar_type: ScalarType, v: i64) -> Option<Self> {
        let value = match scalar_type {
            ScalarType::Byte => Self::Byte(v.try_into().ok()?),
            ScalarType::Short => Self::Short(v.try_into().ok()?),
            ScalarType::Int => Self::Int(v.try_into().ok()?),
            ScalarType::Long => Self::Long(v),
            ScalarType::UByte => Self::UByte(v.try_into().ok()?),
            ScalarType::UShort => Self::UShort(v.try_into().ok()?),
            ScalarType::UInt => Self::UInt(v.try_into().ok()?),
            ScalarType::ULong => Self::ULong(v.try_into().ok()?),
            _ => return None,
        };
        Some(value)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Short(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::UByte(v) => write!(f, "{}", v),
            Self::UShort(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::ULong(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<u64> for ScalarValue {
    fn from(v: u64) -> Self {
        Self::ULong(v)
    }
}

impl From<f32> for ScalarValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Contents of one offset slot of a [`PVStructure`].
///
/// Structure slots carry no data of their own; their contents live in the
/// slots that follow them. Structure-array elements are shared by `Arc`, so
/// copying a structure array shares its elements rather than deep-cloning
/// them.
#[derive(Debug, Clone, PartialEq)]
pub enum PVValue {
    Scalar(ScalarValue),
    ScalarArray(Vec<ScalarValue>),
    Structure,
    StructureArray(Vec<Arc<PVStructure>>),
}

impl PVValue {
    pub fn default_for(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Scalar(t) => Self::Scalar(ScalarValue::default_for(*t)),
            FieldKind::ScalarArray(_) => Self::ScalarArray(Vec::new()),
            FieldKind::Structure(_) => Self::Structure,
            FieldKind::StructureArray(_) => Self::StructureArray(Vec::new()),
        }
    }

    /// Whether this value may be stored in a slot of the given kind.
    pub fn conforms_to(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Self::Scalar(v), FieldKind::Scalar(t)) => v.scalar_type() == *t,
            (Self::ScalarArray(items), FieldKind::ScalarArray(t)) => {
                items.iter().all(|v| v.scalar_type() == *t)
            }
            (Self::Structure, FieldKind::Structure(_)) => true,
            (Self::StructureArray(items), FieldKind::StructureArray(element)) => {
                items.iter().all(|s| s.field().kind() == element.kind())
            }
            _ => false,
        }
    }

    /// Short description of the value's shape, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(v) => v.scalar_type().to_string(),
            Self::ScalarArray(items) => match items.first() {
                Some(v) => format!("{}[]", v.scalar_type()),
                None => "[]".to_string(),
            },
            Self::Structure => "structure".to_string(),
            Self::StructureArray(_) => "structure[]".to_string(),
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_scalar_array(&self) -> Option<&[ScalarValue]> {
        match self {
            Self::ScalarArray(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_structure_array(&self) -> Option<&[Arc<PVStructure>]> {
        match self {
            Self::StructureArray(items) => Some(items),
            _ => None,
        }
    }
}

impl From<ScalarValue> for PVValue {
    fn from(v: ScalarValue) -> Self {
        Self::Scalar(v)
    }
}
