//! Standard property structures and the records built from them.

use crate::error::PvDataError;
use crate::field::{Field, ScalarType};

pub fn alarm() -> Field {
    Field::structure(
        "alarm",
        vec![
            Field::scalar("severity", ScalarType::Int),
            Field::scalar("status", ScalarType::Int),
            Field::scalar("message", ScalarType::String),
        ],
    )
}

pub fn time_stamp() -> Field {
    Field::structure(
        "timeStamp",
        vec![
            Field::scalar("secondsPastEpoch", ScalarType::Long),
            Field::scalar("nanoseconds", ScalarType::Int),
            Field::scalar("userTag", ScalarType::Int),
        ],
    )
}

pub fn display() -> Field {
    Field::structure(
        "display",
        vec![
            Field::scalar("limitLow", ScalarType::Double),
            Field::scalar("limitHigh", ScalarType::Double),
            Field::scalar("description", ScalarType::String),
            Field::scalar("format", ScalarType::String),
            Field::scalar("units", ScalarType::String),
        ],
    )
}

pub fn control() -> Field {
    Field::structure(
        "control",
        vec![
            Field::scalar("limitLow", ScalarType::Double),
            Field::scalar("limitHigh", ScalarType::Double),
            Field::scalar("minStep", ScalarType::Double),
        ],
    )
}

/// Property structure by name, as used in a comma separated property list.
pub fn property(name: &str) -> Result<Field, PvDataError> {
    match name {
        "alarm" => Ok(alarm()),
        "timeStamp" => Ok(time_stamp()),
        "display" => Ok(display()),
        "control" => Ok(control()),
        _ => Err(PvDataError::UnknownField(name.to_string())),
    }
}

fn with_properties(value: Field, properties: &str) -> Result<Field, PvDataError> {
    let mut fields = vec![value];
    for name in properties.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let field = property(name)?;
        if fields.iter().any(|f| f.name() == field.name()) {
            return Err(PvDataError::DuplicateField(field.name().to_string()));
        }
        fields.push(field);
    }
    Ok(Field::structure("", fields))
}

/// Record with a scalar `value` plus the listed properties, e.g.
/// `scalar(ScalarType::Double, "alarm,timeStamp")`.
pub fn scalar(value_type: ScalarType, properties: &str) -> Result<Field, PvDataError> {
    with_properties(Field::scalar("value", value_type), properties)
}

/// Record with a scalar-array `value` plus the listed properties.
pub fn scalar_array(element_type: ScalarType, properties: &str) -> Result<Field, PvDataError> {
    with_properties(Field::scalar_array("value", element_type), properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_record() {
        let field = scalar(ScalarType::Double, "alarm, timeStamp").unwrap();
        let names: Vec<_> = field.children().iter().map(Field::name).collect();
        assert_eq!(names, vec!["value", "alarm", "timeStamp"]);
        assert_eq!(field.number_fields(), 10);
    }

    #[test]
    fn test_unknown_property() {
        assert_eq!(
            scalar(ScalarType::Int, "alarm,limits"),
            Err(PvDataError::UnknownField("limits".into()))
        );
    }

    #[test]
    fn test_repeated_property() {
        assert!(scalar_array(ScalarType::Int, "alarm,alarm").is_err());
    }
}
