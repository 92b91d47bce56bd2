#![allow(dead_code)]

use pvdata::{Field, FieldBuilder, PVStructure, ScalarType, ScalarValue};
use tracing_subscriber::EnvFilter;

/// Routes engine logs to the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `{value: double, alarm: {severity: int, message: string},
/// timeStamp: {sec: long, nsec: int}}`
///
/// Offsets: value 1, alarm 2, alarm.severity 3, alarm.message 4,
/// timeStamp 5, timeStamp.sec 6, timeStamp.nsec 7.
pub fn scenario_field() -> Field {
    FieldBuilder::new()
        .add("value", ScalarType::Double)
        .add_nested_structure("alarm")
        .add("severity", ScalarType::Int)
        .add("message", ScalarType::String)
        .end_nested()
        .unwrap()
        .add_nested_structure("timeStamp")
        .add("sec", ScalarType::Long)
        .add("nsec", ScalarType::Int)
        .end_nested()
        .unwrap()
        .create_structure()
        .unwrap()
}

pub fn scenario_master() -> PVStructure {
    let mut master = PVStructure::new(scenario_field()).unwrap();
    master.set_scalar("value", 12.5).unwrap();
    master.set_scalar("alarm.severity", 1).unwrap();
    master.set_scalar("alarm.message", "HIGH").unwrap();
    master.set_scalar("timeStamp.sec", 1_700_000_000i64).unwrap();
    master.set_scalar("timeStamp.nsec", 250).unwrap();
    master
}

/// `{a: int, b: int}`
pub fn ab_master() -> PVStructure {
    let field = FieldBuilder::new()
        .add("a", ScalarType::Int)
        .add("b", ScalarType::Int)
        .create_structure()
        .unwrap();
    let mut master = PVStructure::new(field).unwrap();
    master.set_scalar("a", 1).unwrap();
    master.set_scalar("b", 2).unwrap();
    master
}

/// A wider master with arrays: `{value: double[], history: {when: long}[],
/// limits: {low: double, high: double}, alarm: {severity: int,
/// message: string}}`.
pub fn array_master() -> PVStructure {
    let field = FieldBuilder::new()
        .add_array("value", ScalarType::Double)
        .add_nested_structure_array("history")
        .add("when", ScalarType::Long)
        .end_nested()
        .unwrap()
        .add_nested_structure("limits")
        .add("low", ScalarType::Double)
        .add("high", ScalarType::Double)
        .end_nested()
        .unwrap()
        .add_nested_structure("alarm")
        .add("severity", ScalarType::Int)
        .add("message", ScalarType::String)
        .end_nested()
        .unwrap()
        .create_structure()
        .unwrap();
    let mut master = PVStructure::new(field).unwrap();
    master
        .set_scalar_array("value", doubles(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
        .unwrap();
    master
}

pub fn doubles(values: &[f64]) -> Vec<ScalarValue> {
    values.iter().map(|&v| ScalarValue::Double(v)).collect()
}

pub fn bits(set: &pvdata::BitSet) -> Vec<usize> {
    set.iter().collect()
}
