//! Self-describing structures for the pvCopy engine.
//!
//! A structure is described by an immutable [`Field`] tree and instantiated
//! as a [`PVStructure`], whose fields are addressed by pre-order offset.
//! [`BitSet`] records which offsets changed.
//!
//! # Example
//!
//! ```
//! use pvdata::{standard, BitSet, PVStructure, ScalarType};
//!
//! let mut pv = PVStructure::new(standard::scalar(ScalarType::Double, "alarm").unwrap()).unwrap();
//! pv.set_scalar("alarm.severity", 2).unwrap();
//!
//! let offset = pv.offset_of("alarm.severity").unwrap();
//! let mut changed = BitSet::new();
//! changed.set(offset);
//! assert_eq!(changed.to_string(), "{3}");
//! ```

pub mod bitset;
pub mod builder;
pub mod error;
pub mod field;
pub mod standard;
pub mod structure;
pub mod value;

pub use bitset::BitSet;
pub use builder::FieldBuilder;
pub use error::PvDataError;
pub use field::{Field, FieldKind, ScalarType};
pub use structure::{ChildOffsets, FieldEntry, Layout, PVStructure};
pub use value::{PVValue, ScalarValue};
