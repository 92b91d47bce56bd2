//! Subset projection and change tracking between a master structure and
//! client copies.
//!
//! A client sends request text such as `field(value,alarm.severity)`. The
//! text is parsed into a [`Request`], intersected with the master's schema
//! to derive the copy schema, and turned into a mapping tree from copy
//! offsets to master fields. [`PVCopy`] then keeps copy instances in sync
//! with the master through a [`BitSet`] of changed copy offsets, in both
//! directions.
//!
//! ```
//! use pvcopy::PVCopy;
//! use pvdata::{standard, BitSet, PVStructure, ScalarType};
//!
//! let mut master =
//!     PVStructure::new(standard::scalar(ScalarType::Double, "alarm,timeStamp").unwrap()).unwrap();
//! let pv_copy = PVCopy::create_from_str(&master, "field(timeStamp,value)", "field").unwrap();
//! assert_eq!(pv_copy.copy_structure().offset_of("value"), Some(5));
//!
//! // Write through the copy.
//! let mut copy = pv_copy.create_instance();
//! copy.set_scalar("value", 4.25).unwrap();
//! let mut changed = BitSet::new();
//! changed.set(5);
//! pv_copy.update_master(&mut master, &copy, &mut changed).unwrap();
//! assert_eq!(master.get_f64("value"), Some(4.25));
//! ```
//!
//! [`BitSet`]: pvdata::BitSet

pub mod config;
pub mod copy;
pub mod error;
pub mod intersect;
pub mod mapping;
pub mod plugin;
pub mod record;
pub mod request;
pub mod session;
pub mod transfer;

pub use config::CopyConfig;
pub use copy::PVCopy;
pub use error::{CopyError, ParseError};
pub use intersect::intersect;
pub use mapping::{CopyNode, CopyNodeKind};
pub use plugin::{
    find_plugin, register_plugin, FilterContext, FilterField, PVFilter, PVPlugin, PluginRegistry,
};
pub use record::{PVRecord, RecordGuard};
pub use request::{parse_request, Options, Request, RequestGroup, RequestParser};
pub use session::CopySession;
pub use transfer::Transfer;
