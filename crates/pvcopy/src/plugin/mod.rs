//! Filter plugins.
//!
//! A request option whose key names a registered plugin, such as
//! `value[array=0:4]`, asks that plugin for a [`PVFilter`] for the field.
//! Filters run before the default copy of their field and may take it over.

mod array;
mod deadband;
mod registry;
mod timestamp;

use pvdata::{BitSet, FieldEntry, PVStructure, PVValue};

pub use array::{ArrayPlugin, ArraySlice};
pub use deadband::{Deadband, DeadbandPlugin};
pub use registry::{find_plugin, register_plugin, PluginRegistry};
pub use timestamp::TimestampPlugin;

pub use crate::transfer::FilterField;

const PLUGIN_TARGET: &str = "pvcopy::plugin";

/// Intercepts the sync step of one field.
pub trait PVFilter: Send + Sync {
    fn name(&self) -> &str;

    /// Moves data for `field` in the direction given by `to_copy`.
    ///
    /// Returns `true` when the filter has dealt with the field and the
    /// default copy must be skipped.
    fn filter(&self, field: &mut FilterField<'_, '_>, bitset: &mut BitSet, to_copy: bool) -> bool;
}

/// What a plugin gets to decide whether a filter applies.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub master: &'a PVStructure,
    pub master_offset: usize,
}

impl<'a> FilterContext<'a> {
    pub fn entry(&self) -> Option<&'a FieldEntry> {
        self.master.entry(self.master_offset)
    }

    pub fn value(&self) -> Option<&'a PVValue> {
        self.master.value(self.master_offset)
    }
}

/// Factory for filters.
pub trait PVPlugin: Send + Sync {
    /// Creates a filter for the option value `value` on the master field
    /// described by `ctx`. `None` means the plugin does not apply.
    fn create(&self, value: &str, ctx: &FilterContext<'_>) -> Option<Box<dyn PVFilter>>;
}

impl<F> PVPlugin for F
where
    F: Fn(&str, &FilterContext<'_>) -> Option<Box<dyn PVFilter>> + Send + Sync,
{
    fn create(&self, value: &str, ctx: &FilterContext<'_>) -> Option<Box<dyn PVFilter>> {
        self(value, ctx)
    }
}
