//! The mapping tree between copy offsets and master fields.

use std::fmt;
use std::ops::Range;

use pvdata::{PVStructure, PvDataError};

use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::plugin::{FilterContext, PVFilter, PluginRegistry};
use crate::request::{Options, RequestGroup};

const COPY_TARGET: &str = "pvcopy::copy";

/// One node of the mapping tree.
///
/// A master node mirrors a whole master subtree into the copy; a structure
/// node mirrors a master structure of which only some fields were
/// requested. Master offsets are plain indices into the master, so the tree
/// never holds master data.
#[derive(Debug)]
pub struct CopyNode {
    copy_offset: usize,
    field_count: usize,
    master_offset: usize,
    options: Option<Options>,
    kind: CopyNodeKind,
}

pub enum CopyNodeKind {
    Master { filters: Vec<Box<dyn PVFilter>> },
    Structure(Vec<CopyNode>),
}

impl fmt::Debug for CopyNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master { filters } => f
                .debug_struct("Master")
                .field("filters", &filters.iter().map(|p| p.name()).collect::<Vec<_>>())
                .finish(),
            Self::Structure(children) => f.debug_tuple("Structure").field(children).finish(),
        }
    }
}

impl CopyNode {
    pub fn copy_offset(&self) -> usize {
        self.copy_offset
    }

    /// Width of the node's subtree in the copy.
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Copy offsets covered by this node.
    pub fn range(&self) -> Range<usize> {
        self.copy_offset..self.copy_offset + self.field_count
    }

    /// Offset of the master field this node mirrors.
    pub fn master_offset(&self) -> usize {
        self.master_offset
    }

    pub fn options(&self) -> Option<&Options> {
        self.options.as_ref()
    }

    pub fn kind(&self) -> &CopyNodeKind {
        &self.kind
    }

    pub fn is_structure(&self) -> bool {
        matches!(self.kind, CopyNodeKind::Structure(_))
    }

    pub fn children(&self) -> &[CopyNode] {
        match &self.kind {
            CopyNodeKind::Structure(children) => children,
            CopyNodeKind::Master { .. } => &[],
        }
    }

    pub fn filters(&self) -> &[Box<dyn PVFilter>] {
        match &self.kind {
            CopyNodeKind::Master { filters } => filters,
            CopyNodeKind::Structure(_) => &[],
        }
    }

    /// Number of nodes in this subtree, this one included.
    pub fn count_nodes(&self) -> usize {
        1 + self.children().iter().map(CopyNode::count_nodes).sum::<usize>()
    }

    /// Deepest node whose copy range contains `copy_offset`.
    pub fn find(&self, copy_offset: usize) -> Option<&CopyNode> {
        if !self.range().contains(&copy_offset) {
            return None;
        }
        self.children()
            .iter()
            .find_map(|child| child.find(copy_offset))
            .or(Some(self))
    }

    /// Copy offset mirroring `master_offset`, if this subtree maps it.
    pub fn copy_offset_of(&self, master_offset: usize) -> Option<usize> {
        match &self.kind {
            CopyNodeKind::Master { .. } => {
                let start = self.master_offset;
                (start..start + self.field_count)
                    .contains(&master_offset)
                    .then(|| self.copy_offset + (master_offset - start))
            }
            CopyNodeKind::Structure(children) => {
                if master_offset == self.master_offset {
                    return Some(self.copy_offset);
                }
                children
                    .iter()
                    .find_map(|child| child.copy_offset_of(master_offset))
            }
        }
    }

    /// Master offset mirrored by `copy_offset`, if this subtree maps it.
    pub fn master_offset_of(&self, copy_offset: usize) -> Option<usize> {
        let node = self.find(copy_offset)?;
        match node.kind {
            CopyNodeKind::Master { .. } => {
                Some(node.master_offset + (copy_offset - node.copy_offset))
            }
            CopyNodeKind::Structure(_) => {
                (copy_offset == node.copy_offset).then_some(node.master_offset)
            }
        }
    }

    /// Calls `f` with the master offset of every master node, in copy order.
    pub fn for_each_master(&self, f: &mut impl FnMut(usize)) {
        match &self.kind {
            CopyNodeKind::Master { .. } => f(self.master_offset),
            CopyNodeKind::Structure(children) => {
                for child in children {
                    child.for_each_master(f);
                }
            }
        }
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let label = if self.is_structure() { "structure" } else { "master" };
        write!(
            f,
            "{:indent$}{} copy={} count={} master={}",
            "",
            label,
            self.copy_offset,
            self.field_count,
            self.master_offset,
            indent = depth * 4
        )?;
        if let Some(options) = &self.options {
            let pairs: Vec<String> = options.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, " [{}]", pairs.join(","))?;
        }
        for filter in self.filters() {
            write!(f, " <{}>", filter.name())?;
        }
        for child in self.children() {
            writeln!(f)?;
            child.write_node(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for CopyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, 0)
    }
}

/// Builds a mapping tree from a master instance and a copy instance of the
/// derived schema.
pub(crate) struct MappingBuilder<'a> {
    pub master: &'a PVStructure,
    pub copy: &'a PVStructure,
    pub config: &'a CopyConfig,
    pub registry: &'a PluginRegistry,
}

impl MappingBuilder<'_> {
    /// Builds the tree for `selection`. The root carries `root_options`.
    pub fn build(
        &self,
        selection: &RequestGroup,
        root_options: Option<&Options>,
    ) -> Result<CopyNode, CopyError> {
        let options = root_options.cloned();
        if !selection.has_subfields() {
            return Ok(self.master_node(0, 0, options));
        }
        self.structure_node(selection, 0, 0, options)
    }

    fn master_node(
        &self,
        copy_offset: usize,
        master_offset: usize,
        options: Option<Options>,
    ) -> CopyNode {
        let field_count = self
            .copy
            .entry(copy_offset)
            .map_or(1, |entry| entry.number_fields());
        let filters = match &options {
            Some(options) if self.config.filter_plugins => {
                self.create_filters(options, master_offset)
            }
            _ => Vec::new(),
        };
        CopyNode {
            copy_offset,
            field_count,
            master_offset,
            options,
            kind: CopyNodeKind::Master { filters },
        }
    }

    fn structure_node(
        &self,
        group: &RequestGroup,
        copy_offset: usize,
        master_offset: usize,
        options: Option<Options>,
    ) -> Result<CopyNode, CopyError> {
        let mut children = Vec::new();
        for child_copy in self.copy.child_offsets(copy_offset) {
            let entry = self.copy.entry(child_copy).ok_or(CopyError::OffsetOutOfRange {
                offset: child_copy,
                len: self.copy.number_fields(),
            })?;
            let child_master = self
                .master
                .child_offset(master_offset, entry.name())
                .ok_or_else(|| PvDataError::UnknownField(entry.full_name().to_string()))?;
            let sub = group.child(entry.name());
            let child_options = sub.and_then(|g| g.options.clone());
            let node = match sub {
                Some(sub) if sub.has_subfields() && entry.field().is_structure() => {
                    self.structure_node(sub, child_copy, child_master, child_options)?
                }
                _ => self.master_node(child_copy, child_master, child_options),
            };
            children.push(node);
        }
        let field_count = self
            .copy
            .entry(copy_offset)
            .map_or(1, |entry| entry.number_fields());
        Ok(CopyNode {
            copy_offset,
            field_count,
            master_offset,
            options,
            kind: CopyNodeKind::Structure(children),
        })
    }

    fn create_filters(&self, options: &Options, master_offset: usize) -> Vec<Box<dyn PVFilter>> {
        let ctx = FilterContext {
            master: self.master,
            master_offset,
        };
        let mut filters = Vec::new();
        for (key, value) in options {
            let Some(plugin) = self.registry.find(key) else {
                continue;
            };
            if let Some(filter) = plugin.create(value, &ctx) {
                tracing::trace!(
                    target: COPY_TARGET,
                    plugin = key.as_str(),
                    value = value.as_str(),
                    master_offset,
                    "created filter"
                );
                filters.push(filter);
            }
        }
        filters
    }
}
