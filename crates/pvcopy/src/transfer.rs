//! Data movement between master and copy.
//!
//! Both sync directions run the same traversal over the mapping tree; the
//! direction lives in [`Transfer`] and only decides which side is written.

use pvdata::{BitSet, FieldKind, PVStructure, PVValue, PvDataError};

use crate::error::CopyError;
use crate::mapping::{CopyNode, CopyNodeKind};

/// The pair of structures a sync call works on, with the direction data
/// flows between them.
#[derive(Debug)]
pub enum Transfer<'a> {
    ToCopy {
        master: &'a PVStructure,
        copy: &'a mut PVStructure,
    },
    ToMaster {
        master: &'a mut PVStructure,
        copy: &'a PVStructure,
    },
}

impl Transfer<'_> {
    pub fn to_copy(&self) -> bool {
        matches!(self, Self::ToCopy { .. })
    }

    pub fn master(&self) -> &PVStructure {
        match self {
            Self::ToCopy { master, .. } => *master,
            Self::ToMaster { master, .. } => &**master,
        }
    }

    pub fn copy(&self) -> &PVStructure {
        match self {
            Self::ToCopy { copy, .. } => &**copy,
            Self::ToMaster { copy, .. } => *copy,
        }
    }

    /// The copy, when it is the side being written.
    pub fn copy_mut(&mut self) -> Option<&mut PVStructure> {
        match self {
            Self::ToCopy { copy, .. } => Some(&mut **copy),
            Self::ToMaster { .. } => None,
        }
    }

    /// The master, when it is the side being written.
    pub fn master_mut(&mut self) -> Option<&mut PVStructure> {
        match self {
            Self::ToMaster { master, .. } => Some(&mut **master),
            Self::ToCopy { .. } => None,
        }
    }

    /// Copies one field subtree in the transfer direction.
    pub fn move_subtree(
        &mut self,
        master_offset: usize,
        copy_offset: usize,
    ) -> Result<(), PvDataError> {
        match self {
            Self::ToCopy { master, copy } => {
                copy.copy_subtree(copy_offset, *master, master_offset)
            }
            Self::ToMaster { master, copy } => {
                master.copy_subtree(master_offset, *copy, copy_offset)
            }
        }
    }
}

/// One field handed to a filter: a master offset and the copy offset it is
/// mapped to, within a running transfer.
pub struct FilterField<'t, 'a> {
    transfer: &'t mut Transfer<'a>,
    master_offset: usize,
    copy_offset: usize,
}

impl<'t, 'a> FilterField<'t, 'a> {
    pub(crate) fn new(
        transfer: &'t mut Transfer<'a>,
        master_offset: usize,
        copy_offset: usize,
    ) -> Self {
        Self {
            transfer,
            master_offset,
            copy_offset,
        }
    }

    pub fn master_offset(&self) -> usize {
        self.master_offset
    }

    pub fn copy_offset(&self) -> usize {
        self.copy_offset
    }

    pub fn to_copy(&self) -> bool {
        self.transfer.to_copy()
    }

    pub fn master(&self) -> &PVStructure {
        self.transfer.master()
    }

    pub fn copy(&self) -> &PVStructure {
        self.transfer.copy()
    }

    pub fn master_mut(&mut self) -> Option<&mut PVStructure> {
        self.transfer.master_mut()
    }

    pub fn copy_mut(&mut self) -> Option<&mut PVStructure> {
        self.transfer.copy_mut()
    }

    pub fn master_value(&self) -> Option<&PVValue> {
        self.master().value(self.master_offset)
    }

    pub fn copy_value(&self) -> Option<&PVValue> {
        self.copy().value(self.copy_offset)
    }

    /// Default data movement for this field, as if no filter were present.
    pub fn move_subtree(&mut self) -> Result<(), PvDataError> {
        self.transfer.move_subtree(self.master_offset, self.copy_offset)
    }
}

/// Runs the node's filters. Returns whether any of them handled the field.
pub(crate) fn run_filters(
    node: &CopyNode,
    transfer: &mut Transfer<'_>,
    bitset: &mut BitSet,
) -> bool {
    let to_copy = transfer.to_copy();
    let mut handled = false;
    for filter in node.filters() {
        let mut field = FilterField::new(transfer, node.master_offset(), node.copy_offset());
        if filter.filter(&mut field, bitset, to_copy) {
            handled = true;
        }
    }
    handled
}

/// Moves the data selected by `bitset` below `node`.
///
/// With `do_all` every node is selected. Otherwise a node whose copy range
/// holds no set bit is skipped without visiting its subtree, and a bit at a
/// node's own offset selects its whole subtree.
pub(crate) fn transfer_node(
    node: &CopyNode,
    transfer: &mut Transfer<'_>,
    bitset: &mut BitSet,
    mut do_all: bool,
) -> Result<(), CopyError> {
    if !do_all {
        if !bitset.any_in_range(node.range()) {
            return Ok(());
        }
        do_all = bitset.get(node.copy_offset());
    }
    match node.kind() {
        CopyNodeKind::Structure(children) => {
            for child in children {
                transfer_node(child, transfer, bitset, do_all)?;
            }
        }
        CopyNodeKind::Master { .. } => {
            if run_filters(node, transfer, bitset) {
                return Ok(());
            }
            transfer_subtree(
                transfer,
                bitset,
                node.master_offset(),
                node.copy_offset(),
                do_all,
            )?;
        }
    }
    Ok(())
}

/// Moves a mirrored subtree, or only its parts with set bits.
fn transfer_subtree(
    transfer: &mut Transfer<'_>,
    bitset: &BitSet,
    master_offset: usize,
    copy_offset: usize,
    do_all: bool,
) -> Result<(), CopyError> {
    if do_all || bitset.get(copy_offset) {
        transfer.move_subtree(master_offset, copy_offset)?;
        return Ok(());
    }
    let copy = transfer.copy();
    let is_structure = copy
        .entry(copy_offset)
        .is_some_and(|entry| matches!(entry.kind(), FieldKind::Structure(_)));
    if !is_structure {
        return Ok(());
    }
    let dirty: Vec<usize> = copy
        .child_offsets(copy_offset)
        .filter(|&child| {
            copy.entry(child)
                .is_some_and(|entry| bitset.any_in_range(entry.range()))
        })
        .collect();
    for child in dirty {
        transfer_subtree(
            transfer,
            bitset,
            master_offset + (child - copy_offset),
            child,
            false,
        )?;
    }
    Ok(())
}
