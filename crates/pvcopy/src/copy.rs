//! The copy engine: one request projected onto one master structure.

use std::fmt;

use pvdata::{BitSet, Field, FieldEntry, FieldKind, PVStructure};

use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::intersect::intersect;
use crate::mapping::{CopyNode, CopyNodeKind, MappingBuilder};
use crate::plugin::PluginRegistry;
use crate::request::{Options, Request, RequestParser};
use crate::transfer::{run_filters, transfer_node, Transfer};

const COPY_TARGET: &str = "pvcopy::copy";

/// Projection of a master structure onto the fields selected by a request.
///
/// A `PVCopy` holds the derived copy schema and the mapping tree. It never
/// holds master data: every sync call takes the master and a copy instance
/// as arguments, and the caller is responsible for locking the master
/// across calls that must see one consistent snapshot.
///
/// ```
/// use pvcopy::PVCopy;
/// use pvdata::{standard, BitSet, PVStructure, ScalarType};
///
/// let mut master =
///     PVStructure::new(standard::scalar(ScalarType::Double, "alarm,timeStamp").unwrap()).unwrap();
/// master.set_scalar("value", 7.5).unwrap();
///
/// let pv_copy = PVCopy::create_from_str(&master, "field(value,alarm)", "field").unwrap();
/// let mut copy = pv_copy.create_instance();
/// let mut changed = BitSet::new();
/// pv_copy.init(&master, &mut copy, &mut changed).unwrap();
/// assert_eq!(copy.get_f64("value"), Some(7.5));
///
/// master.set_scalar("alarm.severity", 2).unwrap();
/// changed.clear_all();
/// pv_copy.update_copy_set_bitset(&master, &mut copy, &mut changed).unwrap();
/// assert_eq!(changed.iter().collect::<Vec<_>>(), vec![3]);
/// ```
#[derive(Debug)]
pub struct PVCopy {
    master_field: Field,
    copy: PVStructure,
    head: CopyNode,
}

impl PVCopy {
    /// Creates a copy for the `structure_name` group of `request`, falling
    /// back to the `field` group.
    pub fn create(
        master: &PVStructure,
        request: &Request,
        structure_name: &str,
    ) -> Result<Self, CopyError> {
        Self::create_with_config(master, request, structure_name, &CopyConfig::default())
    }

    pub fn create_with_config(
        master: &PVStructure,
        request: &Request,
        structure_name: &str,
        config: &CopyConfig,
    ) -> Result<Self, CopyError> {
        Self::create_with(master, request, structure_name, config, PluginRegistry::global())
    }

    /// Like [`PVCopy::create_with_config`], looking filter plugins up in
    /// `registry` instead of the process-wide registry.
    pub fn create_with(
        master: &PVStructure,
        request: &Request,
        structure_name: &str,
        config: &CopyConfig,
        registry: &PluginRegistry,
    ) -> Result<Self, CopyError> {
        let selection = request.selection(structure_name);
        let Some(derived) = intersect(master.field(), selection) else {
            tracing::debug!(
                target: COPY_TARGET,
                request = %request,
                "request selects no master fields"
            );
            return Err(CopyError::NoFields);
        };
        let copy = PVStructure::new(derived)?;
        let head = MappingBuilder {
            master,
            copy: &copy,
            config,
            registry,
        }
        .build(selection, request.record_options())?;
        tracing::debug!(
            target: COPY_TARGET,
            fields = copy.number_fields(),
            nodes = head.count_nodes(),
            wildcard = !head.is_structure(),
            "created copy"
        );
        Ok(Self {
            master_field: master.field().clone(),
            copy,
            head,
        })
    }

    /// Parses `text` and creates a copy from it.
    pub fn create_from_str(
        master: &PVStructure,
        text: &str,
        structure_name: &str,
    ) -> Result<Self, CopyError> {
        let request = RequestParser::new().parse(text)?;
        Self::create(master, &request, structure_name)
    }

    /// Schema of the master at creation time.
    pub fn master_field(&self) -> &Field {
        &self.master_field
    }

    /// Default-valued instance of the copy schema.
    pub fn copy_structure(&self) -> &PVStructure {
        &self.copy
    }

    pub fn head(&self) -> &CopyNode {
        &self.head
    }

    /// Whether the whole master is copied.
    pub fn is_wildcard(&self) -> bool {
        !self.head.is_structure()
    }

    /// New instance of the copy schema, sharing its layout.
    pub fn create_instance(&self) -> PVStructure {
        self.copy.new_instance()
    }

    /// Fills `copy` from `master` completely. `bitset` is reset to bit 0;
    /// filters may add the bits of fields they handled.
    pub fn init(
        &self,
        master: &PVStructure,
        copy: &mut PVStructure,
        bitset: &mut BitSet,
    ) -> Result<(), CopyError> {
        bitset.clear_all();
        bitset.set(0);
        self.update_copy_from_bitset(master, copy, bitset)
    }

    /// Copies every master field that differs from `copy` and sets its bit.
    ///
    /// Comparison is per leaf field, so only changed leaves get bits.
    /// Structure arrays are always copied and marked, since their elements
    /// are shared.
    pub fn update_copy_set_bitset(
        &self,
        master: &PVStructure,
        copy: &mut PVStructure,
        bitset: &mut BitSet,
    ) -> Result<(), CopyError> {
        self.check_pair(master, copy);
        let mut transfer = Transfer::ToCopy { master, copy };
        set_bitset_node(&self.head, &mut transfer, bitset)
    }

    /// Copies master fields whose bits are set in `bitset` into `copy`.
    /// Bit 0 selects everything.
    pub fn update_copy_from_bitset(
        &self,
        master: &PVStructure,
        copy: &mut PVStructure,
        bitset: &mut BitSet,
    ) -> Result<(), CopyError> {
        self.check_pair(master, copy);
        let do_all = bitset.get(0);
        let mut transfer = Transfer::ToCopy { master, copy };
        transfer_node(&self.head, &mut transfer, bitset, do_all)
    }

    /// Writes copy fields whose bits are set in `bitset` back into `master`.
    /// Bit 0 selects everything.
    pub fn update_master(
        &self,
        master: &mut PVStructure,
        copy: &PVStructure,
        bitset: &mut BitSet,
    ) -> Result<(), CopyError> {
        self.check_pair(master, copy);
        let do_all = bitset.get(0);
        let mut transfer = Transfer::ToMaster { master, copy };
        transfer_node(&self.head, &mut transfer, bitset, do_all)
    }

    fn check_pair(&self, master: &PVStructure, copy: &PVStructure) {
        debug_assert_eq!(master.field(), &self.master_field, "master schema changed");
        debug_assert_eq!(copy.field(), self.copy.field(), "not an instance of this copy");
    }

    /// Copy offset of the master field at `master_offset`, if the request
    /// selected it.
    pub fn get_copy_offset(&self, master_offset: usize) -> Option<usize> {
        self.head.copy_offset_of(master_offset)
    }

    /// Master offset mirrored by `copy_offset`.
    pub fn get_master_offset(&self, copy_offset: usize) -> Result<usize, CopyError> {
        self.head
            .master_offset_of(copy_offset)
            .ok_or(CopyError::OffsetOutOfRange {
                offset: copy_offset,
                len: self.copy.number_fields(),
            })
    }

    /// Master field mirrored by `copy_offset`.
    pub fn get_master_field<'m>(
        &self,
        master: &'m PVStructure,
        copy_offset: usize,
    ) -> Result<&'m FieldEntry, CopyError> {
        let offset = self.get_master_offset(copy_offset)?;
        master.entry(offset).ok_or(CopyError::OffsetOutOfRange {
            offset,
            len: master.number_fields(),
        })
    }

    /// Options of the deepest mapping node containing `copy_offset`.
    /// Offset 0 gives the `record[...]` options.
    pub fn get_options(&self, copy_offset: usize) -> Option<&Options> {
        self.head.find(copy_offset)?.options()
    }

    pub fn record_options(&self) -> Option<&Options> {
        self.head.options()
    }

    /// Calls `f` with the offset of every master subtree the copy mirrors
    /// whole, in copy order.
    pub fn traverse_master(&self, mut f: impl FnMut(usize)) {
        self.head.for_each_master(&mut f);
    }

    /// Human-readable dump of the copy schema and the mapping tree.
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PVCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.copy.field())?;
        write!(f, "{}", self.head)
    }
}

fn set_bitset_node(
    node: &CopyNode,
    transfer: &mut Transfer<'_>,
    bitset: &mut BitSet,
) -> Result<(), CopyError> {
    match node.kind() {
        CopyNodeKind::Structure(children) => {
            for child in children {
                set_bitset_node(child, transfer, bitset)?;
            }
        }
        CopyNodeKind::Master { .. } => {
            if run_filters(node, transfer, bitset) {
                return Ok(());
            }
            for k in 0..node.field_count() {
                let master_offset = node.master_offset() + k;
                let copy_offset = node.copy_offset() + k;
                let changed = match transfer.copy().entry(copy_offset).map(FieldEntry::kind) {
                    Some(FieldKind::Structure(_)) | None => continue,
                    Some(FieldKind::StructureArray(_)) => true,
                    Some(_) => !transfer.copy().subtree_equals(
                        copy_offset,
                        transfer.master(),
                        master_offset,
                    ),
                };
                if changed {
                    transfer.move_subtree(master_offset, copy_offset)?;
                    bitset.set(copy_offset);
                }
            }
        }
    }
    Ok(())
}
