//! Request tree types.

use std::fmt;

use indexmap::IndexMap;

/// Per-field options (`name[key=value,...]`), in the order written.
pub type Options = IndexMap<String, String>;

/// Reserved name under which a group's options are exposed.
pub const OPTIONS_NAME: &str = "_options";

/// Top-level group carrying record options: `record[...]`.
pub const RECORD: &str = "record";
/// Top-level group selecting fields: `field(...)`.
pub const FIELD: &str = "field";
/// Top-level group selecting fields to write: `putField(...)`.
pub const PUT_FIELD: &str = "putField";
/// Top-level group selecting fields to read back: `getField(...)`.
pub const GET_FIELD: &str = "getField";

/// A named node of a request tree.
///
/// A group without children selects the whole field it names; a group with
/// children selects only those subfields. Options are held in `options`
/// rather than as a child group; `_options` is reserved so no field can
/// take that name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestGroup {
    pub name: String,
    pub children: Vec<RequestGroup>,
    pub options: Option<Options>,
}

impl RequestGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_children(mut self, children: Vec<RequestGroup>) -> Self {
        self.children = children;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Whether this group narrows its field to a list of subfields.
    pub fn has_subfields(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&RequestGroup> {
        self.children.iter().find(|g| g.name == name)
    }

    /// Looks up a descendant group by dotted path.
    pub fn find(&self, path: &str) -> Option<&RequestGroup> {
        let mut current = self;
        for step in path.split('.') {
            current = current.child(step)?;
        }
        Some(current)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.as_ref()?.get(key).map(String::as_str)
    }

    /// Adds `group` as a child, merging it into an existing child of the
    /// same name.
    pub fn insert(&mut self, group: RequestGroup) {
        match self.children.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => existing.merge(group),
            None => self.children.push(group),
        }
    }

    /// Merges another request for the same field into this one.
    ///
    /// If either side selects the whole field, the result selects the whole
    /// field. Options are combined, later keys replacing earlier ones.
    pub fn merge(&mut self, mut other: RequestGroup) {
        if let Some(options) = other.options.take() {
            self.options.get_or_insert_with(Options::new).extend(options);
        }
        if !self.has_subfields() {
            return;
        }
        if !other.has_subfields() {
            self.children.clear();
            return;
        }
        for child in other.children {
            self.insert(child);
        }
    }
}

static EMPTY_GROUP: RequestGroup = RequestGroup {
    name: String::new(),
    children: Vec::new(),
    options: None,
};

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub(crate) root: RequestGroup,
    pub(crate) grouped: bool,
}

impl Request {
    /// Request whose root is `root`. `grouped` says whether the root's
    /// children are the top-level `record`/`field`/`putField`/`getField`
    /// groups rather than field selections.
    pub fn new(root: RequestGroup, grouped: bool) -> Self {
        Self { root, grouped }
    }

    pub fn root(&self) -> &RequestGroup {
        &self.root
    }

    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    /// Whether the request selects everything.
    pub fn is_empty(&self) -> bool {
        !self.root.has_subfields() && self.root.options.is_none()
    }

    pub fn record_options(&self) -> Option<&Options> {
        if !self.grouped {
            return None;
        }
        self.root.child(RECORD)?.options.as_ref()
    }

    /// The group selecting data fields for a copy.
    ///
    /// Prefers `structure_name` (e.g. `putField`) when present, then
    /// `field`. A request that only carries `record[...]` selects
    /// everything, and an ungrouped request is its own selection.
    pub fn selection(&self, structure_name: &str) -> &RequestGroup {
        if !self.grouped {
            return &self.root;
        }
        if !structure_name.is_empty() {
            if let Some(group) = self.root.child(structure_name) {
                return group;
            }
        }
        self.root.child(FIELD).unwrap_or(&EMPTY_GROUP)
    }
}

fn write_options(f: &mut fmt::Formatter<'_>, options: &Options) -> fmt::Result {
    let mut first = true;
    for (key, value) in options {
        if !first {
            f.write_str(",")?;
        }
        first = false;
        write!(f, "{}={}", key, value)?;
    }
    Ok(())
}

fn write_list(f: &mut fmt::Formatter<'_>, groups: &[RequestGroup]) -> fmt::Result {
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", group)?;
    }
    Ok(())
}

/// Renders the group as a field-list entry, e.g. `alarm[k=v]{severity}`.
impl fmt::Display for RequestGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(options) = &self.options {
            f.write_str("[")?;
            write_options(f, options)?;
            f.write_str("]")?;
        }
        if self.has_subfields() {
            f.write_str("{")?;
            write_list(f, &self.children)?;
            f.write_str("}")?;
        }
        Ok(())
    }
}

/// Renders the request back into request syntax.
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.grouped {
            return write_list(f, &self.root.children);
        }
        for group in &self.root.children {
            if group.name == RECORD {
                f.write_str("record[")?;
                if let Some(options) = &group.options {
                    write_options(f, options)?;
                }
                f.write_str("]")?;
            } else {
                write!(f, "{}(", group.name)?;
                write_list(f, &group.children)?;
                f.write_str(")")?;
            }
        }
        Ok(())
    }
}
