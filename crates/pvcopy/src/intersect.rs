//! Derives the copy schema from a master schema and a request.

use pvdata::{Field, FieldKind};

use crate::request::RequestGroup;

/// Intersects the structure `master` with `request`.
///
/// A request without subfields selects the whole master. Otherwise the
/// result holds the requested fields in request order; names the master does
/// not have are skipped, and a requested substructure that matches nothing
/// is left out rather than kept empty. Returns `None` when nothing matches.
///
/// ```
/// use pvcopy::{intersect, parse_request};
/// use pvdata::{Field, ScalarType};
///
/// let master = Field::structure(
///     "",
///     vec![
///         Field::scalar("a", ScalarType::Int),
///         Field::scalar("b", ScalarType::Int),
///     ],
/// );
/// let request = parse_request("b,a,c").unwrap();
/// let copy = intersect(&master, request.root()).unwrap();
/// let names: Vec<_> = copy.children().iter().map(|f| f.name()).collect();
/// assert_eq!(names, ["b", "a"]);
/// ```
pub fn intersect(master: &Field, request: &RequestGroup) -> Option<Field> {
    if !request.has_subfields() {
        return Some(master.clone());
    }
    let fields: Vec<Field> = request
        .children
        .iter()
        .filter_map(|group| {
            let field = master.child(&group.name)?;
            if group.has_subfields() && matches!(field.kind(), FieldKind::Structure(_)) {
                intersect(field, group)
            } else {
                Some(field.clone())
            }
        })
        .collect();
    if fields.is_empty() {
        None
    } else {
        Some(Field::structure(master.name(), fields))
    }
}
