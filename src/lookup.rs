//! Schema lookup by key path.
//!
//! Given a schema and a path like `["database", "port"]`, find the
//! sub-schema responsible for the value at that path. Optional, nullable
//! and default wrappers are looked through; intersections are searched left
//! operand first. Lookup never fails loudly: an unknown path yields `None`
//! and a debug log line.

use tracing::debug;

use crate::schema::Schema;

/// Resolve the sub-schema for `path` within `schema`.
///
/// Returns `None` when no schema is given, when a segment names a field the
/// object does not declare, or when the path continues past a non-object
/// schema. An empty path returns the (unwrapped) schema itself.
pub fn resolve_type<'a, S: AsRef<str>>(
    path: &[S],
    schema: Option<&'a Schema>,
) -> Option<&'a Schema> {
    resolve_in(path, schema?)
}

fn resolve_in<'a, S: AsRef<str>>(path: &[S], schema: &'a Schema) -> Option<&'a Schema> {
    let current = schema.unwrapped();

    if let Schema::Intersection(left, right) = current {
        return resolve_in(path, left).or_else(|| resolve_in(path, right));
    }

    let Some((head, rest)) = path.split_first() else {
        return Some(current);
    };
    let head = head.as_ref();

    match current {
        Schema::Object { fields, .. } => match fields.get(head) {
            Some(field) => resolve_in(rest, field),
            None => {
                debug!(field = head, "no type definition for field in object schema");
                None
            }
        },
        other => {
            debug!(
                path = %join(path),
                kind = %other.kind_name(),
                "no type definition for path"
            );
            None
        }
    }
}

fn join<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(".")
}
