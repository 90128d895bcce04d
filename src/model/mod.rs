//! Property metadata: per-model descriptors, column types and the registry.

pub mod column;
pub mod descriptor;
pub mod naming;
pub mod registry;

pub use column::ColumnType;
pub use descriptor::{ModelDescriptor, ModelMeta, PropMapping, PropOptions, PropRole, Relation};
pub use registry::metadata_for;

use std::sync::Arc;

/// A record type mapped to tabular storage.
///
/// Implementations register their properties explicitly (or through
/// `#[derive(Model)]`); the registry calls `describe` once per type.
///
/// ```
/// use topaz::{Model, ModelDescriptor};
///
/// #[derive(Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Model for Tag {
///     fn describe(model: &mut ModelDescriptor<Self>) {
///         model.constructor(Tag::default).table("tags");
///         model.column("id", |t| &t.id, |t, v| t.id = v);
///         model.column("label", |t| &t.label, |t, v| t.label = v).named("tag_label");
///     }
/// }
///
/// let meta = Tag::meta();
/// assert_eq!(meta.table_name(), "tags");
/// assert_eq!(meta.lookup_column("tag_label").map(|p| p.name()), Some("label"));
/// ```
pub trait Model: Sized + Send + 'static {
    fn describe(model: &mut ModelDescriptor<Self>);

    fn meta() -> Arc<ModelMeta<Self>> {
        metadata_for::<Self>()
    }
}
