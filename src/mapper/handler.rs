use super::Resolution;
use super::coerce::coerce;
use crate::core::{OrmError, Result, Value};
use crate::model::descriptor::Accessors;
use crate::model::{Model, ModelMeta, metadata_for};
use crate::result::ResultSet;
use std::marker::PhantomData;

const RELATION_DELIMITER: char = '.';
const NULL: Value = Value::Null;

/// Turns a whole result set into some output.
pub trait ResultHandler {
    type Output;

    fn handle(&self, rs: &ResultSet) -> Result<Self::Output>;
}

/// Maps every row of a result set onto a fresh `M`, in row order.
pub struct ResultMapper<M> {
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ResultMapper<M> {
    pub fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }

    pub fn map(&self, rs: &ResultSet) -> Result<Vec<M>> {
        let meta = metadata_for::<M>();
        let columns = rs.column_names();

        let mut results = Vec::with_capacity(rs.row_count());
        for row in &rs.rows {
            let mut bean = meta.instantiate()?;
            for (pos, column) in columns.iter().enumerate() {
                let cell = row.get(pos).unwrap_or(&NULL);
                populate_column(&meta, &mut bean, column, cell)?;
            }
            results.push(bean);
        }
        Ok(results)
    }
}

impl<M: Model> Default for ResultMapper<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> ResultHandler for ResultMapper<M> {
    type Output = Vec<M>;

    fn handle(&self, rs: &ResultSet) -> Result<Vec<M>> {
        self.map(rs)
    }
}

/// Maps only the first row, if any.
pub struct FirstRow<M> {
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> FirstRow<M> {
    pub fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }
}

impl<M: Model> Default for FirstRow<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> ResultHandler for FirstRow<M> {
    type Output = Option<M>;

    fn handle(&self, rs: &ResultSet) -> Result<Option<M>> {
        let Some(first) = rs.rows.first() else {
            return Ok(None);
        };
        let head = ResultSet::new(rs.columns.clone(), vec![first.clone()]);
        Ok(ResultMapper::<M>::new().map(&head)?.pop())
    }
}

/// Shorthand for `ResultMapper::<M>::new().map(rs)`.
pub fn map_rows<M: Model>(rs: &ResultSet) -> Result<Vec<M>> {
    ResultMapper::<M>::new().map(rs)
}

/// Resolves one column of the current row against `bean`.
///
/// `relation.rest` descends into the related instance named by `relation`
/// and resolves `rest` there, recursively for deeper paths.
pub(crate) fn populate_column<M: Model>(
    meta: &ModelMeta<M>,
    bean: &mut M,
    column: &str,
    cell: &Value,
) -> Result<Resolution> {
    if let Some((head, rest)) = column.split_once(RELATION_DELIMITER) {
        return match meta.lookup_column(head).map(|prop| (prop.name(), &prop.access)) {
            Some((name, Accessors::Relation(slot))) => slot.resolve(bean, name, rest, cell),
            _ => {
                tracing::trace!(model = meta.type_name(), column, "no relation for dotted column");
                Ok(Resolution::Skipped)
            }
        };
    }

    let Some(prop) = meta.lookup_column(column) else {
        tracing::trace!(model = meta.type_name(), column, "unmapped column");
        return Ok(Resolution::Skipped);
    };

    match &prop.access {
        Accessors::Column { kind, nullable, .. } => {
            let value = coerce(cell, *kind, *nullable);
            prop.write(bean, value)
        }
        Accessors::Relation(_) if cell.is_null() => Ok(Resolution::Skipped),
        Accessors::Relation(_) => Err(OrmError::TypeMismatch {
            property: prop.name().to_string(),
            expected: prop.type_name(),
            actual: cell.type_name(),
        }),
    }
}
