use super::column::ColumnType;
use super::naming;
use super::registry::metadata_for;
use super::Model;
use crate::core::{BoxError, OrmError, Result, Value, ValueType};
use crate::mapper::{Resolution, populate_column};
use std::collections::HashMap;

/// Storage role of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropRole {
    Column,
    Table(Relation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    HasOne,
    HasMany,
    BelongsTo,
}

/// Outcome of a column setter that could not take the value.
pub(crate) enum SetError {
    /// Value handed back by reconciliation.
    Mismatch(Value),
    Failed(BoxError),
}

type ColumnGetter<M> = Box<dyn Fn(&M) -> Value + Send + Sync>;
type ColumnSetter<M> = Box<dyn Fn(&mut M, Value) -> std::result::Result<(), SetError> + Send + Sync>;

/// Type-erased access to a related model slot on `M`.
pub(crate) trait RelationAccess<M>: Send + Sync {
    fn target_type(&self) -> &'static str;

    fn is_writable(&self) -> bool;

    /// Resolves `column` inside the related instance, creating and attaching
    /// the instance first when the slot is unset.
    fn resolve(&self, parent: &mut M, property: &str, column: &str, cell: &Value)
    -> Result<Resolution>;
}

struct RelationSlot<M, R> {
    get: fn(&mut M) -> Option<&mut R>,
    set: Option<fn(&mut M, R)>,
}

impl<M: Model, R: Model> RelationAccess<M> for RelationSlot<M, R> {
    fn target_type(&self) -> &'static str {
        naming::short_type_name(std::any::type_name::<R>())
    }

    fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    fn resolve(
        &self,
        parent: &mut M,
        property: &str,
        column: &str,
        cell: &Value,
    ) -> Result<Resolution> {
        let meta = metadata_for::<R>();

        if (self.get)(parent).is_none() {
            let Some(set) = self.set else {
                return Ok(Resolution::Skipped);
            };
            set(parent, meta.instantiate()?);
        }

        let nested = (self.get)(parent).ok_or_else(|| {
            OrmError::access(property, "relation getter returned nothing after the setter attached an instance")
        })?;
        populate_column(&meta, nested, column, cell)
    }
}

pub(crate) enum Accessors<M> {
    Column {
        kind: ValueType,
        nullable: bool,
        get: ColumnGetter<M>,
        set: Option<ColumnSetter<M>>,
    },
    Relation(Box<dyn RelationAccess<M>>),
}

/// Resolved binding of one property: names, role and accessor pair.
pub struct PropMapping<M> {
    name: String,
    target_name: String,
    role: PropRole,
    by_key: Option<String>,
    type_name: &'static str,
    pub(crate) access: Accessors<M>,
}

impl<M> PropMapping<M> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column name (for columns) or table name (for relations).
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn role(&self) -> PropRole {
        self.role
    }

    pub fn relation(&self) -> Option<Relation> {
        match self.role {
            PropRole::Table(relation) => Some(relation),
            PropRole::Column => None,
        }
    }

    /// Foreign-key column of a relation.
    pub fn by_key(&self) -> Option<&str> {
        self.by_key.as_deref()
    }

    /// Name of the declared property type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Read path for column properties.
    pub fn value_type(&self) -> Option<ValueType> {
        match &self.access {
            Accessors::Column { kind, .. } => Some(*kind),
            Accessors::Relation(_) => None,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match &self.access {
            Accessors::Column { nullable, .. } => *nullable,
            Accessors::Relation(_) => true,
        }
    }

    /// Properties without a setter are never populated.
    pub fn is_read_only(&self) -> bool {
        match &self.access {
            Accessors::Column { set, .. } => set.is_none(),
            Accessors::Relation(slot) => !slot.is_writable(),
        }
    }

    /// Reads a column property as a cell value.
    pub fn read(&self, model: &M) -> Option<Value> {
        match &self.access {
            Accessors::Column { get, .. } => Some(get(model)),
            Accessors::Relation(_) => None,
        }
    }

    /// Writes an already coerced value through the setter.
    pub fn write(&self, model: &mut M, value: Value) -> Result<Resolution> {
        let Accessors::Column { set, .. } = &self.access else {
            return Err(OrmError::TypeMismatch {
                property: self.name.clone(),
                expected: self.type_name,
                actual: value.type_name(),
            });
        };
        let Some(set) = set else {
            return Ok(Resolution::Skipped);
        };

        match set(model, value) {
            Ok(()) => Ok(Resolution::Applied),
            Err(SetError::Mismatch(rejected)) => Err(OrmError::TypeMismatch {
                property: self.name.clone(),
                expected: self.type_name,
                actual: rejected.type_name(),
            }),
            Err(SetError::Failed(cause)) => Err(OrmError::Access {
                property: self.name.clone(),
                source: cause,
            }),
        }
    }
}

/// Chained options for the property just registered.
pub struct PropOptions<'a, M> {
    prop: &'a mut PropMapping<M>,
}

impl<M> PropOptions<'_, M> {
    /// Explicit column or table name.
    pub fn named(self, target: &str) -> Self {
        self.prop.target_name = target.to_string();
        self
    }

    /// Foreign-key column; only meaningful on relations.
    pub fn by_key(self, key: &str) -> Self {
        self.prop.by_key = Some(key.to_string());
        self
    }
}

/// Builder handed to [`Model::describe`].
pub struct ModelDescriptor<M> {
    pub(crate) type_name: &'static str,
    pub(crate) table: Option<String>,
    pub(crate) constructor: Option<fn() -> M>,
    pub(crate) props: Vec<PropMapping<M>>,
}

impl<M: Model> ModelDescriptor<M> {
    pub(crate) fn new() -> Self {
        Self {
            type_name: naming::short_type_name(std::any::type_name::<M>()),
            table: None,
            constructor: None,
            props: Vec::new(),
        }
    }

    /// Zero-argument constructor used to instantiate rows and related models.
    pub fn constructor(&mut self, ctor: fn() -> M) -> &mut Self {
        self.constructor = Some(ctor);
        self
    }

    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(name.to_string());
        self
    }

    pub fn column<T: ColumnType>(
        &mut self,
        name: &str,
        get: fn(&M) -> &T,
        set: fn(&mut M, T),
    ) -> PropOptions<'_, M> {
        let setter: ColumnSetter<M> = Box::new(move |model, value| {
            let value = T::from_value(value).map_err(SetError::Mismatch)?;
            set(model, value);
            Ok(())
        });
        self.push_column::<T>(name, get, Some(setter))
    }

    /// Column whose setter may refuse a well-typed value.
    pub fn column_try<T: ColumnType>(
        &mut self,
        name: &str,
        get: fn(&M) -> &T,
        set: fn(&mut M, T) -> std::result::Result<(), BoxError>,
    ) -> PropOptions<'_, M> {
        let setter: ColumnSetter<M> = Box::new(move |model, value| {
            let value = T::from_value(value).map_err(SetError::Mismatch)?;
            set(model, value).map_err(SetError::Failed)
        });
        self.push_column::<T>(name, get, Some(setter))
    }

    /// Getter-only column, skipped during population.
    pub fn column_ro<T: ColumnType>(&mut self, name: &str, get: fn(&M) -> &T) -> PropOptions<'_, M> {
        self.push_column::<T>(name, get, None)
    }

    pub fn has_one<R: Model>(
        &mut self,
        name: &str,
        get: fn(&mut M) -> Option<&mut R>,
        set: fn(&mut M, R),
    ) -> PropOptions<'_, M> {
        self.relation(name, Relation::HasOne, get, Some(set))
    }

    pub fn belongs_to<R: Model>(
        &mut self,
        name: &str,
        get: fn(&mut M) -> Option<&mut R>,
        set: fn(&mut M, R),
    ) -> PropOptions<'_, M> {
        self.relation(name, Relation::BelongsTo, get, Some(set))
    }

    /// `get` exposes the element currently being filled (usually the last
    /// one), `set` appends a fresh element.
    pub fn has_many<R: Model>(
        &mut self,
        name: &str,
        get: fn(&mut M) -> Option<&mut R>,
        set: fn(&mut M, R),
    ) -> PropOptions<'_, M> {
        self.relation(name, Relation::HasMany, get, Some(set))
    }

    pub fn relation<R: Model>(
        &mut self,
        name: &str,
        relation: Relation,
        get: fn(&mut M) -> Option<&mut R>,
        set: Option<fn(&mut M, R)>,
    ) -> PropOptions<'_, M> {
        let slot: Box<dyn RelationAccess<M>> = Box::new(RelationSlot { get, set });
        let type_name = slot.target_type();
        self.push(PropMapping {
            name: name.to_string(),
            target_name: naming::type_to_table(type_name),
            role: PropRole::Table(relation),
            by_key: None,
            type_name,
            access: Accessors::Relation(slot),
        })
    }

    fn push_column<T: ColumnType>(
        &mut self,
        name: &str,
        get: fn(&M) -> &T,
        set: Option<ColumnSetter<M>>,
    ) -> PropOptions<'_, M> {
        let getter: ColumnGetter<M> = Box::new(move |model| get(model).to_value());
        self.push(PropMapping {
            name: name.to_string(),
            target_name: naming::property_to_column(name),
            role: PropRole::Column,
            by_key: None,
            type_name: T::type_name(),
            access: Accessors::Column {
                kind: T::KIND,
                nullable: T::NULLABLE,
                get: getter,
                set,
            },
        })
    }

    fn push(&mut self, prop: PropMapping<M>) -> PropOptions<'_, M> {
        if let Some(pos) = self.props.iter().position(|p| p.name == prop.name) {
            tracing::warn!(
                model = self.type_name,
                property = %prop.name,
                "property registered twice; keeping the last declaration"
            );
            self.props.remove(pos);
        }
        self.props.push(prop);
        let last = self.props.len() - 1;
        PropOptions {
            prop: &mut self.props[last],
        }
    }
}

/// Immutable metadata of one model type, built once by the registry.
pub struct ModelMeta<M> {
    type_name: &'static str,
    table: String,
    constructor: Option<fn() -> M>,
    order: Vec<String>,
    props: HashMap<String, PropMapping<M>>,
    by_target: HashMap<String, String>,
}

impl<M: Model> ModelMeta<M> {
    pub(crate) fn build() -> Self {
        let mut descriptor = ModelDescriptor::<M>::new();
        M::describe(&mut descriptor);
        Self::from_descriptor(descriptor)
    }

    fn from_descriptor(descriptor: ModelDescriptor<M>) -> Self {
        let ModelDescriptor {
            type_name,
            table,
            constructor,
            props,
        } = descriptor;

        let mut order = Vec::with_capacity(props.len());
        let mut by_target = HashMap::new();
        let mut map = HashMap::with_capacity(props.len());
        for prop in props {
            order.push(prop.name.clone());
            if prop.role == PropRole::Column {
                by_target.insert(prop.target_name.clone(), prop.name.clone());
            }
            map.insert(prop.name.clone(), prop);
        }

        Self {
            type_name,
            table: table.unwrap_or_else(|| naming::type_to_table(type_name)),
            constructor,
            order,
            props: map,
            by_target,
        }
    }

    /// Creates an empty instance through the registered constructor.
    pub fn instantiate(&self) -> Result<M> {
        self.constructor
            .map(|ctor| ctor())
            .ok_or(OrmError::Instantiation {
                type_name: self.type_name,
            })
    }
}

impl<M> ModelMeta<M> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn get(&self, property: &str) -> Option<&PropMapping<M>> {
        self.props.get(property)
    }

    pub fn contains(&self, property: &str) -> bool {
        self.props.contains_key(property)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &PropMapping<M>> {
        self.order.iter().filter_map(|name| self.props.get(name))
    }

    /// Finds the property bound to an external column name: a column's
    /// target name wins, otherwise the name is converted to property casing.
    pub fn lookup_column(&self, column: &str) -> Option<&PropMapping<M>> {
        if let Some(prop) = self.by_target.get(column).and_then(|p| self.props.get(p)) {
            return Some(prop);
        }
        self.props.get(&naming::column_to_property(column))
    }

    /// Outbound view of the column properties: `(column name, value)` pairs.
    pub fn column_values(&self, model: &M) -> Vec<(&str, Value)> {
        self.properties()
            .filter_map(|prop| prop.read(model).map(|v| (prop.target_name(), v)))
            .collect()
    }
}
