// ============================================================================
// Topaz Library
// ============================================================================
//
// Data layer of a small server-side MVC core:
// - model:       per-type property descriptors and their registry
// - mapper:      result-set to model mapping with dotted-column relations
// - connection:  connection trait, pool, SQLite driver
// - transaction: per-request sessions with nested-transaction flattening
// - web:         request context and interceptor dispatch
//
// ============================================================================

extern crate self as topaz;

pub mod core;
pub mod result;
pub mod model;
pub mod mapper;
pub mod connection;
pub mod transaction;
pub mod web;

pub use crate::core::{BoxError, ColumnMeta, OrmError, Result, Row, Value, ValueType};
pub use result::ResultSet;

pub use model::{ColumnType, Model, ModelDescriptor, ModelMeta, PropMapping, PropRole, Relation, metadata_for};
pub use topaz_derive::Model;

pub use mapper::{FirstRow, ResultHandler, ResultMapper, coerce, map_rows};

pub use connection::{
    Connection, ConnectionFactory,
    config::ConnectionConfig,
    pool::{ConnectionPool, PoolGuard, PoolStats},
    sqlite::{SqliteConnection, SqliteFactory},
};

pub use transaction::{DaoManager, ScopeState, Session};

pub use web::{
    Accept, Action, Controller, FinalInterceptor, Interceptor, InterceptorChain, WebContext,
    WebError,
};
