//! Engine boundary.
//!
//! The entity-component engine is consumed as an opaque service behind the
//! [`Engine`] trait; this crate never implements entity storage, query
//! planning, or script evaluation itself. Handles minted by the engine are
//! affine newtypes: the matching `release_*`/serialize call consumes them,
//! so a double release cannot be written at this layer. The bridge handles
//! on top add the host-facing disposed-state checks.

pub mod mock;

pub use mock::MockEngine;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An operation rejected by the wrapped engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// One member of a struct-type descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    /// Opaque id of the member's type.
    pub type_id: u64,
    /// Array length for fixed-size array members; 0 for plain members.
    pub count: i32,
}

/// One constant of an enum-type descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub name: String,
    pub value: i32,
}

/// Serialization switches for result-set snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotFlags {
    /// Include full table data per result.
    pub table: bool,
    /// Include builtin components.
    pub builtin: bool,
    /// Include inherited components.
    pub inherited: bool,
    /// Include per-result match metadata.
    pub matches: bool,
}

/// A query variable bound to an entity ahead of execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundVar {
    /// Variable index as reported by [`Engine::query_find_var`].
    pub index: i32,
    pub entity: u64,
}

/// Scope over which a native iterator is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterScope {
    /// The children of the given parent entity.
    ChildrenOf(u64),
}

/// One engine-native script variable.
///
/// Names are borrowed from the caller's staging arena; string values are
/// owned and transfer into the engine's variable storage with the call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptVar<'a> {
    pub name: &'a str,
    pub value: VarValue,
}

/// Value shapes accepted by the engine's script-variable mechanism.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Bool(bool),
    Float(f64),
    Str(String),
}

/// Opaque native iterator handle. Affine: releasing consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RawIterator(pub u64);

/// Opaque compiled-query handle. Affine: releasing consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RawQuery(pub u64);

/// Opaque parsed-script handle. Affine: releasing consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RawScript(pub u64);

/// Opaque materialized result set, consumed by serialization.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RawResultSet(pub u64);

/// Entry points of the wrapped entity-component engine.
///
/// Implementations are single-writer: the bridge serializes access through
/// one shared cell and never calls in concurrently.
pub trait Engine {
    /// Registers a struct type over `members`. A `target` of 0 asks the
    /// engine to mint a fresh type entity. Returns the non-zero type id.
    fn register_struct_type(
        &mut self,
        target: u64,
        members: &[StructMember],
    ) -> Result<u64, EngineError>;

    /// Registers an enum type over `constants`.
    fn register_enum_type(
        &mut self,
        target: u64,
        constants: &[EnumConstant],
    ) -> Result<u64, EngineError>;

    /// Produces a fresh iterator over `scope`.
    fn create_iterator(&mut self, scope: IterScope) -> Result<RawIterator, EngineError>;

    /// Pulls the next batch of entity ids; `None` once exhausted.
    fn iterator_advance(&mut self, iter: &RawIterator) -> Result<Option<Vec<u64>>, EngineError>;

    /// Releases a native iterator.
    fn iterator_release(&mut self, iter: RawIterator);

    /// Compiles a query expression.
    fn compile_query(&mut self, expr: &str) -> Result<RawQuery, EngineError>;

    /// Runs the query with the given bindings, materializing the full result
    /// set. Every call produces a fresh cursor.
    fn query_execute(
        &mut self,
        query: &RawQuery,
        vars: &[BoundVar],
    ) -> Result<RawResultSet, EngineError>;

    /// Serializes a materialized result set to JSON text, consuming it.
    fn serialize_result_set(
        &mut self,
        results: RawResultSet,
        flags: &SnapshotFlags,
    ) -> Result<String, EngineError>;

    /// Textual form of the compiled query.
    fn query_str(&mut self, query: &RawQuery) -> String;

    /// Textual execution plan.
    fn query_plan(&mut self, query: &RawQuery) -> String;

    /// Index of a declared query variable, if the query declares it.
    fn query_find_var(&mut self, query: &RawQuery, name: &str) -> Option<i32>;

    /// Name of the variable at `index`.
    fn query_var_name(&mut self, query: &RawQuery, index: i32) -> Option<String>;

    /// Whether the variable at `index` binds an entity.
    fn query_var_is_entity(&mut self, query: &RawQuery, index: i32) -> bool;

    /// Parses a textual argument expression against the query and returns
    /// the resulting bound, materialized result set.
    fn query_args_parse(
        &mut self,
        query: &RawQuery,
        expr: &str,
    ) -> Result<RawResultSet, EngineError>;

    /// Releases a compiled query.
    fn release_query(&mut self, query: RawQuery);

    /// Parses a named script.
    fn parse_script(&mut self, name: &str, source: &str) -> Result<RawScript, EngineError>;

    /// Evaluates a parsed script against `vars`. Returns the engine status
    /// code; 0 is success.
    fn evaluate_script(&mut self, script: &RawScript, vars: &[ScriptVar<'_>]) -> i32;

    /// Releases a parsed script.
    fn release_script(&mut self, script: RawScript);

    /// Resolves an entity by name/path.
    fn lookup_entity_by_name(&mut self, name: &str) -> Option<u64>;

    /// Ids of the types attached to `entity`.
    fn entity_type_ids(&mut self, entity: u64) -> Vec<u64>;

    /// JSON snapshot of one entity.
    fn entity_to_json(&mut self, entity: u64) -> Result<String, EngineError>;

    /// JSON snapshot of the whole world.
    fn world_to_json(&mut self) -> Result<String, EngineError>;

    /// The engine's builtin primitive types, as `(name, type id)` pairs.
    fn primitive_type_ids(&mut self) -> Vec<(&'static str, u64)>;
}
