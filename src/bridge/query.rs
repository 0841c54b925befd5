//! Query bridge.
//!
//! Wraps a compiled query. Execution materializes the full result set and
//! returns it as one JSON snapshot; the bridge never keeps a lazy cursor at
//! this layer, so a snapshot stays valid however the host schedules its
//! parsing. Introspection calls are pass-throughs with type conversion only.

use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use crate::engine::{BoundVar, Engine, RawQuery, SnapshotFlags};
use crate::error::{BridgeError, BridgeResult};
use crate::value::{expect_bool, expect_id, DecodeError, HostValue};

use super::Disposable;

/// Host-visible handle over a compiled query.
///
/// Queries are restartable: [`Query::exec`] can run any number of times
/// while the handle is live, each call executing a fresh cursor and
/// producing an independent snapshot.
#[derive(Debug)]
pub struct Query<E: Engine> {
    engine: Arc<Mutex<E>>,
    raw: Option<RawQuery>,
    default_flags: SnapshotFlags,
}

impl<E: Engine> Query<E> {
    pub(crate) fn compile(
        engine: Arc<Mutex<E>>,
        expr: &str,
        default_flags: SnapshotFlags,
    ) -> BridgeResult<Self> {
        let raw = engine
            .lock()
            .unwrap()
            .compile_query(expr)
            .map_err(BridgeError::QueryFailed)?;
        debug!(target: "bridge::query", expr, "query compiled");
        Ok(Self {
            engine,
            raw: Some(raw),
            default_flags,
        })
    }

    fn raw(&self) -> BridgeResult<&RawQuery> {
        self.raw
            .as_ref()
            .ok_or(BridgeError::Disposed { handle: "query" })
    }

    /// Executes the query and returns a JSON snapshot of the full result
    /// set.
    ///
    /// `options`, when present, must be an object and may carry:
    /// - `variables`: object mapping a declared variable name to an entity
    ///   reference, given as a name string, an id, or an object with a
    ///   `native` id field. Names the query does not declare are skipped, as
    ///   are names whose entity lookup finds nothing; a reference of the
    ///   wrong shape is a decode error.
    /// - `table`, `builtin`, `inherited`, `matches`: boolean snapshot
    ///   switches. Unknown keys are ignored.
    pub fn exec(&self, options: Option<&HostValue>) -> BridgeResult<String> {
        let raw = self.raw()?;
        let mut engine = self.engine.lock().unwrap();
        let (bound, flags) = parse_options(&mut *engine, raw, options, self.default_flags)?;
        let results = engine.query_execute(raw, &bound)?;
        let text = engine.serialize_result_set(results, &flags)?;
        trace!(target: "bridge::query", bytes = text.len(), "query executed");
        Ok(text)
    }

    /// Textual form of the compiled query.
    pub fn to_query_string(&self) -> BridgeResult<String> {
        let raw = self.raw()?;
        Ok(self.engine.lock().unwrap().query_str(raw))
    }

    /// Textual execution plan.
    pub fn plan(&self) -> BridgeResult<String> {
        let raw = self.raw()?;
        Ok(self.engine.lock().unwrap().query_plan(raw))
    }

    /// Index of a declared variable, or `None` if the query does not declare
    /// it. An empty name is an invocation error.
    pub fn find_var(&self, name: &str) -> BridgeResult<Option<i32>> {
        if name.is_empty() {
            return Err(BridgeError::Invocation("invalid name".into()));
        }
        let raw = self.raw()?;
        Ok(self.engine.lock().unwrap().query_find_var(raw, name))
    }

    /// Name of the variable at `index`.
    pub fn var_name(&self, index: i32) -> BridgeResult<String> {
        let raw = self.raw()?;
        self.engine
            .lock()
            .unwrap()
            .query_var_name(raw, index)
            .ok_or_else(|| BridgeError::Invocation(format!("invalid variable index {index}")))
    }

    /// Whether the variable at `index` binds an entity.
    pub fn var_is_entity(&self, index: i32) -> BridgeResult<bool> {
        let raw = self.raw()?;
        Ok(self.engine.lock().unwrap().query_var_is_entity(raw, index))
    }

    /// Parses a textual argument expression, binds it against the query and
    /// returns the snapshot of the resulting iterator. An empty expression
    /// is an invocation error.
    pub fn args_parse(&self, expr: &str) -> BridgeResult<String> {
        if expr.is_empty() {
            return Err(BridgeError::Invocation("invalid expr".into()));
        }
        let raw = self.raw()?;
        let mut engine = self.engine.lock().unwrap();
        let results = engine.query_args_parse(raw, expr)?;
        let text = engine.serialize_result_set(results, &self.default_flags)?;
        Ok(text)
    }

    /// Releases the compiled query. Idempotent.
    pub fn dispose(&mut self) -> BridgeResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Ok(mut engine) = self.engine.lock() {
                engine.release_query(raw);
                trace!(target: "bridge::query", "query released");
            }
        }
    }
}

fn parse_options<E: Engine>(
    engine: &mut E,
    raw: &RawQuery,
    options: Option<&HostValue>,
    default_flags: SnapshotFlags,
) -> BridgeResult<(Vec<BoundVar>, SnapshotFlags)> {
    let Some(options) = options else {
        return Ok((Vec::new(), default_flags));
    };
    if options.as_object().is_none() {
        return Err(BridgeError::Invocation(format!(
            "query options must be an object, got {}",
            options.type_name()
        )));
    }

    let mut flags = default_flags;
    if let Some(value) = options.get("table") {
        flags.table = expect_bool(value, "table")?;
    }
    if let Some(value) = options.get("builtin") {
        flags.builtin = expect_bool(value, "builtin")?;
    }
    if let Some(value) = options.get("inherited") {
        flags.inherited = expect_bool(value, "inherited")?;
    }
    if let Some(value) = options.get("matches") {
        flags.matches = expect_bool(value, "matches")?;
    }

    let mut bound = Vec::new();
    if let Some(variables) = options.get("variables") {
        let entries = variables.as_object().ok_or_else(|| {
            BridgeError::Invocation(format!(
                "query variables must be an object, got {}",
                variables.type_name()
            ))
        })?;
        for (name, reference) in entries {
            let Some(index) = engine.query_find_var(raw, name) else {
                warn!(target: "bridge::query", var = %name, "skipping undeclared query variable");
                continue;
            };
            let entity = match reference {
                HostValue::String(entity_name) => {
                    match engine.lookup_entity_by_name(entity_name) {
                        Some(id) => id,
                        None => {
                            warn!(
                                target: "bridge::query",
                                var = %name,
                                entity = %entity_name,
                                "skipping variable, entity not found"
                            );
                            continue;
                        }
                    }
                }
                HostValue::Id(id) => *id,
                HostValue::Object(_) => {
                    let native = reference.get("native").ok_or_else(|| {
                        BridgeError::Invocation(format!(
                            "variable `{name}` object requires a `native` id field"
                        ))
                    })?;
                    expect_id(native, "native")?
                }
                other => {
                    return Err(BridgeError::Decode(DecodeError::TypeMismatch {
                        field: name.clone(),
                        expected: "string, bigint or entity object",
                        actual: other.type_name(),
                    }))
                }
            };
            bound.push(BoundVar { index, entity });
        }
    }
    Ok((bound, flags))
}

impl<E: Engine> Disposable for Query<E> {
    fn dispose(&mut self) -> BridgeResult<()> {
        Query::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        self.raw.is_none()
    }
}

impl<E: Engine> Drop for Query<E> {
    fn drop(&mut self) {
        self.release();
    }
}
