//! In-memory reference engine.
//!
//! A deterministic [`Engine`] implementation backing the test suite and the
//! documentation examples. It models just enough world state for the bridge
//! semantics to be observable: named entities with child sets, `$`-declared
//! query variables, script variable references, and full handle accounting
//! so tests can audit that every minted handle was released.

use std::collections::HashMap;

use serde_json::json;

use super::{
    BoundVar, Engine, EngineError, EnumConstant, IterScope, RawIterator, RawQuery, RawResultSet,
    RawScript, ScriptVar, SnapshotFlags, StructMember, VarValue,
};

/// Builtin primitive type names, in registration order.
const PRIMITIVES: &[&str] = &[
    "bool", "char", "byte", "u8", "u16", "u32", "u64", "uptr", "i8", "i16", "i32", "i64", "iptr",
    "f32", "f64", "string", "entity", "id",
];

const PRIMITIVE_ID_BASE: u64 = 100;

/// One registration the engine accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisteredType {
    Struct {
        target: u64,
        type_id: u64,
        members: Vec<StructMember>,
    },
    Enum {
        target: u64,
        type_id: u64,
        constants: Vec<EnumConstant>,
    },
}

#[derive(Debug)]
struct IterState {
    remaining: Vec<u64>,
    batch: usize,
}

#[derive(Debug)]
struct QueryState {
    expr: String,
    vars: Vec<String>,
}

#[derive(Debug)]
struct ScriptState {
    source: String,
}

#[derive(Debug)]
struct ResultSetState {
    expr: String,
    bound: Vec<(String, u64)>,
}

/// Deterministic in-memory engine with call and release accounting.
#[derive(Debug, Default)]
pub struct MockEngine {
    next_id: u64,
    entities: HashMap<String, u64>,
    children: HashMap<u64, Vec<u64>>,
    entity_types: HashMap<u64, Vec<u64>>,
    iterators: HashMap<u64, IterState>,
    queries: HashMap<u64, QueryState>,
    scripts: HashMap<u64, ScriptState>,
    result_sets: HashMap<u64, ResultSetState>,

    /// Iterator batch size; 0 yields each scope as one batch.
    pub batch_size: usize,

    /// Every type registration the engine accepted, in order.
    pub registered: Vec<RegisteredType>,
    pub struct_calls: u32,
    pub enum_calls: u32,
    pub iterators_created: u32,
    pub iterators_released: u32,
    pub queries_created: u32,
    pub queries_released: u32,
    pub scripts_created: u32,
    pub scripts_released: u32,
    pub evaluations: u32,
    /// Variables handed to the most recent evaluation.
    pub last_eval_vars: Vec<(String, VarValue)>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            next_id: 1000,
            ..Default::default()
        }
    }

    fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Seeds a named entity and returns its id.
    pub fn add_entity(&mut self, name: &str) -> u64 {
        let id = self.mint();
        self.entities.insert(name.to_string(), id);
        id
    }

    /// Seeds a named child under `parent` and returns its id.
    pub fn add_child(&mut self, parent: u64, name: &str) -> u64 {
        let id = self.add_entity(name);
        self.children.entry(parent).or_default().push(id);
        id
    }

    /// Attaches a type id to an entity, visible through `entity_type_ids`.
    pub fn attach_type(&mut self, entity: u64, type_id: u64) {
        self.entity_types.entry(entity).or_default().push(type_id);
    }

    /// Native handles currently live, for leak audits.
    pub fn live_handles(&self) -> usize {
        self.iterators.len() + self.queries.len() + self.scripts.len() + self.result_sets.len()
    }

    fn snapshot(&self, rs: &ResultSetState, flags: &SnapshotFlags) -> String {
        let mut entities: Vec<(&String, &u64)> = self.entities.iter().collect();
        entities.sort_by_key(|(_, id)| **id);
        let results: Vec<serde_json::Value> = entities
            .iter()
            .map(|(name, id)| json!({ "name": name, "id": id }))
            .collect();
        let mut vars = serde_json::Map::new();
        for (name, entity) in &rs.bound {
            vars.insert(name.clone(), json!(entity));
        }
        json!({
            "expr": rs.expr,
            "vars": vars,
            "flags": flags,
            "results": results,
        })
        .to_string()
    }
}

/// Collects `$name` identifiers in order of first appearance.
fn dollar_idents(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        let tail = &rest[pos + 1..];
        let end = tail
            .char_indices()
            .find(|(_, c)| !c.is_alphanumeric() && *c != '_')
            .map(|(i, _)| i)
            .unwrap_or(tail.len());
        let name = &tail[..end];
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
        rest = &tail[end..];
    }
    out
}

fn balanced_braces(source: &str) -> bool {
    let mut depth = 0i32;
    for c in source.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

impl Engine for MockEngine {
    fn register_struct_type(
        &mut self,
        target: u64,
        members: &[StructMember],
    ) -> Result<u64, EngineError> {
        self.struct_calls += 1;
        if members.is_empty() {
            return Err(EngineError::new("struct type requires at least one member"));
        }
        if members.iter().any(|m| m.name.is_empty()) {
            return Err(EngineError::new("struct member name must not be empty"));
        }
        let type_id = if target != 0 { target } else { self.mint() };
        self.registered.push(RegisteredType::Struct {
            target,
            type_id,
            members: members.to_vec(),
        });
        Ok(type_id)
    }

    fn register_enum_type(
        &mut self,
        target: u64,
        constants: &[EnumConstant],
    ) -> Result<u64, EngineError> {
        self.enum_calls += 1;
        if constants.is_empty() {
            return Err(EngineError::new("enum type requires at least one constant"));
        }
        let type_id = if target != 0 { target } else { self.mint() };
        self.registered.push(RegisteredType::Enum {
            target,
            type_id,
            constants: constants.to_vec(),
        });
        Ok(type_id)
    }

    fn create_iterator(&mut self, scope: IterScope) -> Result<RawIterator, EngineError> {
        let remaining = match scope {
            IterScope::ChildrenOf(parent) => {
                self.children.get(&parent).cloned().unwrap_or_default()
            }
        };
        let batch = if self.batch_size == 0 {
            remaining.len().max(1)
        } else {
            self.batch_size
        };
        let token = self.mint();
        self.iterators.insert(token, IterState { remaining, batch });
        self.iterators_created += 1;
        Ok(RawIterator(token))
    }

    fn iterator_advance(&mut self, iter: &RawIterator) -> Result<Option<Vec<u64>>, EngineError> {
        let state = self
            .iterators
            .get_mut(&iter.0)
            .ok_or_else(|| EngineError::new("unknown iterator handle"))?;
        if state.remaining.is_empty() {
            return Ok(None);
        }
        let take = state.batch.min(state.remaining.len());
        let batch: Vec<u64> = state.remaining.drain(..take).collect();
        Ok(Some(batch))
    }

    fn iterator_release(&mut self, iter: RawIterator) {
        if self.iterators.remove(&iter.0).is_some() {
            self.iterators_released += 1;
        }
    }

    fn compile_query(&mut self, expr: &str) -> Result<RawQuery, EngineError> {
        if expr.trim().is_empty() {
            return Err(EngineError::new("empty query expression"));
        }
        let open = expr.chars().filter(|c| *c == '(').count();
        let close = expr.chars().filter(|c| *c == ')').count();
        if open != close {
            return Err(EngineError::new(format!(
                "query parse error: unbalanced parentheses in `{expr}`"
            )));
        }
        let token = self.mint();
        self.queries.insert(
            token,
            QueryState {
                expr: expr.to_string(),
                vars: dollar_idents(expr),
            },
        );
        self.queries_created += 1;
        Ok(RawQuery(token))
    }

    fn query_execute(
        &mut self,
        query: &RawQuery,
        vars: &[BoundVar],
    ) -> Result<RawResultSet, EngineError> {
        let state = self
            .queries
            .get(&query.0)
            .ok_or_else(|| EngineError::new("unknown query handle"))?;
        let mut bound = Vec::with_capacity(vars.len());
        for var in vars {
            let name = state
                .vars
                .get(var.index as usize)
                .ok_or_else(|| EngineError::new("invalid variable index"))?;
            bound.push((name.clone(), var.entity));
        }
        let expr = state.expr.clone();
        let token = self.mint();
        self.result_sets.insert(token, ResultSetState { expr, bound });
        Ok(RawResultSet(token))
    }

    fn serialize_result_set(
        &mut self,
        results: RawResultSet,
        flags: &SnapshotFlags,
    ) -> Result<String, EngineError> {
        let state = self
            .result_sets
            .remove(&results.0)
            .ok_or_else(|| EngineError::new("unknown result set"))?;
        Ok(self.snapshot(&state, flags))
    }

    fn query_str(&mut self, query: &RawQuery) -> String {
        self.queries
            .get(&query.0)
            .map(|q| q.expr.clone())
            .unwrap_or_default()
    }

    fn query_plan(&mut self, query: &RawQuery) -> String {
        self.queries
            .get(&query.0)
            .map(|q| format!("0. setids\n1. scan {}\n2. yield", q.expr))
            .unwrap_or_default()
    }

    fn query_find_var(&mut self, query: &RawQuery, name: &str) -> Option<i32> {
        self.queries
            .get(&query.0)?
            .vars
            .iter()
            .position(|v| v == name)
            .map(|i| i as i32)
    }

    fn query_var_name(&mut self, query: &RawQuery, index: i32) -> Option<String> {
        if index < 0 {
            return None;
        }
        self.queries
            .get(&query.0)?
            .vars
            .get(index as usize)
            .cloned()
    }

    fn query_var_is_entity(&mut self, query: &RawQuery, index: i32) -> bool {
        // the table source variable is the one non-entity var
        match self.query_var_name(query, index) {
            Some(name) => name != "this",
            None => false,
        }
    }

    fn query_args_parse(
        &mut self,
        query: &RawQuery,
        expr: &str,
    ) -> Result<RawResultSet, EngineError> {
        let state = self
            .queries
            .get(&query.0)
            .ok_or_else(|| EngineError::new("unknown query handle"))?;
        let query_expr = state.expr.clone();
        let declared = state.vars.clone();
        let mut bound = Vec::new();
        for pair in expr.split(',').filter(|p| !p.trim().is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| EngineError::new(format!("malformed argument `{pair}`")))?;
            let name = name.trim().trim_start_matches('$');
            if !declared.iter().any(|v| v == name) {
                return Err(EngineError::new(format!("unknown variable `{name}`")));
            }
            let entity = self
                .entities
                .get(value.trim())
                .copied()
                .ok_or_else(|| EngineError::new(format!("unknown entity `{}`", value.trim())))?;
            bound.push((name.to_string(), entity));
        }
        let token = self.mint();
        self.result_sets.insert(
            token,
            ResultSetState {
                expr: query_expr,
                bound,
            },
        );
        Ok(RawResultSet(token))
    }

    fn release_query(&mut self, query: RawQuery) {
        if self.queries.remove(&query.0).is_some() {
            self.queries_released += 1;
        }
    }

    fn parse_script(&mut self, name: &str, source: &str) -> Result<RawScript, EngineError> {
        if !balanced_braces(source) {
            return Err(EngineError::new(format!(
                "script parse error in {name}: unbalanced braces"
            )));
        }
        let token = self.mint();
        self.scripts.insert(
            token,
            ScriptState {
                source: source.to_string(),
            },
        );
        self.scripts_created += 1;
        Ok(RawScript(token))
    }

    fn evaluate_script(&mut self, script: &RawScript, vars: &[ScriptVar<'_>]) -> i32 {
        self.evaluations += 1;
        self.last_eval_vars = vars
            .iter()
            .map(|v| (v.name.to_string(), v.value.clone()))
            .collect();
        let Some(state) = self.scripts.get(&script.0) else {
            return -1;
        };
        // a referenced $var with no binding fails evaluation
        for referenced in dollar_idents(&state.source) {
            if !vars.iter().any(|v| v.name == referenced) {
                return 1;
            }
        }
        0
    }

    fn release_script(&mut self, script: RawScript) {
        if self.scripts.remove(&script.0).is_some() {
            self.scripts_released += 1;
        }
    }

    fn lookup_entity_by_name(&mut self, name: &str) -> Option<u64> {
        self.entities.get(name).copied()
    }

    fn entity_type_ids(&mut self, entity: u64) -> Vec<u64> {
        self.entity_types.get(&entity).cloned().unwrap_or_default()
    }

    fn entity_to_json(&mut self, entity: u64) -> Result<String, EngineError> {
        let name = self
            .entities
            .iter()
            .find(|(_, id)| **id == entity)
            .map(|(name, _)| name.clone());
        Ok(json!({
            "id": entity,
            "name": name,
            "type": self.entity_type_ids(entity),
        })
        .to_string())
    }

    fn world_to_json(&mut self) -> Result<String, EngineError> {
        let mut entities: Vec<(&String, &u64)> = self.entities.iter().collect();
        entities.sort_by_key(|(_, id)| **id);
        let listed: Vec<serde_json::Value> = entities
            .iter()
            .map(|(name, id)| json!({ "name": name, "id": id }))
            .collect();
        Ok(json!({
            "entity_count": self.entities.len(),
            "type_count": self.registered.len(),
            "entities": listed,
        })
        .to_string())
    }

    fn primitive_type_ids(&mut self) -> Vec<(&'static str, u64)> {
        PRIMITIVES
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, PRIMITIVE_ID_BASE + i as u64))
            .collect()
    }
}
