//! World facade.
//!
//! A [`World`] owns the shared engine cell and is the single place bridge
//! handles are minted from. Handles keep the engine alive through their own
//! `Arc`, so a `World` may be dropped while iterators, queries and scripts
//! from it are still in flight.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::bridge::{EntityIter, Query, Script};
use crate::config::BridgeConfig;
use crate::descriptor;
use crate::engine::{Engine, IterScope};
use crate::error::BridgeResult;
use crate::value::HostValue;

/// Host-facing entry point over one engine instance.
#[derive(Debug)]
pub struct World<E: Engine> {
    engine: Arc<Mutex<E>>,
    config: BridgeConfig,
}

impl<E: Engine> World<E> {
    /// Wraps an engine with the default configuration.
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, BridgeConfig::default())
    }

    /// Wraps an engine with an explicit configuration.
    pub fn with_config(engine: E, config: BridgeConfig) -> Self {
        debug!(
            target: "bridge",
            arena_min_block = config.arena.min_block,
            "world created"
        );
        Self {
            engine: Arc::new(Mutex::new(engine)),
            config,
        }
    }

    /// Registers a struct or enum type from a host descriptor object and
    /// returns the engine's type id.
    pub fn create_type(&self, target: u64, desc: &HostValue) -> BridgeResult<u64> {
        let mut engine = self.engine.lock().unwrap();
        descriptor::create_type(&mut *engine, target, desc)
    }

    /// Opens an iterator over the children of `parent`.
    pub fn children(&self, parent: u64) -> BridgeResult<EntityIter<E>> {
        EntityIter::create(self.engine.clone(), IterScope::ChildrenOf(parent))
    }

    /// Compiles a query expression.
    pub fn query(&self, expr: &str) -> BridgeResult<Query<E>> {
        Query::compile(
            self.engine.clone(),
            expr,
            self.config.query.snapshot_flags(),
        )
    }

    /// Parses a named script.
    pub fn parse(&self, name: &str, source: &str) -> BridgeResult<Script<E>> {
        Script::parse(
            self.engine.clone(),
            name,
            source,
            self.config.arena.min_block,
        )
    }

    /// Resolves an entity by name or path.
    pub fn lookup(&self, path: &str) -> Option<u64> {
        self.engine.lock().unwrap().lookup_entity_by_name(path)
    }

    /// Ids of the types attached to `entity`.
    pub fn entity_type(&self, entity: u64) -> Vec<u64> {
        self.engine.lock().unwrap().entity_type_ids(entity)
    }

    /// JSON snapshot of one entity.
    pub fn entity_to_json(&self, entity: u64) -> BridgeResult<String> {
        Ok(self.engine.lock().unwrap().entity_to_json(entity)?)
    }

    /// JSON snapshot of the whole world.
    pub fn to_json(&self) -> BridgeResult<String> {
        Ok(self.engine.lock().unwrap().world_to_json()?)
    }

    /// The engine's builtin primitive types as a name-to-id object.
    pub fn primitive_types(&self) -> HostValue {
        let ids = self.engine.lock().unwrap().primitive_type_ids();
        HostValue::object(ids.into_iter().map(|(name, id)| (name, HostValue::Id(id))))
    }

    /// Shared handle to the underlying engine.
    ///
    /// Callers must not hold the lock while dropping bridge handles; a
    /// handle's release path takes the same lock.
    pub fn engine(&self) -> Arc<Mutex<E>> {
        self.engine.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::IterStep;
    use crate::engine::MockEngine;

    #[test]
    fn test_create_type_registers_against_engine() {
        let world = World::new(MockEngine::new());
        let desc = HostValue::object([
            ("type", HostValue::from("struct")),
            (
                "members",
                HostValue::array([HostValue::object([
                    ("name", HostValue::from("x")),
                    ("type", HostValue::Id(114)),
                ])]),
            ),
        ]);
        let type_id = world.create_type(0, &desc).unwrap();
        assert_ne!(type_id, 0);

        let engine = world.engine();
        let engine = engine.lock().unwrap();
        assert_eq!(engine.registered.len(), 1);
    }

    #[test]
    fn test_children_iterates_scope() {
        let mut engine = MockEngine::new();
        let parent = engine.add_entity("parent");
        let a = engine.add_child(parent, "a");
        let b = engine.add_child(parent, "b");
        let world = World::new(engine);

        let mut iter = world.children(parent).unwrap();
        assert_eq!(iter.next().unwrap(), IterStep::Batch(vec![a, b]));
        assert_eq!(iter.next().unwrap(), IterStep::Done);
        iter.done().unwrap();
    }

    #[test]
    fn test_query_uses_configured_default_flags() {
        let mut config = BridgeConfig::default();
        config.query.matches = true;
        let world = World::with_config(MockEngine::new(), config);

        let query = world.query("Position").unwrap();
        let snapshot: serde_json::Value =
            serde_json::from_str(&query.exec(None).unwrap()).unwrap();
        assert_eq!(snapshot["flags"]["matches"], true);
        assert_eq!(snapshot["flags"]["table"], false);
    }

    #[test]
    fn test_script_parse_and_eval() {
        let world = World::new(MockEngine::new());
        let script = world.parse("demo.ecs", "box { speed: $speed }").unwrap();
        let vars = HostValue::object([("speed", HostValue::from(4.0))]);
        script.eval(Some(&vars)).unwrap();
    }

    #[test]
    fn test_lookup_and_entity_introspection() {
        let mut engine = MockEngine::new();
        let root = engine.add_entity("root");
        engine.attach_type(root, 114);
        let world = World::new(engine);

        assert_eq!(world.lookup("root"), Some(root));
        assert_eq!(world.lookup("ghost"), None);
        assert_eq!(world.entity_type(root), vec![114]);
        assert!(world.entity_to_json(root).unwrap().contains("\"root\""));
        assert!(world.to_json().unwrap().contains("\"entity_count\":1"));
    }

    #[test]
    fn test_primitive_types_exposes_builtin_table() {
        let world = World::new(MockEngine::new());
        let table = world.primitive_types();
        assert!(matches!(table.get("f64"), Some(HostValue::Id(_))));
        assert!(matches!(table.get("entity"), Some(HostValue::Id(_))));
        assert_eq!(table.as_object().map(|o| o.len()), Some(18));
    }

    #[test]
    fn test_engine_handle_shares_state() {
        let world = World::new(MockEngine::new());
        let fresh = world.engine().lock().unwrap().add_entity("late");
        assert_eq!(world.lookup("late"), Some(fresh));
    }
}
