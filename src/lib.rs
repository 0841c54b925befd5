//! # ECS Bridge
//!
//! A marshalling and resource-lifecycle bridge exposing an entity-component
//! engine to dynamic script hosts.
//!
//! ## Features
//!
//! - **Type descriptors**: struct and enum registration from plain host objects
//! - **Entity iteration**: batched child traversal with an explicit done sentinel
//! - **Queries**: restartable execution with variable binding and JSON snapshots
//! - **Scripts**: parse once, evaluate repeatedly against host variables
//! - **Deterministic disposal**: every native handle is released exactly once,
//!   whether through the host's dispose call or the handle's drop
//!
//! ## Architecture Design
//!
//! The crate ends at two seams: [`HostValue`] on the host side and the
//! [`Engine`] trait on the native side. Everything between is marshalling,
//! lifecycle tracking and error mapping; the bridge stores no entity data of
//! its own, and every operation is a synchronous pass through one shared
//! engine cell.
//!
//! ### Example
//!
//! ```
//! use ecs_bridge::{HostValue, MockEngine, World};
//!
//! let world = World::new(MockEngine::new());
//! let desc = HostValue::object([
//!     ("type", HostValue::from("struct")),
//!     ("members", HostValue::array([HostValue::object([
//!         ("name", HostValue::from("x")),
//!         ("type", HostValue::Id(114)),
//!     ])])),
//! ]);
//! let type_id = world.create_type(0, &desc)?;
//! assert_ne!(type_id, 0);
//! # Ok::<(), ecs_bridge::BridgeError>(())
//! ```
//!
//! ## Modules
//!
//! - [`world`]: host-facing facade over one engine instance
//! - [`bridge`]: iterator, query and script handles
//! - [`descriptor`]: struct and enum type registration
//! - [`value`]: dynamic host values and field decoding
//! - [`arena`]: staging arena for call-scoped native text
//! - [`engine`]: the engine boundary and the in-memory reference engine
//! - [`config`]: TOML and environment configuration
//! - [`error`]: unified error type

/// Host-facing facade over one engine instance
pub mod world;
/// Iterator, query and script bridge handles
pub mod bridge;
/// Struct and enum type registration from host descriptors
pub mod descriptor;
/// Dynamic host values and field decoding
pub mod value;
/// Staging arena for call-scoped native text
pub mod arena;
/// Engine boundary trait and the in-memory reference engine
pub mod engine;
/// Configuration system
pub mod config;
/// Unified error handling
pub mod error;

pub use bridge::{Disposable, EntityIter, IterStep, Query, Script};
pub use config::BridgeConfig;
pub use engine::{Engine, MockEngine};
pub use error::{BridgeError, BridgeResult};
pub use value::HostValue;
pub use world::World;
