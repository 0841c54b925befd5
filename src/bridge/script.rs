//! Script bridge.
//!
//! Wraps a parsed engine script. Evaluation accepts an optional object of
//! host variables; variable names are staged in a per-call arena so the
//! engine reads stable text for the duration of the call, and the arena is
//! finalized as one unit on every exit path.

use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::arena::Arena;
use crate::engine::{Engine, RawScript, ScriptVar, VarValue};
use crate::error::{BridgeError, BridgeResult};
use crate::value::{decode_field, DecodedField, HostValue};

use super::Disposable;

/// Script name used when the host does not supply one.
pub const DEFAULT_SCRIPT_NAME: &str = "<input>";

/// Host-visible handle over a parsed script.
#[derive(Debug)]
pub struct Script<E: Engine> {
    engine: Arc<Mutex<E>>,
    raw: Option<RawScript>,
    arena_min_block: usize,
}

impl<E: Engine> Script<E> {
    pub(crate) fn parse(
        engine: Arc<Mutex<E>>,
        name: &str,
        source: &str,
        arena_min_block: usize,
    ) -> BridgeResult<Self> {
        let raw = engine
            .lock()
            .unwrap()
            .parse_script(name, source)
            .map_err(BridgeError::ParseFailed)?;
        debug!(target: "bridge::script", name, "script parsed");
        Ok(Self {
            engine,
            raw: Some(raw),
            arena_min_block,
        })
    }

    /// Evaluates the script, optionally binding host variables first.
    ///
    /// `vars`, when present, must be an object. Boolean, number and string
    /// entries become engine variables; entries of any other shape are
    /// skipped without failing the call. A non-zero engine status is
    /// reported as an evaluation error.
    pub fn eval(&self, vars: Option<&HostValue>) -> BridgeResult<()> {
        let raw = self
            .raw
            .as_ref()
            .ok_or(BridgeError::Disposed { handle: "script" })?;

        let mut arena = Arena::with_min_block(self.arena_min_block);
        let mut staged = Vec::new();
        if let Some(vars) = vars {
            let entries = vars.as_object().ok_or_else(|| {
                BridgeError::Invocation(format!(
                    "script variables must be an object, got {}",
                    vars.type_name()
                ))
            })?;
            for (name, value) in entries {
                let value = match decode_field(value) {
                    DecodedField::Bool(b) => VarValue::Bool(b),
                    DecodedField::Float64(f) => VarValue::Float(f),
                    DecodedField::String(s) => VarValue::Str(s),
                    DecodedField::OpaqueId(_) | DecodedField::Unsupported => {
                        trace!(
                            target: "bridge::script",
                            var = %name,
                            "skipping unsupported script variable"
                        );
                        continue;
                    }
                };
                staged.push((arena.push_str(name), value));
            }
        }

        // staging is done, from here the arena is only read
        let native_vars: Vec<ScriptVar<'_>> = staged
            .into_iter()
            .map(|(span, value)| ScriptVar {
                name: arena.get_str(span),
                value,
            })
            .collect();
        let status = self.engine.lock().unwrap().evaluate_script(raw, &native_vars);
        drop(native_vars);
        arena.finalize();

        if status != 0 {
            return Err(BridgeError::EvalFailed { status });
        }
        trace!(target: "bridge::script", "script evaluated");
        Ok(())
    }

    /// Releases the parsed script. Idempotent.
    pub fn dispose(&mut self) -> BridgeResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Ok(mut engine) = self.engine.lock() {
                engine.release_script(raw);
                trace!(target: "bridge::script", "script released");
            }
        }
    }
}

impl<E: Engine> Disposable for Script<E> {
    fn dispose(&mut self) -> BridgeResult<()> {
        Script::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        self.raw.is_none()
    }
}

impl<E: Engine> Drop for Script<E> {
    fn drop(&mut self) {
        self.release();
    }
}
