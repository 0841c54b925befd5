//! Struct and enum type descriptors.
//!
//! Turns dynamic descriptor objects into bounded typed records and registers
//! them with the engine. Decoding is all-or-nothing: the registration entry
//! point is called exactly once, only after every entry decoded, and all
//! name storage decoded along the way is dropped before returning whatever
//! the outcome.

use tracing::debug;

use crate::engine::{Engine, EngineError, EnumConstant, StructMember};
use crate::error::{BridgeError, BridgeResult};
use crate::value::{expect_i32, expect_id, expect_str, HostValue};

/// Fixed capacity of a type descriptor, in member/constant entries.
///
/// Longer inputs are rejected before any entry is processed. The bound is a
/// documented contract of the registration path, not an array-size accident,
/// and is deliberately kept as a validated error path.
pub const MAX_DESCRIPTOR_ENTRIES: usize = 32;

/// Registers the struct or enum type described by `desc` and returns the
/// newly minted type id.
///
/// `desc` must be an object whose `type` field selects the kind:
/// - `"struct"`: reads `members`, a sequence of `{name, type, count?}`
///   objects where `type` is an opaque type id and `count` defaults to 0;
/// - `"enum"`: reads `constants`, a sequence of `{name, value}` objects;
/// - anything else is a not-implemented error.
pub fn create_type<E: Engine>(engine: &mut E, target: u64, desc: &HostValue) -> BridgeResult<u64> {
    if desc.as_object().is_none() {
        return Err(BridgeError::Invocation(format!(
            "descriptor must be an object, got {}",
            desc.type_name()
        )));
    }
    let kind = desc
        .get("type")
        .ok_or_else(|| BridgeError::Invocation("descriptor requires a `type` field".into()))?;
    match expect_str(kind, "type")? {
        "struct" => register_struct(engine, target, desc),
        "enum" => register_enum(engine, target, desc),
        other => Err(BridgeError::NotImplemented(format!(
            "descriptor kind `{other}`"
        ))),
    }
}

fn register_struct<E: Engine>(
    engine: &mut E,
    target: u64,
    desc: &HostValue,
) -> BridgeResult<u64> {
    let members = desc
        .get("members")
        .and_then(HostValue::as_array)
        .ok_or_else(|| {
            BridgeError::Invocation("struct descriptor requires a `members` array".into())
        })?;
    // 容量检查必须先于任何成员解码
    if members.len() > MAX_DESCRIPTOR_ENTRIES {
        return Err(BridgeError::Capacity {
            kind: "members",
            len: members.len(),
            max: MAX_DESCRIPTOR_ENTRIES,
        });
    }

    let mut decoded = Vec::with_capacity(members.len());
    for member in members {
        decoded.push(decode_member(member)?);
    }

    let type_id = engine.register_struct_type(target, &decoded)?;
    if type_id == 0 {
        return Err(BridgeError::Engine(EngineError::new(
            "type registration returned no id",
        )));
    }
    debug!(
        target: "bridge",
        type_id,
        members = decoded.len(),
        "struct type registered"
    );
    Ok(type_id)
}

fn register_enum<E: Engine>(engine: &mut E, target: u64, desc: &HostValue) -> BridgeResult<u64> {
    let constants = desc
        .get("constants")
        .and_then(HostValue::as_array)
        .ok_or_else(|| {
            BridgeError::Invocation("enum descriptor requires a `constants` array".into())
        })?;
    if constants.len() > MAX_DESCRIPTOR_ENTRIES {
        return Err(BridgeError::Capacity {
            kind: "constants",
            len: constants.len(),
            max: MAX_DESCRIPTOR_ENTRIES,
        });
    }

    let mut decoded = Vec::with_capacity(constants.len());
    for constant in constants {
        decoded.push(decode_constant(constant)?);
    }

    let type_id = engine.register_enum_type(target, &decoded)?;
    if type_id == 0 {
        return Err(BridgeError::Engine(EngineError::new(
            "type registration returned no id",
        )));
    }
    debug!(
        target: "bridge",
        type_id,
        constants = decoded.len(),
        "enum type registered"
    );
    Ok(type_id)
}

fn decode_member(member: &HostValue) -> BridgeResult<StructMember> {
    if member.as_object().is_none() {
        return Err(BridgeError::Invocation(format!(
            "struct member must be an object, got {}",
            member.type_name()
        )));
    }
    let name = member
        .get("name")
        .ok_or_else(|| BridgeError::Invocation("struct member requires a `name`".into()))?;
    let name = expect_str(name, "name")?.to_string();
    let type_value = member.get("type").ok_or_else(|| {
        BridgeError::Invocation(format!("struct member `{name}` requires a `type`"))
    })?;
    let type_id = expect_id(type_value, "type")?;
    let count = match member.get("count") {
        Some(value) => expect_i32(value, "count")?,
        None => 0,
    };
    Ok(StructMember {
        name,
        type_id,
        count,
    })
}

fn decode_constant(constant: &HostValue) -> BridgeResult<EnumConstant> {
    if constant.as_object().is_none() {
        return Err(BridgeError::Invocation(format!(
            "enum constant must be an object, got {}",
            constant.type_name()
        )));
    }
    let name = constant
        .get("name")
        .ok_or_else(|| BridgeError::Invocation("enum constant requires a `name`".into()))?;
    let name = expect_str(name, "name")?.to_string();
    let value = constant.get("value").ok_or_else(|| {
        BridgeError::Invocation(format!("enum constant `{name}` requires a `value`"))
    })?;
    let value = expect_i32(value, "value")?;
    Ok(EnumConstant { name, value })
}
