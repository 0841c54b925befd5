//! 桥接层统一错误处理
//!
//! 各子模块的错误在这里汇总为 [`BridgeError`],所有错误同步返回,
//! 消息保持人类可读。清理工作(释放暂存缓冲、终结 arena)总是在
//! 错误浮出之前完成,桥接层内部不做任何重试。

use thiserror::Error;

use crate::engine::EngineError;
use crate::value::DecodeError;

/// 桥接层统一错误类型
#[derive(Error, Debug)]
pub enum BridgeError {
    /// 调用参数形状不合法,在进入引擎前即被拒绝
    #[error("invalid invocation: {0}")]
    Invocation(String),

    /// 动态值无法解码为期望的原生字段类型
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// 描述符条目数超出固定容量
    #[error("too many {kind} in type descriptor: {len} exceeds capacity {max}")]
    Capacity {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    /// 尚未支持的描述符类别
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// 查询编译被引擎拒绝
    #[error("query failed: {0}")]
    QueryFailed(EngineError),

    /// 脚本解析被引擎拒绝
    #[error("script parse failed: {0}")]
    ParseFailed(EngineError),

    /// 脚本求值返回非零状态
    #[error("script evaluation failed with status {status}")]
    EvalFailed { status: i32 },

    /// 引擎拒绝的其他操作
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// 在已释放的句柄上调用操作
    #[error("invalid {handle}: handle already disposed")]
    Disposed { handle: &'static str },
}

/// 桥接层统一结果类型
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{expect_id, HostValue};

    #[test]
    fn test_error_display() {
        let err = BridgeError::Capacity {
            kind: "members",
            len: 33,
            max: 32,
        };
        assert_eq!(
            format!("{}", err),
            "too many members in type descriptor: 33 exceeds capacity 32"
        );

        let err = BridgeError::Disposed { handle: "iterator" };
        assert_eq!(format!("{}", err), "invalid iterator: handle already disposed");

        let err = BridgeError::EvalFailed { status: 1 };
        assert_eq!(format!("{}", err), "script evaluation failed with status 1");
    }

    #[test]
    fn test_error_conversion() {
        fn decode_member_type(value: &HostValue) -> BridgeResult<u64> {
            let id = expect_id(value, "type")?;
            Ok(id)
        }

        let err = decode_member_type(&HostValue::Bool(true));
        assert!(matches!(err, Err(BridgeError::Decode(_))));

        let ok = decode_member_type(&HostValue::Id(42));
        assert_eq!(ok.unwrap(), 42);
    }
}
