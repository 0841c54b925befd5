//! 桥接层配置
//!
//! 提供 TOML 配置文件与环境变量覆盖。配置在构造 [`crate::World`] 时
//! 一次性生效,运行期间不再变化。

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::arena::DEFAULT_MIN_BLOCK;
use crate::engine::SnapshotFlags;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("config file error: {0}")]
    File(#[from] std::io::Error),
    /// 解析错误
    #[error("config parse error: {0}")]
    Parse(String),
    /// 验证错误
    #[error("config validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 桥接层主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 暂存 arena 配置
    pub arena: ArenaConfig,

    /// 查询快照默认开关
    pub query: QueryConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::File)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("ECS_BRIDGE_ARENA_MIN_BLOCK") {
            if let Ok(min_block) = val.parse() {
                self.arena.min_block = min_block;
            }
        }
        if let Ok(val) = env::var("ECS_BRIDGE_QUERY_TABLE") {
            self.query.table = val.parse().unwrap_or(self.query.table);
        }
        if let Ok(val) = env::var("ECS_BRIDGE_QUERY_BUILTIN") {
            self.query.builtin = val.parse().unwrap_or(self.query.builtin);
        }
        if let Ok(val) = env::var("ECS_BRIDGE_QUERY_INHERITED") {
            self.query.inherited = val.parse().unwrap_or(self.query.inherited);
        }
        if let Ok(val) = env::var("ECS_BRIDGE_QUERY_MATCHES") {
            self.query.matches = val.parse().unwrap_or(self.query.matches);
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.arena.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 依次尝试 ./ecs_bridge.toml,找不到时使用默认配置,
    /// 最后应用环境变量覆盖。
    pub fn load_or_default() -> Self {
        let mut config = match Self::from_toml_file("ecs_bridge.toml") {
            Ok(config) => {
                debug!(target: "bridge", "loaded config from ecs_bridge.toml");
                config
            }
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config
    }
}

/// 暂存 arena 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// 最小块大小(字节),必须是 2 的幂
    pub min_block: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_block: DEFAULT_MIN_BLOCK,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.min_block.is_power_of_two() {
            return Err(ConfigError::Validation(format!(
                "arena min_block must be a power of two, got {}",
                self.min_block
            )));
        }
        Ok(())
    }
}

/// 查询快照默认开关,可被单次执行的选项覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub table: bool,
    pub builtin: bool,
    pub inherited: bool,
    pub matches: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            table: false,
            builtin: false,
            inherited: false,
            matches: false,
        }
    }
}

impl QueryConfig {
    pub fn snapshot_flags(&self) -> SnapshotFlags {
        SnapshotFlags {
            table: self.table,
            builtin: self.builtin,
            inherited: self.inherited,
            matches: self.matches,
        }
    }
}
