//! 网关运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关运行配置。
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub http_addr: String,
    /// 内存数据缓冲容量（数据点个数）
    pub data_buffer_capacity: usize,
    /// 创建桥接时未给出选项所用的默认值
    pub bridge_default_interval_ms: u64,
    pub bridge_default_buffer_size: usize,
    /// 源连接状态驱动桥接自动暂停/恢复
    pub auto_resume_bridges: bool,
    /// 退出时断开全部连接
    pub shutdown_disconnect: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8090".to_string(),
            data_buffer_capacity: 10_000,
            bridge_default_interval_ms: 1000,
            bridge_default_buffer_size: 1000,
            auto_resume_bridges: true,
            shutdown_disconnect: true,
        }
    }
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置，未设置的键取默认值。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let reader = Reader { lookup };
        let http_addr = reader
            .optional("GW_HTTP_ADDR")
            .unwrap_or(defaults.http_addr);
        let data_buffer_capacity =
            reader.usize_with_default("GW_DATA_BUFFER_CAPACITY", defaults.data_buffer_capacity)?;
        if data_buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "GW_DATA_BUFFER_CAPACITY".to_string(),
                "0".to_string(),
            ));
        }
        let bridge_default_interval_ms = reader.u64_with_default(
            "GW_BRIDGE_DEFAULT_INTERVAL_MS",
            defaults.bridge_default_interval_ms,
        )?;
        let bridge_default_buffer_size = reader.usize_with_default(
            "GW_BRIDGE_DEFAULT_BUFFER_SIZE",
            defaults.bridge_default_buffer_size,
        )?;
        let auto_resume_bridges =
            reader.bool_with_default("GW_AUTO_RESUME_BRIDGES", defaults.auto_resume_bridges)?;
        let shutdown_disconnect =
            reader.bool_with_default("GW_SHUTDOWN_DISCONNECT", defaults.shutdown_disconnect)?;

        Ok(Self {
            http_addr,
            data_buffer_capacity,
            bridge_default_interval_ms,
            bridge_default_buffer_size,
            auto_resume_bridges,
            shutdown_disconnect,
        })
    }
}

struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// 空字符串视为未设置。
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn u64_with_default(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
            None => Ok(default),
        }
    }

    fn usize_with_default(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
            None => Ok(default),
        }
    }

    fn bool_with_default(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(true),
            "0" | "false" | "off" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid(key.to_string(), value)),
        }
    }
}
