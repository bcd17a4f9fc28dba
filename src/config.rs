//! 配置管理模块
//!
//! 启动时构建一次不可变的 [`Config`]，之后以 `Arc<Config>` 形式传递给各层。
//!
//! 加载顺序：
//! 1. 内置默认值
//! 2. YAML 配置文件（`VISIONCAST_CONFIG` 指定，或 `~/.visioncast/config.yaml`）
//! 3. 环境变量覆盖（`OLLAMA_BASE_URL`、`OLLAMA_MODEL`、`VISIONCAST_HOST`、`VISIONCAST_PORT`）

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "VISIONCAST_CONFIG";

const CONFIG_DIR: &str = ".visioncast";
const CONFIG_FILE: &str = "config.yaml";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件格式错误
    #[error("配置文件格式错误: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// 配置值无效
    #[error("配置值无效: {0}")]
    Invalid(String),
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许的 CORS 来源
    pub cors_origins: Vec<String>,
    /// 请求体上限（字节），主要约束图片上传
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

/// 推理后端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// 后端基础 URL，例如 `http://localhost:11434`
    pub base_url: String,
    /// 模型标识
    pub model: String,
    /// 连接超时（秒），流式与非流式共用
    pub connect_timeout_secs: u64,
    /// 非流式调用的请求超时（秒）
    pub unary_timeout_secs: u64,
    /// 健康检查超时（秒）
    pub health_timeout_secs: u64,
    /// 图片 URL 下载超时（秒）
    pub image_download_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3:latest".to_string(),
            connect_timeout_secs: 10,
            unary_timeout_secs: 120,
            health_timeout_secs: 5,
            image_download_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn unary_timeout(&self) -> Duration {
        Duration::from_secs(self.unary_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn image_download_timeout(&self) -> Duration {
        Duration::from_secs(self.image_download_timeout_secs)
    }

    /// 拼接后端端点，去掉 base_url 末尾多余的 `/`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// 流式转换配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// 转换器到客户端之间有界通道的容量
    pub channel_capacity: usize,
    /// 后端单个未完成行的最大字节数
    pub max_line_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
            max_line_bytes: crate::stream::DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别：trace / debug / info / warn / error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// 默认配置文件路径: ~/.visioncast/config.yaml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
            .join(CONFIG_FILE)
    }

    /// 按 默认值 → 配置文件 → 环境变量 的顺序加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 从 YAML 文件读取配置
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// 应用环境变量覆盖
    ///
    /// `lookup` 抽象出环境读取，测试时无需修改进程环境。
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OLLAMA_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = url.trim().to_string();
        }
        if let Some(model) = lookup("OLLAMA_MODEL").filter(|v| !v.trim().is_empty()) {
            self.backend.model = model.trim().to_string();
        }
        if let Some(host) = lookup("VISIONCAST_HOST").filter(|v| !v.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = lookup("VISIONCAST_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("VISIONCAST_PORT 不是合法端口: {port}")))?;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.backend.base_url).map_err(|e| {
            ConfigError::Invalid(format!("backend.base_url 无效 ({}): {e}", self.backend.base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "backend.base_url 仅支持 http/https: {}",
                self.backend.base_url
            )));
        }
        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.model 不能为空".to_string()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port 不能为 0".to_string()));
        }
        if self.stream.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "stream.channel_capacity 至少为 1".to_string(),
            ));
        }
        if self.stream.max_line_bytes == 0 {
            return Err(ConfigError::Invalid(
                "stream.max_line_bytes 至少为 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
