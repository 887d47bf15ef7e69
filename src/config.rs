//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 配置错误
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "配置错误: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 查询词汇表配置结构
///
/// 所有字段都来自工单系统的配置，编译器本身不做任何校验。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// 优先级列表，顺序从低到高
    #[serde(default = "default_priorities")]
    pub priorities: Vec<String>,
    /// 工单类型名称
    #[serde(default = "default_types")]
    pub types: Vec<String>,
    /// 组件名称
    #[serde(default)]
    pub components: Vec<String>,
    /// 状态名称，复合词用下划线分隔
    #[serde(default)]
    pub statuses: Vec<String>,
    /// 解决方式名称
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<String>,
    /// 额外识别的字段名
    #[serde(default)]
    pub extra_fields: Vec<String>,
    /// 固定查询：触发词 -> 查询模板
    /// 模板可以引用 %(user)s、%(month)s、%(year)s 等插值变量
    #[serde(default)]
    pub fixed_queries: BTreeMap<String, String>,
}

fn default_priorities() -> Vec<String> {
    ["lowest", "low", "normal", "high", "highest"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_types() -> Vec<String> {
    ["defect", "enhancement", "task"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_resolutions() -> Vec<String> {
    ["fixed", "invalid", "wontfix", "duplicate", "worksforme", "cantfix"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            priorities: default_priorities(),
            types: default_types(),
            components: Vec::new(),
            statuses: Vec::new(),
            resolutions: default_resolutions(),
            extra_fields: Vec::new(),
            fixed_queries: BTreeMap::new(),
        }
    }
}

impl QueryConfig {
    /// 从JSON文件加载词汇表配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "配置文件不存在: {}",
                path_ref.display()
            )));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("无法读取配置文件 {}: {}", path_ref.display(), e))
        })?;

        // 解析JSON
        let config: QueryConfig = serde_json::from_str(&content).map_err(|e| {
            ConfigError::new(format!("无法解析JSON配置文件 {}: {}", path_ref.display(), e))
        })?;

        Ok(config)
    }
}
