#[cfg(feature = "cli")]
pub mod cli;

use crate::domain::ports::{ConfigProvider, StatusTransitionPolicy};
use crate::utils::error::{DeskError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub optimistic_concurrency: Option<bool>,
    /// "initial-completion" 或 "every-submission"
    pub status_transitions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// "compact" 或 "json"
    pub format: Option<String>,
}

impl DeskConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig {
                base_url: base_url.into(),
                timeout_seconds: None,
            },
            workflow: WorkflowConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DeskError::ConfigValidation {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BACKEND_URL})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DeskError::Config {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn log_format_json(&self) -> bool {
        self.logging.format.as_deref() == Some("json")
    }

    fn parse_policy(&self) -> Result<StatusTransitionPolicy> {
        match self.workflow.status_transitions.as_deref() {
            None | Some("initial-completion") => Ok(StatusTransitionPolicy::InitialCompletionOnly),
            Some("every-submission") => Ok(StatusTransitionPolicy::EverySubmission),
            Some(other) => Err(DeskError::InvalidConfigValue {
                field: "workflow.status_transitions".to_string(),
                value: other.to_string(),
                reason: "Valid values: initial-completion, every-submission".to_string(),
            }),
        }
    }
}

impl ConfigProvider for DeskConfig {
    fn base_url(&self) -> &str {
        &self.backend.base_url
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.backend.timeout_seconds.map(Duration::from_secs)
    }

    fn optimistic_concurrency(&self) -> bool {
        self.workflow.optimistic_concurrency.unwrap_or(false)
    }

    fn transition_policy(&self) -> StatusTransitionPolicy {
        self.parse_policy().unwrap_or_default()
    }
}

impl Validate for DeskConfig {
    fn validate(&self) -> Result<()> {
        crate::utils::validation::validate_url("backend.base_url", &self.backend.base_url)?;

        if let Some(timeout) = self.backend.timeout_seconds {
            crate::utils::validation::validate_positive_number(
                "backend.timeout_seconds",
                timeout,
                1,
            )?;
        }

        if let Some(format) = self.logging.format.as_deref() {
            if !["compact", "json"].contains(&format) {
                return Err(DeskError::InvalidConfigValue {
                    field: "logging.format".to_string(),
                    value: format.to_string(),
                    reason: "Valid formats: compact, json".to_string(),
                });
            }
        }

        self.parse_policy().map(|_| ())
    }
}
