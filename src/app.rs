use crate::config::{self, ApiConfig};
use crate::errors::ConfigError;
use crate::mcp::server::McpServer;
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolExecutor, ToolInvoker};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    /// Resolves the config path (`--config`, then `RESTBRIDGE_CONFIG`), loads and validates it.
    pub fn initialize(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let logger = Logger::new("restbridge");
        let path = config::resolve_config_path(cli_path)?;
        Self::from_path(&path, logger)
    }

    pub fn from_path(path: &Path, logger: Logger) -> Result<Self, ConfigError> {
        let config = config::load_config(path)?;
        logger.info(
            "configuration loaded",
            Some(&serde_json::json!({
                "path": path.display().to_string(),
                "apis": config.apis.len(),
            })),
        );
        Self::from_config(config, logger)
    }

    pub fn from_config(config: ApiConfig, logger: Logger) -> Result<Self, ConfigError> {
        let tool_executor = Arc::new(ToolExecutor::new(config, logger.clone())?);
        logger.debug(
            "tools registered",
            Some(&serde_json::json!({ "count": tool_executor.generator().len() })),
        );
        Ok(Self {
            logger,
            tool_executor,
        })
    }

    pub fn server(&self) -> McpServer {
        let invoker: Arc<dyn ToolInvoker> = self.tool_executor.clone();
        McpServer::new(invoker, self.logger.clone())
    }
}
