//! Server configuration extension point

use std::fmt;

use async_trait::async_trait;

use super::types::ServerConfigRequest;
use crate::config::AppConfig;
use crate::error::Result;

/// Hook run by the configuration wizard before the new configuration is
/// stored. Implementations may adjust `app_config` (plugin options and the
/// like). A failing configurator is logged and skipped.
#[async_trait]
pub trait ServerConfigurator: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    async fn configure_server(
        &self,
        request: &ServerConfigRequest,
        app_config: &mut AppConfig,
    ) -> Result<()>;
}
