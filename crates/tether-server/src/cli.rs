//! `tether config` 子命令

use clap::{Args, Subcommand};

use tether_config::{ConfigError, ConfigManager};

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// 获取配置值
    Get {
        /// 配置键 (如: reconnect.max_attempts, status.webhook_url)
        key: String,
    },
    /// 设置配置值并写回文件
    Set {
        /// 配置键 (如: reconnect.max_attempts, status.webhook_url)
        key: String,
        /// 配置值
        value: String,
    },
    /// 显示当前配置
    Show,
    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    /// 执行命令, 返回要打印的内容
    pub async fn run(self, manager: &ConfigManager) -> anyhow::Result<String> {
        match self {
            ConfigCommand::Get { key } => {
                let config = manager.snapshot().await;
                match config.get_value(&key) {
                    Some(value) => Ok(format!("{} = {}", key, value)),
                    None => Err(ConfigError::KeyNotFound(key).into()),
                }
            }
            ConfigCommand::Set { key, value } => {
                // 校验失败时文件保持不变
                manager
                    .update(|config| config.set_value(&key, &value))
                    .await?;
                Ok(format!("Set {} = {}", key, value))
            }
            ConfigCommand::Show => {
                let config = manager.snapshot().await;
                Ok(serde_json::to_string_pretty(&config)?)
            }
            ConfigCommand::Path => Ok(manager.path().display().to_string()),
        }
    }
}
