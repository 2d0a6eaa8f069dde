//! Provisioning tool boundary.
//!
//! Turns the configured command templates into concrete [`CommandSpec`]s and
//! runs the once-per-run account queries. Account values are opaque strings.

mod template;

pub use template::{render, TemplateError, TemplateVars, ACCOUNT_PLACEHOLDER, RESOURCE_PLACEHOLDER};

use crate::config::{CommandsConfig, ProvisionerConfig};
use crate::poller::extract_identifier;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, EnvOverrides, DEFAULT_COMMAND_TIMEOUT};
use crate::supervisor::ResourceCommands;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Account details reported at the start of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    /// `identifier` is the configured fallback, not a query result
    pub fallback_used: bool,
}

/// The external provisioning tool and its command templates.
#[derive(Debug, Clone)]
pub struct ProvisioningTool {
    program: String,
    commands: CommandsConfig,
    env: EnvOverrides,
    status_timeout: Duration,
    log_dir: Option<PathBuf>,
    account_fallback: Option<String>,
}

impl ProvisioningTool {
    pub fn new(program: impl Into<String>, commands: CommandsConfig) -> Self {
        Self {
            program: program.into(),
            commands,
            env: EnvOverrides::default(),
            status_timeout: DEFAULT_COMMAND_TIMEOUT,
            log_dir: None,
            account_fallback: None,
        }
    }

    pub fn from_config(config: &ProvisionerConfig) -> Self {
        let mut tool = Self::new(config.tool.program.clone(), config.commands.clone())
            .with_env(config.environment.clone())
            .with_status_timeout(config.polling.status_timeout());
        tool.log_dir = config.tool.log_dir.clone();
        tool.account_fallback = config.account.fallback.clone();
        tool
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        self.env = env;
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_account_fallback(mut self, account: impl Into<String>) -> Self {
        self.account_fallback = Some(account.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, args: Vec<String>) -> CommandSpec {
        CommandSpec::new(self.program.clone(), args).with_env(self.env.clone())
    }

    /// Status command for `resource`.
    pub fn status_command(
        &self,
        resource: &str,
        account: Option<&str>,
    ) -> Result<CommandSpec, TemplateError> {
        let vars = TemplateVars {
            resource: Some(resource),
            account,
        };
        let args = render("status", &self.commands.status, vars)?;
        Ok(self.command(args).with_timeout(self.status_timeout))
    }

    /// Provisioning and status commands for `resource`.
    pub fn resource_commands(
        &self,
        resource: &str,
        account: Option<&str>,
    ) -> Result<ResourceCommands, TemplateError> {
        let vars = TemplateVars {
            resource: Some(resource),
            account,
        };
        let mut provision = self.command(render("provision", &self.commands.provision, vars)?);
        if let Some(dir) = &self.log_dir {
            provision = provision.with_log_file(dir.join(format!("{resource}.log")));
        }

        Ok(ResourceCommands {
            provision,
            status: self.status_command(resource, account)?,
        })
    }

    /// Query the account identifier and balance.
    ///
    /// Never fails: an unavailable value is logged and left empty, and the
    /// configured fallback stands in for a missing identifier.
    pub async fn query_account(&self, runner: &dyn CommandRunner) -> AccountInfo {
        let mut info = AccountInfo::default();

        if !self.commands.account_id.is_empty() {
            info.identifier = self
                .query("account_id", &self.commands.account_id, None, runner)
                .await
                .and_then(|output| {
                    extract_identifier(&output)
                        .map(String::from)
                        .or_else(|| first_line(&output))
                });
        }

        if info.identifier.is_none() {
            if let Some(fallback) = &self.account_fallback {
                tracing::warn!(account = %fallback, "Using fallback account identifier");
                info.identifier = Some(fallback.clone());
                info.fallback_used = true;
            }
        }

        if !self.commands.account_balance.is_empty() {
            info.balance = self
                .query(
                    "account_balance",
                    &self.commands.account_balance,
                    info.identifier.as_deref(),
                    runner,
                )
                .await
                .and_then(|output| first_line(&output));
        }

        info
    }

    async fn query(
        &self,
        name: &'static str,
        template: &[String],
        account: Option<&str>,
        runner: &dyn CommandRunner,
    ) -> Option<String> {
        let vars = TemplateVars {
            resource: None,
            account,
        };
        let spec = match render(name, template, vars) {
            Ok(args) => self.command(args).with_timeout(self.status_timeout),
            Err(e) => {
                tracing::warn!(query = name, error = %e, "Skipping account query");
                return None;
            }
        };

        match runner.run(&spec).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                tracing::warn!(
                    query = name,
                    exit_code = output.exit_code,
                    timed_out = output.timed_out,
                    stderr = %stderr_line(&output),
                    "Account query failed"
                );
                None
            }
            Err(e) => {
                tracing::warn!(query = name, error = %e, "Account query could not run");
                None
            }
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}

fn stderr_line(output: &CommandOutput) -> String {
    first_line(&output.stderr).unwrap_or_default()
}
