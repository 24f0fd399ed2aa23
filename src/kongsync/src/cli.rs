use clap::{Parser, Subcommand, ValueEnum};
use kongsync_config::Overrides;
use kongsync_tracing::LogFormat;

#[derive(Parser, Debug)]
#[command(version, about = "KongSync: publish serverless function routes to Kong")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the serverless manifest (yaml/json/toml)
    #[arg(short, long, global = true, default_value = "./serverless.yml")]
    pub manifest: String,

    /// Standalone gateway config, used instead of `custom.kong`
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[arg(long, global = true)]
    pub admin_url: Option<String>,

    #[arg(long, global = true, env = "KONGSYNC_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    #[arg(short, long, global = true)]
    pub stage: Option<String>,

    #[arg(short, long, global = true)]
    pub region: Option<String>,

    /// Max in-flight admin calls per phase
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Exit non-zero when any route operation failed
    #[arg(long, global = true)]
    pub strict: bool,

    #[arg(long, global = true, env = "KONGSYNC_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reconcile the gateway with the manifest
    Sync,
    /// Show what `sync` would do without changing the gateway
    Plan,
    /// Print the desired routes without contacting the gateway
    Routes,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            admin_url: self.admin_url.clone(),
            admin_token: self.admin_token.clone(),
            stage: self.stage.clone(),
            region: self.region.clone(),
            concurrency: self.concurrency,
        }
    }
}
