mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Command, OutputFormat};
use kongsync_admin::{AdminApi, DryRunAdmin, KongAdminClient};
use kongsync_config::Settings;
use kongsync_core::{build, DesiredRoute, ServiceSpec};
use kongsync_reconcile::{ReconcileOptions, Reconciler, SyncReport};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Serialize)]
struct RouteListing<'a> {
    service: &'a str,
    stage: &'a str,
    region: &'a str,
    routes: &'a [DesiredRoute],
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _guard = kongsync_tracing::init(
        env!("CARGO_PKG_NAME"),
        args.otlp_endpoint.as_deref(),
        &args.log_level,
        args.log_format,
    )?;

    let settings = Settings::load(&args.manifest, args.overrides())
        .with_context(|| format!("loading settings from {}", args.manifest))?;
    let desired = build(&settings.functions, &settings.kong.route_defaults());
    info!(
        command = ?args.command,
        functions = settings.functions.len(),
        routes = desired.len(),
        "manifest loaded"
    );

    match args.command {
        Command::Routes => print_routes(&settings, &desired, args.format),
        Command::Sync | Command::Plan => {
            let report = sync(&settings, &desired, args.command == Command::Plan).await?;
            print_report(&report, args.format)?;
            if args.strict && !report.is_clean() {
                bail!("{} route operation(s) failed", report.failures.len());
            }
            Ok(())
        }
    }
}

async fn sync(settings: &Settings, desired: &[DesiredRoute], dry_run: bool) -> Result<SyncReport> {
    let kong = &settings.kong;
    let client = KongAdminClient::new(
        &kong.admin_api_url,
        kong.admin_token.as_deref(),
        Duration::from_secs(kong.timeout_secs),
    )
    .with_context(|| format!("invalid admin api url {}", kong.admin_api_url))?;

    let api: Arc<dyn AdminApi> = if dry_run {
        Arc::new(DryRunAdmin::new(client))
    } else {
        Arc::new(client)
    };

    let options = ReconcileOptions {
        service_name: kong.service.name.clone(),
        service: ServiceSpec {
            url: kong.service.url.clone(),
            tags: kong.service.tags.clone(),
        },
        invocation_plugin: kong.invocation_plugin.clone(),
        concurrency: kong.concurrency,
        dry_run,
    };

    let report = Reconciler::new(api, options).run(desired).await.inspect_err(|e| error!("{e}"))?;
    Ok(report)
}

fn print_report(report: &SyncReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{report}"),
    }
    Ok(())
}

fn print_routes(settings: &Settings, desired: &[DesiredRoute], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let listing = RouteListing {
                service: &settings.kong.service.name,
                stage: &settings.stage,
                region: &settings.region,
                routes: desired,
            };
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            for route in desired {
                let paths = if route.spec.is_some() {
                    route.paths().join(",")
                } else {
                    "<no route block>".to_string()
                };
                println!("{}\t{}\t{}", route.name, route.owner, paths);
            }
        }
    }
    Ok(())
}
