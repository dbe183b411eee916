use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use jambda_client::{payload_from_dir, payload_from_file, ResourceClient};
use jambda_control::{
    Console, FormFlow, LogState, MutationCoordinator, ScriptedLogSource, SharedRegistry,
};
use jambda_metrics::MetricsService;
use jambda_models::{ConsoleConfig, FieldEdit, FunctionResource, Payload};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "jambda-console")]
#[command(about = "Manage functions on a Jambda control plane")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Control plane base URL (overrides api.base_url)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all functions, newest first
    List {
        /// Print the raw resources as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a function
    Create {
        #[arg(long)]
        name: String,

        #[command(flatten)]
        settings: FunctionSettings,

        /// Prebuilt zip archive to upload
        #[arg(long, conflicts_with = "dir")]
        zip: Option<PathBuf>,

        /// Function directory to zip and upload (must contain `bootstrap`)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Edit an existing function's name or configuration
    Edit {
        external_id: String,

        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        settings: FunctionSettings,

        /// Environment variable to remove
        #[arg(long = "unset-env", value_name = "KEY")]
        unset_env: Vec<String>,
    },

    /// Delete a function
    Delete { external_id: String },

    /// Stream a function's logs
    Logs { external_id: String },
}

#[derive(Args, Debug, Default)]
pub struct FunctionSettings {
    /// Trigger: http or cron
    #[arg(long)]
    pub trigger: Option<String>,

    /// Runtime image, e.g. golang:1.22
    #[arg(long)]
    pub image: Option<String>,

    /// Function type: REST or SINGLE
    #[arg(long = "type")]
    pub kind: Option<String>,

    #[arg(long)]
    pub port: Option<String>,

    /// Environment variable as KEY=VALUE
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,
}

impl FunctionSettings {
    fn into_edits(self) -> Vec<FieldEdit> {
        let mut edits = Vec::new();
        edits.extend(self.trigger.map(FieldEdit::Trigger));
        edits.extend(self.image.map(FieldEdit::Image));
        edits.extend(self.kind.map(FieldEdit::Kind));
        edits.extend(self.port.map(FieldEdit::Port));
        edits.extend(
            self.env
                .into_iter()
                .map(|(key, value)| FieldEdit::SetEnv { key, value }),
        );
        edits
    }
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Wires a console over `client` using `config`.
pub fn build_console(config: &ConsoleConfig, client: Arc<dyn ResourceClient>) -> Result<Console> {
    let metrics = Arc::new(MetricsService::new()?);
    let coordinator = MutationCoordinator::new(client, SharedRegistry::new(), metrics)
        .with_reconciliation(config.mutations.delete_reconciliation);
    let logs = Arc::new(ScriptedLogSource::from(&config.logs));

    Ok(Console::new(coordinator, logs).with_default_port(config.defaults.port))
}

async fn load_payload(zip: Option<PathBuf>, dir: Option<PathBuf>) -> Result<Option<Payload>> {
    match (zip, dir) {
        (Some(path), _) => payload_from_file(&path).await.map(Some),
        (None, Some(path)) => payload_from_dir(&path).map(Some),
        (None, None) => Ok(None),
    }
}

async fn refreshed(console: &mut Console) -> Result<()> {
    console.refresh();
    console.settle().await;
    match console.last_error() {
        Some(message) => Err(anyhow!("failed to list functions: {message}")),
        None => Ok(()),
    }
}

fn select(console: &mut Console, external_id: &str) -> Result<()> {
    if console.select_function(external_id) {
        Ok(())
    } else {
        bail!("function {external_id} not found")
    }
}

fn field_report(console: &Console, flow: FormFlow) -> String {
    console
        .field_issues(flow)
        .iter()
        .map(|issue| format!("  {}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_resource(out: &mut impl Write, resource: &FunctionResource) -> Result<()> {
    let config = &resource.configuration;
    writeln!(
        out,
        "{:<38} {:<20} {:<6} {:<16} {:<7} {}",
        resource.external_id,
        resource.name,
        config.trigger.as_str(),
        config.image.as_str(),
        config.kind.as_str(),
        config.port
    )?;
    Ok(())
}

/// Runs one command against the console, writing results to `out`.
pub async fn execute(command: Commands, console: &mut Console, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::List { json } => {
            refreshed(console).await?;
            let functions = console.registry_snapshot();
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&functions)?)?;
            } else {
                for function in &functions {
                    write_resource(out, function)?;
                }
            }
        }

        Commands::Create {
            name,
            settings,
            zip,
            dir,
        } => {
            let payload = load_payload(zip, dir).await?;

            console.open_new();
            console.edit_new(FieldEdit::Name(name));
            for edit in settings.into_edits() {
                console.edit_new(edit);
            }
            if let Some(payload) = payload {
                console.attach_payload(payload);
            }

            if console.submit_new().is_none() {
                bail!(
                    "function definition is invalid:\n{}",
                    field_report(console, FormFlow::Create)
                );
            }
            console.settle().await;

            if let Some(error) = console.submission_error(FormFlow::Create) {
                bail!("create failed: {error}");
            }
            let created = console
                .registry_snapshot()
                .into_iter()
                .next()
                .context("function was created but the list could not be refreshed")?;
            info!(external_id = %created.external_id, "Created function");
            write_resource(out, &created)?;
        }

        Commands::Edit {
            external_id,
            name,
            settings,
            unset_env,
        } => {
            refreshed(console).await?;
            select(console, &external_id)?;
            console.open_edit();

            if let Some(name) = name {
                console.edit_existing(FieldEdit::Name(name));
            }
            for edit in settings.into_edits() {
                console.edit_existing(edit);
            }
            for key in unset_env {
                console.edit_existing(FieldEdit::RemoveEnv(key));
            }

            if console.submit_edit().is_none() {
                bail!(
                    "function definition is invalid:\n{}",
                    field_report(console, FormFlow::Edit)
                );
            }
            console.settle().await;

            if let Some(error) = console.submission_error(FormFlow::Edit) {
                bail!("edit failed: {error}");
            }
            if let Some(updated) = console.selected() {
                write_resource(out, &updated)?;
            }
        }

        Commands::Delete { external_id } => {
            refreshed(console).await?;
            select(console, &external_id)?;
            console.request_delete();
            console.confirm_delete();
            console.settle().await;

            if let Some(failure) = console.delete_failures().first() {
                bail!(
                    "function {} was removed locally but the control plane reported: {}",
                    failure.external_id,
                    failure.error.user_message()
                );
            }
            writeln!(out, "Deleted {external_id}")?;
        }

        Commands::Logs { external_id } => {
            refreshed(console).await?;
            select(console, &external_id)?;
            stream_logs(console, out).await?;
        }
    }

    Ok(())
}

async fn stream_logs(console: &mut Console, out: &mut impl Write) -> Result<()> {
    let mut printed = 0;
    loop {
        for line in console.log_lines().get(printed..).unwrap_or_default() {
            writeln!(out, "{line}")?;
        }
        printed = console.log_lines().len();
        out.flush()?;

        if console.log_state() == &LogState::Idle {
            return Ok(());
        }

        tokio::select! {
            event = console.next_event() => match event {
                Some(event) => console.apply(event),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                console.clear_selection();
                return Ok(());
            }
        }
    }
}
