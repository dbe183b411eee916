use ::tracing::{info, warn};
use jambda_models::{ClientError, FunctionResource};
use tracing_subscriber::EnvFilter;

pub struct TracingService;

impl TracingService {
    /// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
    pub fn init(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        if json {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .compact()
                .try_init()
        }
    }

    pub fn log_function_created(function: &FunctionResource) {
        info!(
            external_id = %function.external_id,
            name = %function.name,
            trigger = %function.configuration.trigger,
            image = %function.configuration.image,
            kind = %function.configuration.kind,
            port = function.configuration.port,
            "Function created"
        );
    }

    pub fn log_function_updated(function: &FunctionResource) {
        info!(
            external_id = %function.external_id,
            name = %function.name,
            "Function updated"
        );
    }

    pub fn log_function_deleted(external_id: &str) {
        info!(external_id = %external_id, "Function deleted");
    }

    pub fn log_delete_diverged(external_id: &str, error: &ClientError) {
        warn!(
            external_id = %external_id,
            status_code = ?error.status_code(),
            error = %error,
            "Delete failed remotely; resource stays removed locally"
        );
    }

    pub fn log_registry_refreshed(count: usize) {
        info!(count = count, "Function registry refreshed");
    }
}
