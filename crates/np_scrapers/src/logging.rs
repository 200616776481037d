use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the global subscriber once per process.
///
/// `filter` takes `RUST_LOG` syntax; without it `RUST_LOG` is read, falling
/// back to `info`.
pub fn init_logging(filter: Option<&str>, json: bool) {
    INIT.call_once(|| {
        let filter = match filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };
        let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
        let installed = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        if let Err(e) = installed {
            eprintln!("logging already initialised: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(Some("debug"), false);
        init_logging(None, true);
        tracing::info!("still logging");
    }
}
