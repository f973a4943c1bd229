use std::sync::Arc;

use tracing::{error, info};

use pulseplane::{AccountService, Config, Database, LogNotifier};

#[tokio::main]
async fn main() {
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = pulseplane::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        pulseplane::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(1);
    }

    info!("PulsePlane OTP service");

    let db = match Database::open(&config.database.path).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    let service = match AccountService::from_config(db, &config, Arc::new(LogNotifier)) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to initialize account service: {e}");
            std::process::exit(1);
        }
    };

    let policy = service.otp().policy();
    info!(
        expiry_secs = policy.expiry.as_secs(),
        max_attempts = policy.max_attempts,
        resend_cooldown_secs = policy.resend_cooldown.as_secs(),
        max_resends = policy.max_resends,
        resend_lockout_secs = policy.resend_lockout.as_secs(),
        retain_verified = policy.retain_verified,
        "OTP policy loaded"
    );
}
