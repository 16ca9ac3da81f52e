use clap::Parser;
use session_issuer::cli::{
    Args, build_config, init_logging, load_configuration, load_jwt_secret, open_database,
};
use session_issuer::{init_cleanup, run_server};
use tracing::{error, info};

fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    // Read the secret before the runtime starts any threads.
    let secret_override = load_jwt_secret();

    let Some(tokens) = load_configuration(&args.settings, secret_override) else {
        std::process::exit(1);
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            std::process::exit(1);
        }
    };

    runtime.block_on(async move {
        let Some(db) = open_database(&args.database).await else {
            std::process::exit(1);
        };

        let addr = format!("0.0.0.0:{}", args.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .unwrap_or_else(|e| {
                error!(address = %addr, error = %e, "Failed to bind");
                std::process::exit(1);
            });

        if let Ok(local_addr) = listener.local_addr() {
            info!(address = %local_addr, "Listening");
        }

        init_cleanup(&db).await;

        let config = build_config(db, tokens, args.ip_extractor);
        if let Err(e) = run_server(config, listener).await {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    });
}
