use host_server::http::{RedirectState, build_redirect_router, build_static_router};
use host_server::server::{bind, serve_https, serve_redirect, shutdown_channel};
use host_server::tls::load_tls_config;
use shared::config::{HostConfig, load_dotenv};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "host_server=info,tower_http=info".to_string()),
        )
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .init();

    let config = match HostConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load host config");
            std::process::exit(1);
        }
    };

    let tls_config = match load_tls_config(&config.tls_cert_path, &config.tls_key_path) {
        Ok(tls_config) => tls_config,
        Err(err) => {
            error!(
                error = %err,
                cert_path = %config.tls_cert_path.display(),
                key_path = %config.tls_key_path.display(),
                "failed to load tls certificate"
            );
            std::process::exit(1);
        }
    };

    let https_listener = match bind(config.https_bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to bind https listener");
            std::process::exit(1);
        }
    };
    let http_listener = match bind(config.http_bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to bind http listener");
            std::process::exit(1);
        }
    };

    let https_port = https_listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(config.https_bind_addr.port());
    let static_router = build_static_router(&config.static_dir, &config.index_file);
    let redirect_router =
        build_redirect_router(RedirectState::new(config.public_host.as_str(), https_port));

    info!(
        https_bind_addr = %config.https_bind_addr,
        http_bind_addr = %config.http_bind_addr,
        static_dir = %config.static_dir.display(),
        public_host = %config.public_host,
        "host server listening"
    );

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                trigger.trigger();
            }
            Err(err) => {
                error!(error = %err, "failed to listen for shutdown signal");
                // Keep the trigger alive; dropping it would stop both listeners.
                std::future::pending::<()>().await;
            }
        }
    });

    let (https_result, redirect_result) = tokio::join!(
        serve_https(https_listener, tls_config, static_router, shutdown.clone()),
        serve_redirect(http_listener, redirect_router, shutdown),
    );

    let mut failed = false;
    for err in [https_result.err(), redirect_result.err()].into_iter().flatten() {
        error!(error = %err, "host server failed");
        failed = true;
    }
    if failed {
        std::process::exit(1);
    }
}
