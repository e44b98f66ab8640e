use pairlink::config::AppConfig;

#[tokio::main]
async fn main() {
    pairlink::init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = pairlink::run(config).await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
