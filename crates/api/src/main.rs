use anyhow::Context;

use matricula_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    matricula_observability::init();

    let config = AppConfig::from_env().context("reading configuration")?;

    let jwt_secret = match config.require_jwt_secret() {
        Ok(secret) => secret.to_string(),
        Err(_) => {
            tracing::warn!("JWT_SECRET_KEY not set; using insecure dev default");
            "dev-secret".to_string()
        }
    };

    let services = matricula_api::app::services::build_services(&config, &jwt_secret)
        .await
        .context("building services")?;
    let app = matricula_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
