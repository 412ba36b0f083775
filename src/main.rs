mod auth;
mod cache;
mod config;
mod detached;
mod gradient;
mod managed;
mod models;
mod novelty;
mod org;
mod preseeded;
mod providers;
mod registry;
mod resolver;
mod routes;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::{AuthProvider, ClientCredentialsAuth};
use crate::config::{ProviderKind, ResolverConfig};
use crate::managed::HttpManagedAssets;
use crate::novelty::NoveltyClassifier;
use crate::org::OrgApi;
use crate::preseeded::{default_catalog, load_catalog, PreseededAssetBank};
use crate::providers::{AsyncJobProvider, DirectProvider, GenerationProvider, ProviderEndpoint};
use crate::registry::HttpRegistry;
use crate::resolver::{BackgroundResolver, ResolverSettings};
use crate::routes::AppState;

fn build_resolver(config: &ResolverConfig, client: reqwest::Client) -> anyhow::Result<BackgroundResolver> {
    let catalog = match &config.preseeded_catalog {
        Some(path) => load_catalog(path)?,
        None => default_catalog(),
    };
    let bank = PreseededAssetBank::new(client.clone(), &config.asset_base_url, catalog);
    let settings = ResolverSettings { dynamic_generation: config.dynamic_generation, provider: config.provider };
    let mut resolver = BackgroundResolver::new(settings, NoveltyClassifier::new(config.novelty.build()), bank);

    match &config.org_credentials {
        Some(creds) => {
            let auth: Arc<dyn AuthProvider> = Arc::new(ClientCredentialsAuth::new(client.clone(), creds));
            let api = OrgApi::new(client.clone(), &creds.base_url, auth);
            resolver = resolver
                .with_registry(Arc::new(HttpRegistry::new(api.clone())))
                .with_managed(Arc::new(HttpManagedAssets::new(api)));
        }
        None => tracing::info!("ℹ️ No org credentials, registry and CMS tiers disabled"),
    }

    match (&config.provider_credentials, config.provider) {
        (Some(creds), kind) if kind.generates() => {
            let auth: Arc<dyn AuthProvider> = Arc::new(ClientCredentialsAuth::new(client.clone(), creds));
            let endpoint = ProviderEndpoint::new(client, &creds.base_url, auth);
            let generator: Arc<dyn GenerationProvider> = match kind {
                ProviderKind::Async => Arc::new(AsyncJobProvider::new(endpoint, config.poll)),
                _ => Arc::new(DirectProvider::new(endpoint)),
            };
            tracing::info!("🎨 Generation provider: {}", generator.name());
            resolver = resolver.with_generator(generator);
        }
        (_, kind) => tracing::info!("ℹ️ Generation disabled (provider: {:?})", kind),
    }

    Ok(resolver)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = ResolverConfig::from_env();
    tracing::info!(
        "⚙️ Dynamic generation: {}, provider: {:?}, novelty: {:?}",
        config.dynamic_generation, config.provider, config.novelty
    );

    let resolver = Arc::new(build_resolver(&config, reqwest::Client::new())?);
    let state = AppState { resolver: resolver.clone() };
    let app = routes::router(state, &config.asset_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    tracing::info!("🧹 Waiting for {} pending write-backs", resolver.tasks().pending());
    resolver.tasks().drain().await;
    Ok(())
}
