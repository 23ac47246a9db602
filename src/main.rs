//! License Panel server binary

use license_panel::{config::ServerConfig, jobs, server, AppContext, PanelResult};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> PanelResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "license_panel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    __    _                              ____                  __
   / /   (_)_______  ____  ________     / __ \____ _____  ___  / /
  / /   / / ___/ _ \/ __ \/ ___/ _ \   / /_/ / __ `/ __ \/ _ \/ /
 / /___/ / /__/  __/ / / (__  )  __/  / ____/ /_/ / / / /  __/ /
/_____/_/\___/\___/_/ /_/____/\___/  /_/    \__,_/_/ /_/\___/_/

        License Panel v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
