use std::{sync::Arc, time::Duration};

use guard_common::GuardConfig;
use guard_credentials::CredentialManager;
use guard_state::{ConsensusLayer, ExecutionLayer};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

use crate::{
    authentication::Auth,
    proxy::UpstreamProxy,
    router::{build_router, GuardApi},
};

/// How long in-flight requests get to finish once shutdown is signalled.
pub(crate) const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Serves the guarded proxy until `shutdown` flips, then drains for up to
/// [`SHUTDOWN_DEADLINE`] before aborting remaining connections.
pub async fn run_api_service<CL: ConsensusLayer, EL: ExecutionLayer>(
    config: GuardConfig,
    cl: Arc<CL>,
    el: Arc<EL>,
    mut shutdown: watch::Receiver<bool>,
) -> eyre::Result<()> {
    let auth = Arc::new(Auth::new(
        CredentialManager::new(&config.credential_secret),
        Duration::from_secs(config.auth_validity_window_secs),
        config.enable_solo_validators,
    ));
    let proxy = UpstreamProxy::new(config.beacon_url.clone(), &config.upstream)?;
    let api = Arc::new(GuardApi::new(cl, el, proxy, config.max_body_bytes));
    let router = build_router(api, auth);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, upstream = %config.beacon_url, "proxy listening");

    let mut graceful = shutdown.clone();
    let server = std::future::IntoFuture::into_future(axum::serve(
        listener,
        router.into_make_service(),
    )
    .with_graceful_shutdown(async move {
        let _ = graceful.changed().await;
    }));
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = drain_deadline(&mut shutdown) => {
            warn!("shutdown deadline reached, aborting in-flight requests");
        }
    }

    Ok(())
}

async fn drain_deadline(shutdown: &mut watch::Receiver<bool>) {
    // The drain clock only starts once shutdown is actually signalled.
    let _ = shutdown.changed().await;
    tokio::time::sleep(SHUTDOWN_DEADLINE).await;
}
