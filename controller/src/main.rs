/*!

This [controller] keeps external resources in line with the custom resources that describe them.
It watches one resource kind, queues an event for every change and lets a pool of workers observe,
create, update or delete the matching external resource, either through an HTTP API described by
an OpenAPI document or by installing a Helm chart.

[controller]: https://kubernetes.io/docs/concepts/architecture/controller/

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

use crate::backend::chart::{ChartBackend, HelmCli};
use crate::backend::rest::RestBackend;
use crate::backend::ExternalResourceBackend;
use crate::config::{Args, BackendKind};
use crate::error::Result;
use crate::event::Event;
use crate::queue::{default_rate_limiter, WorkQueue};
use crate::watch::WatchSource;
use crate::worker::Worker;
use clap::Parser;
use env_logger::Builder;
use kube::core::{ApiResource, DynamicObject};
use kube::Api;
use log::{error, info, LevelFilter};
use model::clients::{new_k8s_client, Discovery, KubeDiscovery, KubeStore};
use snafu::ResultExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod backend;
mod config;
mod constants;
mod error;
mod event;
#[cfg(test)]
mod mock;
mod queue;
mod watch;
mod worker;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.debug);
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let gvr = args.gvr();
    info!(
        "Starting: resource '{}' in namespace '{}', {} workers, resync every {:?}",
        gvr, args.namespace, args.workers, args.resync_interval
    );

    // Initialize the k8s client from in-cluster variables or KUBECONFIG.
    let client = new_k8s_client().await.context(error::ClientSnafu)?;
    let discovery = KubeDiscovery::new(client.clone());
    let api_resource = discovery
        .resolve_resource(&gvr)
        .await
        .context(error::DiscoverySnafu {
            resource: gvr.to_string(),
        })?;
    let api: Api<DynamicObject> =
        Api::namespaced_with(client.clone(), &args.namespace, &api_resource);
    let store = Arc::new(KubeStore::new(client, discovery));

    match args.backend {
        BackendKind::Rest => {
            let http = reqwest::Client::builder()
                .build()
                .context(error::HttpClientSnafu)?;
            let definitions = args.definition_source().await?;
            let backend = RestBackend::new(Arc::clone(&store), definitions, http);
            serve(&args, api, api_resource, store, backend).await;
        }
        BackendKind::Chart => {
            let source = args.chart_source();
            let backend = ChartBackend::new(Arc::clone(&store), HelmCli::default(), source);
            serve(&args, api, api_resource, store, backend).await;
        }
    }
    info!("Stopped");
    Ok(())
}

/// Runs the watch and the workers until a signal arrives, then lets in-flight events finish.
async fn serve<B>(
    args: &Args,
    api: Api<DynamicObject>,
    api_resource: ApiResource,
    store: Arc<KubeStore<KubeDiscovery>>,
    backend: B,
) where
    B: ExternalResourceBackend + 'static,
{
    let queue: WorkQueue<Event> = WorkQueue::new(default_rate_limiter());
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let watch = WatchSource::new(api, api_resource, queue.clone(), args.resync_interval);
    let watch = tokio::spawn({
        let cancel = cancel.clone();
        let queue = queue.clone();
        async move {
            watch.run(cancel).await;
            queue.shut_down();
        }
    });

    let worker = Worker::new(queue, store, Arc::new(backend), args.max_retries);
    Arc::new(worker).run_workers(args.workers).await;

    cancel.cancel();
    if let Err(e) = watch.await {
        error!("watch task failed: {}", e);
    }
}

/// Fires `cancel` on SIGINT or SIGTERM.
async fn cancel_on_signal(cancel: CancellationToken) {
    let interrupt = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = interrupt => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                error!("unable to listen for SIGTERM: {}", e);
                let _ = interrupt.await;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = interrupt.await;
    info!("Shutting down");
    cancel.cancel();
}

/// Extract the value of `RUST_LOG` if it exists, otherwise log this crate and its libraries at
/// `Info`, or at `Trace` when `debug` is set.
fn init_logger(debug: bool) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            let level = if debug {
                LevelFilter::Trace
            } else {
                DEFAULT_LEVEL_FILTER
            };
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("composer_model"), level)
                .filter(Some("composer_restclient"), level)
                .init();
        }
    }
}

/// The log level used when neither `RUST_LOG` nor `--debug` is given.
const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;
