use crate::backend::ExternalResourceBackend;
use crate::constants::CREATE_DELAY;
use crate::error::{self, Error, Result};
use crate::event::{Event, EventType};
use crate::queue::WorkQueue;
use log::{debug, error, info, trace, warn};
use model::clients::{HttpStatusCode, ResourceStore};
use model::condition::reconcile_failed;
use model::constants::FINALIZER_MAIN;
use model::ResourceDocument;
use snafu::ResultExt;
use std::sync::Arc;

/// Takes events off the queue and runs them against a backend.
pub(crate) struct Worker<S, B> {
    queue: WorkQueue<Event>,
    store: Arc<S>,
    backend: Arc<B>,
    max_retries: u32,
}

impl<S, B> Worker<S, B>
where
    S: ResourceStore + 'static,
    B: ExternalResourceBackend + 'static,
{
    pub(crate) fn new(
        queue: WorkQueue<Event>,
        store: Arc<S>,
        backend: Arc<B>,
        max_retries: u32,
    ) -> Self {
        Self {
            queue,
            store,
            backend,
            max_retries,
        }
    }

    /// Runs `count` workers until the queue shuts down.
    pub(crate) async fn run_workers(self: Arc<Self>, count: usize) {
        let handles: Vec<_> = (0..count.max(1))
            .map(|id| {
                let worker = Arc::clone(&self);
                tokio::spawn(async move {
                    trace!("worker {} started", id);
                    worker.run().await;
                    trace!("worker {} stopped", id);
                })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("worker task failed: {}", e);
            }
        }
    }

    pub(crate) async fn run(&self) {
        while let Some(event) = self.queue.get().await {
            let result = self.handle(&event).await;
            self.handle_err(&event, result).await;
            self.queue.done(&event);
        }
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        debug!("processing {}", event);
        let object_ref = &event.object_ref;
        let mut document = match self.store.get(object_ref).await {
            Ok(document) => document,
            Err(e) if e.is_not_found() => {
                debug!("skipping {}, the object no longer exists", event);
                return Ok(());
            }
            Err(e) => {
                return Err(e).context(error::FetchSnafu {
                    object: object_ref.to_string(),
                })
            }
        };
        document.strip_transient_metadata();

        let event_type = if document.is_delete_requested() {
            EventType::Delete
        } else {
            event.event_type
        };
        if event_type != EventType::Delete && !document.has_finalizer(FINALIZER_MAIN) {
            document = self
                .store
                .add_finalizer(FINALIZER_MAIN, &document)
                .await
                .context(error::AddFinalizerSnafu {
                    object: object_ref.to_string(),
                    finalizer: FINALIZER_MAIN,
                })?;
            document.strip_transient_metadata();
        }

        let context = || error::BackendSnafu {
            event: event_type.to_string(),
            object: object_ref.to_string(),
        };
        match event_type {
            EventType::Observe => match self.backend.observe(&document).await {
                Ok(true) => trace!("{} is up to date", object_ref),
                Ok(false) => {
                    info!("{} has no external resource, creating it", object_ref);
                    self.queue.add_after(
                        Event::new(EventType::Create, object_ref.clone()),
                        CREATE_DELAY,
                    );
                }
                Err(e) if e.is_not_found() => {
                    if e.is_drift() {
                        info!("{} drifted, updating it: {}", object_ref, e);
                    } else {
                        info!("{} needs an update: {}", object_ref, e);
                    }
                    self.queue
                        .add(Event::new(EventType::Update, object_ref.clone()));
                }
                Err(e) => return Err(e).context(context()),
            },
            EventType::Create => self.backend.create(&document).await.context(context())?,
            EventType::Update => self.backend.update(&document).await.context(context())?,
            EventType::Delete => self.backend.delete(&document).await.context(context())?,
        }
        Ok(())
    }

    /// Retries failed events with backoff until they have been retried `max_retries` times, then
    /// drops them and marks the object as failed.
    async fn handle_err(&self, event: &Event, result: Result<()>) {
        let e = match result {
            Ok(()) => {
                self.queue.forget(event);
                return;
            }
            Err(e) if e.is_gone() => {
                debug!("{} went away: {}", event, e);
                self.queue.forget(event);
                return;
            }
            Err(e) => e,
        };

        let requeues = self.queue.num_requeues(event);
        if requeues < self.max_retries {
            warn!(
                "{} failed, retry {} of {}: {}",
                event,
                requeues + 1,
                self.max_retries,
                e
            );
            self.queue.add_rate_limited(event.clone());
        } else {
            error!("dropping {} after {} retries: {}", event, requeues, e);
            self.queue.forget(event);
            if let Err(status_err) = self.mark_failed(event, &e).await {
                warn!("unable to record failure of {}: {}", event, status_err);
            }
        }
    }

    async fn mark_failed(&self, event: &Event, e: &Error) -> Result<()> {
        let object = event.object_ref.to_string();
        let mut document: ResourceDocument = self
            .store
            .get(&event.object_ref)
            .await
            .context(error::FetchSnafu { object: &object })?;
        document
            .set_condition(reconcile_failed(e.diagnostic()))
            .context(error::MarkFailedSnafu { object: &object })?;
        self.store
            .update_status(&document)
            .await
            .context(error::UpdateStatusSnafu { object })?;
        Ok(())
    }
}
