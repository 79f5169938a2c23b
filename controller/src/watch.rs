use crate::constants::WATCH_ERROR_DELAY;
use crate::event::{Event, EventType};
use crate::queue::WorkQueue;
use futures::StreamExt;
use kube::api::ListParams;
use kube::core::{ApiResource, DynamicObject};
use kube::Api;
use kube_runtime::watcher;
use log::{debug, trace, warn};
use model::{CrdExt, ObjectRef};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Turns watch notifications into queue events. The cache of last seen specs is only touched by
/// the watch task.
pub(crate) struct WatchSource {
    api: Api<DynamicObject>,
    api_resource: ApiResource,
    queue: WorkQueue<Event>,
    resync_interval: Duration,
    seen: HashMap<ObjectRef, Value>,
}

impl WatchSource {
    pub(crate) fn new(
        api: Api<DynamicObject>,
        api_resource: ApiResource,
        queue: WorkQueue<Event>,
        resync_interval: Duration,
    ) -> Self {
        Self {
            api,
            api_resource,
            queue,
            resync_interval,
            seen: HashMap::new(),
        }
    }

    /// Watches until `cancel` fires. Every `resync_interval` every known object is observed again.
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        let stream = watcher(self.api.clone(), ListParams::default());
        futures::pin_mut!(stream);
        let mut resync = tokio::time::interval_at(
            tokio::time::Instant::now() + self.resync_interval,
            self.resync_interval,
        );
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("stopping watch of {}", self.api_resource.plural);
                    return;
                }
                _ = resync.tick() => self.resync(),
                next = stream.next() => match next {
                    Some(Ok(event)) => self.handle(event),
                    Some(Err(e)) => {
                        warn!("watch of {} failed: {}", self.api_resource.plural, e);
                        tokio::time::sleep(WATCH_ERROR_DELAY).await;
                    }
                    None => {
                        warn!("watch of {} ended", self.api_resource.plural);
                        return;
                    }
                },
            }
        }
    }

    fn handle(&mut self, event: watcher::Event<DynamicObject>) {
        match event {
            watcher::Event::Applied(object) => self.applied(&object),
            watcher::Event::Deleted(object) => {
                trace!("{} was deleted", object.name_or_empty());
                self.seen.remove(&self.object_ref(&object));
            }
            watcher::Event::Restarted(objects) => {
                let refs: Vec<ObjectRef> = objects.iter().map(|o| self.object_ref(o)).collect();
                self.seen.retain(|r, _| refs.contains(r));
                for object in &objects {
                    self.applied(object);
                }
            }
        }
    }

    fn applied(&mut self, object: &DynamicObject) {
        let object_ref = self.object_ref(object);
        let event_type = classify(self.seen.get(&object_ref), object);
        self.seen.insert(object_ref.clone(), object.spec());
        self.queue.add(Event::new(event_type, object_ref));
    }

    fn resync(&self) {
        trace!("resyncing {} objects", self.seen.len());
        for object_ref in self.seen.keys() {
            self.queue
                .add(Event::new(EventType::Observe, object_ref.clone()));
        }
    }

    fn object_ref(&self, object: &DynamicObject) -> ObjectRef {
        object.object_ref_for(&self.api_resource)
    }
}

/// Decides what a notification about `object` means, given the spec last seen for it.
pub(crate) fn classify(previous_spec: Option<&Value>, object: &DynamicObject) -> EventType {
    if object.is_delete_requested() {
        return EventType::Delete;
    }
    match previous_spec {
        Some(previous) if *previous != object.spec() => EventType::Update,
        _ => EventType::Observe,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use serde_json::json;

    fn object(spec: Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "composer.dev/v1alpha1",
            "kind": "Repo",
            "metadata": { "name": "demo", "namespace": "default" },
            "spec": spec,
        }))
        .unwrap()
    }

    #[test]
    fn first_sighting_is_observed() {
        assert_eq!(classify(None, &object(json!({"a": 1}))), EventType::Observe);
    }

    #[test]
    fn spec_change_is_an_update() {
        let previous = json!({"a": 1});
        assert_eq!(
            classify(Some(&previous), &object(json!({"a": 2}))),
            EventType::Update
        );
        assert_eq!(
            classify(Some(&previous), &object(json!({"a": 1}))),
            EventType::Observe
        );
    }

    #[test]
    fn deletion_wins() {
        let mut o = object(json!({"a": 2}));
        o.metadata.deletion_timestamp = Some(Time(chrono_now()));
        assert_eq!(classify(Some(&json!({"a": 1})), &o), EventType::Delete);
        assert_eq!(classify(None, &o), EventType::Delete);
    }

    fn chrono_now() -> k8s_openapi::chrono::DateTime<k8s_openapi::chrono::Utc> {
        k8s_openapi::chrono::Utc::now()
    }
}
