// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Feeding watch events into the reflector caches and the resolver queue.
//!
//! Updates that touch neither labels, spec nor the kube-bind provenance
//! annotation (status, managed fields, resource version bumps) never change
//! a resolution result and are dropped.
//! Deletions always pass. After a relist, keys that disappeared without a
//! delete event are reported as deletions.

use crate::constants::kube_bind::CLUSTER_NAMESPACE_ANNOTATION;
use crate::resolver::{ReconcileRequest, ResolverHandle};
use crate::types::{EdgePlacement, Location, SyncTarget};
use futures::{Future, StreamExt};
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::api::ObjectMeta;
use kube::{Api, Resource};
use kube_runtime::watcher::Config as WatcherConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::pin::pin;
use tracing::{debug, info, warn};

/// A kind whose changes are turned into [`ReconcileRequest`]s
pub trait WatchedKind:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static
{
    /// Digest of the parts of the object that selection depends on
    fn fingerprint(&self) -> u64;

    fn request(key: ObjectRef<Self>) -> ReconcileRequest;
}

impl WatchedKind for EdgePlacement {
    fn fingerprint(&self) -> u64 {
        fingerprint_of(self.meta(), &self.spec)
    }

    fn request(key: ObjectRef<Self>) -> ReconcileRequest {
        ReconcileRequest::EdgePlacement(key)
    }
}

impl WatchedKind for Location {
    fn fingerprint(&self) -> u64 {
        fingerprint_of(self.meta(), &self.spec)
    }

    fn request(key: ObjectRef<Self>) -> ReconcileRequest {
        ReconcileRequest::Location(key)
    }
}

impl WatchedKind for SyncTarget {
    fn fingerprint(&self) -> u64 {
        // uid is carried into published destinations
        let mut hasher = DefaultHasher::new();
        fingerprint_of(self.meta(), &self.spec).hash(&mut hasher);
        self.meta().uid.hash(&mut hasher);
        hasher.finish()
    }

    fn request(key: ObjectRef<Self>) -> ReconcileRequest {
        ReconcileRequest::SyncTarget(key)
    }
}

fn fingerprint_of(meta: &ObjectMeta, spec: &impl Serialize) -> u64 {
    let mut hasher = DefaultHasher::new();
    meta.labels.hash(&mut hasher);
    // tenant identity is derived from this annotation
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(CLUSTER_NAMESPACE_ANNOTATION))
        .hash(&mut hasher);
    serde_json::to_vec(spec).unwrap_or_default().hash(&mut hasher);
    hasher.finish()
}

/// Decides which watch events are worth a reconcile
struct ChangeFilter<K: WatchedKind> {
    seen: HashMap<ObjectRef<K>, u64>,
    /// Keys listed since the current relist started
    relisted: Option<HashSet<ObjectRef<K>>>,
}

impl<K: WatchedKind> Default for ChangeFilter<K> {
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
            relisted: None,
        }
    }
}

impl<K: WatchedKind> ChangeFilter<K> {
    /// Keys to enqueue for `event`
    fn observe(&mut self, event: &watcher::Event<K>) -> Vec<ObjectRef<K>> {
        match event {
            watcher::Event::Apply(obj) => self.applied(obj).into_iter().collect(),
            watcher::Event::InitApply(obj) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(ObjectRef::from_obj(obj));
                }
                self.applied(obj).into_iter().collect()
            }
            watcher::Event::Delete(obj) => {
                let key = ObjectRef::from_obj(obj);
                self.seen.remove(&key);
                vec![key]
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };
                let vanished: Vec<_> = self
                    .seen
                    .keys()
                    .filter(|key| !relisted.contains(*key))
                    .cloned()
                    .collect();
                for key in &vanished {
                    self.seen.remove(key);
                }
                vanished
            }
        }
    }

    fn applied(&mut self, obj: &K) -> Option<ObjectRef<K>> {
        let key = ObjectRef::from_obj(obj);
        let fingerprint = obj.fingerprint();
        if self.seen.insert(key.clone(), fingerprint) == Some(fingerprint) {
            return None;
        }
        Some(key)
    }
}

/// Watch `api` into a reflector cache and forward relevant changes to `handle`.
///
/// Returns the cache and the future driving the watch; the cache only
/// fills while that future is polled.
pub fn reflect<K: WatchedKind>(
    api: Api<K>,
    handle: ResolverHandle,
) -> (Store<K>, impl Future<Output = ()> + Send) {
    let (reader, writer) = reflector::store();
    let stream = reflector::reflector(writer, watcher(api, WatcherConfig::default())).default_backoff();

    let feed = async move {
        let kind = K::kind(&());
        info!("Watching {} objects", kind);

        let mut filter = ChangeFilter::<K>::default();
        let mut stream = pin!(stream);
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    for key in filter.observe(&event) {
                        debug!("{} {} changed", kind, key.name);
                        handle.send(K::request(key)).await;
                    }
                }
                Err(e) => warn!("Error watching {} objects: {}", kind, e),
            }
        }
        warn!("Watch of {} objects ended", kind);
    };

    (reader, feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgePlacementSpec, LocationSpec, SyncTargetSpec};
    use std::collections::BTreeMap;

    fn location(name: &str, labels: &[(&str, &str)]) -> Location {
        let mut loc = Location::new(name, LocationSpec::default());
        loc.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        loc
    }

    fn names(keys: Vec<ObjectRef<Location>>) -> Vec<String> {
        let mut names: Vec<_> = keys.into_iter().map(|k| k.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_unchanged_updates_are_suppressed() {
        let mut filter = ChangeFilter::<Location>::default();
        let loc = location("l1", &[("region", "us")]);

        assert_eq!(names(filter.observe(&watcher::Event::Apply(loc.clone()))), vec!["l1"]);

        let mut status_only = loc.clone();
        status_only.metadata.resource_version = Some("42".to_string());
        assert!(filter.observe(&watcher::Event::Apply(status_only)).is_empty());

        let relabelled = location("l1", &[("region", "eu")]);
        assert_eq!(names(filter.observe(&watcher::Event::Apply(relabelled))), vec!["l1"]);
    }

    #[test]
    fn test_deletes_always_pass() {
        let mut filter = ChangeFilter::<Location>::default();
        let loc = location("l1", &[]);

        assert_eq!(names(filter.observe(&watcher::Event::Delete(loc.clone()))), vec!["l1"]);
        // re-creation after delete is a change again
        assert_eq!(names(filter.observe(&watcher::Event::Apply(loc))), vec!["l1"]);
    }

    #[test]
    fn test_relist_reports_vanished_keys() {
        let mut filter = ChangeFilter::<Location>::default();
        filter.observe(&watcher::Event::Apply(location("l1", &[])));
        filter.observe(&watcher::Event::Apply(location("l2", &[])));

        assert!(filter.observe(&watcher::Event::Init).is_empty());
        assert!(filter
            .observe(&watcher::Event::InitApply(location("l1", &[])))
            .is_empty());
        assert_eq!(names(filter.observe(&watcher::Event::InitDone)), vec!["l2"]);

        // l2 is forgotten, so a second relist does not report it again
        filter.observe(&watcher::Event::Init);
        filter.observe(&watcher::Event::InitApply(location("l1", &[])));
        assert!(filter.observe(&watcher::Event::InitDone).is_empty());
    }

    #[test]
    fn test_sync_target_uid_change_is_a_change() {
        let mut filter = ChangeFilter::<SyncTarget>::default();
        let mut st = SyncTarget::new("s1", SyncTargetSpec::default());
        st.metadata.uid = Some("uid-1".to_string());
        filter.observe(&watcher::Event::Apply(st.clone()));

        st.metadata.uid = Some("uid-2".to_string());
        assert_eq!(filter.observe(&watcher::Event::Apply(st)).len(), 1);
    }

    #[test]
    fn test_late_provenance_annotation_is_a_change() {
        let mut filter = ChangeFilter::<EdgePlacement>::default();
        let mut ep = EdgePlacement::new("kb1-p1", EdgePlacementSpec::default());
        assert_eq!(filter.observe(&watcher::Event::Apply(ep.clone())).len(), 1);

        ep.metadata.annotations = Some(BTreeMap::from([(
            CLUSTER_NAMESPACE_ANNOTATION.to_string(),
            "kb1".to_string(),
        )]));
        assert_eq!(filter.observe(&watcher::Event::Apply(ep.clone())).len(), 1);

        // unrelated annotations are not
        ep.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert("note".to_string(), "x".to_string());
        assert!(filter.observe(&watcher::Event::Apply(ep)).is_empty());
    }
}
