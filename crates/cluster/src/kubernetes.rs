//! Kubernetes 구현: kube-rs 기반 클라이언트와 파드 watcher
//!
//! - [`KubeClusterClient`]: 어노테이션 조회/merge patch, 파드 목록
//! - [`KubePodWatcher`]: `kube::runtime::watcher` 스트림을 [`PodEvent`]로 변환하여
//!   [`PodEventSenders`]로 전달
//!
//! 어노테이션 쓰기는 `metadata.annotations`에 대한 JSON merge patch이므로
//! 주어진 키 외의 어노테이션은 변경되지 않습니다.

use std::collections::BTreeMap;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod as K8sPod;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::runtime::{WatchStreamExt, watcher};
use metrics::counter;
use serde_json::{Map, Value, json};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use perceptor_core::metrics as m;
use perceptor_core::types::{Container, Pod, PodKey};

use crate::client::ClusterClient;
use crate::config::ClusterClientConfig;
use crate::error::ClusterError;
use crate::event::{PodEvent, PodEventSenders};
use crate::watch::PodTracker;

/// kube-rs 기반 [`ClusterClient`]
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
    namespace: Option<String>,
}

impl KubeClusterClient {
    /// in-cluster 설정 또는 kubeconfig로 연결합니다.
    pub async fn connect(config: &ClusterClientConfig) -> Result<Self, ClusterError> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| ClusterError::Connection(format!("failed to create kube client: {e}")))?;
        info!(
            namespace = config.namespace.as_deref().unwrap_or("<all>"),
            "connected to kubernetes api"
        );
        Ok(Self::with_client(client, config.namespace.clone()))
    }

    /// 이미 생성된 `kube::Client`로 만듭니다.
    pub fn with_client(client: kube::Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    /// 이 클라이언트의 범위를 감시하는 watcher를 만듭니다.
    pub fn pod_watcher(&self, senders: PodEventSenders) -> KubePodWatcher {
        KubePodWatcher {
            api: self.scoped(),
            senders,
            tracker: PodTracker::new(),
        }
    }

    fn pods_in(&self, namespace: &str) -> Api<K8sPod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn scoped(&self) -> Api<K8sPod> {
        match &self.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    async fn patch_annotations(&self, pod: &PodKey, annotations: Value) -> Result<(), ClusterError> {
        let patch = json!({ "metadata": { "annotations": annotations } });
        self.pods_in(&pod.namespace)
            .patch(&pod.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(pod, e))?;
        Ok(())
    }
}

impl ClusterClient for KubeClusterClient {
    async fn get_annotations(&self, pod: &PodKey) -> Result<BTreeMap<String, String>, ClusterError> {
        let found = self
            .pods_in(&pod.namespace)
            .get(&pod.name)
            .await
            .map_err(|e| map_kube_error(pod, e))?;
        Ok(found.metadata.annotations.unwrap_or_default())
    }

    async fn set_annotations(
        &self,
        pod: &PodKey,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), ClusterError> {
        let value = serde_json::to_value(&annotations)
            .map_err(|e| ClusterError::Serialization(e.to_string()))?;
        self.patch_annotations(pod, value).await?;
        debug!(pod = %pod, keys = annotations.len(), "pod annotations patched");
        Ok(())
    }

    async fn clear_annotation(&self, pod: &PodKey, key: &str) -> Result<(), ClusterError> {
        // merge patch에서 null은 키 삭제
        let mut removal = Map::new();
        removal.insert(key.to_owned(), Value::Null);
        self.patch_annotations(pod, Value::Object(removal)).await?;
        debug!(pod = %pod, key, "pod annotation cleared");
        Ok(())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, ClusterError> {
        let list = self
            .scoped()
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::Api(format!("list pods failed: {e}")))?;
        Ok(list.items.iter().filter_map(pod_from_k8s).collect())
    }
}

/// watch 스트림을 파드 이벤트로 변환하는 태스크
pub struct KubePodWatcher {
    api: Api<K8sPod>,
    senders: PodEventSenders,
    tracker: PodTracker,
}

impl KubePodWatcher {
    /// 백그라운드 태스크로 실행합니다.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<(), ClusterError>> {
        tokio::spawn(self.run(cancel))
    }

    /// 취소되거나 수신 측이 닫힐 때까지 실행합니다.
    ///
    /// watch 에러는 기록 후 재시도(backoff)되며, 스트림이 끝나면 에러로 종료합니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ClusterError> {
        let stream = watcher(self.api.clone(), watcher::Config::default()).default_backoff();
        let mut stream = std::pin::pin!(stream);
        info!("pod watcher started");

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => break,
                item = stream.next() => item,
            };
            match item {
                Some(Ok(event)) => {
                    for pod_event in self.translate(event) {
                        tokio::select! {
                            _ = cancel.cancelled() => return Ok(()),
                            sent = self.senders.send(pod_event) => sent?,
                        }
                    }
                }
                Some(Err(e)) => {
                    counter!(m::CLUSTER_WATCH_ERRORS_TOTAL).increment(1);
                    warn!(error = %e, "pod watch error, retrying");
                }
                None => return Err(ClusterError::Watch("watch stream ended".to_owned())),
            }
        }

        info!(tracked_pods = self.tracker.len(), "pod watcher stopped");
        Ok(())
    }

    fn translate(&mut self, event: watcher::Event<K8sPod>) -> Vec<PodEvent> {
        match event {
            watcher::Event::Init => {
                debug!("pod watch resync started");
                self.tracker.begin_resync();
                Vec::new()
            }
            watcher::Event::InitApply(pod) | watcher::Event::Apply(pod) => pod_from_k8s(&pod)
                .and_then(|pod| self.tracker.apply(pod))
                .into_iter()
                .collect(),
            watcher::Event::Delete(pod) => pod_key_from_k8s(&pod)
                .and_then(|key| self.tracker.delete(&key))
                .into_iter()
                .collect(),
            watcher::Event::InitDone => {
                let deletes = self.tracker.finish_resync();
                debug!(vanished = deletes.len(), "pod watch resync finished");
                deletes
            }
        }
    }
}

/// k8s 파드 객체를 스냅샷으로 변환합니다. 이름이 없으면 `None`.
///
/// 이미지가 비어 있는 컨테이너는 제외합니다.
pub fn pod_from_k8s(pod: &K8sPod) -> Option<Pod> {
    let key = pod_key_from_k8s(pod)?;
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .filter_map(|c| {
                    c.image
                        .as_deref()
                        .filter(|image| !image.is_empty())
                        .map(|image| Container::new(c.name.clone(), image))
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Pod {
        namespace: key.namespace,
        name: key.name,
        uid: pod.metadata.uid.clone().unwrap_or_default(),
        containers,
    })
}

fn pod_key_from_k8s(pod: &K8sPod) -> Option<PodKey> {
    let name = pod.metadata.name.clone()?;
    let namespace = pod
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_owned());
    Some(PodKey::new(namespace, name))
}

fn map_kube_error(pod: &PodKey, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => {
            ClusterError::PodNotFound(pod.to_string())
        }
        other => ClusterError::Api(format!("pod {pod}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container as K8sContainer, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn k8s_pod(name: Option<&str>, images: &[(&str, Option<&str>)]) -> K8sPod {
        K8sPod {
            metadata: ObjectMeta {
                name: name.map(str::to_owned),
                namespace: Some("apps".to_owned()),
                uid: Some("uid-1".to_owned()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: images
                    .iter()
                    .map(|(n, image)| K8sContainer {
                        name: (*n).to_owned(),
                        image: image.map(str::to_owned),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn converts_pod_snapshot() {
        let pod = pod_from_k8s(&k8s_pod(
            Some("web"),
            &[("app", Some("nginx:1.25")), ("init", None), ("empty", Some(""))],
        ))
        .unwrap();

        assert_eq!(pod.key(), PodKey::new("apps", "web"));
        assert_eq!(pod.uid, "uid-1");
        assert_eq!(pod.containers, vec![Container::new("app", "nginx:1.25")]);
    }

    #[test]
    fn nameless_pod_is_skipped() {
        assert!(pod_from_k8s(&k8s_pod(None, &[("app", Some("nginx"))])).is_none());
    }

    #[test]
    fn missing_namespace_defaults() {
        let mut raw = k8s_pod(Some("web"), &[]);
        raw.metadata.namespace = None;
        assert_eq!(pod_key_from_k8s(&raw), Some(PodKey::new("default", "web")));
    }
}
