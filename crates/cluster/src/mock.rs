//! 인메모리 클러스터 클라이언트
//!
//! 실제 클러스터 없이 엔진과 데몬을 실행/테스트하기 위한 구현입니다.
//! 파드별로 다음 N번의 쓰기를 실패시키도록 설정할 수 있습니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use perceptor_core::types::{Pod, PodKey};

use crate::client::ClusterClient;
use crate::error::ClusterError;

#[derive(Default)]
struct State {
    pods: BTreeMap<PodKey, MockPod>,
    failing_writes: HashMap<PodKey, u32>,
    writes: u64,
}

struct MockPod {
    pod: Pod,
    annotations: BTreeMap<String, String>,
}

/// 인메모리 [`ClusterClient`] 구현
#[derive(Default)]
pub struct MockClusterClient {
    state: Mutex<State>,
}

impl MockClusterClient {
    /// 파드가 없는 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파드를 등록한 상태로 생성합니다.
    pub fn with_pods(self, pods: impl IntoIterator<Item = Pod>) -> Self {
        for pod in pods {
            self.add_pod(pod);
        }
        self
    }

    /// 파드를 등록합니다. 같은 키가 있으면 스냅샷만 교체하고 어노테이션은 유지합니다.
    pub fn add_pod(&self, pod: Pod) {
        let mut state = self.lock();
        let key = pod.key();
        match state.pods.get_mut(&key) {
            Some(existing) => existing.pod = pod,
            None => {
                state.pods.insert(
                    key,
                    MockPod {
                        pod,
                        annotations: BTreeMap::new(),
                    },
                );
            }
        }
    }

    /// 파드를 제거합니다.
    pub fn remove_pod(&self, key: &PodKey) {
        self.lock().pods.remove(key);
    }

    /// 파드의 다음 `times`번 쓰기를 실패시킵니다.
    pub fn fail_next_writes(&self, key: &PodKey, times: u32) {
        self.lock().failing_writes.insert(key.clone(), times);
    }

    /// 파드의 현재 어노테이션 (테스트 검증용)
    pub fn annotations(&self, key: &PodKey) -> Option<BTreeMap<String, String>> {
        self.lock().pods.get(key).map(|p| p.annotations.clone())
    }

    /// 성공한 쓰기 횟수
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_write(state: &mut State, key: &PodKey) -> Result<(), ClusterError> {
        if let Some(remaining) = state.failing_writes.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClusterError::Api(format!("injected write failure for {key}")));
            }
        }
        Ok(())
    }
}

impl ClusterClient for MockClusterClient {
    async fn get_annotations(&self, pod: &PodKey) -> Result<BTreeMap<String, String>, ClusterError> {
        self.lock()
            .pods
            .get(pod)
            .map(|p| p.annotations.clone())
            .ok_or_else(|| ClusterError::PodNotFound(pod.to_string()))
    }

    async fn set_annotations(
        &self,
        pod: &PodKey,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), ClusterError> {
        let mut state = self.lock();
        if !state.pods.contains_key(pod) {
            return Err(ClusterError::PodNotFound(pod.to_string()));
        }
        Self::check_write(&mut state, pod)?;
        if let Some(entry) = state.pods.get_mut(pod) {
            entry.annotations.extend(annotations);
        }
        state.writes += 1;
        Ok(())
    }

    async fn clear_annotation(&self, pod: &PodKey, key: &str) -> Result<(), ClusterError> {
        let mut state = self.lock();
        if !state.pods.contains_key(pod) {
            return Err(ClusterError::PodNotFound(pod.to_string()));
        }
        Self::check_write(&mut state, pod)?;
        if let Some(entry) = state.pods.get_mut(pod) {
            entry.annotations.remove(key);
        }
        state.writes += 1;
        Ok(())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, ClusterError> {
        Ok(self.lock().pods.values().map(|p| p.pod.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perceptor_core::types::Container;

    fn pod(name: &str) -> Pod {
        Pod {
            namespace: "ns".to_owned(),
            name: name.to_owned(),
            uid: format!("uid-{name}"),
            containers: vec![Container::new("c", "img:1")],
        }
    }

    #[tokio::test]
    async fn set_annotations_touches_only_given_keys() {
        // Given: 다른 컨트롤러의 어노테이션이 있는 파드
        let client = MockClusterClient::new().with_pods([pod("a")]);
        let key = PodKey::new("ns", "a");
        client
            .set_annotations(&key, BTreeMap::from([("other".to_owned(), "x".to_owned())]))
            .await
            .unwrap();

        // When: 다른 키를 기록
        client
            .set_annotations(&key, BTreeMap::from([("BlackDuck".to_owned(), "{}".to_owned())]))
            .await
            .unwrap();

        // Then: 기존 키 유지
        let annotations = client.get_annotations(&key).await.unwrap();
        assert_eq!(annotations.get("other").map(String::as_str), Some("x"));
        assert_eq!(annotations.get("BlackDuck").map(String::as_str), Some("{}"));
        assert_eq!(client.write_count(), 2);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let client = MockClusterClient::new().with_pods([pod("a")]);
        let key = PodKey::new("ns", "a");
        client.fail_next_writes(&key, 1);

        assert!(client.set_annotations(&key, BTreeMap::new()).await.is_err());
        assert!(client.set_annotations(&key, BTreeMap::new()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_pod_is_not_found() {
        let client = MockClusterClient::new();
        let err = client
            .get_annotations(&PodKey::new("ns", "ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::PodNotFound(_)));
    }

    #[tokio::test]
    async fn clear_annotation_removes_key() {
        let client = MockClusterClient::new().with_pods([pod("a")]);
        let key = PodKey::new("ns", "a");
        client
            .set_annotations(&key, BTreeMap::from([("BlackDuck".to_owned(), "{}".to_owned())]))
            .await
            .unwrap();

        client.clear_annotation(&key, "BlackDuck").await.unwrap();
        client.clear_annotation(&key, "absent").await.unwrap();

        assert!(client.annotations(&key).unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_pods_returns_snapshots() {
        let client = MockClusterClient::new().with_pods([pod("a"), pod("b")]);
        client.remove_pod(&PodKey::new("ns", "a"));
        let pods = client.list_pods().await.unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name, "b");
    }
}
