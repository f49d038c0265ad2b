//! 파드 스냅샷 추적기
//!
//! watch 스트림은 "현재 상태"만 알려주므로, 마지막으로 본 스냅샷을 기억해 두고
//! Add/Update/Delete 이벤트로 변환합니다. 재동기화(relist) 중에는 수집만 하고,
//! 완료 시점에 사라진 파드를 Delete로 보고합니다.

use std::collections::{BTreeMap, BTreeSet};

use perceptor_core::types::{Pod, PodKey};

use crate::event::{AddPod, DeletePod, PodEvent, UpdatePod};

/// 마지막 스냅샷 기반 이벤트 변환기
#[derive(Debug, Default)]
pub struct PodTracker {
    known: BTreeMap<PodKey, Pod>,
    resync: Option<BTreeSet<PodKey>>,
}

impl PodTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 추적 중인 파드 수
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// 파드가 생성/변경되었음을 반영합니다.
    ///
    /// 처음 보는 파드는 Add, 스냅샷이 달라진 파드는 Update,
    /// 동일한 스냅샷은 이벤트 없음입니다.
    pub fn apply(&mut self, pod: Pod) -> Option<PodEvent> {
        let key = pod.key();
        if let Some(seen) = self.resync.as_mut() {
            seen.insert(key.clone());
        }
        match self.known.insert(key, pod.clone()) {
            None => Some(PodEvent::Add(AddPod { new: pod })),
            Some(old) if old == pod => None,
            Some(old) => Some(PodEvent::Update(UpdatePod { old, new: pod })),
        }
    }

    /// 파드가 삭제되었음을 반영합니다. 모르는 파드면 이벤트 없음.
    pub fn delete(&mut self, key: &PodKey) -> Option<PodEvent> {
        self.known
            .remove(key)
            .map(|_| PodEvent::Delete(DeletePod { id: key.clone() }))
    }

    /// 재동기화를 시작합니다.
    pub fn begin_resync(&mut self) {
        self.resync = Some(BTreeSet::new());
    }

    /// 재동기화를 마치고, 그 사이 보이지 않은 파드를 Delete로 반환합니다.
    pub fn finish_resync(&mut self) -> Vec<PodEvent> {
        let Some(seen) = self.resync.take() else {
            return Vec::new();
        };
        let gone: Vec<PodKey> = self
            .known
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        gone.iter().filter_map(|key| self.delete(key)).collect()
    }
}
