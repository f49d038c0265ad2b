//! 루프별 처리 카운터

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 오케스트레이터 처리 카운터
///
/// 루프들이 공유하며, [`snapshot`](Self::snapshot)으로 현재 값을 읽습니다.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub(crate) events_ingested: AtomicU64,
    pub(crate) scans_submitted: AtomicU64,
    pub(crate) scans_failed: AtomicU64,
    pub(crate) polls: AtomicU64,
    pub(crate) results_merged: AtomicU64,
    pub(crate) annotations_written: AtomicU64,
    pub(crate) annotation_failures: AtomicU64,
}

/// [`EngineStats`]의 한 시점 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_ingested: u64,
    pub scans_submitted: u64,
    pub scans_failed: u64,
    pub polls: u64,
    pub results_merged: u64,
    pub annotations_written: u64,
    pub annotation_failures: u64,
}

impl EngineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            scans_submitted: self.scans_submitted.load(Ordering::Relaxed),
            scans_failed: self.scans_failed.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            results_merged: self.results_merged.load(Ordering::Relaxed),
            annotations_written: self.annotations_written.load(Ordering::Relaxed),
            annotation_failures: self.annotation_failures.load(Ordering::Relaxed),
        }
    }
}
