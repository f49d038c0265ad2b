//! Cluster API abstraction for testability.
//!
//! The [`ClusterClient`] trait covers the four pod operations the engine and
//! the operator CLI need. Production code uses
//! [`KubeClusterClient`](crate::kubernetes::KubeClusterClient); tests and the
//! daemon's mock mode use [`MockClusterClient`](crate::mock::MockClusterClient).
//!
//! ```text
//!   ┌──────────────┐
//!   │ ClusterClient│ (trait)
//!   └──────────────┘
//!        │      │
//!        ▼      ▼
//!   ┌──────┐ ┌──────┐
//!   │ Kube │ │ Mock │
//!   └──┬───┘ └──────┘
//!      ▼
//!  API server
//! ```
//!
//! # Write semantics
//!
//! [`set_annotations`](ClusterClient::set_annotations) writes only the keys it
//! is given; every other annotation on the pod is left untouched. There is no
//! resource-version check, so a single writer per annotation key is assumed.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use perceptor_core::types::{Pod, PodKey};

use crate::error::ClusterError;

/// Pod read/write operations against the cluster.
pub trait ClusterClient: Send + Sync + 'static {
    /// Returns all annotations currently set on the pod.
    ///
    /// # Errors
    ///
    /// - `ClusterError::PodNotFound`: the pod no longer exists
    /// - `ClusterError::Api`: any other API failure
    fn get_annotations(
        &self,
        pod: &PodKey,
    ) -> impl Future<Output = Result<BTreeMap<String, String>, ClusterError>> + Send;

    /// Sets the given annotation keys on the pod, leaving other keys as they are.
    fn set_annotations(
        &self,
        pod: &PodKey,
        annotations: BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// Removes a single annotation key from the pod. Removing an absent key succeeds.
    fn clear_annotation(
        &self,
        pod: &PodKey,
        key: &str,
    ) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// Lists the pods in scope (one namespace or the whole cluster).
    fn list_pods(&self) -> impl Future<Output = Result<Vec<Pod>, ClusterError>> + Send;
}

impl<T: ClusterClient> ClusterClient for Arc<T> {
    fn get_annotations(
        &self,
        pod: &PodKey,
    ) -> impl Future<Output = Result<BTreeMap<String, String>, ClusterError>> + Send {
        (**self).get_annotations(pod)
    }

    fn set_annotations(
        &self,
        pod: &PodKey,
        annotations: BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), ClusterError>> + Send {
        (**self).set_annotations(pod, annotations)
    }

    fn clear_annotation(
        &self,
        pod: &PodKey,
        key: &str,
    ) -> impl Future<Output = Result<(), ClusterError>> + Send {
        (**self).clear_annotation(pod, key)
    }

    fn list_pods(&self) -> impl Future<Output = Result<Vec<Pod>, ClusterError>> + Send {
        (**self).list_pods()
    }
}
