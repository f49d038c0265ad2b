//! Pod factories and waiters against the mock cluster.

use std::time::Duration;

use perceptor_cluster::{AddPod, MockClusterClient, PodEvent};
use perceptor_core::annotations::ANNOTATION_KEY;
use perceptor_core::types::{Container, Pod, PodKey};
use perceptor_daemon::orchestrator::Orchestrator;

/// A pod in namespace `ns` with containers `c1`, `c2`, ... running `images`.
pub fn pod(name: &str, images: &[&str]) -> Pod {
    Pod {
        namespace: "ns".to_owned(),
        name: name.to_owned(),
        uid: format!("uid-{name}"),
        containers: images
            .iter()
            .enumerate()
            .map(|(i, image)| Container::new(format!("c{}", i + 1), *image))
            .collect(),
    }
}

pub fn cluster(orchestrator: &Orchestrator) -> &MockClusterClient {
    orchestrator
        .harness()
        .cluster
        .as_deref()
        .expect("mock cluster mode")
}

/// Put the pod into the mock cluster and announce it to the engine.
pub async fn add_pod(orchestrator: &Orchestrator, pod: Pod) {
    cluster(orchestrator).add_pod(pod.clone());
    orchestrator
        .harness()
        .events
        .as_ref()
        .expect("mock cluster mode")
        .send(PodEvent::Add(AddPod { new: pod }))
        .await
        .expect("engine should accept pod events");
}

/// Wait until the pod's annotation blob mentions every image, or panic.
pub async fn wait_for_blob(orchestrator: &Orchestrator, pod: &str, images: &[&str]) -> String {
    let key = PodKey::new("ns", pod);
    for _ in 0..600 {
        let blob = cluster(orchestrator)
            .annotations(&key)
            .and_then(|annotations| annotations.get(ANNOTATION_KEY).cloned())
            .filter(|blob| images.iter().all(|image| blob.contains(image)));
        if let Some(blob) = blob {
            return blob;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("pod {key} was never annotated with {images:?}");
}
