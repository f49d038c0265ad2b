//! `perceptor annotations` command handler
//!
//! Reads and edits the reserved scan-result annotation on a single pod.
//! Writes are merges: other images in the blob and unrelated annotation
//! keys are left untouched.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use tracing::info;

use perceptor_cluster::ClusterClient;
use perceptor_core::annotations::{ANNOTATION_KEY, BlackDuckAnnotations, ImageAnnotation};
use perceptor_core::types::{ImageRef, PodKey};

use crate::cli::{AnnotationsAction, AnnotationsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `annotations` command against any cluster client.
pub async fn execute<C: ClusterClient>(
    args: AnnotationsArgs,
    cluster: &C,
    writer: &OutputWriter,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match args.action {
        AnnotationsAction::Get { namespace, pod } => {
            let report = get(cluster, &PodKey::new(namespace, pod)).await?;
            writer.render_to(&report, out)
        }
        AnnotationsAction::Set {
            namespace,
            pod,
            image,
            policy_violations,
            vulnerabilities,
        } => {
            let annotation = ImageAnnotation {
                policy_violation_count: policy_violations,
                vulnerability_count: vulnerabilities,
            };
            let report = set(
                cluster,
                &PodKey::new(namespace, pod),
                &ImageRef::from(image),
                annotation,
            )
            .await?;
            writer.render_to(&report, out)
        }
        AnnotationsAction::Clear { namespace, pod } => {
            let report = clear(cluster, &PodKey::new(namespace, pod)).await?;
            writer.render_to(&report, out)
        }
    }
}

/// Decode the scan results stored on a pod.
///
/// A missing or malformed blob decodes to an empty report.
pub async fn get<C: ClusterClient>(cluster: &C, pod: &PodKey) -> Result<AnnotationReport, CliError> {
    let annotations = cluster.get_annotations(pod).await?;
    let decoded = BlackDuckAnnotations::from_pod_annotations(&annotations);
    Ok(AnnotationReport::new(pod, &decoded))
}

/// Merge one image's counts into the pod's blob and write it back.
pub async fn set<C: ClusterClient>(
    cluster: &C,
    pod: &PodKey,
    image: &ImageRef,
    annotation: ImageAnnotation,
) -> Result<AnnotationReport, CliError> {
    let annotations = cluster.get_annotations(pod).await?;
    let mut decoded = BlackDuckAnnotations::from_pod_annotations(&annotations);
    decoded.merge_image(image, annotation);

    cluster
        .set_annotations(pod, decoded.to_pod_annotations()?)
        .await?;
    info!(pod = %pod, image = %image, "annotation updated");

    Ok(AnnotationReport::new(pod, &decoded))
}

/// Remove the reserved annotation key from a pod.
pub async fn clear<C: ClusterClient>(cluster: &C, pod: &PodKey) -> Result<ClearReport, CliError> {
    cluster.clear_annotation(pod, ANNOTATION_KEY).await?;
    info!(pod = %pod, key = ANNOTATION_KEY, "annotation cleared");
    Ok(ClearReport {
        pod: pod.to_string(),
        key: ANNOTATION_KEY,
        cleared: true,
    })
}

/// Decoded scan results on one pod.
#[derive(Debug, Serialize)]
pub struct AnnotationReport {
    pub pod: String,
    pub images: Vec<ImageCountsRow>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub key_vals: BTreeMap<String, String>,
}

/// One image row, in image-reference order.
#[derive(Debug, Serialize)]
pub struct ImageCountsRow {
    pub image: String,
    pub policy_violations: u32,
    pub vulnerabilities: u32,
}

impl AnnotationReport {
    fn new(pod: &PodKey, decoded: &BlackDuckAnnotations) -> Self {
        Self {
            pod: pod.to_string(),
            images: decoded
                .image_annotations
                .iter()
                .map(|(image, counts)| ImageCountsRow {
                    image: image.clone(),
                    policy_violations: counts.policy_violation_count,
                    vulnerabilities: counts.vulnerability_count,
                })
                .collect(),
            key_vals: decoded.key_vals.clone(),
        }
    }
}

impl Render for AnnotationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Pod: {}", self.pod.bold())?;
        if self.images.is_empty() {
            return writeln!(w, "  (no scan results)");
        }

        let width = self
            .images
            .iter()
            .map(|row| row.image.len())
            .max()
            .unwrap_or(0)
            .max("IMAGE".len());
        writeln!(
            w,
            "  {:<width$}  {:>10}  {:>15}",
            "IMAGE", "VIOLATIONS", "VULNERABILITIES"
        )?;
        for row in &self.images {
            let violations = format!("{:>10}", row.policy_violations);
            let violations = if row.policy_violations > 0 {
                violations.red()
            } else {
                violations.green()
            };
            writeln!(
                w,
                "  {:<width$}  {}  {:>15}",
                row.image, violations, row.vulnerabilities
            )?;
        }
        for (key, value) in &self.key_vals {
            writeln!(w, "  {key} = {value}")?;
        }
        Ok(())
    }
}

/// Result of `annotations clear`.
#[derive(Debug, Serialize)]
pub struct ClearReport {
    pub pod: String,
    pub key: &'static str,
    pub cleared: bool,
}

impl Render for ClearReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Removed annotation '{}' from {}", self.key, self.pod)
    }
}
