#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use perceptor_core::annotations::{BlackDuckAnnotations, ImageAnnotation};
use perceptor_core::types::ImageRef;

/// 퍼저용 구조적 입력: 순서대로 병합할 이미지 결과
#[derive(Arbitrary, Debug)]
struct FuzzMerge {
    merges: Vec<FuzzImage>,
}

#[derive(Arbitrary, Debug)]
struct FuzzImage {
    image: String,
    policy_violations: u32,
    vulnerabilities: u32,
}

fuzz_target!(|input: FuzzMerge| {
    let mut blob = BlackDuckAnnotations::default();

    for merge in input.merges.iter().take(64) {
        let before = blob.clone();
        let image = ImageRef::from(merge.image.as_str());
        let annotation = ImageAnnotation {
            policy_violation_count: merge.policy_violations,
            vulnerability_count: merge.vulnerabilities,
        };

        blob.merge_image(&image, annotation);

        // 병합한 이미지는 새 값, 나머지 이미지는 그대로
        assert_eq!(blob.image(&image), Some(&annotation));
        for (other, counts) in &before.image_annotations {
            if other != image.as_str() {
                assert_eq!(blob.image_annotations.get(other), Some(counts));
            }
        }
    }

    let pod = blob.to_pod_annotations().expect("blob must serialize");
    assert_eq!(BlackDuckAnnotations::from_pod_annotations(&pod), blob);
});
