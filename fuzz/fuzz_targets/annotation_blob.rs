#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use perceptor_core::annotations::{ANNOTATION_KEY, BlackDuckAnnotations};

fuzz_target!(|data: &[u8]| {
    let Ok(blob) = std::str::from_utf8(data) else {
        return;
    };

    // 깨진 blob도 빈 구조로 복원되어야 함
    let pod = BTreeMap::from([(ANNOTATION_KEY.to_owned(), blob.to_owned())]);
    let _ = BlackDuckAnnotations::from_pod_annotations(&pod);

    if let Ok(parsed) = BlackDuckAnnotations::from_json(blob) {
        let encoded = parsed.to_json().expect("parsed blob must serialize");
        let reparsed = BlackDuckAnnotations::from_json(&encoded).expect("own output must parse");
        assert_eq!(parsed, reparsed);
    }
});
