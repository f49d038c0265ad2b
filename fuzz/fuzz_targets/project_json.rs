#![no_main]

use libfuzzer_sys::fuzz_target;
use perceptor_scanner::{Project, is_project_done};

fuzz_target!(|data: &[u8]| {
    if let Ok(project) = serde_json::from_slice::<Project>(data) {
        let _ = is_project_done(&project);
        let _ = project.scan_results();
    }
});
