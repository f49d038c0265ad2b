#![no_main]

use libfuzzer_sys::fuzz_target;
use perceptor_core::config::PerceptorConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(config) = PerceptorConfig::parse(content) {
            let _ = config.validate();
        }
    }
});
