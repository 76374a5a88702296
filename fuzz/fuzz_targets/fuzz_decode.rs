#![no_main]
use libfuzzer_sys::fuzz_target;
use zendib::{DibFormat, DibRequest, Limits};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 20),
        ..Limits::default()
    };

    // Packed DIB and .bmp file, both must never panic
    let requests = [Some(DibRequest::new(data)), DibRequest::from_bmp_file(data).ok()];
    for request in requests.into_iter().flatten() {
        let Ok(dib) = request.with_limits(&limits).decode(&enough::Unstoppable) else {
            continue;
        };
        let _ = dib.convert_to(&DibFormat::direct(24), true, &enough::Unstoppable);
    }
});
