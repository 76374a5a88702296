#![no_main]
use libfuzzer_sys::fuzz_target;
use zendib::{BitmapInfo, DibRequest, MemorySurface, RasterOp, StretchRequest};

/// Small signed values near the surface, or values at the ends of the `i32` range.
fn coord(bytes: &[u8], i: usize) -> i32 {
    let b = bytes[i];
    match b {
        0x40..=0x7f => i32::MAX - i32::from(b & 0x3f),
        0x80..=0xbf => i32::MIN + i32::from(b & 0x3f),
        _ => i32::from(b as i8),
    }
}

fuzz_target!(|data: &[u8]| {
    // 9 control bytes: destination, source and raster op; the rest is a packed DIB
    if data.len() < 9 {
        return;
    }
    let (ctl, packed) = data.split_at(9);
    let Ok(dib) = DibRequest::new(packed).load(&enough::Unstoppable) else {
        return;
    };
    if u64::from(dib.width()) * u64::from(dib.height()) > 1 << 16 {
        return;
    }
    let Ok(mut surface) = MemorySurface::new(BitmapInfo::with_defaults(16, -16, 32)) else {
        return;
    };
    let rop = match ctl[8] % 4 {
        0 => RasterOp::SRCCOPY,
        1 => RasterOp::SRCPAINT,
        2 => RasterOp::SRCINVERT,
        _ => RasterOp::NOTSRCCOPY,
    };
    let _ = StretchRequest::new(coord(ctl, 0), coord(ctl, 1), coord(ctl, 2), coord(ctl, 3))
        .source(coord(ctl, 4), coord(ctl, 5), coord(ctl, 6), coord(ctl, 7))
        .rop(rop)
        .blit(&mut surface, &dib, &enough::Unstoppable);
});
