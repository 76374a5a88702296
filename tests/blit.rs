//! Blits, banded transfers and read-back against in-memory surfaces.

use enough::Unstoppable;
use rgb::RGB8;
use zendib::*;

fn row8(width: i32, height: i32, bits: Vec<u8>) -> Dib<'static> {
    Dib::new(BitmapInfo::with_defaults(width, height, 8), bits).unwrap()
}

fn surface8(width: i32, height: i32) -> MemorySurface {
    MemorySurface::new(BitmapInfo::with_defaults(width, height, 8)).unwrap()
}

fn device_row(surface: &MemorySurface, y: i32) -> Vec<u32> {
    (0..surface.bounds().right)
        .map(|x| surface.pixel(x, y).unwrap())
        .collect()
}

/// 4x1 RLE8 bitmap with a gray ramp table: a run of two 1s, then end of bitmap.
fn rle8_packed() -> Vec<u8> {
    let stream = [0x02, 0x01, 0x00, 0x01];
    let mut data = Vec::new();
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&4i32.to_le_bytes());
    data.extend_from_slice(&1i32.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&8u16.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&(stream.len() as u32).to_le_bytes());
    data.extend_from_slice(&[0u8; 16]);
    for i in 0..256u32 {
        data.extend_from_slice(&[i as u8, i as u8, i as u8, 0]);
    }
    data.extend_from_slice(&stream);
    data
}

/// A 4x1 surface sharing the RLE bitmap's table, pre-filled with 9.
fn surface_for(dib: &Dib<'_>) -> MemorySurface {
    let info = BitmapInfo::new(BitmapHeader::new(4, -1, 8), dib.colors().clone());
    MemorySurface::from_dib(Dib::new(info, vec![9; 4]).unwrap()).unwrap()
}

// ── Stretched blits ──────────────────────────────────────────────────

#[test]
fn negative_destination_width_mirrors_the_row() {
    let dib = row8(4, -1, vec![1, 2, 3, 4]);
    let mut surface = surface8(4, -1);
    let rows = StretchRequest::new(3, 0, -4, 1)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(device_row(&surface, 0), [4, 3, 2, 1]);
}

#[test]
fn mirror_flag_stays_inside_the_destination() {
    let dib = row8(4, -1, vec![1, 2, 3, 4]);
    let mut surface = surface8(4, -1);
    StretchRequest::new(0, 0, 4, 1)
        .mirror(true)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(device_row(&surface, 0), [4, 3, 2, 1]);
}

#[test]
fn bottom_up_source_lands_upright() {
    // Stored bottom row first: the top row holds 7.
    let dib = row8(1, 2, vec![5, 0, 0, 0, 7, 0, 0, 0]);
    let mut surface = surface8(1, -2);
    let rows = StretchRequest::new(0, 0, 1, 2)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(rows, 2);
    assert_eq!(surface.pixel(0, 0), Some(7));
    assert_eq!(surface.pixel(0, 1), Some(5));
}

#[test]
fn source_rectangle_counts_from_the_bottom_of_bottom_up_bitmaps() {
    let dib = row8(1, 2, vec![5, 0, 0, 0, 7, 0, 0, 0]);
    let mut surface = surface8(1, -1);
    let rows = StretchRequest::new(0, 0, 1, 1)
        .source(0, 0, 1, 1)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(rows, 2);
    assert_eq!(surface.pixel(0, 0), Some(5));
}

#[test]
fn stretch_and_convert_together() {
    // Top-down view: [3, 4] over [1, 2].
    let dib = row8(2, 2, vec![1, 2, 0, 0, 3, 4, 0, 0]);
    let mut surface = MemorySurface::new(BitmapInfo::with_defaults(4, -4, 24)).unwrap();
    StretchRequest::new(0, 0, 4, 4)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    let olive = RGB8::new(0x80, 0x80, 0x00);
    let navy = RGB8::new(0x00, 0x00, 0x80);
    let maroon = RGB8::new(0x80, 0x00, 0x00);
    let green = RGB8::new(0x00, 0x80, 0x00);
    assert_eq!(surface.pixel_rgb(0, 0), Some(olive));
    assert_eq!(surface.pixel_rgb(1, 1), Some(olive));
    assert_eq!(surface.pixel_rgb(2, 0), Some(navy));
    assert_eq!(surface.pixel_rgb(0, 3), Some(maroon));
    assert_eq!(surface.pixel_rgb(3, 2), Some(green));
}

#[test]
fn rejected_format_is_converted_first() {
    let dib = row8(2, -1, vec![1, 2, 0, 0]);
    let mut surface = MemorySurface::new(BitmapInfo::with_defaults(2, -1, 32)).unwrap();
    let rows = StretchRequest::new(0, 0, 2, 1)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(surface.pixel(0, 0), Some(0x0080_0000));
    assert_eq!(surface.pixel_rgb(1, 0), Some(RGB8::new(0, 0x80, 0)));
}

#[test]
fn monochrome_surface_marks_the_background_color() {
    let white_then_red = vec![0xff, 0xff, 0xff, 0x00, 0x00, 0xff, 0, 0];
    let dib = Dib::new(BitmapInfo::with_defaults(2, -1, 24), white_then_red).unwrap();

    let mut surface = MemorySurface::monochrome(2, 1).unwrap();
    StretchRequest::new(0, 0, 2, 1)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(device_row(&surface, 0), [1, 0]);

    let mut surface = MemorySurface::monochrome(2, 1).unwrap();
    StretchRequest::new(0, 0, 2, 1)
        .background(RGB8::new(0xff, 0, 0))
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(device_row(&surface, 0), [0, 1]);
}

#[test]
fn raster_ops_combine_with_the_destination() {
    let dib = row8(2, -1, vec![0x0f, 0xf0, 0, 0]);
    let mut surface = surface8(2, -1);
    surface.fill(RGB8::new(0xff, 0xff, 0xff)).unwrap();
    assert_eq!(device_row(&surface, 0), [0xff, 0xff]);

    StretchRequest::new(0, 0, 2, 1)
        .rop(RasterOp::SRCAND)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(device_row(&surface, 0), [0x0f, 0xf0]);

    StretchRequest::new(0, 0, 2, 1)
        .rop(RasterOp::SRCINVERT)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(device_row(&surface, 0), [0, 0]);

    // Flag bits are ignored.
    StretchRequest::new(0, 0, 2, 1)
        .rop(RasterOp(RasterOp::NOTSRCCOPY.0 | RasterOp::NOMIRRORBITMAP.0))
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(device_row(&surface, 0), [0xf0, 0x0f]);
}

#[test]
fn non_copy_ops_read_bottom_up_sources_upright() {
    let dib = row8(1, 2, vec![5, 0, 0, 0, 7, 0, 0, 0]);
    let mut surface = surface8(1, -2);
    StretchRequest::new(0, 0, 1, 2)
        .rop(RasterOp::SRCINVERT)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(surface.pixel(0, 0), Some(7));
    assert_eq!(surface.pixel(0, 1), Some(5));
}

#[test]
fn rle_copy_leaves_skipped_pixels_alone() {
    let packed = rle8_packed();
    let dib = DibRequest::new(&packed).load(&Unstoppable).unwrap();
    assert_eq!(dib.header().compression, Compression::Rle8);
    let mut surface = surface_for(&dib);
    let rows = StretchRequest::new(0, 0, 4, 1)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(device_row(&surface, 0), [1, 1, 9, 9]);
}

#[test]
fn nothing_visible_blits_nothing() {
    let dib = row8(2, -1, vec![1, 2, 0, 0]);
    let mut surface = surface8(2, -1);
    let rows = StretchRequest::new(-10, 0, 2, 1)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    assert_eq!(rows, 0);
    assert_eq!(device_row(&surface, 0), [0, 0]);
}

// ── Banded transfers ─────────────────────────────────────────────────

#[test]
fn bottom_up_band_lands_on_its_scanlines() {
    let info = BitmapInfo::with_defaults(2, 4, 8);
    // Scanlines 1 and 2, counted from the bottom.
    let band = [11, 11, 0, 0, 22, 22, 0, 0];
    let mut surface = surface8(2, -4);
    let request = SetBitsRequest {
        width: 2,
        height: 4,
        start_scan: 1,
        lines: 2,
        ..SetBitsRequest::default()
    };
    let lines = set_dib_bits_to_device(&mut surface, &request, &info, &band, &Unstoppable).unwrap();
    assert_eq!(lines, 2);
    assert_eq!(device_row(&surface, 0), [0, 0]);
    assert_eq!(device_row(&surface, 1), [22, 22]);
    assert_eq!(device_row(&surface, 2), [11, 11]);
    assert_eq!(device_row(&surface, 3), [0, 0]);
}

#[test]
fn top_down_band_counts_scans_from_the_bottom() {
    let info = BitmapInfo::with_defaults(2, -4, 8);
    let band = [11, 11, 0, 0, 22, 22, 0, 0];
    let mut surface = surface8(2, -4);
    let request = SetBitsRequest {
        width: 2,
        height: 4,
        start_scan: 0,
        lines: 2,
        ..SetBitsRequest::default()
    };
    let lines = set_dib_bits_to_device(&mut surface, &request, &info, &band, &Unstoppable).unwrap();
    assert_eq!(lines, 2);
    assert_eq!(device_row(&surface, 1), [0, 0]);
    assert_eq!(device_row(&surface, 2), [11, 11]);
    assert_eq!(device_row(&surface, 3), [22, 22]);
}

#[test]
fn band_past_the_bitmap_transfers_nothing() {
    let info = BitmapInfo::with_defaults(2, 4, 8);
    let mut surface = surface8(2, -4);
    let request = SetBitsRequest {
        width: 2,
        height: 4,
        start_scan: 4,
        lines: 1,
        ..SetBitsRequest::default()
    };
    let lines = set_dib_bits_to_device(&mut surface, &request, &info, &[7; 4], &Unstoppable).unwrap();
    assert_eq!(lines, 0);
}

#[test]
fn short_band_is_rejected() {
    let info = BitmapInfo::with_defaults(2, 4, 8);
    let mut surface = surface8(2, -4);
    let request = SetBitsRequest {
        width: 2,
        height: 4,
        lines: 2,
        ..SetBitsRequest::default()
    };
    let result = set_dib_bits_to_device(&mut surface, &request, &info, &[7; 4], &Unstoppable);
    assert!(matches!(result, Err(DibError::BufferTooSmall { needed: 8, actual: 4 })));
}

#[test]
fn rle_transfer_decodes_whole_stream_with_clip() {
    let packed = rle8_packed();
    let dib = DibRequest::new(&packed).load(&Unstoppable).unwrap();
    let mut surface = surface_for(&dib);
    let request = SetBitsRequest {
        width: 4,
        height: 1,
        lines: 1,
        ..SetBitsRequest::default()
    };
    let lines =
        set_dib_bits_to_device(&mut surface, &request, dib.info(), dib.bits(), &Unstoppable).unwrap();
    assert_eq!(lines, 1);
    assert_eq!(device_row(&surface, 0), [1, 1, 9, 9]);
}

// ── Read-back ────────────────────────────────────────────────────────

#[test]
fn read_back_matches_the_surface_bits() {
    let bits: Vec<u8> = (0..24u8).map(|i| if i % 12 >= 9 { 0 } else { i * 7 }).collect();
    let dib = Dib::new(BitmapInfo::with_defaults(3, 2, 24), bits.clone()).unwrap();
    let surface = MemorySurface::from_dib(dib).unwrap();

    let got = get_dib_bits(
        &surface,
        0,
        2,
        &BitmapHeader::new(3, 2, 24),
        ColorUsage::Rgb,
        None,
        &Unstoppable,
    )
    .unwrap();
    assert_eq!(got.lines, 2);
    assert_eq!(got.bits, bits);

    let flipped = get_dib_bits(
        &surface,
        0,
        2,
        &BitmapHeader::new(3, -2, 24),
        ColorUsage::Rgb,
        None,
        &Unstoppable,
    )
    .unwrap();
    assert_eq!(&flipped.bits[..12], &bits[12..]);
    assert_eq!(&flipped.bits[12..], &bits[..12]);
}

#[test]
fn blit_then_read_back_in_another_depth() {
    let dib = row8(2, -1, vec![9, 12, 0, 0]);
    let mut surface = surface8(2, -1);
    StretchRequest::new(0, 0, 2, 1)
        .blit(&mut surface, &dib, &Unstoppable)
        .unwrap();
    let got = get_dib_bits(
        &surface,
        0,
        1,
        &BitmapHeader::new(2, -1, 24),
        ColorUsage::Rgb,
        None,
        &Unstoppable,
    )
    .unwrap();
    let expected_9 = default_color_table(8).unwrap()[9];
    let expected_12 = default_color_table(8).unwrap()[12];
    assert_eq!(&got.bits[..3], &[expected_9.b, expected_9.g, expected_9.r]);
    assert_eq!(&got.bits[3..6], &[expected_12.b, expected_12.g, expected_12.r]);
}
