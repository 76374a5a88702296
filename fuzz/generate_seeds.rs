#!/usr/bin/env -S cargo +nightly -Zscript
//! Write packed-DIB seeds for both fuzz targets.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn info_header(width: i32, height: i32, bpp: u16, compression: u32, size_image: u32) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&40u32.to_le_bytes());
    v.extend_from_slice(&width.to_le_bytes());
    v.extend_from_slice(&height.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&bpp.to_le_bytes());
    v.extend_from_slice(&compression.to_le_bytes());
    v.extend_from_slice(&size_image.to_le_bytes());
    v.extend_from_slice(&[0u8; 16]);
    v
}

fn main() {
    use std::fs;
    let mut seeds: Vec<(&str, Vec<u8>)> = Vec::new();

    // RLE8 4x2: run, literal, delta, end of bitmap
    let stream = [0x02, 0x05, 0x00, 0x03, 0x01, 0x02, 0x03, 0x00, 0x00, 0x02, 0x01, 0x01, 0x00, 0x01];
    let mut rle8 = info_header(4, 2, 8, 1, stream.len() as u32);
    rle8.extend((0..256u32).flat_map(|i| [i as u8, 0x80, 0xff - i as u8, 0]));
    rle8.extend_from_slice(&stream);
    seeds.push(("rle8_4x2.dib", rle8));

    // RLE4 5x1 with an odd literal
    let stream = [0x03, 0x12, 0x00, 0x03, 0x45, 0x60, 0x00, 0x01];
    let mut rle4 = info_header(5, 1, 4, 2, stream.len() as u32);
    rle4.extend((0..16u8).flat_map(|i| [i * 16, i, 0, 0]));
    rle4.extend_from_slice(&stream);
    seeds.push(("rle4_5x1.dib", rle4));

    // 16-bit 565 bitfields 2x1
    let mut bitfields = info_header(2, 1, 16, 3, 0);
    for mask in [0xf800u32, 0x07e0, 0x001f] {
        bitfields.extend_from_slice(&mask.to_le_bytes());
    }
    bitfields.extend_from_slice(&[0x00, 0xf8, 0x1f, 0x00]);
    seeds.push(("bitfields_565.dib", bitfields));

    // Core header 1-bit 3x1 with RGB triples
    let mut core = Vec::new();
    core.extend_from_slice(&12u32.to_le_bytes());
    core.extend_from_slice(&3u16.to_le_bytes());
    core.extend_from_slice(&1u16.to_le_bytes());
    core.extend_from_slice(&1u16.to_le_bytes());
    core.extend_from_slice(&1u16.to_le_bytes());
    core.extend_from_slice(&[0x00, 0x00, 0xff, 0xff, 0x00, 0x00]);
    core.extend_from_slice(&[0b1010_0000, 0, 0, 0]);
    seeds.push(("core_1bpp.dib", core));

    // Top-down 24-bit 1x2
    let mut top_down = info_header(1, -2, 24, 0, 0);
    top_down.extend_from_slice(&[0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00]);
    seeds.push(("topdown_24.dib", top_down));

    // Truncated and malformed
    seeds.push(("empty.bin", Vec::new()));
    seeds.push(("short_header.bin", 40u32.to_le_bytes().to_vec()));
    let mut runaway = info_header(2, 2, 8, 1, 0x1000);
    runaway.extend_from_slice(&[0u8; 1024]);
    runaway.extend_from_slice(&[0x00, 0x02, 0xff]);
    seeds.push(("rle_truncated_delta.dib", runaway));

    for target in ["fuzz_decode", "fuzz_blit"] {
        let dir = format!("fuzz/corpus/{target}");
        fs::create_dir_all(&dir).unwrap();
        for (name, data) in &seeds {
            let mut bytes = Vec::new();
            if target == "fuzz_blit" {
                // Destination (0, 0, 8, 8), source (0, 0, 4, 2), copy.
                bytes.extend_from_slice(&[0, 0, 8, 8, 0, 0, 4, 2, 0]);
            }
            bytes.extend_from_slice(data);
            fs::write(format!("{dir}/{name}"), bytes).unwrap();
        }
    }

    println!("Generated seed corpora in fuzz/corpus/");
}
