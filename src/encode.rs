//! BMP writer: a `BM` file header, a 40-byte info header, the color table or channel
//! masks, then the bits exactly as the bitmap stores them.

use alloc::vec::Vec;

use enough::Stop;

use crate::color::ColorInfo;
use crate::dib::{Dib, FILE_HEADER_SIZE};
use crate::error::DibError;
use crate::header::{BitmapHeader, Compression, INFO_HEADER_SIZE};

/// Encode a bitmap as a `.bmp` file.
///
/// Orientation and compression are preserved; RLE bitmaps are written with their
/// compressed stream.
pub fn encode_bmp(dib: &Dib<'_>, stop: &dyn Stop) -> Result<Vec<u8>, DibError> {
    stop.check()?;
    let header = dib.header();
    let colors = match dib.colors() {
        ColorInfo::Table(table) if header.bit_count <= 8 => {
            let count = match header.clr_used {
                0 => table.len(),
                n => (n as usize).min(table.len()),
            };
            let mut quads = table.to_quads();
            quads.truncate(count * 4);
            quads
        }
        ColorInfo::Masks(masks) if header.compression == Compression::Bitfields => {
            masks.to_bytes().to_vec()
        }
        _ => Vec::new(),
    };
    let pixel_data = if header.compression.is_rle() {
        dib.bits()
    } else {
        &dib.bits()[..header.image_size()]
    };

    let data_offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE as usize + colors.len();
    let file_size = data_offset
        .checked_add(pixel_data.len())
        .filter(|&s| s <= u32::MAX as usize)
        .ok_or_else(|| DibError::LimitExceeded("BMP file exceeds 4 GiB".into()))?;

    let mut out = Vec::new();
    out.try_reserve_exact(file_size)
        .map_err(|_| DibError::AllocationFailure { bytes: file_size })?;
    let clr_used = match (header.bit_count <= 8, header.clr_used) {
        (false, _) => 0,
        (true, 0) if colors.len() / 4 == header.max_colors() as usize => 0,
        (true, 0) => (colors.len() / 4) as u32,
        (true, n) => n,
    };
    write_bmp_header(
        &mut out,
        file_size,
        data_offset,
        header,
        pixel_data.len(),
        clr_used,
    );
    out.extend_from_slice(&colors);

    let stride = header.stride().max(1);
    for rows in pixel_data.chunks(stride * 16) {
        stop.check()?;
        out.extend_from_slice(rows);
    }
    Ok(out)
}

fn write_bmp_header(
    out: &mut Vec<u8>,
    file_size: usize,
    data_offset: usize,
    header: &BitmapHeader,
    pixel_data_size: usize,
    clr_used: u32,
) {
    // File header (14 bytes)
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]); // reserved
    out.extend_from_slice(&(data_offset as u32).to_le_bytes());

    // BITMAPINFOHEADER (40 bytes)
    out.extend_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
    out.extend_from_slice(&header.width.to_le_bytes());
    out.extend_from_slice(&header.height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&header.bit_count.to_le_bytes());
    out.extend_from_slice(&header.compression.to_u32().to_le_bytes());
    out.extend_from_slice(&(pixel_data_size as u32).to_le_bytes());
    out.extend_from_slice(&header.x_pels_per_meter.to_le_bytes());
    out.extend_from_slice(&header.y_pels_per_meter.to_le_bytes());
    out.extend_from_slice(&clr_used.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // important colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BitfieldMasks;
    use crate::dib::{BitmapInfo, DibRequest};
    use alloc::vec;
    use enough::Unstoppable;

    #[test]
    fn indexed_bitmap_survives_writer_and_loader() {
        let info = BitmapInfo::with_defaults(3, 2, 4);
        let dib = Dib::new(info, vec![0x12, 0x30, 0, 0, 0xfe, 0xd0, 0, 0]).unwrap();
        let file = encode_bmp(&dib, &Unstoppable).unwrap();
        assert_eq!(&file[..2], b"BM");
        assert_eq!(file.len(), 14 + 40 + 64 + 8);
        let loaded = DibRequest::from_bmp_file(&file)
            .unwrap()
            .load(&Unstoppable)
            .unwrap();
        assert_eq!(loaded.header(), dib.header());
        assert_eq!(loaded.colors(), dib.colors());
        assert_eq!(loaded.bits(), dib.bits());
    }

    #[test]
    fn bitfields_masks_follow_header() {
        let header = BitmapHeader::new(1, -1, 16).with_compression(Compression::Bitfields);
        let masks = BitfieldMasks {
            red: 0xf800,
            green: 0x07e0,
            blue: 0x001f,
        };
        let dib = Dib::new(BitmapInfo::new(header, ColorInfo::Masks(masks)), vec![0x1f, 0, 0, 0]).unwrap();
        let file = encode_bmp(&dib, &Unstoppable).unwrap();
        assert_eq!(&file[54..66], &masks.to_bytes());
        let loaded = DibRequest::from_bmp_file(&file)
            .unwrap()
            .load(&Unstoppable)
            .unwrap();
        assert_eq!(loaded.pixel_rgb(0, 0), Some(rgb::RGB8::new(0, 0, 0xff)));
    }
}
