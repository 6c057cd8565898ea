// Content and perceptual hashing

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::constants::HASH_READ_BUF_SIZE;
use crate::error::{DarkroomError, Result};

/// Stream a file through SHA-256. Returns lowercase hex (64 chars).
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .map_err(|e| DarkroomError::Hash(format!("failed to open {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buf = vec![0u8; HASH_READ_BUF_SIZE];
    loop {
        let read = reader
            .read(&mut buf)
            .map_err(|e| DarkroomError::Hash(format!("failed to read {}: {}", path.display(), e)))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Difference hash: grayscale 9x8 reduction, one bit per horizontally
/// adjacent pixel pair, row-major from the top-left.
pub fn dhash_file(path: &Path) -> Result<u64> {
    let img = image::open(path)
        .map_err(|e| DarkroomError::Hash(format!("failed to decode {}: {}", path.display(), e)))?;
    Ok(dhash_image(&img))
}

pub fn dhash_image(img: &image::DynamicImage) -> u64 {
    let gray = img.to_luma8();
    let reduced = image::imageops::resize(&gray, 9, 8, image::imageops::FilterType::Triangle);

    let mut hash: u64 = 0;
    for y in 0..8 {
        for x in 0..8 {
            let left = reduced.get_pixel(x, y)[0];
            let right = reduced.get_pixel(x + 1, y)[0];
            hash <<= 1;
            if left > right {
                hash |= 1;
            }
        }
    }
    hash
}

/// Hex encoding used for dhash storage (16 chars, zero padded).
pub fn dhash_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

/// Bit distance between two hex-encoded dhashes. Fails unless both are
/// valid 16-char hex strings.
pub fn hamming_distance(dhash1: &str, dhash2: &str) -> Result<u32> {
    let h1 = parse_dhash(dhash1)?;
    let h2 = parse_dhash(dhash2)?;
    Ok((h1 ^ h2).count_ones())
}

fn parse_dhash(s: &str) -> Result<u64> {
    if s.len() != 16 {
        return Err(DarkroomError::Hash(format!("invalid dhash length: {:?}", s)));
    }
    u64::from_str_radix(s, 16)
        .map_err(|e| DarkroomError::Hash(format!("invalid dhash {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn sha256_known_answer() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        assert_eq!(
            sha256_file(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(
            sha256_file(file.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_missing_file_errors() {
        assert!(sha256_file(Path::new("/nope/missing.jpg")).is_err());
    }

    #[test]
    fn dhash_horizontal_gradient_is_all_ones() {
        // Brightness strictly decreasing left-to-right makes every
        // adjacent-pair comparison true.
        let img = image::DynamicImage::ImageLuma8(image::GrayImage::from_fn(90, 80, |x, _| {
            image::Luma([255u8.saturating_sub((x * 2) as u8)])
        }));
        assert_eq!(dhash_image(&img), u64::MAX);
    }

    #[test]
    fn dhash_flat_image_is_zero() {
        let img = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            64,
            64,
            image::Luma([128u8]),
        ));
        assert_eq!(dhash_image(&img), 0);
        assert_eq!(dhash_hex(0), "0000000000000000");
    }

    #[test]
    fn hamming_symmetry_and_bounds() {
        let a = dhash_hex(0xffff_0000_ffff_0000);
        let b = dhash_hex(0x0000_ffff_0000_ffff);
        assert_eq!(
            hamming_distance(&a, &b).unwrap(),
            hamming_distance(&b, &a).unwrap()
        );
        assert_eq!(hamming_distance(&a, &b).unwrap(), 64);
        assert_eq!(hamming_distance(&a, &a).unwrap(), 0);
    }

    #[test]
    fn hamming_rejects_bad_input() {
        assert!(hamming_distance("zzzz", "0000000000000000").is_err());
        assert!(hamming_distance("0000000000000000", "123").is_err());
        assert!(hamming_distance("0000000000000000", "g000000000000000").is_err());
    }
}
