use chrono::Utc;
use image::imageops::FilterType;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::AppError;
use crate::storage::StorageService;

/// Maximum number of images accepted per location submission. Parts beyond
/// the cap are dropped at intake, not treated as an error.
pub const MAX_IMAGES_PER_SUBMISSION: usize = 5;

/// Bounds applied to every uploaded image before it is stored.
pub const MAX_IMAGE_WIDTH: u32 = 1600;
pub const MAX_IMAGE_HEIGHT: u32 = 1600;
pub const JPEG_QUALITY: u8 = 75;

/// Matches the first `@lat,lng` segment of a pasted map URL.
static COORDINATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").expect("Invalid regex"));

/// parse_coordinates
///
/// Extracts the latitude/longitude pair from a pasted map URL, e.g.
/// `https://maps.google.com/@19.2566,-103.7167,15z` yields
/// `("19.2566", "-103.7167")`. A URL without an `@lat,lng` segment yields
/// `None`; extraction never panics.
pub fn parse_coordinates(url: &str) -> Option<(String, String)> {
    let caps = COORDINATE_RE.captures(url)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// compress
///
/// Normalizes an arbitrary user-selected image: decode, scale down preserving
/// aspect ratio when either dimension exceeds its bound, and re-encode as a
/// fixed-quality JPEG. If decoding or re-encoding fails for any reason the
/// original bytes come back untouched so the submission itself never fails on
/// a stubborn file.
pub fn compress(bytes: &[u8], max_width: u32, max_height: u32, quality: u8) -> Vec<u8> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "image decode failed, storing original bytes");
            return bytes.to_vec();
        }
    };

    let (width, height) = (decoded.width(), decoded.height());
    let resized = if width > max_width || height > max_height {
        decoded.resize(max_width, max_height, FilterType::Triangle)
    } else {
        decoded
    };

    // JPEG carries no alpha channel.
    let rgb = resized.to_rgb8();

    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    match rgb.write_with_encoder(encoder) {
        Ok(()) => out,
        Err(e) => {
            tracing::warn!(error = %e, "jpeg re-encode failed, storing original bytes");
            bytes.to_vec()
        }
    }
}

/// object_key_for
///
/// Builds the destination key for an upload: the caller-specified path prefix
/// plus the current time and the original filename, so concurrent uploads of
/// identically named files cannot collide.
pub fn object_key_for(destination: &str, filename: &str) -> String {
    format!(
        "{}/{}-{}",
        destination.trim_matches('/'),
        Utc::now().timestamp_millis(),
        filename
    )
}

/// upload
///
/// Stores the (possibly compressed) bytes under a timestamped key beneath
/// `destination` and resolves the public URL of the stored object.
pub async fn upload(
    storage: &dyn StorageService,
    destination: &str,
    filename: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, AppError> {
    let key = object_key_for(destination, filename);
    storage.put_object(&key, bytes, content_type).await
}

/// replace
///
/// Best-effort delete of whatever object `old_url` resolves to, followed by a
/// fresh upload. A failed delete is logged and swallowed; it never blocks the
/// new upload.
pub async fn replace(
    storage: &dyn StorageService,
    old_url: Option<&str>,
    destination: &str,
    filename: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, AppError> {
    if let Some(old) = old_url {
        match storage.object_key(old) {
            Some(key) => {
                if let Err(e) = storage.delete_object(&key).await {
                    tracing::warn!(error = %e, key, "failed to delete replaced object");
                }
            }
            None => tracing::debug!(url = old, "old URL is not ours, skipping delete"),
        }
    }
    upload(storage, destination, filename, bytes, content_type).await
}
