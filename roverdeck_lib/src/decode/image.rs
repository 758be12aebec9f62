use crate::msgs::CompressedImage;
use base64::Engine;

/// Inline data URL for a compressed map/camera frame, e.g.
/// `data:image/png;base64,...`. The payload is passed through untouched.
pub fn to_data_url(image: &CompressedImage) -> String {
    // Plain codec ("png") or "rgb8; jpeg compressed bgr8" style: the codec
    // is the first word after the last semicolon
    let format = image
        .format
        .rsplit(';')
        .next()
        .and_then(|tail| tail.split_whitespace().next())
        .unwrap_or("png");
    format!("data:image/{};base64,{}", format, image.data)
}

/// Decoded image payload, if the base64 is valid.
pub fn payload(image: &CompressedImage) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(image.data.as_bytes())
        .ok()
}

/// Decoded payload size in bytes, if the base64 is valid.
pub fn payload_len(image: &CompressedImage) -> Option<usize> {
    payload(image).map(|bytes| bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_defaults_to_png() {
        let image = CompressedImage {
            data: "AAAA".to_string(),
            ..Default::default()
        };
        assert_eq!(to_data_url(&image), "data:image/png;base64,AAAA");
    }

    #[test]
    fn data_url_extracts_codec_from_ros_format_string() {
        let verbose = CompressedImage {
            format: "rgb8; jpeg compressed bgr8".to_string(),
            data: "AAAA".to_string(),
            ..Default::default()
        };
        assert_eq!(to_data_url(&verbose), "data:image/jpeg;base64,AAAA");

        let plain = CompressedImage {
            format: "jpeg".to_string(),
            data: "AAAA".to_string(),
            ..Default::default()
        };
        assert_eq!(to_data_url(&plain), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn payload_len_rejects_bad_base64() {
        let image = CompressedImage {
            data: "not base64!!".to_string(),
            ..Default::default()
        };
        assert_eq!(payload_len(&image), None);
    }
}
