use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

use crate::{config::QrConfig, errors::ServiceError};

/// Renders `payload` as a PNG QR code and returns it as a data URL.
pub fn encode_data_url(payload: &str, cfg: &QrConfig) -> Result<String, ServiceError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|err| ServiceError::InternalError {
        message: format!("qr encoding failed: {}", err),
    })?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(cfg.size, cfg.size)
        .quiet_zone(cfg.quiet_zone)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| ServiceError::InternalError {
            message: format!("png encoding failed: {}", err),
        })?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn produces_a_png_data_url() {
        let cfg = QrConfig { size: 120, quiet_zone: true };
        let url = encode_data_url("http://127.0.0.1:8080/?ticket=abc", &cfg).unwrap();
        let body = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(body).unwrap();
        assert_eq!(&bytes[..8], &PNG_MAGIC);
    }

    #[test]
    fn same_payload_renders_the_same_image() {
        let cfg = QrConfig { size: 64, quiet_zone: false };
        let a = encode_data_url("ticket", &cfg).unwrap();
        let b = encode_data_url("ticket", &cfg).unwrap();
        assert_eq!(a, b);
    }
}
