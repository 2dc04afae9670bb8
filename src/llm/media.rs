pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_magic_bytes() {
        let mut bytes = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend_from_slice(&[0; 16]);
        assert_eq!(detect_mime_type(&bytes).as_deref(), Some("image/png"));
    }

    #[test]
    fn unknown_bytes_yield_none() {
        assert_eq!(detect_mime_type(&[0x00, 0x01, 0x02]), None);
    }
}
