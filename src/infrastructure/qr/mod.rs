use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

/// Turns a shareable URL into an embeddable image reference.
pub trait QrRenderer: Send + Sync {
    fn render(&self, url: &str) -> String;
}

/// Emits a `data:` URI carrying the encoded payload; rasterising it is left to the client.
#[derive(Clone, Copy, Debug, Default)]
pub struct DataUriRenderer;

impl QrRenderer for DataUriRenderer {
    fn render(&self, url: &str) -> String {
        format!("data:text/plain;base64,{}", BASE64.encode(url.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_decodes_back_to_url() {
        let uri = DataUriRenderer.render("http://localhost:8080/pay/abc");
        let encoded = uri.strip_prefix("data:text/plain;base64,").unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, b"http://localhost:8080/pay/abc");
    }
}
