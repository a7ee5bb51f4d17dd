use crate::errors::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

pub struct ScreenshotManager;

impl ScreenshotManager {
    pub fn to_base64(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub async fn save_to_file(bytes: &[u8], file_path: impl AsRef<Path>) -> Result<()> {
        tokio::fs::write(file_path, bytes).await?;
        Ok(())
    }
}

/// Serde adapter storing an optional binary blob as a base64 string.
pub mod base64_opt {
    use super::ScreenshotManager;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&ScreenshotManager::to_base64(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_screenshot_bytes() {
        let path = std::env::temp_dir().join(format!("pilot-shot-{}.png", uuid::Uuid::new_v4()));
        ScreenshotManager::save_to_file(b"png-bytes", &path).await.unwrap();
        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, b"png-bytes");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn encodes_base64() {
        assert_eq!(ScreenshotManager::to_base64(b"hi"), "aGk=");
    }
}
