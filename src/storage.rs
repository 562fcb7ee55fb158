use std::time::Duration;

use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;

use crate::config::StorageConfig;

/// How the browser should treat the object behind a signed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(
        &self,
        key: &str,
        ttl: Duration,
        disposition: Disposition,
    ) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let mut loader =
            defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let Some((access_key, secret_key)) = &cfg.credentials {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        // MinIO and friends only speak path-style addressing.
        let conf = S3ConfigBuilder::from(&shared)
            .force_path_style(cfg.endpoint.is_some())
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn presign_get(
        &self,
        key: &str,
        ttl: Duration,
        disposition: Disposition,
    ) -> anyhow::Result<String> {
        let mut req = self.client.get_object().bucket(&self.bucket).key(key);
        if disposition == Disposition::Attachment {
            req = req.response_content_disposition(format!("attachment; filename=\"{key}\""));
        }
        let presigned = req
            .presigned(PresigningConfig::expires_in(ttl)?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn minio() -> Storage {
        let cfg = StorageConfig {
            bucket: "photos".into(),
            endpoint: Some("http://localhost:9000".into()),
            credentials: Some(("minioadmin".into(), "minioadmin".into())),
            region: "us-east-1".into(),
        };
        Storage::new(&cfg).await.expect("client builds offline")
    }

    #[tokio::test]
    async fn presigned_urls_carry_expiry_and_disposition() {
        let storage = minio().await;
        let ttl = Duration::from_secs(3600);

        let view = storage
            .presign_get("a_b.jpg", ttl, Disposition::Inline)
            .await
            .unwrap();
        let download = storage
            .presign_get("a_b.jpg", ttl, Disposition::Attachment)
            .await
            .unwrap();

        for url in [&view, &download] {
            assert!(url.starts_with("http://localhost:9000/photos/a_b.jpg?"), "{url}");
            assert!(url.contains("X-Amz-Expires=3600"), "{url}");
            assert!(url.contains("X-Amz-Signature="), "{url}");
        }
        assert!(!view.contains("response-content-disposition"));
        assert!(download
            .contains("response-content-disposition=attachment%3B%20filename%3D%22a_b.jpg%22"));
    }

    #[tokio::test]
    async fn presign_rejects_expiry_beyond_a_week() {
        let storage = minio().await;
        let too_long = Duration::from_secs(8 * 24 * 3600);
        assert!(storage
            .presign_get("a_b.jpg", too_long, Disposition::Inline)
            .await
            .is_err());
    }
}
