use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use http::{StatusCode, Uri};
use serde::Deserialize;

pub(crate) mod logging;
use super::chunked::PartChunker;
use super::errors::{Error, Result};
use super::s3::logging::LoggingInterceptor;
use super::{Key, ObjectBody, ObjectStore, PutBody};

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    String::from("us-east-2")
}

#[derive(Clone, Deserialize)]
pub struct S3Config {
    secret_key: String,
    access_key: String,
    /// host[:port] of the object store
    endpoint: String,
    #[serde(default = "default_true")]
    use_tls: bool,
    #[serde(default = "default_region")]
    region: String,
    #[serde(default = "default_true")]
    force_path_style: bool,
}

impl S3Config {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str, use_tls: bool) -> Self {
        Self {
            secret_key: secret_key.to_string(),
            access_key: access_key.to_string(),
            endpoint: endpoint.to_string(),
            use_tls,
            region: default_region(),
            force_path_style: true,
        }
    }

    pub async fn new_objects(&self) -> Result<S3> {
        let scp = SharedCredentialsProvider::new(
            Credentials::new(
                self.access_key.clone(),
                self.secret_key.clone(),
                None,
                None,
                "darkroom",
            )
            .provide_credentials()
            .await?,
        );

        let uri = Uri::builder()
            .scheme(if self.use_tls { "https" } else { "http" })
            .authority(self.endpoint.as_str())
            .path_and_query("/")
            .build()?;

        let sdk_config = aws_config::load_from_env().await;

        let config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .region(Region::new(self.region.clone()))
            .credentials_provider(scp)
            .endpoint_url(uri.to_string())
            .force_path_style(self.force_path_style)
            .interceptor(LoggingInterceptor)
            .build();

        let s3_client = aws_sdk_s3::Client::from_conf(config);

        Ok(S3 { client: s3_client })
    }
}

#[derive(Clone)]
pub struct S3 {
    client: Client,
}

impl S3 {
    async fn put_single(&self, bucket: &str, key: &Key, bytes: Bytes) -> Result<()> {
        let content_length = bytes.len() as i64;
        let _put_object_output = self
            .client
            .put_object()
            .key(key.as_str())
            .body(ByteStream::from(bytes))
            .content_length(content_length)
            .bucket(bucket)
            .send()
            .await?;
        Ok(())
    }

    async fn initiate_multipart_upload(&self, bucket: &str, key: &Key) -> Result<String> {
        let create_multipart_upload_output = self
            .client
            .create_multipart_upload()
            .key(key.as_str())
            .bucket(bucket)
            .send()
            .await?;

        create_multipart_upload_output
            .upload_id
            .ok_or(Error::FailedToInitiateMultipartUpload("missing upload id"))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &Key,
        upload_id: &str,
        part_number: i32,
        bytes: Bytes,
    ) -> Result<CompletedPart> {
        let content_length = bytes.len() as i64;
        let upload_part_output = self
            .client
            .upload_part()
            .upload_id(upload_id)
            .part_number(part_number)
            .key(key.as_str())
            .body(ByteStream::from(bytes))
            .content_length(content_length)
            .bucket(bucket)
            .send()
            .await?;

        let mut pb = CompletedPart::builder().part_number(part_number);
        if let Some(e_tag) = upload_part_output.e_tag {
            pb = pb.e_tag(e_tag);
        }
        Ok(pb.build())
    }

    /// Upload every part of the body, starting with the two parts already pulled off the
    /// chunker by [`ObjectStore::put`].
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &Key,
        upload_id: &str,
        first: Bytes,
        second: Bytes,
        mut parts: PartChunker,
    ) -> Result<Vec<CompletedPart>> {
        let mut completed = vec![
            self.upload_part(bucket, key, upload_id, 1, first).await?,
            self.upload_part(bucket, key, upload_id, 2, second).await?,
        ];
        let mut part_number = 3;
        while let Some(bytes) = parts.next().await {
            let bytes = bytes.map_err(Error::ObjectBody)?;
            completed.push(
                self.upload_part(bucket, key, upload_id, part_number, bytes)
                    .await?,
            );
            part_number += 1;
        }
        Ok(completed)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &Key,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let mpu = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();
        let _complete_multipart_upload_output = self
            .client
            .complete_multipart_upload()
            .multipart_upload(mpu)
            .upload_id(upload_id)
            .key(key.as_str())
            .bucket(bucket)
            .send()
            .await?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &Key, upload_id: &str) -> Result<()> {
        let _abort_multipart_upload_output = self
            .client
            .abort_multipart_upload()
            .upload_id(upload_id)
            .key(key.as_str())
            .bucket(bucket)
            .send()
            .await?;
        Ok(())
    }
}

/// Adapt an SDK [`ByteStream`] into an [`ObjectBody`]. The connection backing the stream is
/// released once it is drained or dropped.
fn object_body(body: ByteStream) -> ObjectBody {
    stream::unfold(body, |mut body| async move {
        match body.try_next().await {
            Ok(Some(bytes)) => Some((Ok(bytes), body)),
            Ok(None) => None,
            Err(e) => Some((Err(Error::from(e)), body)),
        }
    })
    .boxed()
}

#[async_trait]
impl ObjectStore for S3 {
    async fn put(&self, bucket: &str, key: &Key, body: PutBody) -> Result<()> {
        let mut parts = PartChunker::new(body);

        let first = match parts.next().await {
            Some(bytes) => bytes.map_err(Error::ObjectBody)?,
            None => Bytes::new(),
        };
        let second = match parts.next().await {
            Some(bytes) => bytes.map_err(Error::ObjectBody)?,
            None => return self.put_single(bucket, key, first).await,
        };

        tracing::debug!("body of {key} exceeds one part, using multipart upload");
        let upload_id = self.initiate_multipart_upload(bucket, key).await?;
        match self
            .upload_parts(bucket, key, &upload_id, first, second, parts)
            .await
        {
            Ok(completed) => {
                self.complete_multipart_upload(bucket, key, &upload_id, completed)
                    .await
            }
            Err(e) => {
                if let Err(abort_err) = self.abort_multipart_upload(bucket, key, &upload_id).await {
                    tracing::warn!("failed to abort multipart upload {upload_id}: {abort_err}");
                }
                Err(e)
            }
        }
    }

    async fn get(&self, bucket: &str, key: &Key) -> Result<ObjectBody> {
        let get_object_output = match self
            .client
            .get_object()
            .key(key.as_str())
            .bucket(bucket)
            .send()
            .await
        {
            Ok(output) => output,
            Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => {
                return Err(Error::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        Ok(object_body(get_object_output.body))
    }

    async fn exists(&self, bucket: &str, key: &Key) -> Result<bool> {
        match self
            .client
            .head_object()
            .key(key.as_str())
            .bucket(bucket)
            .send()
            .await
        {
            Err(SdkError::ServiceError(e)) => {
                let http = e.raw();
                match http.status() {
                    StatusCode::NOT_FOUND => Ok(false),
                    _ => Err(SdkError::ServiceError(e).into()),
                }
            }
            Err(e) => Err(Error::AWSSDKHeadObjectError(e)),
            Ok(_) => Ok(true),
        }
    }

    async fn signed_url(&self, bucket: &str, key: &Key, ttl: Duration) -> Result<String> {
        let presigned = self
            .client
            .get_object()
            .key(key.as_str())
            .bucket(bucket)
            .presigned(PresigningConfig::expires_in(ttl)?)
            .await?;
        Ok(presigned.uri().to_string())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Err(SdkError::ServiceError(e)) => {
                let http = e.raw();
                match http.status() {
                    StatusCode::NOT_FOUND => Ok(false),
                    _ => Err(SdkError::ServiceError(e).into()),
                }
            }
            Err(e) => Err(Error::AWSSDKHeadBucketError(e)),
            Ok(_) => Ok(true),
        }
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 is the implicit default and must not be sent as a location constraint
        if region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(e))
                if e.err().is_bucket_already_owned_by_you() || e.err().is_bucket_already_exists() =>
            {
                Err(Error::BucketAlreadyExists(bucket.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
