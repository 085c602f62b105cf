use std::time::Duration;

use serde::Deserialize;

fn default_region() -> String {
    String::from("us-east-2")
}

fn default_signed_url_ttl() -> u64 {
    5 * 60
}

#[derive(Clone, Debug, Deserialize)]
pub struct PhotoServiceConfig {
    pub bucket_name: String,
    /// region the bucket is created in when it does not exist yet
    #[serde(default = "default_region")]
    pub region: String,
    /// default validity of signed urls, in seconds
    #[serde(rename = "signed_url_ttl", default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

impl PhotoServiceConfig {
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region: default_region(),
            signed_url_ttl_secs: default_signed_url_ttl(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_signed_url_ttl(mut self, ttl: Duration) -> Self {
        self.signed_url_ttl_secs = ttl.as_secs();
        self
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}
