use aws_config::BehaviorVersion;
use aws_types::{region::Region, SdkConfig};

/// Load the shared AWS configuration from the environment
///
/// A non-empty `region` takes precedence over the region of the default
/// provider chain (`AWS_REGION`, profile, instance metadata).
pub async fn load_shared_config(region: &str) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if !region.is_empty() {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// Region the shared configuration resolved to, if any
pub fn shared_region(config: &SdkConfig) -> Option<String> {
    config
        .region()
        .map(|region| region.to_string())
        .filter(|region| !region.is_empty())
}
