//! Public URL shapes.
//!
//! Previously issued URLs must keep resolving, so these formats are fixed.

/// Separator between bucket and endpoint in virtual-hosted URLs
pub const SUFFIX_SPLIT: &str = ".";

/// Separator between host and object name
pub const DIR_SPLIT: &str = "/";

/// `https://{bucket}.{endpoint}/{name}`
pub fn virtual_hosted(bucket: &str, endpoint: &str, name: &str) -> String {
    format!(
        "https://{}{}{}{}{}",
        bucket, SUFFIX_SPLIT, endpoint, DIR_SPLIT, name
    )
}

/// `{endpoint}/{bucket}/{name}`, for S3-compatible stores behind a custom endpoint
pub fn path_style(endpoint: &str, bucket: &str, name: &str) -> String {
    format!(
        "{}{}{}{}{}",
        endpoint.trim_end_matches('/'),
        DIR_SPLIT,
        bucket,
        DIR_SPLIT,
        name
    )
}

/// `https://{bucket}.s3.{region}.amazonaws.com/{name}`
pub fn aws(bucket: &str, region: &str, name: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, name)
}

/// Regional AWS S3 service endpoint
pub fn aws_endpoint(region: &str) -> String {
    format!("https://s3.{}.amazonaws.com", region)
}

/// `{base_url}/{name}`
pub fn under_base(base_url: &str, name: &str) -> String {
    format!("{}{}{}", base_url.trim_end_matches('/'), DIR_SPLIT, name)
}
