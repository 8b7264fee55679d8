use percent_encoding::percent_decode_str;
use url::Url;

use crate::types::StoragePath;

const INVALID_SCHEME: &str = "scheme must be s3:// .";
const INVALID_PATH: &str = "path must be a valid s3:// URL.";
const NO_BUCKET_NAME_SPECIFIED: &str = "bucket name must be specified.";
const NO_PATH_SPECIFIED: &str = "path must be specified.";
const INVALID_PREFIX_ENCODING: &str = "prefix must be a valid UTF-8 string.";

pub fn check_storage_path(path: &str) -> Result<String, String> {
    if path.is_empty() {
        return Err(NO_PATH_SPECIFIED.to_string());
    }

    let parsed = Url::parse(path).map_err(|_| INVALID_PATH.to_string())?;
    if parsed.scheme() != "s3" {
        return Err(INVALID_SCHEME.to_string());
    }
    if parsed.host_str().is_none_or(|host| host.is_empty()) {
        return Err(NO_BUCKET_NAME_SPECIFIED.to_string());
    }

    Ok(path.to_string())
}

pub fn parse_storage_path(path: &str) -> Result<StoragePath, String> {
    check_storage_path(path)?;

    let parsed = Url::parse(path).map_err(|_| INVALID_PATH.to_string())?;
    let bucket = parsed
        .host_str()
        .ok_or_else(|| NO_BUCKET_NAME_SPECIFIED.to_string())?
        .to_string();

    // remove first '/'
    let prefix = parsed.path().strip_prefix('/').unwrap_or(parsed.path());
    let prefix = percent_decode_str(prefix)
        .decode_utf8()
        .map_err(|_| INVALID_PREFIX_ENCODING.to_string())?
        .to_string();

    Ok(StoragePath { bucket, prefix })
}
