use std::io;
use std::path::Path;

/// Reads the bearer token fresh from `path`, so a rotated secret is picked
/// up on the next call. Trailing whitespace is dropped.
pub async fn read_token(path: impl AsRef<Path>) -> io::Result<String> {
    let token = tokio::fs::read_to_string(path).await?;
    Ok(token.trim_end().to_string())
}
