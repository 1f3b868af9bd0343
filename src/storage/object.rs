use crate::utils::errors::Result;
use async_trait::async_trait;

/// Minimal key-value object storage capability.
///
/// "Not found" is never an error: `head` returns `false` and `get` returns
/// `None`. Only connectivity, permission and transfer failures are `Err`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata-only existence probe
    async fn head(&self, key: &str) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// All object keys starting with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Human readable location, for log lines
    fn describe(&self) -> String;
}

/// Join key segments with `/`, skipping empty ones and stray slashes
pub fn join_key<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
