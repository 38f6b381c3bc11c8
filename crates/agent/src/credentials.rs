use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use outreach_tool_runtime::{validate_session_id, CredentialSource};

/// Reads `{dir}/creds_{session_id}.json` and returns its `credentials` field.
///
/// Files are re-read on every lookup and never written.
pub struct FileCredentialSource {
    dir: PathBuf,
}

impl FileCredentialSource {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("creds_{}.json", session_id))
    }
}

impl CredentialSource for FileCredentialSource {
    fn credentials(&self, session_id: &str) -> Option<Value> {
        validate_session_id(session_id).ok()?;
        let path = self.path_for(session_id);
        let data = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Value>(&data) {
            Ok(mut json) => match json.get_mut("credentials") {
                Some(creds) => Some(creds.take()),
                None => {
                    warn!(path = %path.display(), "credentials file has no 'credentials' field");
                    None
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid credentials file");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_credentials_field() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("creds_s-1.json"),
            json!({"credentials": {"token": "abc", "refresh_token": "r"}}).to_string(),
        )
        .unwrap();

        let source = FileCredentialSource::new(tmp.path());
        assert_eq!(
            source.credentials("s-1"),
            Some(json!({"token": "abc", "refresh_token": "r"}))
        );
        assert_eq!(source.credentials("s-2"), None);
    }

    #[test]
    fn test_malformed_files_yield_none() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("creds_bad.json"), "not json").unwrap();
        std::fs::write(tmp.path().join("creds_empty.json"), "{}").unwrap();

        let source = FileCredentialSource::new(tmp.path());
        assert_eq!(source.credentials("bad"), None);
        assert_eq!(source.credentials("empty"), None);
        assert_eq!(source.credentials("../bad"), None);
    }
}
