use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::{IssuingFlow, TokenSet};

const SESSION_FILE_NAME: &str = "session.toml";
const SESSION_FILE_VERSION: u32 = 1;

/// Storage abstraction for the persisted session.
///
/// Holds at most one [`TokenSet`]. Implementations do no locking of their own
/// beyond what they need for memory safety; writes are serialized by the
/// session manager.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenSet>, AuthError>;
    fn save(&self, tokens: &TokenSet) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Configuration for file-backed session storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_storefront_dir()
    }
}

/// File-backed token store using a single TOML file.
///
/// Writes go to a temporary file that is renamed over the previous one, so a
/// reader never observes a mix of old and new tokens.
///
/// # Example
/// ```no_run
/// use chrono::{Duration, Utc};
/// use storefront_session::auth::{FileTokenStore, IssuingFlow, TokenSet, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let now = Utc::now();
/// let tokens = TokenSet::new(
///     "access",
///     "refresh",
///     now + Duration::hours(4),
///     now + Duration::days(30),
///     IssuingFlow::Otp,
/// );
/// store.save(&tokens)?;
/// # Ok::<(), storefront_session::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_storefront_dir(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.base_dir.join(SESSION_FILE_NAME)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenSet>, AuthError> {
        let path = self.path();
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Store(err.to_string())),
        };
        let file: SessionFile = toml::from_str(&raw)?;
        if file.version != SESSION_FILE_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = file.version,
                "unsupported session file version treated as signed out"
            );
            return Ok(None);
        }
        let tokens = file.session.and_then(StoredSession::into_token_set);
        if tokens.is_none() {
            tracing::debug!(path = %path.display(), "incomplete session file treated as signed out");
        }
        Ok(tokens)
    }

    fn save(&self, tokens: &TokenSet) -> Result<(), AuthError> {
        let file = SessionFile {
            version: SESSION_FILE_VERSION,
            saved_at: Some(Utc::now()),
            session: Some(StoredSession::from(tokens)),
        };
        let serialized = toml::to_string(&file)?;
        atomic_write(&self.path(), serialized.as_bytes())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Store(err.to_string())),
        }
    }
}

/// Process-local token store. Does not survive restarts; intended for tests
/// and embedders that persist the session themselves.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenSet>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenSet>, AuthError> {
        let guard = self
            .tokens
            .lock()
            .map_err(|_| AuthError::Store("memory store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, tokens: &TokenSet) -> Result<(), AuthError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|_| AuthError::Store("memory store lock poisoned".to_string()))?;
        *guard = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        let mut guard = self
            .tokens
            .lock()
            .map_err(|_| AuthError::Store("memory store lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default = "default_file_version")]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<StoredSession>,
}

/// On-disk layout. Every field is optional so a partially written or
/// hand-edited file reads back as "signed out" instead of failing.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuing_flow: Option<IssuingFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_token: Option<String>,
}

fn default_file_version() -> u32 {
    SESSION_FILE_VERSION
}

impl StoredSession {
    fn into_token_set(self) -> Option<TokenSet> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty())?;
        Some(TokenSet::new(
            access_token,
            refresh_token,
            self.access_expires_at?,
            self.refresh_expires_at?,
            self.issuing_flow.unwrap_or(IssuingFlow::Password),
        )
        .with_provider_token(self.provider_token))
    }
}

impl From<&TokenSet> for StoredSession {
    fn from(tokens: &TokenSet) -> Self {
        Self {
            access_token: Some(tokens.access_token().to_string()),
            refresh_token: Some(tokens.refresh_token().to_string()),
            access_expires_at: Some(tokens.access_expires_at()),
            refresh_expires_at: Some(tokens.refresh_expires_at()),
            issuing_flow: Some(tokens.issuing_flow()),
            provider_token: tokens.provider_token().map(str::to_string),
        }
    }
}

fn default_storefront_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".storefront"))
        .unwrap_or_else(|| PathBuf::from(".storefront"))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Store(format!("session path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::Store(err.to_string()));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::Store(err.to_string()));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
