// File: ./src/storage.rs
// Durable persistence of the current session: the access token and the
// serialized user record, stored as two entries in the data directory.
//
// Writes are full overwrites (never merges) and go through an advisory
// file lock plus an atomic tmp-file rename, so a crash mid-write can not
// leave a torn session on disk.
use crate::context::AppContext;
use crate::model::User;
use anyhow::Result;
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};

pub struct TokenStore;

impl TokenStore {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Persist the full session. Both entries are written; the token first,
    /// so a failure between the two leaves at most an orphan token that
    /// `load_session` will discard.
    pub fn save_session(ctx: &dyn AppContext, token: &str, user: &User) -> Result<()> {
        let token_path = ctx
            .get_token_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine token path"))?;
        let user_path = ctx
            .get_user_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine user path"))?;

        Self::with_lock(&token_path, || {
            Self::atomic_write(&token_path, token)?;
            let json = serde_json::to_string_pretty(user)?;
            Self::atomic_write(&user_path, json)?;
            Ok(())
        })
    }

    /// Read the persisted session. Returns `None` unless BOTH the token and
    /// the user record are present and parseable; a half-present pair is
    /// cleared so no later read can observe it.
    ///
    /// Storage errors are logged and treated as "no stored session" — this
    /// path must never take the process down.
    pub fn load_session(ctx: &dyn AppContext) -> Option<(String, User)> {
        let token_path = ctx.get_token_path()?;
        let user_path = ctx.get_user_path()?;

        let result: Result<Option<(String, User)>> = Self::with_lock(&token_path, || {
            if !token_path.exists() || !user_path.exists() {
                return Ok(None);
            }
            let token = fs::read_to_string(&token_path)?;
            let json = fs::read_to_string(&user_path)?;
            let user: User = serde_json::from_str(&json)?;
            if token.is_empty() {
                return Ok(None);
            }
            Ok(Some((token, user)))
        });

        match result {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                // One of the pair may be an orphan from an interrupted write.
                if token_path.exists() != user_path.exists() {
                    log::warn!("Discarding half-present stored session");
                    let _ = fs::remove_file(&token_path);
                    let _ = fs::remove_file(&user_path);
                }
                None
            }
            Err(e) => {
                log::error!("Failed to read stored session: {}", e);
                None
            }
        }
    }

    /// Remove both persisted entries. Missing files are not an error.
    pub fn clear_session(ctx: &dyn AppContext) -> Result<()> {
        let token_path = ctx
            .get_token_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine token path"))?;
        let user_path = ctx
            .get_user_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine user path"))?;

        Self::with_lock(&token_path, || {
            if token_path.exists() {
                fs::remove_file(&token_path)?;
            }
            if user_path.exists() {
                fs::remove_file(&user_path)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    fn sample_user() -> User {
        User {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            display_name: "Ada".to_string(),
            avatar_url: None,
        }
    }

    #[test]
    fn test_fresh_context_has_no_session() {
        let ctx = TestContext::new();
        assert!(TokenStore::load_session(&ctx).is_none());
    }

    #[test]
    fn test_save_load_clear_roundtrip() {
        let ctx = TestContext::new();
        let user = sample_user();
        TokenStore::save_session(&ctx, "tok_xyz", &user).unwrap();

        let (token, loaded) = TokenStore::load_session(&ctx).unwrap();
        assert_eq!(token, "tok_xyz");
        assert_eq!(loaded, user);

        TokenStore::clear_session(&ctx).unwrap();
        assert!(TokenStore::load_session(&ctx).is_none());
        // Clearing twice is fine.
        TokenStore::clear_session(&ctx).unwrap();
    }

    #[test]
    fn test_save_overwrites_previous_session() {
        let ctx = TestContext::new();
        TokenStore::save_session(&ctx, "tok_old", &sample_user()).unwrap();

        let mut other = sample_user();
        other.id = "u2".to_string();
        TokenStore::save_session(&ctx, "tok_new", &other).unwrap();

        let (token, user) = TokenStore::load_session(&ctx).unwrap();
        assert_eq!(token, "tok_new");
        assert_eq!(user.id, "u2");
    }

    #[test]
    fn test_orphan_token_is_discarded() {
        let ctx = TestContext::new();
        let token_path = ctx.get_token_path().unwrap();
        TokenStore::atomic_write(&token_path, "tok_orphan").unwrap();

        assert!(TokenStore::load_session(&ctx).is_none());
        // The orphan must be gone so it can't resurface later.
        assert!(!token_path.exists());
    }

    #[test]
    fn test_corrupt_user_record_is_treated_as_empty() {
        let ctx = TestContext::new();
        TokenStore::save_session(&ctx, "tok_xyz", &sample_user()).unwrap();
        let user_path = ctx.get_user_path().unwrap();
        std::fs::write(&user_path, "{ not json").unwrap();

        assert!(TokenStore::load_session(&ctx).is_none());
    }
}
