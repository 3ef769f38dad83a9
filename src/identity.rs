//! Anonymous identity provider
//!
//! One opaque token per storage context, created lazily and kept until the
//! storage is cleared.

use crate::storage::KeyValueStore;
use uuid::Uuid;

/// Prefix of every generated identity token
pub const USER_ID_PREFIX: &str = "HS-";

/// Number of random characters after the prefix
const USER_ID_RANDOM_CHARS: usize = 9;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a fresh identity token such as `HS-K3Z9QW1BD`
pub fn generate_user_id() -> String {
    let mut value = Uuid::new_v4().as_u128();
    let mut token = String::with_capacity(USER_ID_PREFIX.len() + USER_ID_RANDOM_CHARS);
    token.push_str(USER_ID_PREFIX);
    for _ in 0..USER_ID_RANDOM_CHARS {
        token.push(BASE36[(value % 36) as usize] as char);
        value /= 36;
    }
    token
}

/// Resolves the persisted identity stored under a fixed key
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    key: String,
    /// Token handed out while the persisted one cannot be read or written
    session_id: Option<String>,
}

impl IdentityProvider {
    /// Create a provider for the given storage key
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            session_id: None,
        }
    }

    /// Storage key holding the identity
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return the persisted identity, creating it on first use.
    ///
    /// When storage cannot be read or written, one session-only token is
    /// returned for the lifetime of this provider. It is persisted as soon as
    /// storage accepts it, unless a stored identity turns up first.
    pub fn get_user_id<S: KeyValueStore + ?Sized>(&mut self, store: &mut S) -> String {
        match store.get_item(&self.key) {
            Ok(Some(id)) if !id.trim().is_empty() => {
                self.session_id = None;
                return id;
            }
            Ok(_) => {}
            Err(e) => {
                if self.session_id.is_none() {
                    log::warn!("identity storage unreadable, using session-only id: {}", e);
                }
                return self.session_id.get_or_insert_with(generate_user_id).clone();
            }
        }

        let id = self.session_id.take().unwrap_or_else(generate_user_id);
        match store.set_item(&self.key, &id) {
            Ok(()) => log::debug!("persisted identity {}", id),
            Err(e) => {
                log::warn!("failed to persist identity: {}", e);
                self.session_id = Some(id.clone());
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_id_format() {
        let id = generate_user_id();
        assert!(id.starts_with("HS-"));
        assert_eq!(id.len(), 12);
        assert!(id[3..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_user_id(), generate_user_id());
    }

    #[test]
    fn test_identity_is_stable() {
        let mut store = MemoryStore::new();
        let mut provider = IdentityProvider::new("hepple_uid");

        let first = provider.get_user_id(&mut store);
        let second = provider.get_user_id(&mut store);
        assert_eq!(first, second);
        assert_eq!(store.get_item("hepple_uid").unwrap(), Some(first));
    }

    #[test]
    fn test_identity_regenerated_after_clear() {
        let mut store = MemoryStore::new();
        let mut provider = IdentityProvider::new("hepple_uid");

        let first = provider.get_user_id(&mut store);
        store.clear();
        let second = provider.get_user_id(&mut store);
        assert_ne!(first, second);
    }

    #[test]
    fn test_existing_identity_is_reused() {
        let mut store = MemoryStore::new();
        store.set_item("hepple_uid", "HS-EXISTING1").unwrap();

        let mut provider = IdentityProvider::new("hepple_uid");
        assert_eq!(provider.get_user_id(&mut store), "HS-EXISTING1");
    }

    #[test]
    fn test_unavailable_storage_degrades_to_session_id() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        let mut provider = IdentityProvider::new("hepple_uid");

        let first = provider.get_user_id(&mut store);
        let second = provider.get_user_id(&mut store);
        assert!(first.starts_with("HS-"));
        assert_eq!(first, second);

        // Persisted once storage is back
        store.set_unavailable(false);
        assert_eq!(provider.get_user_id(&mut store), first);
        assert_eq!(store.get_item("hepple_uid").unwrap(), Some(first));
    }

    #[test]
    fn test_stored_identity_replaces_session_id() {
        let mut store = MemoryStore::new();
        store.set_item("hepple_uid", "HS-EXISTING1").unwrap();
        store.set_unavailable(true);
        let mut provider = IdentityProvider::new("hepple_uid");

        let session = provider.get_user_id(&mut store);
        assert_ne!(session, "HS-EXISTING1");

        store.set_unavailable(false);
        assert_eq!(provider.get_user_id(&mut store), "HS-EXISTING1");
    }

    #[test]
    fn test_quota_failure_still_returns_id() {
        let mut store = MemoryStore::with_quota(4);
        let mut provider = IdentityProvider::new("hepple_uid");

        let id = provider.get_user_id(&mut store);
        assert!(id.starts_with("HS-"));
        assert_eq!(store.get_item("hepple_uid").unwrap(), None);
        assert_eq!(provider.get_user_id(&mut store), id);
    }
}
