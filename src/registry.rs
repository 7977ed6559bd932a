use chrono::{DateTime, Utc};
use facegate_signature::{Signature, SignatureError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{self, StoreError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("identity {0} not found")]
    IdentityNotFound(Uuid),
    #[error(transparent)]
    Malformed(#[from] SignatureError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An authorized person. The reference signature lives inline; deleting the
/// identity removes both in one write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub room: Option<String>,
    #[serde(with = "serde_bytes")]
    pub signature: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

/// Profile fields for a new identity. Role falls back to "Staff".
#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub room: Option<String>,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub room: Option<String>,
}

/// Reporting view: the profile plus whether a signature is on file, without
/// the signature bytes themselves.
#[derive(Debug, Clone, Serialize)]
pub struct IdentitySummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub room: Option<String>,
    pub enrolled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for IdentitySummary {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            phone: identity.phone.clone(),
            role: identity.role.clone(),
            room: identity.room.clone(),
            enrolled: identity.signature.is_some(),
            created_at: identity.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryState {
    identities: Vec<Identity>,
}

/// The set of people allowed through the gate.
///
/// State is one postcard file, reloaded per operation. Mutations hold the
/// handle's lock across the load-modify-save sequence; reads go straight to
/// the last committed file.
pub struct IdentityRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl IdentityRegistry {
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join("registry.bin"),
            lock: Mutex::new(()),
        }
    }

    pub fn create(&self, new: NewIdentity) -> Result<Identity, RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: RegistryState = store::load_state(&self.path)?;
        let identity = Identity {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            phone: new.phone,
            role: new.role.unwrap_or_else(|| "Staff".to_string()),
            room: new.room,
            signature: None,
            created_at: Utc::now(),
        };
        state.identities.push(identity.clone());
        store::save_state(&self.path, &state)?;
        Ok(identity)
    }

    pub fn get(&self, id: Uuid) -> Result<Identity, RegistryError> {
        let state: RegistryState = store::load_state(&self.path)?;
        state
            .identities
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(RegistryError::IdentityNotFound(id))
    }

    pub fn list(&self) -> Result<Vec<Identity>, RegistryError> {
        let state: RegistryState = store::load_state(&self.path)?;
        Ok(state.identities)
    }

    pub fn update(&self, id: Uuid, update: IdentityUpdate) -> Result<Identity, RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: RegistryState = store::load_state(&self.path)?;
        let identity = state
            .identities
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RegistryError::IdentityNotFound(id))?;
        if let Some(name) = update.name {
            identity.name = name;
        }
        if let Some(email) = update.email {
            identity.email = Some(email);
        }
        if let Some(phone) = update.phone {
            identity.phone = Some(phone);
        }
        if let Some(role) = update.role {
            identity.role = role;
        }
        if let Some(room) = update.room {
            identity.room = Some(room);
        }
        let updated = identity.clone();
        store::save_state(&self.path, &state)?;
        Ok(updated)
    }

    /// Remove the identity and, with it, its signature. Recorded access
    /// events keep referring to the removed id; the ledger is append-only.
    pub fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: RegistryState = store::load_state(&self.path)?;
        let before = state.identities.len();
        state.identities.retain(|p| p.id != id);
        if state.identities.len() == before {
            return Err(RegistryError::IdentityNotFound(id));
        }
        store::save_state(&self.path, &state)?;
        Ok(())
    }

    /// Attach or replace the reference signature. One signature per
    /// identity; the previous one is overwritten without history.
    pub fn enroll(&self, id: Uuid, signature: &Signature) -> Result<Identity, RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: RegistryState = store::load_state(&self.path)?;
        let identity = state
            .identities
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RegistryError::IdentityNotFound(id))?;
        identity.signature = Some(signature.to_bytes());
        let updated = identity.clone();
        store::save_state(&self.path, &state)?;
        Ok(updated)
    }

    /// Detach the reference signature, keeping the identity un-enrolled.
    pub fn clear_signature(&self, id: Uuid) -> Result<Identity, RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: RegistryState = store::load_state(&self.path)?;
        let identity = state
            .identities
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RegistryError::IdentityNotFound(id))?;
        identity.signature = None;
        let updated = identity.clone();
        store::save_state(&self.path, &state)?;
        Ok(updated)
    }

    /// Decoded signatures of everyone enrolled at call time.
    ///
    /// Identities without a signature are skipped. A stored signature that
    /// no longer decodes surfaces as an error item so a scan fails closed
    /// instead of silently dropping a candidate.
    pub fn enrolled(
        &self,
    ) -> Result<impl Iterator<Item = Result<(Uuid, Signature), RegistryError>>, RegistryError> {
        let state: RegistryState = store::load_state(&self.path)?;
        Ok(state.identities.into_iter().filter_map(|p| {
            let bytes = p.signature?;
            Some(
                Signature::from_bytes(&bytes)
                    .map(|sig| (p.id, sig))
                    .map_err(RegistryError::from),
            )
        }))
    }

    #[cfg(test)]
    pub(crate) fn put_signature_bytes(&self, id: Uuid, bytes: Vec<u8>) -> Result<(), RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: RegistryState = store::load_state(&self.path)?;
        let identity = state
            .identities
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RegistryError::IdentityNotFound(id))?;
        identity.signature = Some(bytes);
        store::save_state(&self.path, &state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_signature::SIGNATURE_DIM;

    fn sig(fill: f32) -> Signature {
        Signature::from_vec(vec![fill; SIGNATURE_DIM]).unwrap()
    }

    fn registry() -> (tempfile::TempDir, IdentityRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = IdentityRegistry::open(dir.path());
        (dir, registry)
    }

    #[test]
    fn create_assigns_id_and_default_role() {
        let (_dir, registry) = registry();
        let identity = registry
            .create(NewIdentity {
                name: "Iris Vega".into(),
                ..NewIdentity::default()
            })
            .unwrap();
        assert_eq!(identity.role, "Staff");
        assert!(identity.signature.is_none());
        assert_eq!(registry.get(identity.id).unwrap().name, "Iris Vega");
    }

    #[test]
    fn corrupt_stored_signature_surfaces_as_error() {
        let (_dir, registry) = registry();
        let identity = registry
            .create(NewIdentity {
                name: "Sal".into(),
                ..NewIdentity::default()
            })
            .unwrap();
        registry
            .put_signature_bytes(identity.id, vec![1, 2, 3])
            .unwrap();

        let mut entries = registry.enrolled().unwrap();
        let entry = entries.next().expect("one enrolled entry");
        assert!(matches!(entry, Err(RegistryError::Malformed(_))));
    }

    #[test]
    fn enroll_replaces_previous_signature() {
        let (_dir, registry) = registry();
        let identity = registry
            .create(NewIdentity {
                name: "Rey".into(),
                ..NewIdentity::default()
            })
            .unwrap();
        registry.enroll(identity.id, &sig(0.1)).unwrap();
        registry.enroll(identity.id, &sig(0.9)).unwrap();

        let stored = registry.get(identity.id).unwrap().signature.unwrap();
        assert_eq!(stored, sig(0.9).to_bytes());
    }
}
