//! User and audit persistence behind injectable trait seams.
//!
//! The server only ever appends: registrations go to a JSONL user store and
//! raw questionnaires to a JSONL audit log. Handlers talk to the traits, so
//! tests inject the in-memory implementations and never touch disk.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ds_core::{Error, Result};
use ds_inference::predictor::Questionnaire;
use serde::{Deserialize, Serialize};

/// A registered user as persisted. Only the bcrypt hash of the password is
/// ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub password_hash: String,
}

/// Registered-user persistence.
pub trait UserStore: Send + Sync {
    /// Insert a new user. A duplicate email is a domain error.
    fn insert_user(&self, user: StoredUser) -> Result<()>;

    /// Look a user up by email.
    fn find_user(&self, email: &str) -> Result<Option<StoredUser>>;
}

/// Raw questionnaire audit log (the prediction itself is not persisted).
pub trait AuditStore: Send + Sync {
    fn record_questionnaire(&self, questionnaire: &Questionnaire) -> Result<()>;
}

impl<S: UserStore + ?Sized> UserStore for std::sync::Arc<S> {
    fn insert_user(&self, user: StoredUser) -> Result<()> {
        (**self).insert_user(user)
    }

    fn find_user(&self, email: &str) -> Result<Option<StoredUser>> {
        (**self).find_user(email)
    }
}

impl<S: AuditStore + ?Sized> AuditStore for std::sync::Arc<S> {
    fn record_questionnaire(&self, questionnaire: &Questionnaire) -> Result<()> {
        (**self).record_questionnaire(questionnaire)
    }
}

// ---------------------------------------------------------------------------
// JSONL file implementations
// ---------------------------------------------------------------------------

/// Append-only JSONL user store with an in-memory email index loaded at
/// startup.
pub struct JsonlUserStore {
    path: PathBuf,
    users: Mutex<HashMap<String, StoredUser>>,
}

impl JsonlUserStore {
    /// Open (or create) the store, loading any existing records.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut users = HashMap::new();
        if path.exists() {
            for (i, line) in std::fs::read_to_string(path)?.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let user: StoredUser = serde_json::from_str(line).map_err(|e| {
                    Error::Data(format!("corrupt user store {} line {}: {e}", path.display(), i + 1))
                })?;
                users.insert(user.email.clone(), user);
            }
        }
        Ok(Self { path: path.to_path_buf(), users: Mutex::new(users) })
    }

    fn append_line(&self, user: &StoredUser) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(user)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl UserStore for JsonlUserStore {
    fn insert_user(&self, user: StoredUser) -> Result<()> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if users.contains_key(&user.email) {
            return Err(Error::Domain("Email already registered".to_string()));
        }
        self.append_line(&user)?;
        users.insert(user.email.clone(), user);
        Ok(())
    }

    fn find_user(&self, email: &str) -> Result<Option<StoredUser>> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.get(email).cloned())
    }
}

/// Append-only JSONL questionnaire log.
pub struct JsonlAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self { path: path.to_path_buf(), write_lock: Mutex::new(()) })
    }
}

impl AuditStore for JsonlAuditStore {
    fn record_questionnaire(&self, questionnaire: &Questionnaire) -> Result<()> {
        let _guard = self.write_lock.lock().expect("audit store lock poisoned");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(questionnaire)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementations (tests, local experiments)
// ---------------------------------------------------------------------------

/// In-memory user store, same semantics as the JSONL one.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, StoredUser>>,
}

impl UserStore for MemoryUserStore {
    fn insert_user(&self, user: StoredUser) -> Result<()> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if users.contains_key(&user.email) {
            return Err(Error::Domain("Email already registered".to_string()));
        }
        users.insert(user.email.clone(), user);
        Ok(())
    }

    fn find_user(&self, email: &str) -> Result<Option<StoredUser>> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.get(email).cloned())
    }
}

/// In-memory audit log.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<Questionnaire>>,
}

impl MemoryAuditStore {
    /// Number of recorded questionnaires.
    pub fn len(&self) -> usize {
        self.records.lock().expect("audit store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditStore for MemoryAuditStore {
    fn record_questionnaire(&self, questionnaire: &Questionnaire) -> Result<()> {
        self.records.lock().expect("audit store lock poisoned").push(questionnaire.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> StoredUser {
        StoredUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            gender: "Female".into(),
            email: email.into(),
            phone: "0123456789".into(),
            address: "12 Analytical Way".into(),
            password_hash: "$2b$04$fakehash".into(),
        }
    }

    #[test]
    fn jsonl_store_rejects_duplicate_email_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/users.jsonl");

        let store = JsonlUserStore::open(&path).unwrap();
        store.insert_user(user("a@example.com")).unwrap();
        let err = store.insert_user(user("a@example.com")).unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");

        // Reopen: the record is still there.
        drop(store);
        let store = JsonlUserStore::open(&path).unwrap();
        assert!(store.find_user("a@example.com").unwrap().is_some());
        assert!(store.find_user("b@example.com").unwrap().is_none());
        assert!(store.insert_user(user("a@example.com")).is_err());
    }

    #[test]
    fn audit_store_appends_one_line_per_questionnaire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/audit.jsonl");
        let store = JsonlAuditStore::open(&path).unwrap();

        let q = Questionnaire {
            age: 40,
            sex: 1,
            polyuria: 0,
            polydipsia: 0,
            sudden_weight_loss: 0,
            weakness: 0,
            polyphagia: 0,
            genital_thrush: 0,
            visual_blurring: 0,
            itching: 0,
            irritability: 0,
            delayed_healing: 0,
            partial_paresis: 0,
            muscle_stiffness: 0,
            alopecia: 0,
            obesity: 0,
        };
        store.record_questionnaire(&q).unwrap();
        store.record_questionnaire(&q).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        // Wire format stays camelCase for downstream analysis tooling.
        assert!(text.contains("\"suddenWeightLoss\":0"));
    }
}
