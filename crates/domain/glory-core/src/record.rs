use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = String;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl Identity {
    pub fn scope(&self) -> Scope {
        if self.is_admin {
            Scope::Any
        } else {
            Scope::Owner(self.user_id.clone())
        }
    }
}

/// Which remote records an operation may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Owner(UserId),
    /// Administrators may read and update any user's records.
    Any,
}

impl Scope {
    pub fn permits(&self, owner_id: &str) -> bool {
        match self {
            Scope::Owner(id) => id == owner_id,
            Scope::Any => true,
        }
    }
}

/// What gets written to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub owner_id: UserId,
    pub name: String,
    pub template_id: String,
    pub content: serde_json::Value,
}

/// A record as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    pub owner_id: UserId,
    pub name: String,
    pub template_id: String,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pick the most recently updated record; ties go to the latest created.
pub fn most_recent(candidates: impl IntoIterator<Item = RemoteRecord>) -> Option<RemoteRecord> {
    candidates
        .into_iter()
        .max_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then(a.created_at.cmp(&b.created_at))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, updated_secs: i64) -> RemoteRecord {
        let ts = Utc.timestamp_opt(updated_secs, 0).unwrap();
        RemoteRecord {
            id: id.into(),
            owner_id: "u1".into(),
            name: "Amna Tariq".into(),
            template_id: crate::DEFAULT_TEMPLATE_ID.into(),
            content: serde_json::Value::Null,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn most_recent_prefers_latest_update() {
        let picked = most_recent(vec![record("a", 10), record("b", 30), record("c", 20)]);
        assert_eq!(picked.unwrap().id, "b");
        assert!(most_recent(Vec::new()).is_none());
    }

    #[test]
    fn owner_scope_only_permits_own_records() {
        let user = Identity {
            user_id: "u1".into(),
            email: "u1@example.com".into(),
            is_admin: false,
        };
        assert!(user.scope().permits("u1"));
        assert!(!user.scope().permits("u2"));

        let admin = Identity {
            is_admin: true,
            ..user
        };
        assert!(admin.scope().permits("u2"));
    }
}
