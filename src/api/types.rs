//! Payloads exchanged with the trick-sharing site

use serde::{Deserialize, Serialize};

/// Signed-in user as returned by `/api/user/current/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_profile: Option<String>,
}

/// Author block embedded in a trick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrickOwner {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_profile: Option<String>,
}

/// Tags arrive either as a list or as one comma-separated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    List(Vec<String>),
    Joined(String),
}

impl Default for Tags {
    fn default() -> Self {
        Tags::List(Vec::new())
    }
}

impl Tags {
    /// Individual tags, splitting a joined string on commas
    pub fn into_list(self) -> Vec<String> {
        match self {
            Tags::List(tags) => tags,
            Tags::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// One shared bookmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trick {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub origin_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    pub user: TrickOwner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Response of `/api/trick/tricks-user`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TricksByUser {
    #[serde(default)]
    pub tricks: Vec<Trick>,
    #[serde(default)]
    pub tricks_count: u64,
}

/// `{ "data": ... }` wrapper used by most endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Form submitted to create a trick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewTrick {
    pub title: String,
    pub origin_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_accepts_mongo_id() {
        let user: User = serde_json::from_value(json!({
            "_id": "54a1",
            "username": "rin",
            "email": "rin@example.com"
        }))
        .unwrap();
        assert_eq!(user.id, "54a1");
        assert_eq!(user.email.as_deref(), Some("rin@example.com"));
        assert!(user.photo_profile.is_none());
    }

    #[test]
    fn test_tags_from_joined_string() {
        let tags: Tags = serde_json::from_value(json!("rust , async,  ,tokio")).unwrap();
        assert_eq!(tags.into_list(), vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn test_tags_from_list() {
        let tags: Tags = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(tags.into_list(), vec!["a", "b"]);
    }

    #[test]
    fn test_tricks_by_user_defaults() {
        let res: TricksByUser = serde_json::from_value(json!({})).unwrap();
        assert!(res.tricks.is_empty());
        assert_eq!(res.tricks_count, 0);
    }

    #[test]
    fn test_envelope_of_tricks() {
        let env: Envelope<Vec<Trick>> = serde_json::from_value(json!({
            "data": [{
                "title": "Pin a future",
                "origin_url": "https://example.com/pin",
                "tags": "rust,async",
                "user": {"username": "rin"}
            }]
        }))
        .unwrap();
        assert_eq!(env.data.len(), 1);
        assert_eq!(env.data[0].user.username, "rin");
        assert!(env.message.is_none());
    }
}
