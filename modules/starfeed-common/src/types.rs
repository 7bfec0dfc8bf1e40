use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Feedback type for a star edge.
pub const FEEDBACK_STAR: &str = "star";

/// Categories an item can be filed under. Labels outside this set are
/// taxonomy terms only.
pub const CATEGORIES: [&str; 2] = ["book", "game"];

// --- Wire records ---
//
// Field names follow the store's PascalCase JSON convention.

/// One observed interaction between an identity and a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Feedback {
    pub feedback_type: String,
    pub user_id: String,
    pub item_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Feedback {
    /// Build a star edge from a raw `owner/name` repository name.
    pub fn star(user_id: &str, name_with_owner: &str, starred_at: DateTime<Utc>) -> Self {
        Self {
            feedback_type: FEEDBACK_STAR.to_string(),
            user_id: user_id.to_lowercase(),
            item_id: item_id_from_full_name(name_with_owner),
            timestamp: starred_at,
        }
    }
}

/// A catalog record in the recommendation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    pub item_id: String,
    #[serde(default)]
    pub is_hidden: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Partial item update. `None` fields are omitted from the request body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Cold-start seed record for an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: Vec<String>,
}

/// The store serializes empty label sets as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

// --- Slug normalization ---

/// `Owner/Name` → `owner:name`. Item ids are lowercase colon-separated slugs.
pub fn item_id_from_full_name(full_name: &str) -> String {
    full_name.replace('/', ":").to_lowercase()
}

/// `owner:name` → `owner/name`, the form the source API expects.
pub fn full_name_from_item_id(item_id: &str) -> String {
    item_id.replace(':', "/")
}

/// Intersect a label set with the fixed category set.
pub fn generate_categories<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    labels
        .into_iter()
        .filter(|label| CATEGORIES.contains(&label.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_roundtrip() {
        assert_eq!(item_id_from_full_name("Octo/Proj"), "octo:proj");
        assert_eq!(full_name_from_item_id("octo:proj"), "octo/proj");
    }

    #[test]
    fn star_edge_is_normalized() {
        let edge = Feedback::star("Alice", "Octo/Proj", Utc::now());
        assert_eq!(edge.feedback_type, "star");
        assert_eq!(edge.user_id, "alice");
        assert_eq!(edge.item_id, "octo:proj");
    }

    #[test]
    fn categories_intersect_fixed_set() {
        let labels = vec![
            "rust".to_string(),
            "game".to_string(),
            "book".to_string(),
        ];
        assert_eq!(generate_categories(&labels), vec!["game", "book"]);
        assert!(generate_categories(&Vec::new()).is_empty());
    }

    #[test]
    fn feedback_serializes_pascal_case() {
        let edge = Feedback::star("alice", "octo/proj", Utc::now());
        let json = serde_json::to_value(&edge).unwrap();
        assert!(json.get("FeedbackType").is_some());
        assert!(json.get("UserId").is_some());
        assert!(json.get("ItemId").is_some());
        assert!(json.get("Timestamp").is_some());
    }

    #[test]
    fn item_tolerates_null_labels() {
        let item: Item = serde_json::from_str(
            r#"{"ItemId":"octo:proj","Timestamp":"2023-01-01T00:00:00Z","Labels":null,"Categories":null,"Comment":null}"#,
        )
        .unwrap();
        assert!(item.labels.is_empty());
        assert!(item.categories.is_empty());
        assert!(item.comment.is_none());
        assert!(!item.is_hidden);
    }

    #[test]
    fn item_patch_omits_unset_fields() {
        let patch = ItemPatch {
            labels: Some(vec!["rust".to_string()]),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert!(json.get("Labels").is_some());
    }
}
