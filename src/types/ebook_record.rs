use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::types::LayoutMode;

/// Publication state derived from an ebook's progress.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EbookStatus {
    /// Generation has not reached 100%.
    Draft,

    /// Generation is complete.
    Published,
}

impl fmt::Display for EbookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EbookStatus::Draft => write!(f, "Brouillon"),
            EbookStatus::Published => write!(f, "Publié"),
        }
    }
}

/// A saved ebook as listed by `GET /api/ebook/list`.
///
/// Records come from other clients too, so reading is forgiving: a missing
/// or `null` title is empty, a missing or unknown style is the default, and
/// an unreadable timestamp is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EbookRecord {
    /// Title of the ebook.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub title: String,

    /// Generated text.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub content: String,

    /// Preview style the ebook was saved with.
    #[serde(default, deserialize_with = "deserialize_style")]
    pub style: LayoutMode,

    /// Generation progress in percent.
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,

    /// Last modification time.
    #[serde(default, with = "crate::utils::time::lenient")]
    pub updated_at: Option<OffsetDateTime>,
}

impl EbookRecord {
    /// Progress clamped to `[0, 100]`.
    pub fn progress(&self) -> u8 {
        self.progress.min(100)
    }

    /// Publication state: published once progress reaches 100.
    pub fn status(&self) -> EbookStatus {
        if self.progress() >= 100 {
            EbookStatus::Published
        } else {
            EbookStatus::Draft
        }
    }

    /// Sales shown on the dashboard: one per ten points of progress.
    pub fn sales(&self) -> u8 {
        self.progress() / 10
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_style<'de, D>(deserializer: D) -> Result<LayoutMode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let style = Option::<String>::deserialize(deserializer)?;
    Ok(style
        .and_then(|style| style.parse().ok())
        .unwrap_or_default())
}

// The backend does not validate progress; anything numeric is clamped.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(value.clamp(0.0, 100.0) as u8)
}

/// Body of `GET /api/ebook/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EbookList {
    /// The saved ebooks.  Items that cannot be read as a record are skipped.
    #[serde(default, deserialize_with = "deserialize_items")]
    pub items: Vec<EbookRecord>,
}

fn deserialize_items<'de, D>(deserializer: D) -> Result<Vec<EbookRecord>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let items = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping unreadable ebook record");
                None
            }
        })
        .collect();
    Ok(items)
}

/// Body of `POST /api/ebook/save`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveEbookParams {
    /// Title of the ebook.
    pub title: String,

    /// Full accumulated text of the completed stream.
    pub content: String,

    /// Preview style selected when the stream completed.
    pub style: LayoutMode,

    /// Last extracted progress.
    pub progress: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_list_with_missing_fields() {
        let json = r#"{"items":[
            {"title":"Guide","style":"pdf","progress":100,"updated_at":"2025-01-02T03:04:05Z"},
            {"title":"Brouillon"}
        ]}"#;
        let list: EbookList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].style, LayoutMode::Pdf);
        assert_eq!(list.items[0].status(), EbookStatus::Published);
        assert!(list.items[0].updated_at.is_some());
        assert_eq!(list.items[1].style, LayoutMode::Book);
        assert_eq!(list.items[1].status(), EbookStatus::Draft);
        assert!(list.items[1].updated_at.is_none());
    }

    #[test]
    fn timestamp_without_offset_is_utc() {
        let json = r#"{"items":[
            {"title":"Guide","updated_at":"2025-01-02T03:04:05Z"},
            {"title":"Local","updated_at":"2025-01-02T03:04:05.123456"}
        ]}"#;
        let list: EbookList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(
            list.items[1].updated_at,
            Some(time::macros::datetime!(2025-01-02 03:04:05.123456 UTC))
        );
    }

    #[test]
    fn unreadable_timestamps_are_none() {
        let json = r#"{"items":[
            {"title":"A","updated_at":"la semaine dernière"},
            {"title":"B","updated_at":""},
            {"title":"C","updated_at":true},
            {"title":"D","updated_at":1735787045000}
        ]}"#;
        let list: EbookList = serde_json::from_str(json).unwrap();
        let dates: Vec<_> = list.items.iter().map(|item| item.updated_at).collect();
        assert_eq!(
            dates,
            vec![
                None,
                None,
                None,
                Some(time::macros::datetime!(2025-01-02 03:04:05 UTC))
            ]
        );
    }

    #[test]
    fn null_or_unknown_style_is_default() {
        let json = r#"{"items":[
            {"title":"A","style":null},
            {"title":"B","style":"epub"},
            {"title":"C","style":"PDF"}
        ]}"#;
        let list: EbookList = serde_json::from_str(json).unwrap();
        let styles: Vec<LayoutMode> = list.items.iter().map(|item| item.style).collect();
        assert_eq!(
            styles,
            vec![LayoutMode::Book, LayoutMode::Book, LayoutMode::Pdf]
        );
    }

    #[test]
    fn missing_or_null_title_is_empty() {
        let json = r#"{"items":[{"progress":20},{"title":null,"content":null},{"title":"Guide"}]}"#;
        let list: EbookList = serde_json::from_str(json).unwrap();
        let titles: Vec<&str> = list.items.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, vec!["", "", "Guide"]);
        assert_eq!(list.items[0].progress(), 20);
    }

    #[test]
    fn malformed_items_are_skipped() {
        let json = r#"{"items":[
            "pas un ebook",
            {"title":"Guide","progress":100},
            {"title":["liste"]},
            {"title":"Brouillon","progress":"quarante"}
        ]}"#;
        let list: EbookList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].title, "Guide");
    }

    #[test]
    fn missing_items_is_empty() {
        let list: EbookList = serde_json::from_str("{}").unwrap();
        assert!(list.items.is_empty());
    }

    #[test]
    fn out_of_range_progress_is_clamped_on_read() {
        let json = r#"{"items":[{"title":"A","progress":300},{"title":"B","progress":-4},{"title":"C","progress":null}]}"#;
        let list: EbookList = serde_json::from_str(json).unwrap();
        let progress: Vec<u8> = list.items.iter().map(|item| item.progress).collect();
        assert_eq!(progress, vec![100, 0, 0]);
    }

    #[test]
    fn progress_is_clamped() {
        let record = EbookRecord {
            title: "Trop".to_string(),
            content: String::new(),
            style: LayoutMode::Scroll,
            progress: 250,
            updated_at: None,
        };
        assert_eq!(record.progress(), 100);
        assert_eq!(record.status(), EbookStatus::Published);
    }

    #[test]
    fn save_params_serialization() {
        let params = SaveEbookParams {
            title: "Mon Ebook IA".to_string(),
            content: "Il était une fois.".to_string(),
            style: LayoutMode::Book,
            progress: 40,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Mon Ebook IA",
                "content": "Il était une fois.",
                "style": "book",
                "progress": 40,
            })
        );
    }
}
