use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub images: Option<Vec<String>>,
}

impl EventChanges {
    /// Writes the present fields onto `event`.
    pub fn apply_to(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = Some(description);
        }
        if let Some(location) = self.location {
            event.location = Some(location);
        }
        if let Some(starts_at) = self.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = self.ends_at {
            event.ends_at = Some(ends_at);
        }
        if let Some(images) = self.images {
            event.images = images;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_changes_keep_absent_fields() {
        let now = Utc::now();
        let mut event = Event {
            id: Uuid::new_v4(),
            title: "Gala".to_string(),
            description: Some("Black tie".to_string()),
            location: Some("Taipei".to_string()),
            starts_at: now,
            ends_at: None,
            images: vec!["/img/gala.png".to_string()],
            created_at: now,
        };

        EventChanges {
            title: Some("Winter Gala".to_string()),
            ends_at: Some(now + Duration::hours(3)),
            ..EventChanges::default()
        }
        .apply_to(&mut event);

        assert_eq!(event.title, "Winter Gala");
        assert_eq!(event.description.as_deref(), Some("Black tie"));
        assert_eq!(event.ends_at, Some(now + Duration::hours(3)));
        assert_eq!(event.images.len(), 1);
    }
}
