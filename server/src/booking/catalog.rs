use tracing::info;
use uuid::Uuid;

use crate::models::{Event, EventChanges, NewEvent};
use crate::store::BookingStore;
use crate::utils::error::AppError;

/// Event listings that bookings and ticket types hang off.
pub struct EventCatalog<'a> {
    store: &'a dyn BookingStore,
}

fn clean_images(images: Vec<String>) -> Vec<String> {
    images
        .into_iter()
        .map(|img| img.trim().to_string())
        .filter(|img| !img.is_empty())
        .collect()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<'a> EventCatalog<'a> {
    pub fn new(store: &'a dyn BookingStore) -> Self {
        Self { store }
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.store.list_events().await?)
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Event, AppError> {
        self.store
            .fetch_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    pub async fn create_event(&self, new: NewEvent) -> Result<Event, AppError> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::ValidationError(
                "Event title is required.".to_string(),
            ));
        }
        if new.ends_at.is_some_and(|ends| ends < new.starts_at) {
            return Err(AppError::ValidationError(
                "Event cannot end before it starts.".to_string(),
            ));
        }

        let event = self
            .store
            .create_event(NewEvent {
                title,
                description: blank_to_none(new.description),
                location: blank_to_none(new.location),
                images: clean_images(new.images),
                ..new
            })
            .await?;
        info!(event_id = %event.id, title = %event.title, "Event created");
        Ok(event)
    }

    pub async fn update_event(&self, id: Uuid, changes: EventChanges) -> Result<Event, AppError> {
        let current = self.get_event(id).await?;

        let title = match changes.title {
            Some(title) if title.trim().is_empty() => {
                return Err(AppError::ValidationError(
                    "Event title cannot be empty.".to_string(),
                ));
            }
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };
        let starts_at = changes.starts_at.unwrap_or(current.starts_at);
        let ends_at = changes.ends_at.or(current.ends_at);
        if ends_at.is_some_and(|ends| ends < starts_at) {
            return Err(AppError::ValidationError(
                "Event cannot end before it starts.".to_string(),
            ));
        }

        self.store
            .update_event(
                id,
                EventChanges {
                    title,
                    images: changes.images.map(clean_images),
                    ..changes
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    /// Refuses while any pending or confirmed booking exists for the event.
    /// Deleting removes its ticket types and cancelled bookings with it.
    pub async fn delete_event(&self, id: Uuid) -> Result<(), AppError> {
        self.get_event(id).await?;
        if self.store.event_in_use(id).await? {
            return Err(AppError::ValidationError(
                "Event has active bookings and cannot be deleted.".to_string(),
            ));
        }
        if !self.store.delete_event(id).await? {
            // A booking landed between the check and the delete.
            return Err(AppError::ValidationError(
                "Event has active bookings and cannot be deleted.".to_string(),
            ));
        }
        info!(event_id = %id, "Event deleted");
        Ok(())
    }
}
