//! In-memory profile image store for tests and single-node development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use amora_application::{ImageRecord, NewImageRecord, OrderUpdate, ProfileImageStore};
use amora_core::{AppError, AppResult, UserId};
use amora_domain::StorageId;

#[derive(Default)]
struct StoreState {
    tickets: HashMap<String, UserId>,
    images: Vec<ImageRecord>,
    blobs: HashMap<String, (String, Vec<u8>)>,
}

/// In-memory implementation of the profile image store port.
#[derive(Default)]
pub struct InMemoryImageStore {
    state: Mutex<StoreState>,
}

impl InMemoryImageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileImageStore for InMemoryImageStore {
    async fn save_upload_ticket(&self, user_id: UserId, token: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.tickets.insert(token.to_owned(), user_id);
        Ok(())
    }

    async fn take_upload_ticket(&self, token: &str) -> AppResult<Option<UserId>> {
        let mut state = self.state.lock().await;
        Ok(state.tickets.remove(token))
    }

    async fn register_image(&self, record: NewImageRecord) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .images
            .iter()
            .any(|image| image.storage_id == record.storage_id)
        {
            return Err(AppError::Conflict(format!(
                "image {} is already registered",
                record.storage_id
            )));
        }

        let position = i32::try_from(
            state
                .images
                .iter()
                .filter(|image| image.user_id == record.user_id)
                .count(),
        )
        .map_err(|error| AppError::Internal(format!("gallery too large: {error}")))?;

        state.blobs.insert(
            record.storage_id.as_str().to_owned(),
            (record.content_type, record.bytes),
        );
        state.images.push(ImageRecord {
            storage_id: record.storage_id,
            user_id: record.user_id,
            file_name: record.file_name,
            url: record.url,
            position,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_images(&self, user_id: UserId) -> AppResult<Vec<ImageRecord>> {
        let state = self.state.lock().await;
        let mut images: Vec<ImageRecord> = state
            .images
            .iter()
            .filter(|image| image.user_id == user_id)
            .cloned()
            .collect();
        images.sort_by_key(|image| image.position);
        Ok(images)
    }

    async fn fetch_content(
        &self,
        storage_id: &StorageId,
    ) -> AppResult<Option<(String, Vec<u8>)>> {
        let state = self.state.lock().await;
        Ok(state.blobs.get(storage_id.as_str()).cloned())
    }

    async fn update_order(&self, user_id: UserId, order: &[StorageId]) -> AppResult<OrderUpdate> {
        let mut state = self.state.lock().await;
        let owned: Vec<StorageId> = state
            .images
            .iter()
            .filter(|image| image.user_id == user_id)
            .map(|image| image.storage_id.clone())
            .collect();

        // The submitted order must be a permutation of the registered set;
        // anything else means a stale or still-processing id.
        if order.len() != owned.len() || !order.iter().all(|id| owned.contains(id)) {
            return Ok(OrderUpdate::InvalidImageIds);
        }

        for image in state
            .images
            .iter_mut()
            .filter(|image| image.user_id == user_id)
        {
            if let Some(position) = order
                .iter()
                .position(|id| id == &image.storage_id)
                .and_then(|position| i32::try_from(position).ok())
            {
                image.position = position;
            }
        }
        Ok(OrderUpdate::Applied)
    }

    async fn delete_image(&self, user_id: UserId, storage_id: &StorageId) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.images.len();
        state
            .images
            .retain(|image| !(image.user_id == user_id && &image.storage_id == storage_id));
        let deleted = state.images.len() != before;
        if deleted {
            state.blobs.remove(storage_id.as_str());
            // Close the position gap left by the removed image.
            let mut remaining: Vec<&mut ImageRecord> = state
                .images
                .iter_mut()
                .filter(|image| image.user_id == user_id)
                .collect();
            remaining.sort_by_key(|image| image.position);
            for (index, image) in remaining.into_iter().enumerate() {
                image.position = i32::try_from(index).unwrap_or(i32::MAX);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use amora_application::{NewImageRecord, OrderUpdate, ProfileImageStore};
    use amora_core::{AppResult, UserId};
    use amora_domain::StorageId;

    use super::InMemoryImageStore;

    async fn register(
        store: &InMemoryImageStore,
        user_id: UserId,
        id: &str,
    ) -> AppResult<StorageId> {
        let storage_id = StorageId::new(id)?;
        store
            .register_image(NewImageRecord {
                user_id,
                storage_id: storage_id.clone(),
                file_name: format!("{id}.jpg"),
                content_type: "image/jpeg".to_owned(),
                bytes: vec![1, 2, 3],
                url: format!("https://api.test/api/images/{id}/content"),
            })
            .await?;
        Ok(storage_id)
    }

    #[tokio::test]
    async fn images_are_partitioned_by_user() -> AppResult<()> {
        let store = InMemoryImageStore::new();
        let first_user = UserId::new();
        let second_user = UserId::new();
        register(&store, first_user, "a").await?;
        register(&store, second_user, "b").await?;

        let first_gallery = store.list_images(first_user).await?;
        assert_eq!(first_gallery.len(), 1);
        assert_eq!(first_gallery[0].storage_id.as_str(), "a");
        Ok(())
    }

    #[tokio::test]
    async fn order_update_is_all_or_nothing() -> AppResult<()> {
        let store = InMemoryImageStore::new();
        let user_id = UserId::new();
        let first = register(&store, user_id, "a").await?;
        let second = register(&store, user_id, "b").await?;

        let rejected = store
            .update_order(user_id, &[first.clone(), StorageId::new("ghost")?])
            .await?;
        assert_eq!(rejected, OrderUpdate::InvalidImageIds);
        let images = store.list_images(user_id).await?;
        assert_eq!(images[0].storage_id, first);

        let applied = store.update_order(user_id, &[second.clone(), first]).await?;
        assert_eq!(applied, OrderUpdate::Applied);
        let images = store.list_images(user_id).await?;
        assert_eq!(images[0].storage_id, second);
        Ok(())
    }

    #[tokio::test]
    async fn delete_compacts_positions() -> AppResult<()> {
        let store = InMemoryImageStore::new();
        let user_id = UserId::new();
        register(&store, user_id, "a").await?;
        let second = register(&store, user_id, "b").await?;
        register(&store, user_id, "c").await?;

        assert!(store.delete_image(user_id, &second).await?);
        let images = store.list_images(user_id).await?;
        let positions: Vec<i32> = images.iter().map(|image| image.position).collect();
        assert_eq!(positions, vec![0, 1]);
        Ok(())
    }
}
