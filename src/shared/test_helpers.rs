use std::sync::Mutex;

use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response, Router};
use fake::faker::name::en::Name;
use fake::Fake;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::modules::storage::BlobStore;

pub fn create_user(role: Role) -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::now_v7(),
        username: Name().fake(),
        role,
    }
}

pub fn create_employee() -> AuthenticatedUser {
    create_user(Role::Employee)
}

pub fn create_captain() -> AuthenticatedUser {
    create_user(Role::Captain)
}

pub fn create_admin() -> AuthenticatedUser {
    create_user(Role::Admin)
}

/// Router that sees `user` as the authenticated caller on every request
pub fn with_user_auth(router: Router, user: AuthenticatedUser) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
        },
    ))
}

/// Blob store that keeps objects in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<Vec<(String, usize, String)>>,
    fail_after: Mutex<Option<usize>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` more objects, then fail every put
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    pub fn urls(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _, _)| url.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        let mut fail_after = self.fail_after.lock().unwrap();
        if let Some(remaining) = fail_after.as_mut() {
            if *remaining == 0 {
                return Err(AppError::ExternalServiceError(
                    "storage unavailable".to_string(),
                ));
            }
            *remaining -= 1;
        }

        let url = format!("memory://{}", key);
        self.objects
            .lock()
            .unwrap()
            .push((url.clone(), data.len(), content_type.to_string()));
        Ok(url)
    }

    async fn remove(&self, url: &str) -> Result<()> {
        self.objects.lock().unwrap().retain(|(u, _, _)| u != url);
        Ok(())
    }
}
