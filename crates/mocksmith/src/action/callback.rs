//! Embedder-supplied callbacks that compute a response.

use crate::model::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ExpectationResponseCallback: Send + Sync {
    async fn handle(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse>;
}

/// Callbacks addressed by `httpClassCallback` (by name) and
/// `httpObjectCallback` (by client id).
#[derive(Default)]
pub struct CallbackRegistry {
    classes: RwLock<HashMap<String, Arc<dyn ExpectationResponseCallback>>>,
    objects: RwLock<HashMap<String, Arc<dyn ExpectationResponseCallback>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_class(
        &self,
        name: impl Into<String>,
        callback: Arc<dyn ExpectationResponseCallback>,
    ) {
        self.classes.write().insert(name.into(), callback);
    }

    pub fn register_object(
        &self,
        client_id: impl Into<String>,
        callback: Arc<dyn ExpectationResponseCallback>,
    ) {
        self.objects.write().insert(client_id.into(), callback);
    }

    pub fn unregister_object(&self, client_id: &str) -> bool {
        self.objects.write().remove(client_id).is_some()
    }

    pub fn class(&self, name: &str) -> Option<Arc<dyn ExpectationResponseCallback>> {
        self.classes.read().get(name).cloned()
    }

    pub fn object(&self, client_id: &str) -> Option<Arc<dyn ExpectationResponseCallback>> {
        self.objects.read().get(client_id).cloned()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("classes", &self.classes.read().len())
            .field("objects", &self.objects.read().len())
            .finish()
    }
}
