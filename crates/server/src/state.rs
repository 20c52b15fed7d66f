use std::sync::Arc;

use services::ProgressTracker;

use crate::auth::AuthKeys;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<ProgressTracker>,
    pub auth: Arc<AuthKeys>,
}

impl AppState {
    #[must_use]
    pub fn new(tracker: ProgressTracker, auth: AuthKeys) -> Self {
        Self {
            tracker: Arc::new(tracker),
            auth: Arc::new(auth),
        }
    }
}
