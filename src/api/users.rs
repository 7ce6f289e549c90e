//! Session user endpoints.

use reqwest::Method;
use serde_json::{Map, Value};

use super::Gateway;
use crate::errors::ApiError;
use crate::models::User;

const CURRENT_USER_PATH: &str = "/api/account/users/current-user/";

impl Gateway {
    /// GET the signed-in user.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let request = self.request(Method::GET, CURRENT_USER_PATH);
        self.fetch_json(request).await
    }

    /// PATCH the signed-in user's profile.
    pub async fn update_current_user(&self, changes: &Map<String, Value>) -> Result<User, ApiError> {
        let request = self.request(Method::PATCH, CURRENT_USER_PATH).json(changes);
        self.fetch_json(request).await
    }
}
