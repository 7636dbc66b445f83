use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct PortalSessionRequest {
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDogProfileRequest {
    #[serde(default)]
    pub partner_id: Option<i64>,
    #[serde(default, rename = "dogData")]
    pub dog_data: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct DogProfileCreated {
    #[serde(rename = "dogId")]
    pub dog_id: i64,
}
