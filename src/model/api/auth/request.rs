use serde::{Deserialize, Serialize};

/// A sign-in request carrying an ID token from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id_token: String,
}
