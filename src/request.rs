use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::identity::ClientIdentity;
use crate::validate::validate_inputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Otp,
}

/// Body of `POST /session`. Only obtainable through
/// [`SessionRequestBuilder::build`], so every instance has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRequest {
    client_id: ClientIdentity,
    remote_id: Uuid,
    auth_type: AuthType,
    auth_value: String,
}

impl SessionRequest {
    pub fn client_id(&self) -> &ClientIdentity {
        &self.client_id
    }

    pub fn remote_id(&self) -> Uuid {
        self.remote_id
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }
}

/// Connect-form state, updated on every edit so nothing is read out of band
/// when the operator submits.
#[derive(Debug, Clone, Default)]
pub struct SessionRequestBuilder {
    remote_id: String,
    otp: String,
}

impl SessionRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_remote_id(&mut self, value: impl Into<String>) -> &mut Self {
        self.remote_id = value.into();
        self
    }

    pub fn set_otp(&mut self, value: impl Into<String>) -> &mut Self {
        self.otp = value.into();
        self
    }

    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    pub fn otp(&self) -> &str {
        &self.otp
    }

    pub fn clear(&mut self) {
        self.remote_id.clear();
        self.otp.clear();
    }

    pub fn build(&self, identity: &ClientIdentity) -> Result<SessionRequest, ValidationError> {
        let remote_id = validate_inputs(&self.remote_id, &self.otp)?;
        Ok(SessionRequest {
            client_id: *identity,
            remote_id,
            auth_type: AuthType::Otp,
            auth_value: self.otp.clone(),
        })
    }
}
