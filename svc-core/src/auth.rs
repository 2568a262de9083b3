//! Authorization check client: `POST {namespace, object, relation,
//! subject_id}` to the configured read URI, `{allowed: bool}` response,
//! any status outside `[200,300)` is a failure. Grounded on the teacher's
//! `r2e-openfga::backend` HTTP-call shape, without vendoring the OpenFGA
//! wire protocol itself (out of scope per §1).

use serde::{Deserialize, Serialize};

use crate::config::AuthorizationConfig;
use crate::error::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationCheck {
    pub namespace: String,
    pub object: String,
    pub relation: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
}

#[derive(Clone)]
pub struct AuthorizationClient {
    http: reqwest::Client,
    read_uri: String,
}

impl AuthorizationClient {
    pub fn new(config: &AuthorizationConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            read_uri: config.read_uri.clone(),
        }
    }

    pub async fn check(&self, request: &AuthorizationCheck) -> Result<bool, ServiceError> {
        let response = self
            .http
            .post(&self.read_uri)
            .json(request)
            .send()
            .await
            .map_err(|err| ServiceError::Io(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::Io(format!(
                "authorization check returned status {}",
                response.status()
            )));
        }

        let decision: AuthorizationDecision = response
            .json()
            .await
            .map_err(|err| ServiceError::Io(err.to_string()))?;
        Ok(decision.allowed)
    }
}
