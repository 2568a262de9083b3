use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix that marks a claim's sole role as an internal-system call.
///
/// See [`AuthenticationClaims::is_internal_system`].
pub const INTERNAL_SYSTEM_ROLE_PREFIX: &str = "system_internal";

/// Fixed metadata keys used when projecting claims onto a pub/sub message
/// or gRPC metadata carrier. Keep this list in sync with `AsMetadata`/
/// `ClaimsFromMap` — heterogeneous services interoperate only if every
/// implementation agrees on these exact keys.
pub mod metadata_keys {
    pub const SUBJECT: &str = "sub";
    pub const TENANT_ID: &str = "tenant_id";
    pub const PARTITION_ID: &str = "partition_id";
    pub const ACCESS_ID: &str = "access_id";
    pub const CONTACT_ID: &str = "contact_id";
    pub const ROLES: &str = "roles";
}

/// Immutable identity envelope carried on the request/message context.
///
/// Every accessor first returns the named field; when that field is empty
/// it falls back to the extension map under the same key (see
/// [`AuthenticationClaims::subject`] and friends). The only sanctioned
/// mutation is [`AuthenticationClaims::absorb_from_headers`], which may run
/// exactly once, at request entry, and only for an internal-system claim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthenticationClaims {
    pub subject: String,
    pub tenant_id: String,
    pub partition_id: String,
    pub access_id: String,
    pub contact_id: String,
    pub roles: Vec<String>,
    /// Future/unknown fields, keyed exactly as they arrived (JWT claim name
    /// or metadata key). Also used as the fallback source for the named
    /// fields above when those are empty.
    #[serde(default)]
    pub extension: BTreeMap<String, Value>,
}

impl AuthenticationClaims {
    /// Construct claims directly — the sanctioned path for tests and for
    /// service-to-service callers that mint claims without a JWT.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn with_partition(mut self, partition_id: impl Into<String>) -> Self {
        self.partition_id = partition_id.into();
        self
    }

    pub fn with_access_id(mut self, access_id: impl Into<String>) -> Self {
        self.access_id = access_id.into();
        self
    }

    pub fn with_contact_id(mut self, contact_id: impl Into<String>) -> Self {
        self.contact_id = contact_id.into();
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    fn field_or_extension(&self, field: &str, key: &str) -> String {
        if !field.is_empty() {
            return field.to_string();
        }
        self.extension
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub fn subject(&self) -> String {
        self.field_or_extension(&self.subject, metadata_keys::SUBJECT)
    }

    pub fn tenant_id(&self) -> String {
        self.field_or_extension(&self.tenant_id, metadata_keys::TENANT_ID)
    }

    pub fn partition_id(&self) -> String {
        self.field_or_extension(&self.partition_id, metadata_keys::PARTITION_ID)
    }

    pub fn access_id(&self) -> String {
        self.field_or_extension(&self.access_id, metadata_keys::ACCESS_ID)
    }

    pub fn contact_id(&self) -> String {
        self.field_or_extension(&self.contact_id, metadata_keys::CONTACT_ID)
    }

    /// Roles, falling back to a comma-separated string under `roles` or
    /// `role` in the extension map when the structured field is empty.
    pub fn roles(&self) -> Vec<String> {
        if !self.roles.is_empty() {
            return self.roles.clone();
        }
        for key in ["roles", "role"] {
            if let Some(raw) = self.extension.get(key).and_then(Value::as_str) {
                let parsed: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if !parsed.is_empty() {
                    return parsed;
                }
            }
        }
        Vec::new()
    }

    /// An internal-system claim's sole role begins with
    /// [`INTERNAL_SYSTEM_ROLE_PREFIX`]. It is the only kind of claim allowed
    /// to absorb tenancy from inbound headers, and is exempt from automatic
    /// datastore query scoping.
    pub fn is_internal_system(&self) -> bool {
        let roles = self.roles();
        roles.len() == 1 && roles[0].starts_with(INTERNAL_SYSTEM_ROLE_PREFIX)
    }

    /// Serialize the identity into the fixed flat string map used for
    /// pub/sub metadata and gRPC carriers. Always writes all six keys
    /// (empty string for unset fields) so `ClaimsFromMap` round-trips.
    pub fn as_metadata(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(metadata_keys::SUBJECT.to_string(), self.subject());
        map.insert(metadata_keys::TENANT_ID.to_string(), self.tenant_id());
        map.insert(metadata_keys::PARTITION_ID.to_string(), self.partition_id());
        map.insert(metadata_keys::ACCESS_ID.to_string(), self.access_id());
        map.insert(metadata_keys::CONTACT_ID.to_string(), self.contact_id());
        map.insert(metadata_keys::ROLES.to_string(), self.roles().join(","));
        map
    }

    /// Inverse of [`AuthenticationClaims::as_metadata`].
    pub fn from_metadata(map: &BTreeMap<String, String>) -> Self {
        let roles = map
            .get(metadata_keys::ROLES)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            subject: map.get(metadata_keys::SUBJECT).cloned().unwrap_or_default(),
            tenant_id: map
                .get(metadata_keys::TENANT_ID)
                .cloned()
                .unwrap_or_default(),
            partition_id: map
                .get(metadata_keys::PARTITION_ID)
                .cloned()
                .unwrap_or_default(),
            access_id: map
                .get(metadata_keys::ACCESS_ID)
                .cloned()
                .unwrap_or_default(),
            contact_id: map
                .get(metadata_keys::CONTACT_ID)
                .cloned()
                .unwrap_or_default(),
            roles,
            extension: BTreeMap::new(),
        }
    }

    /// Absorb tenant/partition/access/contact/roles from inbound request
    /// headers when they are empty on this claim. Only legal for an
    /// internal-system claim, and meant to run exactly once, at request
    /// entry — it is the sole sanctioned mutation on an otherwise immutable
    /// envelope. Non-system claims are returned unchanged.
    pub fn absorb_from_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        if !self.is_internal_system() {
            return self;
        }
        if self.tenant_id.is_empty() {
            if let Some(v) = headers.get(metadata_keys::TENANT_ID) {
                self.tenant_id = v.clone();
            }
        }
        if self.partition_id.is_empty() {
            if let Some(v) = headers.get(metadata_keys::PARTITION_ID) {
                self.partition_id = v.clone();
            }
        }
        if self.access_id.is_empty() {
            if let Some(v) = headers.get(metadata_keys::ACCESS_ID) {
                self.access_id = v.clone();
            }
        }
        if self.contact_id.is_empty() {
            if let Some(v) = headers.get(metadata_keys::CONTACT_ID) {
                self.contact_id = v.clone();
            }
        }
        if self.roles.is_empty() {
            if let Some(v) = headers.get(metadata_keys::ROLES) {
                self.roles = v
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        self
    }
}
