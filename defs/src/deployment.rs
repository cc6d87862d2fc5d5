use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Discriminator shared by every deployment document in the collection.
pub const OBJTYPE_DEPLOYMENT: &str = "Deployment";

/// Attributes the database adds to every stored document besides `_key`.
const REVISION_FIELDS: [&str; 2] = ["_id", "_rev"];

fn default_objtype() -> String {
    OBJTYPE_DEPLOYMENT.to_string()
}

fn empty_key_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let key = Option::<String>::deserialize(deserializer)?;
    Ok(key.filter(|key| !key.is_empty()))
}

/// A deployment record as stored in the document database and returned by the API.
///
/// Fields the service knows about are typed; anything else submitted by a
/// client is kept in `metadata` and written back out unchanged.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Deployment {
    /// Database assigned key, unset until the record has been persisted.
    #[serde(
        rename = "_key",
        default,
        deserialize_with = "empty_key_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_objtype")]
    pub objtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_num: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starttime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endtime: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Deployment {
    pub fn new() -> Self {
        Deployment {
            key: None,
            name: None,
            objtype: default_objtype(),
            application: None,
            environment: None,
            components: vec![],
            deployment_num: None,
            result: None,
            starttime: None,
            endtime: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_deployment(&self) -> bool {
        self.objtype == OBJTYPE_DEPLOYMENT
    }

    /// Overwrites whatever discriminator the client sent.
    pub fn mark_as_deployment(&mut self) {
        self.objtype = default_objtype();
    }

    /// Decodes a document read back from the database, dropping its revision attributes.
    pub fn from_document(mut document: serde_json::Value) -> Result<Self, serde_json::Error> {
        if let Some(obj) = document.as_object_mut() {
            for field in REVISION_FIELDS {
                obj.remove(field);
            }
        }
        serde_json::from_value(document)
    }

    /// Document body without database attributes, which must not affect the content address.
    pub fn content(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("_key");
            for field in REVISION_FIELDS {
                obj.remove(field);
            }
        }
        Ok(value)
    }
}

impl Default for Deployment {
    fn default() -> Self {
        Deployment::new()
    }
}
