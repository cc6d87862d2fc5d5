use serde_json::{json, Map, Value};

/// Filter over the shared collection: documents of one `objtype`, optionally
/// narrowed to those whose `name` or `_key` equals an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub objtype: String,
    pub identifier: Option<String>,
}

impl DocumentQuery {
    pub fn by_objtype(objtype: &str) -> Self {
        DocumentQuery {
            objtype: objtype.to_string(),
            identifier: None,
        }
    }

    pub fn by_name_or_key(objtype: &str, identifier: &str) -> Self {
        DocumentQuery {
            objtype: objtype.to_string(),
            identifier: Some(identifier.to_string()),
        }
    }

    /// AQL text and bind variables for running this query against `collection`.
    pub fn to_aql(&self, collection: &str) -> (String, Map<String, Value>) {
        let mut bind_vars = Map::new();
        bind_vars.insert("@collection".to_string(), json!(collection));
        bind_vars.insert("objtype".to_string(), json!(self.objtype));

        let aql = match &self.identifier {
            Some(identifier) => {
                bind_vars.insert("key".to_string(), json!(identifier));
                "FOR doc IN @@collection
    FILTER (doc.objtype == @objtype) AND (doc.name == @key OR doc._key == @key)
    RETURN doc"
            }
            None => {
                "FOR doc IN @@collection
    FILTER (doc.objtype == @objtype)
    RETURN doc"
            }
        };

        (aql.to_string(), bind_vars)
    }

    pub fn matches(&self, document: &Value) -> bool {
        if document.get("objtype").and_then(Value::as_str) != Some(self.objtype.as_str()) {
            return false;
        }
        match &self.identifier {
            Some(identifier) => {
                let name = document.get("name").and_then(Value::as_str);
                let key = document.get("_key").and_then(Value::as_str);
                name == Some(identifier.as_str()) || key == Some(identifier.as_str())
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_query_aql() {
        let (aql, bind_vars) = DocumentQuery::by_objtype("Deployment").to_aql("evidence");

        assert!(aql.contains("FILTER (doc.objtype == @objtype)"));
        assert!(!aql.contains("@key"));
        assert_eq!(
            Value::Object(bind_vars),
            json!({"@collection": "evidence", "objtype": "Deployment"})
        );
    }

    #[test]
    fn test_identifier_query_aql() {
        let (aql, bind_vars) =
            DocumentQuery::by_name_or_key("Deployment", "svc-a").to_aql("evidence");

        assert!(aql.contains("doc.name == @key OR doc._key == @key"));
        assert_eq!(
            Value::Object(bind_vars),
            json!({"@collection": "evidence", "objtype": "Deployment", "key": "svc-a"})
        );
    }

    #[test]
    fn test_matches_objtype() {
        let query = DocumentQuery::by_objtype("Deployment");
        assert!(query.matches(&json!({"objtype": "Deployment", "name": "a"})));
        assert!(!query.matches(&json!({"objtype": "Component", "name": "a"})));
        assert!(!query.matches(&json!({"name": "a"})));
    }

    #[test]
    fn test_matches_name_or_key() {
        let query = DocumentQuery::by_name_or_key("Deployment", "svc-a");
        assert!(query.matches(&json!({"objtype": "Deployment", "name": "svc-a", "_key": "1"})));
        assert!(query.matches(&json!({"objtype": "Deployment", "name": "other", "_key": "svc-a"})));
        assert!(!query.matches(&json!({"objtype": "Deployment", "name": "other", "_key": "2"})));
        assert!(!query.matches(&json!({"objtype": "Component", "name": "svc-a"})));
    }
}
