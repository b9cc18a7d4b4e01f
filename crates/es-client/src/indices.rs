//! Index, alias and index template administration

use crate::client::ElasticClient;
use crate::transport::Request;
use es_storage_core::prelude::*;
use reqwest::Method;
use serde_json::{json, Value};

/// `reindex` waits for the task to finish unless told otherwise
pub const REINDEX_WAIT_FOR_COMPLETION: bool = true;

impl ElasticClient {
    /// Create an index; an existing index with the same name is not an error
    pub async fn create_index(&self, index: &str, body: &Value) -> Result<Value> {
        self.perform_unless_exists(Request::new("create_index", Method::PUT, &[index]).json(body.clone()))
            .await
    }

    pub async fn remove_index(&self, index: &str) -> Result<Value> {
        self.perform(Request::new("remove_index", Method::DELETE, &[index]))
            .await
    }

    pub async fn exists_index(&self, index: &str) -> Result<bool> {
        self.perform_exists(Request::new("exists_index", Method::HEAD, &[index]))
            .await
    }

    /// Clone `source` into a new index `destination`
    pub async fn clone_index(&self, source: &str, destination: &str) -> Result<Value> {
        self.perform(Request::new("clone_index", Method::PUT, &[source, "_clone", destination]))
            .await
    }

    pub async fn get_mapping(&self, index: &str) -> Result<Value> {
        self.perform(Request::new("get_mapping", Method::GET, &[index, "_mapping"]))
            .await
    }

    /// List every index with its settings, mappings and aliases
    pub async fn list_indices(&self) -> Result<Value> {
        self.perform(Request::new("list_indices", Method::GET, &["*"]))
            .await
    }

    pub async fn refresh(&self, index: &str, params: Option<&Params>) -> Result<Value> {
        self.perform(Request::new("refresh", Method::POST, &[index, "_refresh"]).params(params))
            .await
    }

    pub async fn flush(&self, index: &str, params: Option<&Params>) -> Result<Value> {
        self.perform(Request::new("flush", Method::POST, &[index, "_flush"]).params(params))
            .await
    }

    /// Copy every document of `source` into `destination`, waiting for completion
    pub async fn reindex(&self, source: &str, destination: &str) -> Result<Value> {
        self.reindex_with(source, destination, REINDEX_WAIT_FOR_COMPLETION)
            .await
    }

    /// Copy every document of `source` into `destination`
    ///
    /// Without `wait_for_completion` the cluster answers with a task id.
    pub async fn reindex_with(
        &self,
        source: &str,
        destination: &str,
        wait_for_completion: bool,
    ) -> Result<Value> {
        let request = Request::new("reindex", Method::POST, &["_reindex"])
            .param("wait_for_completion", wait_for_completion)
            .json(json!({
                "source": { "index": source },
                "dest": { "index": destination }
            }));
        self.perform(request).await
    }

    pub async fn update_by_query(&self, index: &str, query: &Value) -> Result<Value> {
        self.perform(
            Request::new("update_by_query", Method::POST, &[index, "_update_by_query"]).json(query.clone()),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Aliases
    // ------------------------------------------------------------------

    /// Apply a batch of alias `actions`
    pub async fn update_aliases(&self, body: &Value) -> Result<Value> {
        self.perform(Request::new("update_aliases", Method::POST, &["_aliases"]).json(body.clone()))
            .await
    }

    pub async fn delete_alias(&self, index: &str, alias: &str) -> Result<Value> {
        self.perform(Request::new("delete_alias", Method::DELETE, &[index, "_alias", alias]))
            .await
    }

    /// Check an alias, optionally restricted to one index
    pub async fn exists_alias(&self, alias: &str, index: Option<&str>) -> Result<bool> {
        let request = match index {
            Some(index) => Request::new("exists_alias", Method::HEAD, &[index, "_alias", alias]),
            None => Request::new("exists_alias", Method::HEAD, &["_alias", alias]),
        };
        self.perform_exists(request).await
    }

    pub async fn list_aliases(&self) -> Result<Value> {
        self.perform(Request::new("list_aliases", Method::GET, &["_alias", "*"]))
            .await
    }

    // ------------------------------------------------------------------
    // Index templates
    // ------------------------------------------------------------------

    /// Create or replace an index template; "already exists" is not an error
    pub async fn put_index_template(
        &self,
        name: &str,
        body: &Value,
        params: Option<&Params>,
    ) -> Result<Value> {
        let request = Request::new("put_index_template", Method::PUT, &["_index_template", name])
            .params(params)
            .json(body.clone());
        self.perform_unless_exists(request).await
    }

    pub async fn delete_index_template(&self, name: &str, params: Option<&Params>) -> Result<Value> {
        self.perform(
            Request::new("delete_index_template", Method::DELETE, &["_index_template", name]).params(params),
        )
        .await
    }

    pub async fn exists_index_template(&self, name: &str) -> Result<bool> {
        self.perform_exists(Request::new("exists_index_template", Method::HEAD, &["_index_template", name]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::client_for;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn already_exists(kind: &str) -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "type": kind,
                "reason": "index [widgets/xyz] already exists"
            },
            "status": 400
        }))
    }

    #[tokio::test]
    async fn test_create_index_twice() {
        let server = MockServer::start().await;
        let mapping = json!({"mappings": {"properties": {"x": {"type": "long"}}}});
        Mock::given(method("PUT"))
            .and(path("/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/widgets"))
            .respond_with(already_exists("resource_already_exists_exception"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let first = client.create_index("widgets", &mapping).await.unwrap();
        assert_eq!(first["acknowledged"], true);

        let second = client.create_index("widgets", &mapping).await.unwrap();
        assert_eq!(second["error"]["type"], "resource_already_exists_exception");
    }

    #[tokio::test]
    async fn test_create_index_bad_mapping_fails() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/widgets"))
            .respond_with(already_exists("mapper_parsing_exception"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.create_index("widgets", &json!({})).await.err().unwrap();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_put_index_template_tolerates_existing() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/_index_template/profiles"))
            .and(query_param("create", "true"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "root_cause": [{
                        "type": "illegal_argument_exception",
                        "reason": "index template [profiles] already exists"
                    }],
                    "type": "illegal_argument_exception",
                    "reason": "index template [profiles] already exists"
                },
                "status": 400
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params = vec![("create".to_string(), "true".to_string())];
        let result = client
            .put_index_template("profiles", &json!({"index_patterns": ["profile-*"]}), Some(&params))
            .await
            .unwrap();
        assert_eq!(result["error"]["type"], "illegal_argument_exception");
    }

    #[tokio::test]
    async fn test_put_index_template_rejects_invalid_template() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/_index_template/profiles"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"type": "illegal_argument_exception", "reason": "unknown setting [index.bogus]"},
                "status": 400
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .put_index_template("profiles", &json!({"index_patterns": ["profile-*"]}), None)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_reindex_waits_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_reindex"))
            .and(query_param("wait_for_completion", "true"))
            .and(body_json(json!({
                "source": {"index": "widgets-v1"},
                "dest": {"index": "widgets-v2"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 10, "created": 10})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.reindex("widgets-v1", "widgets-v2").await.unwrap();
        assert_eq!(result["created"], 10);
    }

    #[tokio::test]
    async fn test_exists_alias_paths() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/_alias/widgets"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/other/_alias/widgets"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.exists_alias("widgets", None).await.unwrap());
        assert!(!client.exists_alias("widgets", Some("other")).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_forwards_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/widgets/_refresh"))
            .and(query_param("ignore_unavailable", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_shards": {"total": 1}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let params = vec![("ignore_unavailable".to_string(), "true".to_string())];
        client.refresh("widgets", Some(&params)).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_index_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"type": "index_not_found_exception", "reason": "no such index [gone]"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.remove_index("gone").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_index_read_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widgets/_mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "widgets": {"mappings": {"properties": {"x": {"type": "long"}}}}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"widgets": {}, "gadgets": {}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/widgets"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let mapping = client.get_mapping("widgets").await.unwrap();
        assert_eq!(mapping["widgets"]["mappings"]["properties"]["x"]["type"], "long");

        let indices = client.list_indices().await.unwrap();
        assert_eq!(indices.as_object().unwrap().len(), 2);

        assert!(client.exists_index("widgets").await.unwrap());
        assert!(!client.exists_index("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_clone_and_flush() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/widgets/_clone/widgets-copy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true, "index": "widgets-copy"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/widgets/_flush"))
            .and(query_param("force", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_shards": {"total": 1}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cloned = client.clone_index("widgets", "widgets-copy").await.unwrap();
        assert_eq!(cloned["index"], "widgets-copy");

        let params = vec![("force".to_string(), "true".to_string())];
        client.flush("widgets", Some(&params)).await.unwrap();
    }

    #[tokio::test]
    async fn test_reindex_without_waiting_returns_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_reindex"))
            .and(query_param("wait_for_completion", "false"))
            .and(body_json(json!({
                "source": {"index": "widgets-v1"},
                "dest": {"index": "widgets-v2"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task": "node-1:42"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .reindex_with("widgets-v1", "widgets-v2", false)
            .await
            .unwrap();
        assert_eq!(result["task"], "node-1:42");
    }

    #[tokio::test]
    async fn test_update_by_query_forwards_body() {
        let server = MockServer::start().await;
        let body = json!({
            "query": {"term": {"kind": "old"}},
            "script": {"source": "ctx._source.kind = 'new'"}
        });
        Mock::given(method("POST"))
            .and(path("/widgets/_update_by_query"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updated": 3})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.update_by_query("widgets", &body).await.unwrap();
        assert_eq!(result["updated"], 3);
    }

    #[tokio::test]
    async fn test_alias_management() {
        let server = MockServer::start().await;
        let actions = json!({
            "actions": [
                {"remove": {"index": "widgets-v1", "alias": "widgets"}},
                {"add": {"index": "widgets-v2", "alias": "widgets"}}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/_aliases"))
            .and(body_json(actions.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/widgets-v2/_alias/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_alias/*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "widgets-v2": {"aliases": {"widgets": {}}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.update_aliases(&actions).await.unwrap();

        let aliases = client.list_aliases().await.unwrap();
        assert!(aliases["widgets-v2"]["aliases"].get("widgets").is_some());

        client.delete_alias("widgets-v2", "widgets").await.unwrap();
    }

    #[tokio::test]
    async fn test_template_exists_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/_index_template/profiles"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/_index_template/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/_index_template/profiles"))
            .and(query_param("master_timeout", "30s"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.exists_index_template("profiles").await.unwrap());
        assert!(!client.exists_index_template("missing").await.unwrap());

        let params = vec![("master_timeout".to_string(), "30s".to_string())];
        let result = client
            .delete_index_template("profiles", Some(&params))
            .await
            .unwrap();
        assert_eq!(result["acknowledged"], true);
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let errors = vec![
            client.remove_index("").await.err(),
            client.refresh("", None).await.err(),
            client.create_index(" ", &json!({})).await.err(),
            client.delete_alias("widgets", "").await.err(),
            client.put_index_template("", &json!({}), None).await.err(),
        ];
        for err in errors {
            assert!(matches!(err, Some(StorageError::InvalidInput { .. })));
        }
    }
}
