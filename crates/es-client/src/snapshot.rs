//! Snapshot repository and snapshot administration

use crate::client::ElasticClient;
use crate::transport::Request;
use es_storage_core::prelude::*;
use reqwest::Method;
use serde_json::Value;

impl ElasticClient {
    pub async fn create_snapshot_repository(&self, name: &str, repository: &Value) -> Result<Value> {
        self.perform(
            Request::new("create_snapshot_repository", Method::PUT, &["_snapshot", name])
                .json(repository.clone()),
        )
        .await
    }

    pub async fn get_snapshot_repository(&self, name: &str) -> Result<Value> {
        self.perform(Request::new("get_snapshot_repository", Method::GET, &["_snapshot", name]))
            .await
    }

    pub async fn delete_snapshot_repository(&self, name: &str) -> Result<Value> {
        self.perform(Request::new("delete_snapshot_repository", Method::DELETE, &["_snapshot", name]))
            .await
    }

    /// Status of the snapshots currently running in a repository
    pub async fn get_repository_snapshots(&self, name: &str) -> Result<Value> {
        self.perform(Request::new("get_repository_snapshots", Method::GET, &["_snapshot", name, "_status"]))
            .await
    }

    pub async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: Option<&Value>,
        params: Option<&Params>,
    ) -> Result<Value> {
        let request = Request::new("create_snapshot", Method::PUT, &["_snapshot", repository, snapshot])
            .params(params)
            .json_opt(body);
        self.perform(request).await
    }

    pub async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: Option<&Value>,
        params: Option<&Params>,
    ) -> Result<Value> {
        let request = Request::new(
            "restore_snapshot",
            Method::POST,
            &["_snapshot", repository, snapshot, "_restore"],
        )
        .params(params)
        .json_opt(body);
        self.perform(request).await
    }

    pub async fn delete_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        params: Option<&Params>,
    ) -> Result<Value> {
        let request = Request::new("delete_snapshot", Method::DELETE, &["_snapshot", repository, snapshot])
            .params(params);
        self.perform(request).await
    }

    pub async fn get_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        params: Option<&Params>,
    ) -> Result<Value> {
        let request = Request::new("get_snapshot", Method::GET, &["_snapshot", repository, snapshot])
            .params(params);
        self.perform(request).await
    }

    pub async fn get_snapshot_status(
        &self,
        repository: &str,
        snapshot: &str,
        params: Option<&Params>,
    ) -> Result<Value> {
        let request = Request::new(
            "get_snapshot_status",
            Method::GET,
            &["_snapshot", repository, snapshot, "_status"],
        )
        .params(params);
        self.perform(request).await
    }
}
