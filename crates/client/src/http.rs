use async_trait::async_trait;
use jambda_models::{
    ApiConfig, ClientError, ErrorResponse, FunctionConfiguration, FunctionResource, Payload,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::resource::ResourceClient;

/// `ResourceClient` over the platform's REST API.
#[derive(Clone)]
pub struct HttpResourceClient {
    client: Client,
    endpoint: String,
}

impl HttpResourceClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ClientError::transport)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ApiConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn functions_url(&self) -> String {
        format!("{}/function", self.endpoint)
    }

    fn function_url(&self, external_id: &str) -> String {
        format!("{}/function/{}", self.endpoint, external_id)
    }
}

fn config_part(configuration: &FunctionConfiguration) -> Result<String, ClientError> {
    serde_json::to_string(configuration).map_err(ClientError::transport)
}

/// Turns a non-success response into `ClientError::Remote`.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));

    Err(ClientError::remote(status.as_u16(), message))
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response.json::<T>().await.map_err(ClientError::transport)
}

/// Anything but a JSON array is an empty list; malformed entries are skipped.
fn decode_list(body: &str) -> Vec<FunctionResource> {
    let items = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<FunctionResource>(item) {
            Ok(resource) => Some(resource),
            Err(e) => {
                warn!(error = %e, "Skipping malformed function entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn list(&self) -> Result<Vec<FunctionResource>, ClientError> {
        debug!(url = %self.functions_url(), "Listing functions");

        let response = self
            .client
            .get(self.functions_url())
            .send()
            .await
            .map_err(ClientError::transport)?;
        let response = check(response).await?;
        let body = response.text().await.map_err(ClientError::transport)?;

        Ok(decode_list(&body))
    }

    async fn create(
        &self,
        name: &str,
        configuration: &FunctionConfiguration,
        payload: &Payload,
    ) -> Result<FunctionResource, ClientError> {
        info!(name = %name, payload_bytes = payload.len(), "Creating function");

        let zip = Part::bytes(payload.bytes.to_vec()).file_name(payload.file_name.clone());
        let form = Form::new()
            .part("zip", zip)
            .text("config", config_part(configuration)?)
            .text("name", name.to_string());

        let response = self
            .client
            .post(self.functions_url())
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::transport)?;

        decode(check(response).await?).await
    }

    async fn update(
        &self,
        external_id: &str,
        name: &str,
        configuration: &FunctionConfiguration,
    ) -> Result<FunctionResource, ClientError> {
        info!(external_id = %external_id, name = %name, "Updating function");

        let form = Form::new()
            .text("config", config_part(configuration)?)
            .text("name", name.to_string());

        let response = self
            .client
            .put(self.function_url(external_id))
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::transport)?;

        decode(check(response).await?).await
    }

    async fn remove(&self, external_id: &str) -> Result<(), ClientError> {
        info!(external_id = %external_id, "Deleting function");

        let response = self
            .client
            .delete(self.function_url(external_id))
            .send()
            .await
            .map_err(ClientError::transport)?;
        check(response).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_decoding_ignores_non_arrays() {
        assert!(decode_list("null").is_empty());
        assert!(decode_list("{\"functions\":[]}").is_empty());
        assert!(decode_list("").is_empty());
    }

    #[test]
    fn list_decoding_skips_malformed_entries() {
        let body = r#"[
            {"id":1,"external_id":"a","name":"one","configuration":{"trigger":"http","image":"golang:1.22","type":"REST","port":8080}},
            {"id":2,"external_id":"b","name":"two","configuration":{"trigger":"smtp","image":"golang:1.22","type":"REST"}}
        ]"#;
        let resources = decode_list(body);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].external_id, "a");
    }

    #[test]
    fn urls_are_keyed_by_external_id() {
        let client = HttpResourceClient::with_client(Client::new(), &ApiConfig::default());
        assert_eq!(client.functions_url(), "http://localhost:8080/v1/api/function");
        assert_eq!(
            client.function_url("ext123"),
            "http://localhost:8080/v1/api/function/ext123"
        );
    }
}
