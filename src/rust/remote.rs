use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ConsoleConfig;
use crate::error::{ConfigError, RemoteError};
use crate::fields::FieldSnapshot;
use crate::projection::PreprocessPayload;

pub const PREPROCESS_PATH: &str = "preProcess";
pub const TRAIN_PATH: &str = "gcForest/train";
pub const TEST_PATH: &str = "gcForest/test";

/// Envelope code the service uses to report success.
pub const SUCCESS_CODE: i64 = 200;

/// The remote classification service, as seen by the console.
///
/// Implementations report application-level failures (envelope code other
/// than 200) as [`RemoteError::Rejected`], so callers only see `Ok` for a
/// call that genuinely succeeded.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn preprocess(&self, request: &PreprocessRequest) -> Result<PreprocessPayload, RemoteError>;

    async fn train(&self) -> Result<(), RemoteError>;

    /// Returns the flat metric mapping in the order the service sent it.
    async fn test(&self) -> Result<Map<String, Value>, RemoteError>;
}

/// Query parameters of the preprocessing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessRequest {
    pub file_path: String,
    pub file_number: u64,
    pub category_number: u64,
    pub dimension_reduction: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduction_number: Option<u64>,
}

impl From<&FieldSnapshot> for PreprocessRequest {
    fn from(snapshot: &FieldSnapshot) -> Self {
        Self {
            file_path: snapshot.file_path.clone(),
            file_number: snapshot.article_count,
            category_number: snapshot.category_count,
            dimension_reduction: snapshot.dimension_reduction,
            reduction_number: if snapshot.dimension_reduction {
                snapshot.reduction_threshold
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: Value,
    #[serde(default)]
    data: Value,
}

/// Checks the `{code, data}` envelope and hands back its `data` member.
pub fn decode_envelope(body: &[u8]) -> Result<Value, RemoteError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    let code = match &envelope.code {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| RemoteError::Malformed(format!("envelope code is not an integer: {}", envelope.code)))?;

    if code != SUCCESS_CODE {
        return Err(RemoteError::Rejected { code });
    }
    Ok(envelope.data)
}

/// Decodes a preprocessing response. `data` is normally a JSON-encoded
/// string; an inline object is accepted as well.
pub fn decode_preprocess(body: &[u8]) -> Result<PreprocessPayload, RemoteError> {
    match decode_envelope(body)? {
        Value::String(encoded) => Ok(serde_json::from_str(&encoded)?),
        inline @ Value::Object(_) => Ok(serde_json::from_value(inline)?),
        other => Err(RemoteError::Malformed(format!(
            "preprocess data is neither a string nor an object: {}",
            other
        ))),
    }
}

pub fn decode_metrics(body: &[u8]) -> Result<Map<String, Value>, RemoteError> {
    Ok(serde_json::from_slice(body)?)
}

/// [`ClassificationService`] over HTTP GET requests.
#[derive(Debug, Clone)]
pub struct HttpClassificationService {
    client: Client,
    preprocess_url: Url,
    train_url: Url,
    test_url: Url,
}

impl HttpClassificationService {
    pub fn new(base_url: Url) -> Result<Self, ConfigError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: Url) -> Result<Self, ConfigError> {
        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|_| ConfigError::InvalidServiceUrl(base_url.to_string()))
        };
        Ok(Self {
            preprocess_url: join(PREPROCESS_PATH)?,
            train_url: join(TRAIN_PATH)?,
            test_url: join(TEST_PATH)?,
            client,
        })
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self, ConfigError> {
        Self::new(config.base_url()?)
    }

    async fn fetch<Q: Serialize + ?Sized>(&self, url: &Url, query: Option<&Q>) -> Result<Vec<u8>, RemoteError> {
        let mut request = self.client.get(url.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        log::debug!("GET {}", url);
        let response = request.send().await?;
        log::debug!("{} answered with HTTP {}", url, response.status());
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ClassificationService for HttpClassificationService {
    async fn preprocess(&self, request: &PreprocessRequest) -> Result<PreprocessPayload, RemoteError> {
        let body = self.fetch(&self.preprocess_url, Some(request)).await?;
        decode_preprocess(&body)
    }

    async fn train(&self) -> Result<(), RemoteError> {
        let body = self.fetch::<()>(&self.train_url, None).await?;
        decode_envelope(&body).map(|_| ())
    }

    async fn test(&self) -> Result<Map<String, Value>, RemoteError> {
        let body = self.fetch::<()>(&self.test_url, None).await?;
        decode_metrics(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_snapshot() {
        let snapshot = FieldSnapshot {
            file_path: "/corpus".into(),
            article_count: 100,
            category_count: 4,
            dimension_reduction: true,
            reduction_threshold: Some(50),
        };
        let request = PreprocessRequest::from(&snapshot);
        assert_eq!(request.file_number, 100);
        assert_eq!(request.category_number, 4);
        assert_eq!(request.reduction_number, Some(50));

        let query = serde_json::to_value(&request).unwrap();
        assert_eq!(query["filePath"], "/corpus");
        assert_eq!(query["dimensionReduction"], true);
        assert_eq!(query["reductionNumber"], 50);
    }

    #[test]
    fn test_large_counts_reach_the_query() {
        let snapshot = FieldSnapshot {
            file_path: "/corpus".into(),
            article_count: 6_000_000_000,
            category_count: 2,
            dimension_reduction: false,
            reduction_threshold: None,
        };
        let query = serde_json::to_value(PreprocessRequest::from(&snapshot)).unwrap();
        assert_eq!(query["fileNumber"], 6_000_000_000u64);
    }

    #[test]
    fn test_reduction_number_omitted_when_disabled() {
        let snapshot = FieldSnapshot {
            file_path: "/corpus".into(),
            article_count: 1,
            category_count: 1,
            dimension_reduction: false,
            reduction_threshold: Some(50),
        };
        let query = serde_json::to_value(PreprocessRequest::from(&snapshot)).unwrap();
        assert!(query.get("reductionNumber").is_none());
    }

    #[test]
    fn test_decode_string_encoded_data() {
        let body = br#"{"code":200,"data":"{\"Keywords\":[[\"w1\"]],\"2-gram\":[],\"3-gram\":[]}"}"#;
        let payload = decode_preprocess(body).unwrap();
        assert_eq!(payload.keywords, vec![vec!["w1".to_string()]]);
        assert!(payload.bigrams.is_empty());
    }

    #[test]
    fn test_decode_inline_data() {
        let body = br#"{"code":"200","data":{"Keywords":[],"2-gram":["a b"],"3-gram":["a b c"]}}"#;
        let payload = decode_preprocess(body).unwrap();
        assert_eq!(payload.bigrams, vec!["a b".to_string()]);
    }

    #[test]
    fn test_rejected_envelope() {
        let result = decode_preprocess(br#"{"code":500,"data":"oops"}"#);
        assert!(matches!(result, Err(RemoteError::Rejected { code: 500 })));
        let result = decode_envelope(br#"{"code":404}"#);
        assert!(matches!(result, Err(RemoteError::Rejected { code: 404 })));
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(decode_envelope(b"<html>"), Err(RemoteError::Malformed(_))));
        assert!(matches!(decode_envelope(br#"{"data":1}"#), Err(RemoteError::Malformed(_))));
        assert!(matches!(decode_envelope(br#"{"code":true}"#), Err(RemoteError::Malformed(_))));
        assert!(matches!(decode_preprocess(br#"{"code":200,"data":"not json"}"#), Err(RemoteError::Malformed(_))));
        assert!(matches!(decode_preprocess(br#"{"code":200}"#), Err(RemoteError::Malformed(_))));
        assert!(matches!(decode_metrics(b"[1,2]"), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn test_train_envelope_without_data() {
        assert_eq!(decode_envelope(br#"{"code":200}"#).unwrap(), Value::Null);
    }

    #[test]
    fn test_endpoint_urls() {
        let service = HttpClassificationService::new(Url::parse("http://host:8080/api/").unwrap()).unwrap();
        assert_eq!(service.preprocess_url.as_str(), "http://host:8080/api/preProcess");
        assert_eq!(service.train_url.as_str(), "http://host:8080/api/gcForest/train");
        assert_eq!(service.test_url.as_str(), "http://host:8080/api/gcForest/test");
    }
}
