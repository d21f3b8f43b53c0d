use crate::entity::{PropertyValue, TableEntity};
use crate::storage::{Connector, Credentials, StorageError, TableService};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request.
pub const DEFAULT_API_VERSION: &str = "2019-02-02";

const ACCEPT_NOMETADATA: &str = "application/json;odata=nometadata";

/// Configuration for [`AzureConnector`].
///
/// Leave `endpoint` unset to talk to `https://{account}.table.core.windows.net`.
/// Set it to reach the storage emulator, e.g.
/// `http://127.0.0.1:10002/devstoreaccount1`.
#[derive(Clone, Debug)]
pub struct AzureConfig {
    pub endpoint: Option<String>,
    pub api_version: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

/// Opens [`AzureTableService`] connections.
#[derive(Clone, Debug, Default)]
pub struct AzureConnector {
    config: AzureConfig,
}

impl AzureConnector {
    pub fn new(config: AzureConfig) -> Self {
        Self { config }
    }
}

impl Connector for AzureConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn TableService>, StorageError> {
        let service = AzureTableService::new(credentials, &self.config)?;
        Ok(Arc::new(service) as Arc<dyn TableService>)
    }
}

/// Azure Table Storage over the JSON REST interface, authorized with
/// `SharedKeyLite`.
///
/// Uses a blocking HTTP client: every call holds the calling thread until
/// the service responds. Do not use it from inside an async runtime
/// worker; wrap the logging call in `spawn_blocking` there.
pub struct AzureTableService {
    client: Client,
    account: String,
    key: Vec<u8>,
    base_url: Url,
    api_version: String,
}

impl AzureTableService {
    /// Validate credentials and build the HTTP client. No request is sent.
    pub fn new(credentials: &Credentials, config: &AzureConfig) -> Result<Self, StorageError> {
        if credentials.account_name.is_empty() {
            return Err(StorageError::InvalidCredentials("account name required".to_string()));
        }
        let key = STANDARD
            .decode(credentials.account_key.trim())
            .map_err(|e| StorageError::InvalidCredentials(format!("malformed account key: {}", e)))?;
        if key.is_empty() {
            return Err(StorageError::InvalidCredentials("account key required".to_string()));
        }

        let endpoint = match &config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.table.core.windows.net", credentials.account_name),
        };
        let base_url = Url::parse(&endpoint)
            .map_err(|e| StorageError::InvalidCredentials(format!("invalid endpoint {}: {}", endpoint, e)))?;

        // Inserts carry no client-side timeout.
        let client = Client::builder().timeout(None::<Duration>).build()?;

        Ok(Self {
            client,
            account: credentials.account_name.clone(),
            key,
            base_url,
            api_version: config.api_version.clone(),
        })
    }

    fn url(&self, resource: &str) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}/{}", self.base_url.path().trim_end_matches('/'), resource);
        url.set_path(&path);
        url
    }

    fn signed_post(&self, url: Url, body: String) -> Result<RequestBuilder, StorageError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = shared_key_lite(&self.account, &self.key, &date, url.path())?;

        Ok(self
            .client
            .post(url)
            .header("x-ms-date", date)
            .header("x-ms-version", &self.api_version)
            .header("Authorization", authorization)
            .header("Accept", ACCEPT_NOMETADATA)
            .header("Content-Type", "application/json")
            .header("DataServiceVersion", "3.0;NetFx")
            .header("MaxDataServiceVersion", "3.0;NetFx")
            .header("Prefer", "return-no-content")
            .body(body))
    }
}

impl TableService for AzureTableService {
    fn create_table(&self, table: &str, timeout: Duration) -> Result<(), StorageError> {
        let mut url = self.url("Tables");
        url.query_pairs_mut()
            .append_pair("timeout", &timeout.as_secs().to_string());

        let body = json!({ "TableName": table }).to_string();
        let resp = self.signed_post(url, body)?.timeout(timeout).send()?;
        check_response(resp)
    }

    fn insert_entity(&self, table: &str, entity: &TableEntity) -> Result<(), StorageError> {
        let url = self.url(&urlencoding::encode(table));
        let body = serde_json::to_string(&entity_body(entity))?;
        let resp = self.signed_post(url, body)?.send()?;
        check_response(resp)
    }
}

/// `Authorization` header value for the Table service `SharedKeyLite` scheme.
///
/// The string to sign is the request date followed by the canonicalized
/// resource `/{account}{path}`.
fn shared_key_lite(account: &str, key: &[u8], date: &str, path: &str) -> Result<String, StorageError> {
    let string_to_sign = format!("{}\n/{}{}", date, account, path);
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::InvalidCredentials(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKeyLite {}:{}", account, signature))
}

/// Entity system keys. Caller properties with these names are not sent.
const KEY_PROPERTIES: [&str; 2] = ["PartitionKey", "RowKey"];

/// JSON body of an insert, with `@odata.type` annotations where the JSON
/// type alone would be ambiguous. Null properties are left out.
fn entity_body(entity: &TableEntity) -> Value {
    let mut body = Map::new();

    for (name, value) in &entity.properties {
        if KEY_PROPERTIES.contains(&name.as_str()) {
            continue;
        }
        let (json, edm_type) = match value {
            PropertyValue::Null => continue,
            PropertyValue::Boolean(b) => (Value::Bool(*b), None),
            PropertyValue::Int64(i) => (Value::String(i.to_string()), Some("Edm.Int64")),
            PropertyValue::Double(d) => match serde_json::Number::from_f64(*d) {
                Some(n) => (Value::Number(n), Some("Edm.Double")),
                None => (Value::String(non_finite(*d).to_string()), Some("Edm.Double")),
            },
            PropertyValue::String(s) => (Value::String(s.clone()), None),
            PropertyValue::DateTime(t) => (Value::String(edm_datetime(t)), Some("Edm.DateTime")),
        };
        if let Some(edm_type) = edm_type {
            body.insert(format!("{}@odata.type", name), Value::String(edm_type.to_string()));
        }
        body.insert(name.clone(), json);
    }

    body.insert("PartitionKey".to_string(), Value::String(entity.partition_key.clone()));
    body.insert("RowKey".to_string(), Value::String(entity.row_key.clone()));
    Value::Object(body)
}

/// `Edm.DateTime` text: UTC with 100 ns ticks, seven fractional digits.
fn edm_datetime(t: &DateTime<Utc>) -> String {
    // A leap second reports more than 999_999_999 nanoseconds.
    let ticks = t.timestamp_subsec_nanos().min(999_999_999) / 100;
    format!("{}.{:07}Z", t.format("%Y-%m-%dT%H:%M:%S"), ticks)
}

fn non_finite(d: f64) -> &'static str {
    if d.is_nan() {
        "NaN"
    } else if d.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Deserialize)]
struct ODataError {
    code: String,
    message: ODataMessage,
}

#[derive(Deserialize)]
struct ODataMessage {
    value: String,
}

fn check_response(resp: Response) -> Result<(), StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let text = resp.text().unwrap_or_else(|_| "<no body>".to_string());
    Err(service_error(status.as_u16(), &text))
}

fn service_error(status: u16, body: &str) -> StorageError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => StorageError::Service {
            status,
            code: envelope.error.code,
            message: envelope.error.message.value,
        },
        Err(_) => StorageError::Service {
            status,
            code: String::new(),
            message: body.to_string(),
        },
    }
}
