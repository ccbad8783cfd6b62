//! The originating HTTP request and the data store attached to it.

use dashmap::DashMap;
use std::any::Any;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// An attached value. Opaque to the core: anything `Send + Sync` can be
/// stored, including handles that cannot be serialized.
pub type DataValue = Arc<dyn Any + Send + Sync>;

/// Per-request key/value scratch space.
///
/// Owned by the [`HttpRequest`]; connections only ever hand out references to
/// it, so a mutation is immediately visible through every handle to the same
/// connection.
#[derive(Debug, Default)]
pub struct DataMap {
    entries: DashMap<String, DataValue>,
}

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point lookup. An unset key is `None`, never an error.
    pub fn get(&self, key: &str) -> Option<DataValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Typed lookup: `None` when the key is unset or holds another type.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key)?.downcast::<T>().ok()
    }

    /// Upsert, returning the previous value if there was one.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Option<DataValue> {
        self.entries.insert(key.into(), Arc::new(value))
    }

    pub fn remove(&self, key: &str) -> Option<DataValue> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Snapshot of the currently attached keys.
    pub fn keys(&self) -> HashSet<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Request metadata the transport hands to the core.
///
/// Parsing the request line and headers is the transport's job; this type
/// only carries the result.
#[derive(Debug)]
pub struct HttpRequest {
    id: Uuid,
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    remote_address: Option<SocketAddr>,
    timestamp: SystemTime,
    data: DataMap,
}

impl HttpRequest {
    pub fn builder(uri: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(uri)
    }

    /// Unique per request, useful for correlating log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The full URI the client requested, including the query string.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First value of a decoded query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a decoded query parameter, in request order.
    pub fn query_params(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn query_param_keys(&self) -> HashSet<&str> {
        self.query.iter().map(|(key, _)| key.as_str()).collect()
    }

    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_address
    }

    /// When the request was accepted.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// The live data store attached to this request.
    pub fn data(&self) -> &DataMap {
        &self.data
    }
}

pub struct HttpRequestBuilder {
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    remote_address: Option<SocketAddr>,
}

impl HttpRequestBuilder {
    fn new(uri: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            uri: uri.into(),
            headers: Vec::new(),
            remote_address: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn remote_address(mut self, remote_address: SocketAddr) -> Self {
        self.remote_address = Some(remote_address);
        self
    }

    pub fn build(self) -> HttpRequest {
        let query = parse_query(&self.uri);
        HttpRequest {
            id: Uuid::new_v4(),
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            query,
            remote_address: self.remote_address,
            timestamp: SystemTime::now(),
            data: DataMap::new(),
        }
    }
}

fn parse_query(uri: &str) -> Vec<(String, String)> {
    let Some((_, rest)) = uri.split_once('?') else {
        return Vec::new();
    };
    let query = rest.split_once('#').map_or(rest, |(query, _)| query);

    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}
