use std::borrow::Cow;
use std::collections::HashMap;

/// Immutable snapshot of the parts of a request the engine matches against.
/// Built once per request and read-only during evaluation.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    path_base: String,
    query: String,
    server_variables: HashMap<String, String>,
}

impl RequestDescriptor {
    pub fn builder() -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::default()
    }

    /// Build a descriptor from a parsed URL. Path base is left empty and no
    /// explicit server variables are set; the derived ones still resolve.
    pub fn from_url(url: &url::Url) -> Self {
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port(),
            path: url.path().to_string(),
            path_base: String::new(),
            query: url.query().unwrap_or("").to_string(),
            server_variables: HashMap::new(),
        }
    }

    #[inline]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Request path, always starting with `/`. Excludes the path base.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn path_base(&self) -> &str {
        &self.path_base
    }

    /// Query string without the leading `?`; empty when absent.
    #[inline]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Look up a server variable. Explicitly set variables win; otherwise a
    /// standard set is derived from the request parts:
    /// `HTTPS`, `HTTP_HOST`, `HTTP_URL`, `REQUEST_URI`, `QUERY_STRING`,
    /// `SERVER_NAME`, `SERVER_PORT`, `REQUEST_SCHEME`.
    pub fn server_variable(&self, name: &str) -> Option<Cow<'_, str>> {
        if let Some(value) = self.server_variables.get(name) {
            return Some(Cow::Borrowed(value));
        }
        match name {
            "HTTPS" => Some(Cow::Borrowed(if self.scheme == "https" {
                "on"
            } else {
                "off"
            })),
            "HTTP_HOST" | "SERVER_NAME" => Some(Cow::Borrowed(&self.host)),
            "HTTP_URL" => Some(Cow::Borrowed(&self.path)),
            "REQUEST_URI" => {
                if self.query.is_empty() {
                    Some(Cow::Borrowed(&self.path))
                } else {
                    Some(Cow::Owned(format!("{}?{}", self.path, self.query)))
                }
            }
            "QUERY_STRING" => Some(Cow::Borrowed(&self.query)),
            "REQUEST_SCHEME" => Some(Cow::Borrowed(&self.scheme)),
            "SERVER_PORT" => {
                let port = self.port.unwrap_or(match self.scheme.as_str() {
                    "https" => 443,
                    _ => 80,
                });
                Some(Cow::Owned(port.to_string()))
            }
            _ => None,
        }
    }
}

/// Plain-data builder for fixture and per-request descriptors.
#[derive(Debug, Clone)]
pub struct RequestDescriptorBuilder {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    path_base: String,
    query: String,
    server_variables: HashMap<String, String>,
}

impl Default for RequestDescriptorBuilder {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: None,
            path: "/".to_string(),
            path_base: String::new(),
            query: String::new(),
            server_variables: HashMap::new(),
        }
    }
}

impl RequestDescriptorBuilder {
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn path_base(mut self, path_base: &str) -> Self {
        self.path_base = path_base.to_string();
        self
    }

    /// Query string without the leading `?`.
    pub fn query(mut self, query: &str) -> Self {
        self.query = query.trim_start_matches('?').to_string();
        self
    }

    pub fn server_variable(mut self, name: &str, value: &str) -> Self {
        self.server_variables
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> RequestDescriptor {
        RequestDescriptor {
            scheme: self.scheme,
            host: self.host,
            port: self.port,
            path: self.path,
            path_base: self.path_base,
            query: self.query,
            server_variables: self.server_variables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_variables() {
        let req = RequestDescriptor::builder()
            .scheme("https")
            .host("example.com")
            .path("/abc")
            .query("x=1")
            .build();

        assert_eq!(req.server_variable("HTTPS").unwrap(), "on");
        assert_eq!(req.server_variable("HTTP_HOST").unwrap(), "example.com");
        assert_eq!(req.server_variable("HTTP_URL").unwrap(), "/abc");
        assert_eq!(req.server_variable("REQUEST_URI").unwrap(), "/abc?x=1");
        assert_eq!(req.server_variable("QUERY_STRING").unwrap(), "x=1");
        assert_eq!(req.server_variable("SERVER_PORT").unwrap(), "443");
        assert!(req.server_variable("HTTP_USER_AGENT").is_none());
    }

    #[test]
    fn test_explicit_variable_wins_over_derived() {
        let req = RequestDescriptor::builder()
            .scheme("http")
            .server_variable("HTTPS", "on")
            .build();
        assert_eq!(req.server_variable("HTTPS").unwrap(), "on");
    }

    #[test]
    fn test_from_url() {
        let url = url::Url::parse("https://localhost:8443/abc?a=b").unwrap();
        let req = RequestDescriptor::from_url(&url);
        assert_eq!(req.scheme(), "https");
        assert_eq!(req.host(), "localhost");
        assert_eq!(req.port(), Some(8443));
        assert_eq!(req.path(), "/abc");
        assert_eq!(req.query(), "a=b");
        assert_eq!(req.server_variable("SERVER_PORT").unwrap(), "8443");
    }

    #[test]
    fn test_default_port_follows_scheme() {
        let req = RequestDescriptor::builder().scheme("http").build();
        assert_eq!(req.server_variable("SERVER_PORT").unwrap(), "80");
    }
}
