//! Caddy Route Manager (C6): idempotent creation of a dedicated HTTP server
//! block and per-application reverse-proxy routes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// The server block every route lives under.
const SERVER_NAME: &str = "otturnaut";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("caddy admin api unavailable")]
    CaddyUnavailable,
    #[error("request to caddy timed out")]
    Timeout,
    #[error("request to caddy failed: {0}")]
    RequestFailed(String),
    #[error("caddy returned unexpected status {code}: {body}")]
    UnexpectedStatus { code: u16, body: String },
    #[error("route not found")]
    NotFound,
    #[error("route could not be decoded: {0}")]
    DecodeFailed(String),
}

impl ProxyError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Timeout
        } else if err.is_connect() {
            ProxyError::CaddyUnavailable
        } else {
            ProxyError::RequestFailed(err.to_string())
        }
    }
}

/// A reverse-proxy route for one deployed application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub domains: Vec<String>,
    pub port: u16,
}

impl Route {
    pub fn new(app_id: &str, domains: Vec<String>, port: u16) -> Self {
        Self {
            id: otturnaut_core::naming::route_id(app_id),
            domains,
            port,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "@id": self.id,
            "match": [ { "host": self.domains } ],
            "handle": [ {
                "handler": "reverse_proxy",
                "upstreams": [ { "dial": format!("127.0.0.1:{}", self.port) } ],
            } ],
        })
    }

    /// Decode a wire route, distinguishing a structurally malformed route
    /// (missing `@id`, missing `host`, missing `upstreams`, or an
    /// unparseable `dial`) from a route that is simply absent.
    fn from_json(value: &Value) -> Result<Route, String> {
        let id = value
            .get("@id")
            .and_then(Value::as_str)
            .ok_or("missing @id")?
            .to_string();
        let domains = value
            .get("match")
            .and_then(Value::as_array)
            .and_then(|m| m.first())
            .and_then(|m| m.get("host"))
            .and_then(Value::as_array)
            .ok_or("missing match[0].host")?
            .iter()
            .filter_map(|h| h.as_str().map(str::to_string))
            .collect();
        let dial = value
            .get("handle")
            .and_then(Value::as_array)
            .and_then(|h| h.first())
            .and_then(|h| h.get("upstreams"))
            .and_then(Value::as_array)
            .and_then(|u| u.first())
            .and_then(|u| u.get("dial"))
            .and_then(Value::as_str)
            .ok_or("missing handle[0].upstreams[0].dial")?;
        let port = dial
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| format!("unparseable dial {dial:?}"))?;
        Ok(Route { id, domains, port })
    }
}

/// Capability interface over the route manager, so the saga can depend on
/// an abstraction rather than `CaddyClient` directly.
#[async_trait]
pub trait RouteManager: Send + Sync {
    async fn add_route(&self, route: &Route) -> Result<(), ProxyError>;
    async fn remove_route(&self, route_id: &str) -> Result<(), ProxyError>;
    async fn get_route(&self, route_id: &str) -> Result<Route, ProxyError>;
    async fn list_routes(&self) -> Result<Vec<Route>, ProxyError>;
    async fn health_check(&self) -> Result<(), ProxyError>;
}

/// Which prefix of `/apps/http/servers` already exists, driving which path
/// the bootstrap POST targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaddyTopology {
    Empty,
    AppsOnly,
    AppsHttpOnly,
    AppsHttpServersOnly,
    ServerPresent,
}

pub struct CaddyClient {
    admin_url: String,
    http_port: u16,
    https_port: u16,
    automatic_https_disable: bool,
    client: reqwest::Client,
}

impl CaddyClient {
    pub fn new(admin_url: &str, http_port: u16, https_port: u16, automatic_https_disable: bool) -> Self {
        Self {
            admin_url: admin_url.trim_end_matches('/').to_string(),
            http_port,
            https_port,
            automatic_https_disable,
            client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.admin_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ProxyError> {
        self.client
            .get(self.url(path))
            .send()
            .await
            .map_err(ProxyError::from_reqwest)
    }

    async fn detect_topology(&self) -> Result<CaddyTopology, ProxyError> {
        let resp = self.get("/config/").await?;
        if !resp.status().is_success() {
            return Ok(CaddyTopology::Empty);
        }
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        if body.is_null() || body == json!({}) {
            return Ok(CaddyTopology::Empty);
        }
        let Some(apps) = body.get("apps") else {
            return Ok(CaddyTopology::Empty);
        };
        let Some(http) = apps.get("http") else {
            return Ok(CaddyTopology::AppsOnly);
        };
        let Some(servers) = http.get("servers") else {
            return Ok(CaddyTopology::AppsHttpOnly);
        };
        if servers.get(SERVER_NAME).is_some() {
            Ok(CaddyTopology::ServerPresent)
        } else {
            Ok(CaddyTopology::AppsHttpServersOnly)
        }
    }

    fn server_block(&self) -> Value {
        let mut block = json!({
            "listen": [format!(":{}", self.http_port), format!(":{}", self.https_port)],
            "routes": [],
        });
        if self.automatic_https_disable {
            block["automatic_https"] = json!({ "disable": true });
        }
        block
    }

    /// Ensure `/apps/http/servers/otturnaut` exists, POSTing at the
    /// deepest existing prefix so Caddy never 400s on a missing parent.
    async fn ensure_server(&self) -> Result<(), ProxyError> {
        let topology = self.detect_topology().await?;
        debug!(?topology, "caddy bootstrap topology");

        let (path, body) = match topology {
            CaddyTopology::ServerPresent => return Ok(()),
            CaddyTopology::Empty => (
                "/config/".to_string(),
                json!({ "apps": { "http": { "servers": { SERVER_NAME: self.server_block() } } } }),
            ),
            CaddyTopology::AppsOnly => (
                "/config/apps/http/".to_string(),
                json!({ "servers": { SERVER_NAME: self.server_block() } }),
            ),
            CaddyTopology::AppsHttpOnly => (
                "/config/apps/http/servers/".to_string(),
                json!({ SERVER_NAME: self.server_block() }),
            ),
            CaddyTopology::AppsHttpServersOnly => (
                format!("/config/apps/http/servers/{SERVER_NAME}/"),
                self.server_block(),
            ),
        };

        let resp = self
            .client
            .post(self.url(&path))
            .json(&body)
            .send()
            .await
            .map_err(ProxyError::from_reqwest)?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProxyError::UnexpectedStatus { code, body });
        }
        Ok(())
    }

    /// Ensure the server exists, then append this route to its routes array.
    pub async fn add_route(&self, route: &Route) -> Result<(), ProxyError> {
        self.ensure_server().await?;

        let path = format!("/config/apps/http/servers/{SERVER_NAME}/routes/");
        let resp = self
            .client
            .post(self.url(&path))
            .json(&route.to_json())
            .send()
            .await
            .map_err(ProxyError::from_reqwest)?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProxyError::UnexpectedStatus { code, body });
        }
        Ok(())
    }

    pub async fn remove_route(&self, route_id: &str) -> Result<(), ProxyError> {
        let resp = self
            .client
            .delete(self.url(&format!("/id/{route_id}")))
            .send()
            .await
            .map_err(ProxyError::from_reqwest)?;

        match resp.status().as_u16() {
            200 | 204 => Ok(()),
            404 => Ok(()), // already gone — removal is idempotent
            code => Err(ProxyError::UnexpectedStatus {
                code,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    pub async fn get_route(&self, route_id: &str) -> Result<Route, ProxyError> {
        let resp = self.get(&format!("/id/{route_id}")).await?;
        match resp.status().as_u16() {
            200 => {
                let body: Value = resp.json().await.map_err(ProxyError::from_reqwest)?;
                Route::from_json(&body).map_err(ProxyError::DecodeFailed)
            }
            404 => Err(ProxyError::NotFound),
            code => Err(ProxyError::UnexpectedStatus {
                code,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    /// A missing server (404/400) is an empty list, not an error — there is
    /// simply nothing deployed yet.
    pub async fn list_routes(&self) -> Result<Vec<Route>, ProxyError> {
        let path = format!("/config/apps/http/servers/{SERVER_NAME}/routes/");
        let resp = self.get(&path).await?;
        match resp.status().as_u16() {
            200 => {
                let body: Value = resp.json().await.map_err(ProxyError::from_reqwest)?;
                let routes = body
                    .as_array()
                    .map(|arr| arr.iter().filter_map(|v| Route::from_json(v).ok()).collect())
                    .unwrap_or_default();
                Ok(routes)
            }
            404 | 400 => Ok(Vec::new()),
            code => Err(ProxyError::UnexpectedStatus {
                code,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    pub async fn health_check(&self) -> Result<(), ProxyError> {
        let resp = self.get("/config/").await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            warn!(status = %resp.status(), "caddy health check failed");
            Err(ProxyError::UnexpectedStatus {
                code: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl RouteManager for CaddyClient {
    async fn add_route(&self, route: &Route) -> Result<(), ProxyError> {
        CaddyClient::add_route(self, route).await
    }

    async fn remove_route(&self, route_id: &str) -> Result<(), ProxyError> {
        CaddyClient::remove_route(self, route_id).await
    }

    async fn get_route(&self, route_id: &str) -> Result<Route, ProxyError> {
        CaddyClient::get_route(self, route_id).await
    }

    async fn list_routes(&self) -> Result<Vec<Route>, ProxyError> {
        CaddyClient::list_routes(self).await
    }

    async fn health_check(&self) -> Result<(), ProxyError> {
        CaddyClient::health_check(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_json_round_trips() {
        let route = Route::new("myapp", vec!["myapp.com".to_string()], 10234);
        let json = route.to_json();
        assert_eq!(json["@id"], "myapp-route");
        assert_eq!(json["handle"][0]["upstreams"][0]["dial"], "127.0.0.1:10234");

        let parsed = Route::from_json(&json).unwrap();
        assert_eq!(parsed, route);
    }

    #[test]
    fn route_dial_is_always_loopback_literal() {
        let route = Route::new("myapp", vec!["myapp.com".to_string()], 5000);
        let json = route.to_json();
        let dial = json["handle"][0]["upstreams"][0]["dial"].as_str().unwrap();
        assert!(dial.starts_with("127.0.0.1:"));
        assert!(!dial.contains("localhost"));
    }

    #[test]
    fn route_id_matches_naming_convention() {
        let route = Route::new("myapp", vec![], 1);
        assert_eq!(route.id, "myapp-route");
    }

    #[test]
    fn decode_fails_on_missing_id() {
        let json = json!({
            "match": [ { "host": ["myapp.com"] } ],
            "handle": [ { "upstreams": [ { "dial": "127.0.0.1:1000" } ] } ],
        });
        assert!(Route::from_json(&json).is_err());
    }

    #[test]
    fn decode_fails_on_missing_host() {
        let json = json!({
            "@id": "myapp-route",
            "match": [ {} ],
            "handle": [ { "upstreams": [ { "dial": "127.0.0.1:1000" } ] } ],
        });
        assert!(Route::from_json(&json).is_err());
    }

    #[test]
    fn decode_fails_on_missing_upstreams() {
        let json = json!({
            "@id": "myapp-route",
            "match": [ { "host": ["myapp.com"] } ],
            "handle": [ {} ],
        });
        assert!(Route::from_json(&json).is_err());
    }

    #[test]
    fn decode_fails_on_unparseable_dial() {
        let json = json!({
            "@id": "myapp-route",
            "match": [ { "host": ["myapp.com"] } ],
            "handle": [ { "upstreams": [ { "dial": "not-a-port" } ] } ],
        });
        assert!(Route::from_json(&json).is_err());
    }
}
