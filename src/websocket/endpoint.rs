use crate::types::constants::{CONNECTION_MODE, WS_PATH};
use crate::types::Result;
use url::Url;

/// Where and how to reach the realtime server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `host[:port]` of the application
    pub host: String,
    /// Mirrors the hosting page scheme: `true` selects `wss`
    pub secure: bool,
    /// Value of the `client` query parameter
    pub client_name: String,
}

impl Endpoint {
    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// `<ws|wss>://<host>/ws?timestamp=<ms>&client=<name>[&token=<token>]&mode=optimized`
    pub fn url(&self, token: Option<&str>, timestamp_ms: i64) -> Result<Url> {
        let mut url = Url::parse(&format!("{}://{}{}", self.scheme(), self.host, WS_PATH))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("timestamp", &timestamp_ms.to_string());
            query.append_pair("client", &self.client_name);
            if let Some(token) = token {
                query.append_pair("token", token);
            }
            query.append_pair("mode", CONNECTION_MODE);
        }

        Ok(url)
    }
}
