use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::COOKIE, multipart, Client, Method as HttpMethod};
use shared::{
    domain::{BodyEncoding, Method},
    error::TransportError,
    protocol::{OutboundRequest, ResponseEnvelope},
};
use tokio::sync::RwLock;
use url::Url;

use crate::{config::ClientSettings, CookieStore, Transport};

/// Cookie jar shared between the client (which writes the CSRF cookie) and
/// the transport (which serializes the jar into the `Cookie` header).
#[derive(Debug, Default)]
pub struct InMemoryCookieStore {
    cookies: RwLock<HashMap<String, String>>,
}

impl InMemoryCookieStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.cookies.read().await.get(name).cloned()
    }

    /// `Cookie` header value for the current jar, or `None` when empty.
    pub async fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.read().await;
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[async_trait]
impl CookieStore for InMemoryCookieStore {
    async fn set_cookie(&self, name: &str, value: &str) -> Result<()> {
        self.cookies
            .write()
            .await
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// `Transport` implementation over reqwest.
pub struct HttpTransport {
    http: Client,
    base: Url,
    cookies: Arc<InMemoryCookieStore>,
    with_credentials: bool,
}

impl HttpTransport {
    pub fn new(base_url: &str, cookies: Arc<InMemoryCookieStore>) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid base url {base_url:?}"))?;
        Ok(Self {
            http: Client::new(),
            base,
            cookies,
            with_credentials: true,
        })
    }

    pub fn from_settings(
        settings: &ClientSettings,
        cookies: Arc<InMemoryCookieStore>,
    ) -> Result<Self> {
        let mut transport = Self::new(&settings.base_url, cookies)?;
        transport.with_credentials = settings.with_credentials;
        Ok(transport)
    }

    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    fn build_multipart(
        request: &OutboundRequest,
    ) -> Result<multipart::Form, TransportError> {
        let mut form = multipart::Form::new();
        for (name, value) in &request.form.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &request.form.files {
            let mut part = multipart::Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
            if let Some(mime) = &file.mime_type {
                part = part
                    .mime_str(mime)
                    .map_err(|e| TransportError::Network(format!("invalid mime type {mime:?}: {e}")))?;
            }
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<ResponseEnvelope, TransportError> {
        let url = self
            .base
            .join(&request.path)
            .map_err(|e| TransportError::Network(format!("invalid request path {:?}: {e}", request.path)))?;

        let method = match request.method {
            Method::Get => HttpMethod::GET,
            Method::Post => HttpMethod::POST,
        };
        let mut builder = self.http.request(method, url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if self.with_credentials {
            if let Some(header) = self.cookies.cookie_header().await {
                builder = builder.header(COOKIE, header);
            }
        }

        builder = match request.encoding {
            BodyEncoding::None => builder,
            BodyEncoding::UrlEncoded => match request.method {
                Method::Get => builder.query(&request.form.fields),
                Method::Post => builder.form(&request.form.fields),
            },
            BodyEncoding::Multipart => builder.multipart(Self::build_multipart(&request)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<ResponseEnvelope>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
