use crate::call::{ApiCall, CallInfo, RequestConfiguration};
use crate::error::{self, ApiError, Result};
use crate::openapi::{ApiDescription, Method};
use log::{debug, info};
use model::AuthMethod;
use reqwest::StatusCode;
use serde_json::Value;
use snafu::{ensure, ResultExt};
use std::sync::Arc;
use url::Url;

/// Executes calls against the server declared by an API description.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    description: Arc<ApiDescription>,
    auth: Option<AuthMethod>,
    verbose: bool,
}

impl RestClient {
    pub fn new(http: reqwest::Client, description: Arc<ApiDescription>) -> Self {
        Self {
            http,
            description,
            auth: None,
            verbose: false,
        }
    }

    pub fn with_auth(mut self, auth: Option<AuthMethod>) -> Self {
        self.auth = auth;
        self
    }

    /// Logs every request and response body at `info` instead of `debug`.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn description(&self) -> &ApiDescription {
        &self.description
    }

    /// Runs `call`. Returns the decoded response body, or `None` when the backend sent none.
    pub async fn call(
        &self,
        call: ApiCall,
        info: &CallInfo,
        request: &RequestConfiguration,
    ) -> Result<Option<Value>> {
        match call {
            ApiCall::FindBy => self.find_by(info, request).await.map(Some),
            ApiCall::Get
            | ApiCall::Post
            | ApiCall::Put
            | ApiCall::Patch
            | ApiCall::Delete
            | ApiCall::List => self.execute(info.method, &info.path, request).await,
        }
    }

    /// Lists with the request's query, then returns the first element of the first array in the
    /// response that has a string field equal to one of the request's parameters.
    pub async fn find_by(&self, info: &CallInfo, request: &RequestConfiguration) -> Result<Value> {
        let url = self.build_url(&info.path, request)?;
        let list = RequestConfiguration {
            body: Default::default(),
            ..request.clone()
        };
        let response = self
            .execute(info.method, &info.path, &list)
            .await?
            .unwrap_or(Value::Null);
        find_match(response, request).ok_or_else(|| {
            error::NoMatchSnafu {
                url: url.to_string(),
            }
            .build()
            .into()
        })
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        request: &RequestConfiguration,
    ) -> Result<Option<Value>> {
        self.description
            .validate_request(method, path, &request.path_params, &request.query)?;
        let success_codes = self.description.success_status_codes(method, path)?;
        let url = self.build_url(path, request)?;
        self.log(format_args!("{} {}", method, url));

        let mut builder = self.http.request(method.as_reqwest(), url.clone());
        if method.has_body() && !request.body.is_empty() {
            self.log(format_args!(
                "request body: {}",
                serde_json::to_string(&request.body).unwrap_or_default()
            ));
            builder = builder.json(&request.body);
        }
        builder = match &self.auth {
            Some(AuthMethod::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(AuthMethod::Bearer { token }) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await.context(error::RequestSnafu {
            method: method.to_string(),
            url: url.as_str(),
        })?;
        let status = response.status();
        let body = response.bytes().await.context(error::RequestSnafu {
            method: method.to_string(),
            url: url.as_str(),
        })?;
        self.log(format_args!(
            "{} {} answered {}: {}",
            method,
            url,
            status,
            String::from_utf8_lossy(&body)
        ));

        ensure!(
            status != StatusCode::NOT_FOUND,
            error::NotFoundSnafu { url: url.as_str() }
        );
        if !success_codes.contains(&status.as_u16()) {
            return Err(match serde_json::from_slice::<ApiError>(&body) {
                Ok(api_error) if !api_error.message.is_empty() => error::ApiSnafu {
                    url: url.as_str(),
                    status: status.as_u16(),
                    error: api_error,
                }
                .build(),
                _ => error::UnexpectedStatusSnafu {
                    url: url.as_str(),
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body),
                }
                .build(),
            }
            .into());
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&body).context(
            error::DecodeSnafu { url: url.as_str() },
        )?))
    }

    /// Joins the server URL and `path`, substituting `{name}` segments and appending the query.
    fn build_url(&self, path: &str, request: &RequestConfiguration) -> Result<Url> {
        let mut path = path.to_string();
        for (name, value) in &request.path_params {
            let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes())
                .collect::<String>()
                .replace('+', "%20");
            path = path.replace(&format!("{{{}}}", name), &encoded);
        }
        let raw = format!(
            "{}{}",
            self.description.server_url().trim_end_matches('/'),
            path
        );
        let mut url = Url::parse(&raw).context(error::InvalidUrlSnafu { url: &raw })?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    fn log(&self, args: std::fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", args);
        } else {
            debug!("{}", args);
        }
    }
}

/// Only the first array-valued field of an object is scanned. A bare array is scanned as is.
fn find_match(response: Value, request: &RequestConfiguration) -> Option<Value> {
    let elements = match response {
        Value::Array(elements) => elements,
        Value::Object(fields) => fields.into_iter().find_map(|(_, v)| match v {
            Value::Array(elements) => Some(elements),
            _ => None,
        })?,
        _ => return None,
    };
    elements.into_iter().find(|element| {
        request
            .parameters()
            .any(|(key, value)| element.get(key).and_then(Value::as_str) == Some(value.as_str()))
    })
}
