//! Signed Request Consumer
//!
//! Builds authenticated HTTP requests and executes them. In OAuth 1.0a mode
//! every request carries an HMAC-SHA1 `Authorization` header; in OAuth 2.0
//! mode the access token is attached as a query parameter or header.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::core::encoding::{append_query, encode_form, parse_form};
use crate::core::signature::{OAuthSigner, SignatureRequest, TokenPair};
use crate::core::transport::{
    strip_query, FilePart, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartForm,
    RequestBody,
};
use crate::error::{ConfigurationError, ProtocolError, ProviderError, SocialAuthError};
use crate::types::AccessGrant;

/// Default OAuth2 access token query parameter.
pub const DEFAULT_ACCESS_TOKEN_PARAMETER: &str = "access_token";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Shared HTTP transport handle.
pub type SharedTransport = Arc<dyn HttpTransport>;

/// Where an OAuth2 access token goes on outgoing requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenPlacement {
    /// `?<name>=<token>` on the request URL.
    QueryParameter(String),
    /// `Authorization: <scheme> <token>`.
    Header { scheme: String },
}

impl Default for TokenPlacement {
    fn default() -> Self {
        Self::QueryParameter(DEFAULT_ACCESS_TOKEN_PARAMETER.to_string())
    }
}

/// Request authentication mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigningMode {
    OAuth1,
    OAuth2(TokenPlacement),
}

/// One API call: method, URL, parameters, headers and optional body.
#[derive(Clone, Debug, Default)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Query parameters for GET/DELETE; form body for POST/PUT without an explicit body.
    pub params: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub file: Option<FilePart>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Raw body; parameters then travel in the query string.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a file, turning the request into `multipart/form-data`.
    pub fn file(mut self, file: FilePart) -> Self {
        self.file = Some(file);
        self
    }

    /// Parameters sent as a form-encoded body.
    fn is_form(&self) -> bool {
        matches!(self.method, HttpMethod::Post | HttpMethod::Put)
            && self.body.is_none()
            && self.file.is_none()
    }
}

/// OAuth 1.0a token response (request token or access token).
#[derive(Clone, Debug)]
pub struct OAuth1TokenResponse {
    pub token: TokenPair,
    /// Remaining response fields such as `user_id` or `oauth_callback_confirmed`.
    pub extra: BTreeMap<String, String>,
}

/// Signed request consumer for one provider.
#[derive(Clone)]
pub struct OAuthConsumer {
    provider_id: String,
    consumer_key: String,
    consumer_secret: SecretString,
    signer: OAuthSigner,
    mode: SigningMode,
    transport: SharedTransport,
}

impl OAuthConsumer {
    pub fn new(
        provider_id: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: SecretString,
        mode: SigningMode,
        transport: SharedTransport,
    ) -> Self {
        let consumer_key = consumer_key.into();
        Self {
            provider_id: provider_id.into(),
            signer: OAuthSigner::new(consumer_key.clone(), consumer_secret.clone()),
            consumer_key,
            consumer_secret,
            mode,
            transport,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Client secret for OAuth2 token endpoint parameters.
    pub(crate) fn consumer_secret(&self) -> String {
        self.consumer_secret.expose_secret().clone()
    }

    pub fn mode(&self) -> &SigningMode {
        &self.mode
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Obtain an OAuth 1.0a request token.
    pub async fn request_token(
        &self,
        url: &str,
        callback: &str,
    ) -> Result<OAuth1TokenResponse, SocialAuthError> {
        let protocol = [("oauth_callback", callback.to_string())];
        let response = self.token_call(url, None, &protocol).await?;

        let (token, extra) = Self::split_token_response(&response.body);
        let token = token.ok_or_else(|| {
            SocialAuthError::Protocol(ProtocolError::MissingField {
                field: "oauth_token".to_string(),
            })
        })?;
        tracing::debug!(provider = %self.provider_id, "obtained request token");
        Ok(OAuth1TokenResponse { token, extra })
    }

    /// Exchange an authorized request token for an access token.
    pub async fn access_token(
        &self,
        url: &str,
        request_token: &TokenPair,
        verifier: Option<&str>,
    ) -> Result<OAuth1TokenResponse, SocialAuthError> {
        let protocol: Vec<(&str, String)> = verifier
            .map(|v| vec![("oauth_verifier", v.to_string())])
            .unwrap_or_default();
        let response = self.token_call(url, Some(request_token), &protocol).await?;

        let (token, extra) = Self::split_token_response(&response.body);
        let token = token.ok_or_else(|| {
            SocialAuthError::Configuration(ConfigurationError::MissingAccessToken {
                provider_id: self.provider_id.clone(),
                url: url.to_string(),
            })
        })?;
        tracing::debug!(provider = %self.provider_id, "obtained access token");
        Ok(OAuth1TokenResponse { token, extra })
    }

    async fn token_call(
        &self,
        url: &str,
        token: Option<&TokenPair>,
        protocol_params: &[(&str, String)],
    ) -> Result<HttpResponse, SocialAuthError> {
        let header = self.signer.authorization_header(&SignatureRequest {
            method: HttpMethod::Post,
            url,
            body_params: &[],
            token,
            protocol_params,
        })?;

        let mut request = HttpRequest::new(HttpMethod::Post, url);
        request
            .headers
            .insert("Authorization".to_string(), header);
        self.dispatch(request).await
    }

    fn split_token_response(body: &str) -> (Option<TokenPair>, BTreeMap<String, String>) {
        let mut extra: BTreeMap<String, String> = parse_form(body).into_iter().collect();
        let key = extra.remove("oauth_token").filter(|k| !k.is_empty());
        let secret = extra.remove("oauth_token_secret").unwrap_or_default();
        (key.map(|key| TokenPair::new(key, secret)), extra)
    }

    /// Execute an API request authenticated with `grant`.
    pub async fn execute(
        &self,
        request: ApiRequest,
        grant: &AccessGrant,
    ) -> Result<HttpResponse, SocialAuthError> {
        let prepared = self.prepare(request, Some(grant))?;
        self.dispatch(prepared).await
    }

    /// Execute a request without attaching credentials (token endpoints, public APIs).
    pub async fn execute_unauthenticated(
        &self,
        request: ApiRequest,
    ) -> Result<HttpResponse, SocialAuthError> {
        let prepared = self.prepare(request, None)?;
        self.dispatch(prepared).await
    }

    pub async fn http_get(
        &self,
        url: &str,
        params: &[(String, String)],
        grant: &AccessGrant,
    ) -> Result<HttpResponse, SocialAuthError> {
        self.execute(ApiRequest::get(url).params(params.iter().cloned()), grant)
            .await
    }

    pub async fn http_post(
        &self,
        url: &str,
        params: &[(String, String)],
        body: Option<String>,
        grant: &AccessGrant,
    ) -> Result<HttpResponse, SocialAuthError> {
        let mut request = ApiRequest::post(url).params(params.iter().cloned());
        request.body = body;
        self.execute(request, grant).await
    }

    pub async fn http_put(
        &self,
        url: &str,
        params: &[(String, String)],
        body: Option<String>,
        grant: &AccessGrant,
    ) -> Result<HttpResponse, SocialAuthError> {
        let mut request = ApiRequest::put(url).params(params.iter().cloned());
        request.body = body;
        self.execute(request, grant).await
    }

    pub async fn http_delete(
        &self,
        url: &str,
        params: &[(String, String)],
        grant: &AccessGrant,
    ) -> Result<HttpResponse, SocialAuthError> {
        self.execute(ApiRequest::delete(url).params(params.iter().cloned()), grant)
            .await
    }

    /// Multipart upload of one file alongside plain fields.
    pub async fn upload(
        &self,
        url: &str,
        fields: &[(String, String)],
        file: FilePart,
        grant: &AccessGrant,
    ) -> Result<HttpResponse, SocialAuthError> {
        let request = ApiRequest::post(url)
            .params(fields.iter().cloned())
            .file(file);
        self.execute(request, grant).await
    }

    /// Turn an `ApiRequest` into a wire request, attaching credentials.
    pub fn prepare(
        &self,
        request: ApiRequest,
        grant: Option<&AccessGrant>,
    ) -> Result<HttpRequest, SocialAuthError> {
        let is_form = request.is_form();
        let ApiRequest {
            method,
            url,
            params,
            headers,
            body,
            file,
        } = request;

        // Parameters that end up in the URL; form and multipart keep theirs.
        let mut url = if is_form || file.is_some() {
            url
        } else {
            append_query(&url, &params)
        };

        let mut wire_headers = headers;
        if let Some(grant) = grant {
            match &self.mode {
                SigningMode::OAuth1 => {
                    let token = TokenPair::new(
                        grant.key.clone(),
                        grant.secret.clone().unwrap_or_default(),
                    );
                    let body_params: &[(String, String)] = if is_form { &params } else { &[] };
                    let header = self.signer.authorization_header(&SignatureRequest {
                        method,
                        url: &url,
                        body_params,
                        token: Some(&token),
                        protocol_params: &[],
                    })?;
                    wire_headers.insert("Authorization".to_string(), header);
                }
                SigningMode::OAuth2(TokenPlacement::QueryParameter(name)) => {
                    url = append_query(&url, &[(name.clone(), grant.key.clone())]);
                }
                SigningMode::OAuth2(TokenPlacement::Header { scheme }) => {
                    wire_headers.insert(
                        "Authorization".to_string(),
                        format!("{} {}", scheme, grant.key),
                    );
                }
            }
        }

        let body = if let Some(file) = file {
            RequestBody::Multipart(MultipartForm {
                fields: params,
                file: Some(file),
            })
        } else if let Some(body) = body {
            RequestBody::Text(body)
        } else if is_form {
            if !wire_headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case("content-type"))
            {
                wire_headers.insert("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string());
            }
            RequestBody::Text(encode_form(&params))
        } else {
            RequestBody::Empty
        };

        Ok(HttpRequest {
            method,
            url,
            headers: wire_headers,
            body,
        })
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, SocialAuthError> {
        let method = request.method;
        let url = strip_query(&request.url);
        tracing::debug!(provider = %self.provider_id, method = method.as_str(), url = %url, "sending request");

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            tracing::warn!(
                provider = %self.provider_id,
                url = %url,
                status = response.status,
                "provider returned an error status"
            );
            return Err(SocialAuthError::Provider(ProviderError::UnexpectedStatus {
                provider_id: self.provider_id.clone(),
                url,
                status: response.status,
                body: response.body,
            }));
        }
        Ok(response)
    }
}

impl std::fmt::Debug for OAuthConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConsumer")
            .field("provider_id", &self.provider_id)
            .field("consumer_key", &self.consumer_key)
            .field("mode", &self.mode)
            .finish()
    }
}
