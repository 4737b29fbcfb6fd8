//! Native HTTP transport over `reqwest`.
//!
//! Every call reads the body as text first and hands status plus text to the
//! core parsers, so error details are extracted the same way as in the
//! browser client.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use termipics::config::ClientConfig;
use termipics::endpoints;
use termipics::error::parse_response;
use termipics::gallery::{ImageInfo, ImagePage, ImageQuery, UserInfo, UserInfoKey, image_page_from_response};
use termipics::types::{
    Grant, LoginRequest, OAuthCodeRequest, Renewal, SignupRequest, SignupResponse, TokenRequest, UploadResponse,
    Verification,
};
use termipics::upload::{FILE_FIELD, LABELS_FIELD, TITLE_FIELD, ValidUpload, upload_response};
use termipics::{Authority, ClientError};

/// Remote API client bound to one server.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpAuthority {
    /// Build a client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend cannot be initialised.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.config.url(path)).json(body);
        let (status, text) = send(request).await?;
        parse_response(status, &text)
    }

    async fn get_text(&self, path: &str, access: &str) -> Result<(u16, String), ClientError> {
        let request = self.client.get(self.config.url(path)).header(AUTHORIZATION, bearer(access));
        send(request).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, access: &str) -> Result<T, ClientError> {
        let (status, text) = self.get_text(path, access).await?;
        parse_response(status, &text)
    }

    pub async fn user_info(&self, access: &str, keys: &[UserInfoKey]) -> Result<UserInfo, ClientError> {
        self.get_json(&UserInfoKey::path(keys), access).await
    }

    pub async fn list_images(&self, access: &str, query: &ImageQuery) -> Result<ImagePage, ClientError> {
        let (status, text) = self.get_text(&query.path(), access).await?;
        image_page_from_response(status, &text)
    }

    pub async fn image_info(&self, access: &str, image_uid: &str) -> Result<ImageInfo, ClientError> {
        self.get_json(&endpoints::image_info(image_uid), access).await
    }

    /// Absolute thumbnail URL for display.
    #[must_use]
    pub fn thumbnail_url(&self, image_uid: &str) -> String {
        self.config.url(&endpoints::image_thumbnail(image_uid))
    }

    pub async fn upload(&self, access: &str, upload: &ValidUpload, bytes: Vec<u8>) -> Result<UploadResponse, ClientError> {
        let file = reqwest::multipart::Part::bytes(bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(transport)?;
        let form = reqwest::multipart::Form::new()
            .part(FILE_FIELD, file)
            .text(TITLE_FIELD, upload.title.clone())
            .text(LABELS_FIELD, upload.labels_field());
        let request = self
            .client
            .post(self.config.url(endpoints::IMAGE_UPLOAD))
            .header(AUTHORIZATION, bearer(access))
            .multipart(form);
        let (status, text) = send(request).await?;
        upload_response(status, &text)
    }
}

#[async_trait::async_trait(?Send)]
impl Authority for HttpAuthority {
    async fn verify_token(&self, access_token: &str) -> Result<Verification, ClientError> {
        self.post_json(endpoints::VERIFY_TOKEN, &TokenRequest { token: access_token }).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Renewal, ClientError> {
        self.post_json(endpoints::REFRESH_TOKEN, &TokenRequest { token: refresh_token }).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<Grant, ClientError> {
        self.post_json(endpoints::LOGIN, request).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<(), ClientError> {
        let _: SignupResponse = self.post_json(endpoints::SIGNUP, request).await?;
        Ok(())
    }

    async fn exchange_oauth_code(&self, code: &str) -> Result<Grant, ClientError> {
        self.post_json(endpoints::GOOGLE, &OAuthCodeRequest { code }).await
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<(u16, String), ClientError> {
    let response = request.send().await.map_err(transport)?;
    let status = response.status().as_u16();
    let text = response.text().await.map_err(transport)?;
    Ok((status, text))
}

fn bearer(access: &str) -> String {
    format!("Bearer {access}")
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}
