//! HTTP access to the counter and gallery endpoints.

use async_trait::async_trait;
use carton::{
    GalleryImage,
    payloads::{
        CountPayload, CountResponse, DeletePayload, DeleteResponse, ErrorResponse,
        GalleryResponse, ImageResponse, UpdateCaptionPayload,
    },
};
use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;

use crate::{compress::PreparedUpload, error::ClientError};

#[async_trait]
pub trait CounterApi: Send + Sync {
    async fn fetch_count(&self) -> Result<u64, ClientError>;

    async fn save_count(&self, count: u64) -> Result<u64, ClientError>;
}

#[async_trait]
pub trait GalleryApi: Send + Sync {
    async fn list_images(&self) -> Result<Vec<GalleryImage>, ClientError>;

    async fn upload_image(
        &self,
        upload: PreparedUpload,
        caption: &str,
    ) -> Result<GalleryImage, ClientError>;

    async fn update_caption(&self, id: &str, caption: &str) -> Result<GalleryImage, ClientError>;

    async fn delete_image(&self, id: &str) -> Result<(), ClientError>;

    async fn download(&self, url: &str) -> Result<Vec<u8>, ClientError>;
}

#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|error| error.error)
            .unwrap_or(body);

        return Err(ClientError::Status { status, message });
    }

    Ok(response.json().await?)
}

#[async_trait]
impl CounterApi for HttpApi {
    async fn fetch_count(&self) -> Result<u64, ClientError> {
        let response = self.client.get(self.url("/counter")).send().await?;
        let body: CountResponse = decode(response).await?;

        if !body.success {
            return Err(ClientError::Unexpected("counter read not successful".to_string()));
        }

        Ok(body.count)
    }

    async fn save_count(&self, count: u64) -> Result<u64, ClientError> {
        let response = self
            .client
            .post(self.url("/counter"))
            .json(&CountPayload { count })
            .send()
            .await?;
        let body: CountResponse = decode(response).await?;

        Ok(body.count)
    }
}

#[async_trait]
impl GalleryApi for HttpApi {
    async fn list_images(&self) -> Result<Vec<GalleryImage>, ClientError> {
        let response = self.client.get(self.url("/gallery")).send().await?;
        let body: GalleryResponse = decode(response).await?;

        Ok(body.images)
    }

    async fn upload_image(
        &self,
        upload: PreparedUpload,
        caption: &str,
    ) -> Result<GalleryImage, ClientError> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.filename)
            .mime_str(&upload.content_type)?;

        let form = Form::new()
            .part("image", part)
            .text("caption", caption.to_string());

        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        let body: ImageResponse = decode(response).await?;

        Ok(body.image)
    }

    async fn update_caption(&self, id: &str, caption: &str) -> Result<GalleryImage, ClientError> {
        let payload = UpdateCaptionPayload {
            id: id.to_string(),
            caption: Some(caption.to_string()),
        };

        let response = self
            .client
            .post(self.url("/gallery/update"))
            .json(&payload)
            .send()
            .await?;
        let body: ImageResponse = decode(response).await?;

        Ok(body.image)
    }

    async fn delete_image(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/gallery/delete"))
            .json(&DeletePayload { id: id.to_string() })
            .send()
            .await?;
        let _: DeleteResponse = decode(response).await?;

        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                message: format!("download of {url} failed"),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
