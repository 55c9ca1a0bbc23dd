use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use log::{debug, error, info};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

// Backblaze B2 API response structures
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct AuthorizeAccountResponse {
    #[serde(rename = "accountId")]
    pub account_id: String,
    #[serde(rename = "apiUrl")]
    pub api_url: String,
    #[serde(rename = "authorizationToken")]
    pub authorization_token: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetUploadUrlResponse {
    #[serde(rename = "authorizationToken")]
    pub authorization_token: String,
    #[serde(rename = "bucketId")]
    pub bucket_id: String,
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UploadFileResponse {
    #[serde(rename = "bucketId")]
    pub bucket_id: String,
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListFileNamesResponse {
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FileInfo {
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// Object path for one donation image. Time-prefixed so re-uploads of the
/// same file name never collide.
pub fn donation_image_path(user_id: &Uuid, original_name: &str) -> String {
    let safe_name = sanitize_filename::sanitize(original_name);
    format!(
        "donation-images/{}/{}_{}",
        user_id,
        Utc::now().timestamp_millis(),
        safe_name
    )
}

/// Object path for a user avatar. One object per user, replaced in place.
pub fn avatar_path(user_id: &Uuid, original_name: &str) -> String {
    let safe_name = sanitize_filename::sanitize(original_name);
    format!("avatars/{}/{}", user_id, safe_name)
}

/// Recovers the object name from a public download URL
/// (`{download_url}/file/{bucket}/{object_name}`).
pub fn object_name_from_url(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("/file/")?;
    let (_bucket, object_name) = rest.split_once('/')?;
    if object_name.is_empty() {
        None
    } else {
        Some(object_name)
    }
}

// B2 client with caching for auth tokens
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    auth_data: Arc<Mutex<Option<AuthorizeAccountResponse>>>,
    auth_time: Arc<Mutex<Option<Instant>>>,
    application_key_id: String,
    application_key: String,
    bucket_id: String,
}

impl StorageClient {
    pub fn new(
        application_key_id: String,
        application_key: String,
        bucket_id: String,
    ) -> Result<Self, Box<dyn Error>> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(StorageClient {
            client,
            auth_data: Arc::new(Mutex::new(None)),
            auth_time: Arc::new(Mutex::new(None)),
            application_key_id,
            application_key,
            bucket_id,
        })
    }

    // Create a new StorageClient from a SecretStore
    pub fn from_secrets(secrets: &shuttle_runtime::SecretStore) -> Result<Self, Box<dyn Error>> {
        let application_key_id = secrets
            .get("B2_APPLICATION_KEY_ID")
            .ok_or("B2_APPLICATION_KEY_ID not found in secrets")?
            .to_string();

        let application_key = secrets
            .get("B2_APPLICATION_KEY")
            .ok_or("B2_APPLICATION_KEY not found in secrets")?
            .to_string();

        let bucket_id = secrets
            .get("B2_BUCKET_ID")
            .ok_or("B2_BUCKET_ID not found in secrets")?
            .to_string();

        Self::new(application_key_id, application_key, bucket_id)
    }

    // Authorize account and get auth token, reusing a cached token while it
    // is still fresh (B2 tokens are valid for 24h; we refresh at 23h).
    async fn authorize_account(&self) -> Result<AuthorizeAccountResponse, Box<dyn Error>> {
        {
            let auth_time_guard = self.auth_time.lock().unwrap();
            let auth_data_guard = self.auth_data.lock().unwrap();
            if let (Some(auth_time), Some(auth_data)) = (&*auth_time_guard, &*auth_data_guard) {
                if auth_time.elapsed() < Duration::from_secs(23 * 60 * 60) {
                    debug!("Using cached B2 authorization token");
                    return Ok(auth_data.clone());
                }
            }
        }

        let auth = format!("{}:{}", self.application_key_id, self.application_key);
        let encoded_auth = STANDARD.encode(auth);

        let response = self
            .client
            .get("https://api.backblazeb2.com/b2api/v2/b2_authorize_account")
            .header(header::AUTHORIZATION, format!("Basic {}", encoded_auth))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            error!("B2 authorization failed: {}", error_text);
            return Err(format!("B2 authorization failed: {}", error_text).into());
        }

        let auth_data: AuthorizeAccountResponse = response.json().await?;
        info!("B2 authorization successful");

        *self.auth_data.lock().unwrap() = Some(auth_data.clone());
        *self.auth_time.lock().unwrap() = Some(Instant::now());

        Ok(auth_data)
    }

    // Get upload URL
    async fn get_upload_url(&self) -> Result<GetUploadUrlResponse, Box<dyn Error>> {
        let auth = self.authorize_account().await?;

        let response = self
            .client
            .post(format!("{}/b2api/v2/b2_get_upload_url", auth.api_url))
            .header(header::AUTHORIZATION, &auth.authorization_token)
            .json(&serde_json::json!({
                "bucketId": self.bucket_id
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            error!("Failed to get upload URL: {}", error_text);
            return Err(format!("Failed to get upload URL: {}", error_text).into());
        }

        Ok(response.json().await?)
    }

    /// Uploads one file and returns its public download URL.
    pub async fn upload_file(
        &self,
        file_data: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<String, Box<dyn Error>> {
        let upload_url = self.get_upload_url().await?;

        let mut hasher = Sha1::new();
        hasher.update(file_data);
        let sha1_hex = format!("{:x}", hasher.finalize());

        info!("Uploading {} ({} bytes) to B2", file_name, file_data.len());

        let response = self
            .client
            .post(&upload_url.upload_url)
            .header(header::AUTHORIZATION, &upload_url.authorization_token)
            .header("X-Bz-File-Name", file_name)
            .header("Content-Type", content_type)
            .header("Content-Length", file_data.len().to_string())
            .header("X-Bz-Content-Sha1", sha1_hex)
            .body(file_data.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            error!("Failed to upload file: {}", error_text);
            return Err(format!("Failed to upload file: {}", error_text).into());
        }

        let upload_response: UploadFileResponse = response.json().await?;

        let auth = self.authorize_account().await?;
        let download_url = format!(
            "{}/file/{}/{}",
            auth.download_url, upload_response.bucket_id, upload_response.file_name
        );

        Ok(download_url)
    }

    // Find file ID by name
    async fn find_file_id(&self, file_name: &str) -> Result<Option<String>, Box<dyn Error>> {
        let auth = self.authorize_account().await?;

        let response = self
            .client
            .post(format!("{}/b2api/v2/b2_list_file_names", auth.api_url))
            .header(header::AUTHORIZATION, &auth.authorization_token)
            .json(&serde_json::json!({
                "bucketId": self.bucket_id,
                "prefix": file_name,
                "maxFileCount": 1
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            error!("Failed to list files: {}", error_text);
            return Err(format!("Failed to list files: {}", error_text).into());
        }

        let list_response: ListFileNamesResponse = response.json().await?;

        for file in list_response.files {
            if file.file_name == file_name {
                return Ok(Some(file.file_id));
            }
        }

        Ok(None)
    }

    /// Deletes an object by name; missing objects are not an error.
    pub async fn delete_file(&self, file_name: &str) -> Result<(), Box<dyn Error>> {
        let file_id = match self.find_file_id(file_name).await? {
            Some(id) => id,
            None => {
                info!("File not found for deletion: {}", file_name);
                return Ok(());
            }
        };

        let auth = self.authorize_account().await?;

        let response = self
            .client
            .post(format!("{}/b2api/v2/b2_delete_file_version", auth.api_url))
            .header(header::AUTHORIZATION, &auth.authorization_token)
            .json(&serde_json::json!({
                "fileName": file_name,
                "fileId": file_id
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            error!("Failed to delete file: {}", error_text);
            return Err(format!("Failed to delete file: {}", error_text).into());
        }

        info!("File deleted successfully: {}", file_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_image_paths_are_sanitized_and_user_scoped() {
        let user = Uuid::new_v4();
        let path = donation_image_path(&user, "../..//lunch photo.jpg");
        assert!(path.starts_with(&format!("donation-images/{}/", user)));
        assert!(!path.contains(".."));
    }

    #[test]
    fn avatar_path_is_stable_per_user_and_name() {
        let user = Uuid::new_v4();
        assert_eq!(
            avatar_path(&user, "me.png"),
            format!("avatars/{}/me.png", user)
        );
    }

    #[test]
    fn object_name_is_recovered_from_download_url() {
        let url = "https://f000.backblazeb2.com/file/foodshare/donation-images/u1/1_lunch.jpg";
        assert_eq!(
            object_name_from_url(url),
            Some("donation-images/u1/1_lunch.jpg")
        );
        assert_eq!(object_name_from_url("https://example.com/nope"), None);
    }
}
