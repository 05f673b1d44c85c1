use log::debug;
use serde::de::DeserializeOwned;

use crate::{NavigationError, Result};

/// Reads a JSON body, turning non-success answers into `ExternalService` errors.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        debug!("collaborator answered {}: {}", status, text);
        return Err(NavigationError::ExternalService {
            status_code: Some(status),
            reason: text,
        });
    }
    Ok(serde_json::from_str(&text)?)
}
