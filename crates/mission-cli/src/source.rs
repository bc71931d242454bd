//! Mission data source used by the dashboard.

use mission_core::models::{Mission, MissionUpload};
use mission_sdk::{ClientError, MissionClient};

/// The two calls the dashboard makes.
#[allow(async_fn_in_trait)]
pub trait MissionSource {
    async fn list_missions(&self) -> Result<Vec<Mission>, ClientError>;

    async fn upload_kml(
        &self,
        file_name: &str,
        content: Vec<u8>,
        mission_name: &str,
    ) -> Result<MissionUpload, ClientError>;
}

impl MissionSource for MissionClient {
    async fn list_missions(&self) -> Result<Vec<Mission>, ClientError> {
        MissionClient::list_missions(self).await
    }

    async fn upload_kml(
        &self,
        file_name: &str,
        content: Vec<u8>,
        mission_name: &str,
    ) -> Result<MissionUpload, ClientError> {
        MissionClient::upload_kml(self, file_name, content, mission_name).await
    }
}
