//! Viewer Service

use lipid_core::dto::viewer::ViewerConfig;
use lipid_core::error::CoreError;
use lipid_core::store::ImageStore;
use std::sync::Arc;

use super::ServiceError;

pub struct ViewerService {
    images: Arc<dyn ImageStore>,
}

impl ViewerService {
    pub fn new(images: Arc<dyn ImageStore>) -> Self {
        Self { images }
    }

    /// Tile source, overlays and legend of one image
    pub async fn config(&self, image_id: &str) -> Result<ViewerConfig, ServiceError> {
        let image = self
            .images
            .get(image_id)
            .await?
            .ok_or_else(|| CoreError::image_not_found(image_id))?;

        Ok(ViewerConfig::from(image))
    }
}
