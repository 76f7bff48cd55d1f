//! Image Repository

use async_trait::async_trait;
use lipid_core::domain::image::Image;
use lipid_core::store::{ImageStore, StoreError};
use sqlx::PgPool;

use super::backend;

pub struct PgImageStore {
    pool: PgPool,
}

impl PgImageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageStore for PgImageStore {
    async fn get(&self, id: &str) -> Result<Option<Image>, StoreError> {
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, dzi_base_uri, overlay_refs, legend
            FROM images
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Image::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: String,
    dzi_base_uri: String,
    overlay_refs: serde_json::Value,
    legend: serde_json::Value,
}

impl TryFrom<ImageRow> for Image {
    type Error = StoreError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let overlay_refs = match row.overlay_refs {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Null => Vec::new(),
            other => {
                return Err(StoreError::Corrupt(format!(
                    "image {} overlay_refs is not an array: {}",
                    row.id, other
                )));
            }
        };

        let legend = match row.legend {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(StoreError::Corrupt(format!(
                    "image {} legend is not an object: {}",
                    row.id, other
                )));
            }
        };

        Ok(Image {
            id: row.id,
            dzi_base_uri: row.dzi_base_uri,
            overlay_refs,
            legend,
        })
    }
}
