use anyhow::anyhow;
use drift_core::config::ImagerySettings;
use drift_engine::traits::{ImageTarget, StreetImage, StreetViewProvider};
use drift_providers::google_maps::{GoogleMapsConfig, StreetViewParams, build_street_view_request};
use drift_providers::runtime;

#[derive(Debug, Clone)]
pub struct GoogleStreetViewProvider {
    maps: GoogleMapsConfig,
    settings: ImagerySettings,
}

impl GoogleStreetViewProvider {
    pub fn new(maps: GoogleMapsConfig, settings: ImagerySettings) -> Self {
        Self { maps, settings }
    }
}

#[async_trait::async_trait]
impl StreetViewProvider for GoogleStreetViewProvider {
    async fn fetch_image(
        &self,
        target: &ImageTarget,
        heading: f32,
    ) -> anyhow::Result<Option<StreetImage>> {
        let params = StreetViewParams {
            width: self.settings.width,
            height: self.settings.height,
            heading,
            pitch: self.settings.pitch,
            fov: self.settings.fov,
        };
        let req = build_street_view_request(&self.maps, &target.as_location(), &params);
        let resp = runtime::execute(&req).await?;

        // `return_error_code=true` turns "no imagery here" into a 404.
        if resp.status == 404 {
            return Ok(None);
        }
        if !resp.is_success() {
            return Err(anyhow!(
                "street view request failed: status={} body={}",
                resp.status,
                resp.body_preview()
            ));
        }
        if let Some(ct) = resp.content_type.as_deref() {
            if !ct.starts_with("image/") {
                return Err(anyhow!(
                    "street view returned {ct} instead of an image: {}",
                    resp.body_preview()
                ));
            }
        }

        Ok(Some(StreetImage {
            heading,
            content_type: resp.content_type,
            bytes: resp.body,
        }))
    }
}
