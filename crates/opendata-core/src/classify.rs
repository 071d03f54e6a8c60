use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServiceKind {
    /// Per-feature query, styling and attribute popups.
    FeatureService,
    /// Rendered map service, addressed at the parent service level.
    MapImageService,
    VectorTile,
    TiledImage,
    #[default]
    Unknown,
}

impl ServiceKind {
    /// Whether an overlay layer can be built for this kind.
    pub fn is_overlay(&self) -> bool {
        matches!(self, ServiceKind::FeatureService | ServiceKind::MapImageService)
    }

    pub fn short_code(&self) -> &'static str {
        match self {
            ServiceKind::FeatureService => "FS",
            ServiceKind::MapImageService => "MS",
            ServiceKind::VectorTile => "VT",
            ServiceKind::TiledImage => "TI",
            ServiceKind::Unknown => "UNK",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceKind::FeatureService => "feature service",
            ServiceKind::MapImageService => "map image service",
            ServiceKind::VectorTile => "vector tile",
            ServiceKind::TiledImage => "tiled image",
            ServiceKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

pub struct Classifier;

impl Classifier {
    /// Pattern match on the URL only; no network access. Every input maps to exactly one kind.
    pub fn classify(url: &str) -> ServiceKind {
        let url_lower = url.trim().to_lowercase();

        if url_lower.is_empty() {
            return ServiceKind::Unknown;
        }

        // Checked first: a FeatureServer URL never addresses a basemap.
        if url_lower.contains("/featureserver") {
            return ServiceKind::FeatureService;
        }

        if url_lower.contains("/vectortileserver") {
            return ServiceKind::VectorTile;
        }

        if url_lower.contains("/mapserver") {
            return ServiceKind::MapImageService;
        }

        if url_lower.contains("/imageserver") || url_lower.contains("/tile/") {
            return ServiceKind::TiledImage;
        }

        ServiceKind::Unknown
    }

    /// Strips a trailing numeric sub-layer index (`.../MapServer/3` -> `.../MapServer`)
    /// from map-image URLs. Any other URL comes back unchanged.
    pub fn parent_service_url(url: &str) -> &str {
        if Self::classify(url) != ServiceKind::MapImageService {
            return url;
        }

        let trimmed = url.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((parent, last)) if is_layer_index(last) => parent,
            _ => url,
        }
    }
}

fn is_layer_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://meckgis.mecklenburgcountync.gov/server/rest/services";

    #[test]
    fn test_overlay_kinds() {
        assert_eq!(
            Classifier::classify(&format!("{BASE}/Parks/FeatureServer/0")),
            ServiceKind::FeatureService
        );
        assert_eq!(
            Classifier::classify(&format!("{BASE}/Zoning/MapServer/3")),
            ServiceKind::MapImageService
        );
        assert_eq!(
            Classifier::classify(&format!("{BASE}/Zoning/mapserver")),
            ServiceKind::MapImageService
        );
    }

    #[test]
    fn test_vector_basemap_mapserver_is_map_image() {
        assert_eq!(
            Classifier::classify(&format!("{BASE}/Basemap/VectorBasemap/MapServer")),
            ServiceKind::MapImageService
        );
        assert_eq!(
            Classifier::classify(&format!("{BASE}/Basemap/VectorBasemapGrayscale/MapServer/0")),
            ServiceKind::MapImageService
        );
    }

    #[test]
    fn test_basemap_kinds() {
        assert_eq!(
            Classifier::classify("https://tiles.example.gov/rest/services/Streets/VectorTileServer"),
            ServiceKind::VectorTile
        );
        assert_eq!(
            Classifier::classify(&format!("{BASE}/Imagery/ImageServer")),
            ServiceKind::TiledImage
        );
    }

    #[test]
    fn test_unknown_is_total() {
        for url in ["", "   ", "not a url", "https://example.com/data.geojson"] {
            assert_eq!(Classifier::classify(url), ServiceKind::Unknown, "{url:?}");
        }
    }

    #[test]
    fn test_parent_service_url() {
        let layer = format!("{BASE}/Zoning/MapServer/3");
        assert_eq!(
            Classifier::parent_service_url(&layer),
            format!("{BASE}/Zoning/MapServer")
        );

        let with_slash = format!("{BASE}/Zoning/MapServer/12/");
        assert_eq!(
            Classifier::parent_service_url(&with_slash),
            format!("{BASE}/Zoning/MapServer")
        );

        let parent = format!("{BASE}/Zoning/MapServer");
        assert_eq!(Classifier::parent_service_url(&parent), parent);

        // Feature services keep their sub-layer index.
        let feature = format!("{BASE}/Parks/FeatureServer/0");
        assert_eq!(Classifier::parent_service_url(&feature), feature);
    }

    #[test]
    fn test_overlay_flag() {
        assert!(ServiceKind::FeatureService.is_overlay());
        assert!(ServiceKind::MapImageService.is_overlay());
        assert!(!ServiceKind::VectorTile.is_overlay());
        assert!(!ServiceKind::Unknown.is_overlay());
    }
}
