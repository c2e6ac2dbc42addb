use crate::db::models::CameraId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use url::{form_urlencoded, ParseError, Url};

/// Only the path and query of a route matter; the base just makes input absolute
static BASE: Lazy<Result<Url, ParseError>> = Lazy::new(|| Url::parse("http://spotwise.local/"));

/// Every page the app can show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Home,
    Auth,
    Driver,
    Admin,
    AdminCameras,
    CameraPreview { id: CameraId },
    CameraDetection { id: CameraId },
    LiveFeed,
    VideoEditor {
        video_url: Option<String>,
        camera_name: Option<String>,
    },
    Directions {
        slot: Option<String>,
        zone: Option<String>,
    },
    NotFound,
}

impl Route {
    /// Parse a path with optional query string, e.g. `/directions?slot=A-01&zone=A`
    pub fn parse(input: &str) -> Self {
        let url = match BASE.clone().and_then(|base| base.join(input)) {
            Ok(url) => url,
            Err(_) => return Route::NotFound,
        };

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let query = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };

        match segments.as_slice() {
            [] => Route::Home,
            ["auth"] => Route::Auth,
            ["driver"] => Route::Driver,
            ["admin"] => Route::Admin,
            ["admin", "cameras"] => Route::AdminCameras,
            ["admin", "cameras", id, "preview"] => match id.parse() {
                Ok(id) => Route::CameraPreview { id },
                Err(_) => Route::NotFound,
            },
            ["admin", "detection", id] => match id.parse() {
                Ok(id) => Route::CameraDetection { id },
                Err(_) => Route::NotFound,
            },
            ["admin", "live-feed"] => Route::LiveFeed,
            ["video-editor"] => Route::VideoEditor {
                video_url: query("videoUrl"),
                camera_name: query("cameraName"),
            },
            ["directions"] => Route::Directions {
                slot: query("slot"),
                zone: query("zone"),
            },
            _ => Route::NotFound,
        }
    }

    /// Path without the query string
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Auth => "/auth".to_string(),
            Route::Driver => "/driver".to_string(),
            Route::Admin => "/admin".to_string(),
            Route::AdminCameras => "/admin/cameras".to_string(),
            Route::CameraPreview { id } => format!("/admin/cameras/{}/preview", id),
            Route::CameraDetection { id } => format!("/admin/detection/{}", id),
            Route::LiveFeed => "/admin/live-feed".to_string(),
            Route::VideoEditor { .. } => "/video-editor".to_string(),
            Route::Directions { .. } => "/directions".to_string(),
            Route::NotFound => "/404".to_string(),
        }
    }

    fn query_string(&self) -> Option<String> {
        let pairs: Vec<(&str, &String)> = match self {
            Route::VideoEditor {
                video_url,
                camera_name,
            } => [("videoUrl", video_url), ("cameraName", camera_name)]
                .into_iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
                .collect(),
            Route::Directions { slot, zone } => [("slot", slot), ("zone", zone)]
                .into_iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
                .collect(),
            _ => return None,
        };
        if pairs.is_empty() {
            return None;
        }

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
        Some(serializer.finish())
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.query_string() {
            Some(query) => write!(f, "{}?{}", self.path(), query),
            None => f.write_str(&self.path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_route_surface() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/admin/cameras"), Route::AdminCameras);
        assert_eq!(Route::parse("/admin/cameras/7/preview"), Route::CameraPreview { id: 7 });
        assert_eq!(Route::parse("/admin/detection/3"), Route::CameraDetection { id: 3 });
        assert_eq!(Route::parse("/admin/live-feed"), Route::LiveFeed);
        assert_eq!(Route::parse("/admin/detection/abc"), Route::NotFound);
        assert_eq!(Route::parse("/parking"), Route::NotFound);
    }

    #[test]
    fn reads_query_parameters() {
        assert_eq!(
            Route::parse("/directions?slot=A-01&zone=A"),
            Route::Directions {
                slot: Some("A-01".to_string()),
                zone: Some("A".to_string()),
            }
        );

        let route = Route::parse("/video-editor?videoUrl=%2Fvideos%2Fcamera1.mp4&cameraName=Gate%20West");
        assert_eq!(
            route,
            Route::VideoEditor {
                video_url: Some("/videos/camera1.mp4".to_string()),
                camera_name: Some("Gate West".to_string()),
            }
        );
    }

    #[test]
    fn display_encodes_query() {
        let route = Route::VideoEditor {
            video_url: Some("/videos/camera 1.mp4".to_string()),
            camera_name: None,
        };
        let rendered = route.to_string();
        assert_eq!(rendered, "/video-editor?videoUrl=%2Fvideos%2Fcamera+1.mp4");
        assert_eq!(Route::parse(&rendered), route);
    }
}
