//! Slippy map page served by the proxy
//!
//! A fixed Leaflet view: a public base layer with the proxy's tiles composed
//! on top at half opacity.

use serde::Serialize;

use crate::domain::DomainError;

pub const DEFAULT_CENTER: (f64, f64) = (51.505, -0.09);
pub const DEFAULT_ZOOM: u8 = 13;
pub const LAYER_MAX_ZOOM: u8 = 16;
pub const OVERLAY_OPACITY: f64 = 0.5;

const BASE_URL: &str = "http://{s}.tile.stamen.com/toner/{z}/{x}/{y}.png";
const BASE_SUBDOMAINS: &str = "abcd";
const BASE_ATTRIBUTION: &str = "Map tiles by <a href=\"http://stamen.com/\">Stamen Design</a>, \
under <a href=\"http://creativecommons.org/licenses/by/3.0\">CC BY 3.0</a>. \
Data by <a href=\"http://openstreetmap.org/\">OpenStreetMap</a>, \
under <a href=\"http://creativecommons.org/licenses/by-sa/3.0\">CC BY SA</a>.";

pub const OSM_ATTRIBUTION: &str =
    "Map data &copy; <a href=\"https://www.openstreetmap.org/\">OpenStreetMap</a> contributors";

const INDEX_HTML: &str = include_str!("../templates/index.html");
const STYLE_CSS: &str = include_str!("../templates/style.css");

/// Leaflet tile layer options.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomains: Option<String>,
    pub max_zoom: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    pub attribution: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub detect_retina: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub url_template: String,
    pub options: TileLayerOptions,
}

impl TileLayer {
    /// Opacity as rendered; layers without one are fully opaque.
    pub fn effective_opacity(&self) -> f64 {
        self.options.opacity.unwrap_or(1.0)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self.options.opacity {
            Some(o) if !(0.0..=1.0).contains(&o) => Err(DomainError::InvalidOpacity(o)),
            _ => Ok(()),
        }
    }
}

/// Map centre, zoom and tile layers, bottom layer first.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub center: (f64, f64),
    pub zoom: u8,
    pub layers: Vec<TileLayer>,
    pub port: u16,
}

impl MapView {
    /// Base map plus the proxy's tiles on `port`.
    pub fn for_proxy(port: u16, overlay_attribution: &str) -> Self {
        let base = TileLayer {
            url_template: BASE_URL.to_string(),
            options: TileLayerOptions {
                subdomains: Some(BASE_SUBDOMAINS.to_string()),
                max_zoom: LAYER_MAX_ZOOM,
                opacity: None,
                attribution: BASE_ATTRIBUTION.to_string(),
                detect_retina: true,
            },
        };
        let overlay = TileLayer {
            url_template: format!("http://localhost:{port}/tiles/{{z}}/{{x}}/{{y}}.png"),
            options: TileLayerOptions {
                subdomains: None,
                max_zoom: LAYER_MAX_ZOOM,
                opacity: Some(OVERLAY_OPACITY),
                attribution: overlay_attribution.to_string(),
                detect_retina: false,
            },
        };
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            layers: vec![base, overlay],
            port,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.layers.iter().try_for_each(TileLayer::validate)
    }

    /// The Leaflet script creating the map and adding layers in order.
    pub fn script(&self) -> Result<String, DomainError> {
        self.validate()?;
        let mut js = format!(
            "var map = L.map('map').setView([{}, {}], {});\n",
            self.center.0, self.center.1, self.zoom
        );
        for layer in &self.layers {
            let url = serde_json::to_string(&layer.url_template)
                .map_err(|e| DomainError::InvalidValue(e.to_string()))?;
            let options = serde_json::to_string_pretty(&layer.options)
                .map_err(|e| DomainError::InvalidValue(e.to_string()))?;
            js.push_str(&format!("\nL.tileLayer({url}, {options}).addTo(map);\n"));
        }
        Ok(js)
    }

    pub fn index_html(&self) -> String {
        INDEX_HTML.replace("{{ port }}", &self.port.to_string())
    }

    pub fn style_css(&self) -> String {
        STYLE_CSS.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_proxy_view_when_building_then_overlay_sits_on_top_and_is_translucent() {
        let view = MapView::for_proxy(8000, OSM_ATTRIBUTION);
        assert_eq!(view.layers.len(), 2);
        let (base, overlay) = (&view.layers[0], &view.layers[1]);
        assert_eq!(base.effective_opacity(), 1.0);
        assert_eq!(overlay.effective_opacity(), 0.5);
        assert!(overlay.effective_opacity() < base.effective_opacity());
        assert_eq!(
            overlay.url_template,
            "http://localhost:8000/tiles/{z}/{x}/{y}.png"
        );
    }

    #[test]
    fn given_view_when_rendering_script_then_layers_appear_in_order() {
        let js = MapView::for_proxy(9123, OSM_ATTRIBUTION).script().unwrap();
        assert!(js.starts_with("var map = L.map('map').setView([51.505, -0.09], 13);"));
        let base = js.find("tile.stamen.com").unwrap();
        let overlay = js.find("localhost:9123").unwrap();
        assert!(base < overlay);
        assert!(js.contains("\"subdomains\": \"abcd\""));
        assert!(js.contains("\"maxZoom\": 16"));
        assert!(js.contains("\"opacity\": 0.5"));
        assert!(js.contains("\"detectRetina\": true"));
    }

    #[test]
    fn given_out_of_range_opacity_when_rendering_then_errors() {
        let mut view = MapView::for_proxy(8000, OSM_ATTRIBUTION);
        view.layers[1].options.opacity = Some(1.5);
        assert_eq!(view.script().unwrap_err(), DomainError::InvalidOpacity(1.5));
    }

    #[test]
    fn given_port_when_rendering_index_then_templates_it() {
        let html = MapView::for_proxy(8123, OSM_ATTRIBUTION).index_html();
        assert!(html.contains("8123"));
        assert!(!html.contains("{{ port }}"));
    }
}
