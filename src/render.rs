//! Leaflet HTML rendering of a [`MapView`].

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use url::form_urlencoded;

use crate::models::{ClientRecord, DepartmentSelection, ALL_DEPARTMENTS, PLACEHOLDER};
use crate::pipeline::MapView;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const TILE_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

/// Presentation settings
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: String,
    pub zoom_start: u8,
    pub overlay_name: String,
    pub marker_color: String,
    /// Map height in pixels
    pub height: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: "Clients TESSAN".to_string(),
            zoom_start: 6,
            overlay_name: "French Departments".to_string(),
            marker_color: "darkgreen".to_string(),
            height: 600,
        }
    }
}

/// What the dashboard page shows under the selector
pub enum PageContent<'a> {
    Map(&'a MapView),
    Info(String),
    Warning(String),
    Error(String),
}

#[derive(Serialize)]
struct Marker {
    lat: f64,
    lon: f64,
    popup: String,
}

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON safe to inline inside a `<script>` element
fn script_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

fn popup(record: &ClientRecord) -> String {
    format!(
        "<b>Name:</b> {}<br><b>Address:</b> {}<br><b>Department:</b> {}<br>",
        escape_html(&record.name),
        escape_html(&record.address),
        escape_html(&record.administrative_area),
    )
}

/// Query string selecting a department, e.g. `department=Finist%C3%A8re`
pub fn selection_query(selection: &DepartmentSelection) -> String {
    let value = match selection {
        DepartmentSelection::Unselected => "",
        DepartmentSelection::All => ALL_DEPARTMENTS,
        DepartmentSelection::Department(name) => name,
    };
    form_urlencoded::Serializer::new(String::new())
        .append_pair("department", value)
        .finish()
}

fn head(title: &str) -> String {
    format!(
        r#"<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="{css}">
<script src="{js}"></script>
<style>
body {{ font-family: sans-serif; margin: 1.5rem; }}
.metric {{ font-size: 2rem; font-weight: bold; }}
.client-marker {{ border-radius: 50%; border: 2px solid white; }}
.notice {{ padding: 0.75rem; border-radius: 4px; margin: 1rem 0; }}
.notice.info {{ background: #e8f0fe; }}
.notice.warning {{ background: #fff4e5; }}
.notice.error {{ background: #fdecea; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 2px 6px; }}
</style>"#,
        title = escape_html(title),
        css = LEAFLET_CSS,
        js = LEAFLET_JS,
    )
}

/// Table of the enriched rows
fn client_table(records: &[ClientRecord]) -> String {
    let mut rows = String::new();
    for r in records {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.6}</td><td>{:.6}</td></tr>\n",
            escape_html(&r.name),
            escape_html(&r.address),
            escape_html(&r.postal_code),
            escape_html(&r.locality),
            escape_html(&r.administrative_area),
            r.latitude.unwrap_or_default(),
            r.longitude.unwrap_or_default(),
        ));
    }

    format!(
        "<details>\n<summary>Show data table</summary>\n<table>\n<tr><th>Name</th><th>Address</th><th>PostalCode</th><th>Locality</th><th>AdministrativeArea2</th><th>lat</th><th>lng</th></tr>\n{rows}</table>\n</details>"
    )
}

/// Map container, client counter, table and Leaflet script
pub fn map_fragment(view: &MapView, options: &RenderOptions) -> String {
    let records = &view.clients.records;
    let markers: Vec<Marker> = records
        .iter()
        .filter_map(|r| {
            r.coordinates().map(|c| Marker {
                lat: c.lat,
                lon: c.lon,
                popup: popup(r),
            })
        })
        .collect();

    let style = json!({
        "fillColor": "orange",
        "color": "black",
        "weight": 0.5,
        "fillOpacity": 0.2,
    });

    let unresolved = if view.clients.unresolved.is_empty() {
        String::new()
    } else {
        format!(
            "<p class=\"notice warning\">{} address(es) could not be placed on the map.</p>\n",
            view.clients.unresolved.len()
        )
    };

    format!(
        r#"<div class="metric-label">Number of clients</div>
<div class="metric">{count}</div>
{unresolved}<div id="map" style="height: {height}px;"></div>
<script>
var map = L.map('map').setView([{lat}, {lon}], {zoom});
L.tileLayer('{tiles}', {{ attribution: '{attribution}' }}).addTo(map);
var boundaries = L.geoJSON({boundaries}, {{ style: function () {{ return {style}; }} }}).addTo(map);
L.control.layers(null, {{ {overlay}: boundaries }}).addTo(map);
var icon = L.divIcon({{ className: 'client-marker', html: '', iconSize: [14, 14] }});
{markers}.forEach(function (m) {{
  var marker = L.marker([m.lat, m.lon], {{ icon: icon }}).addTo(map);
  marker.getElement && marker.getElement() && (marker.getElement().style.background = {color});
  marker.bindPopup(m.popup);
}});
</script>
{table}"#,
        count = records.len(),
        unresolved = unresolved,
        height = options.height,
        lat = view.clients.centroid.lat,
        lon = view.clients.centroid.lon,
        zoom = options.zoom_start,
        tiles = TILE_URL,
        attribution = TILE_ATTRIBUTION,
        boundaries = script_json(view.boundaries.as_json()),
        style = style,
        overlay = script_json(&options.overlay_name),
        markers = script_json(&markers),
        color = script_json(&options.marker_color),
        table = client_table(records),
    )
}

/// Standalone HTML document, used for downloads and exports
pub fn render_map(view: &MapView, options: &RenderOptions) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n{head}\n</head>\n<body>\n<h1>{title}</h1>\n<h2>{selection}</h2>\n{map}\n<footer>Generated {ts}</footer>\n</body>\n</html>\n",
        head = head(&options.title),
        title = escape_html(&options.title),
        selection = escape_html(view.selection.label()),
        map = map_fragment(view, options),
        ts = Utc::now().format("%Y-%m-%d %H:%M UTC"),
    )
}

/// Selector form; the placeholder is the first option
fn selector(departments: &[String], selection: &DepartmentSelection) -> String {
    let mut options = String::new();
    let mut push = |value: &str, selected: bool| {
        options.push_str(&format!(
            "<option value=\"{v}\"{s}>{v}</option>\n",
            v = escape_html(value),
            s = if selected { " selected" } else { "" },
        ));
    };

    push(PLACEHOLDER, *selection == DepartmentSelection::Unselected);
    push(ALL_DEPARTMENTS, *selection == DepartmentSelection::All);
    for department in departments {
        let selected =
            matches!(selection, DepartmentSelection::Department(d) if d == department);
        push(department, selected);
    }

    format!(
        "<form method=\"get\" action=\"/map\">\n<label>Filter <select name=\"department\" onchange=\"this.form.submit()\">\n{options}</select></label>\n<noscript><button type=\"submit\">Show</button></noscript>\n</form>"
    )
}

/// Interactive dashboard page served by the HTTP front-end
pub fn render_page(
    departments: &[String],
    selection: &DepartmentSelection,
    content: PageContent<'_>,
    options: &RenderOptions,
) -> String {
    let body = match content {
        PageContent::Map(view) => format!(
            "<p><a href=\"/map/download?{query}\" download=\"client_map.html\">Download Map</a></p>\n{map}",
            query = escape_html(&selection_query(selection)),
            map = map_fragment(view, options),
        ),
        PageContent::Info(msg) => format!("<p class=\"notice info\">{}</p>", escape_html(&msg)),
        PageContent::Warning(msg) => {
            format!("<p class=\"notice warning\">{}</p>", escape_html(&msg))
        }
        PageContent::Error(msg) => format!("<p class=\"notice error\">{}</p>", escape_html(&msg)),
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n{head}\n</head>\n<body>\n<h1>{title}</h1>\n{selector}\n{body}\n</body>\n</html>\n",
        head = head(&options.title),
        title = escape_html(&options.title),
        selector = selector(departments, selection),
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use crate::pipeline::EnrichedSet;
    use crate::source::BoundaryOverlay;

    fn view() -> MapView {
        let mut a = ClientRecord::new("Pharmacie <Port>", "1 quai Est", "Finistère");
        a.set_coordinates(Coordinates::new(48.38, -4.49));
        let mut b = ClientRecord::new("Cabinet", "2 place Saint-Corentin", "Finistère");
        b.set_coordinates(Coordinates::new(48.0, -4.1));

        MapView {
            selection: DepartmentSelection::Department("Finistère".to_string()),
            clients: EnrichedSet {
                records: vec![a, b],
                centroid: Coordinates::new(48.19, -4.295),
                unresolved: vec!["nowhere".to_string()],
            },
            boundaries: BoundaryOverlay(json!({"type": "FeatureCollection", "features": []})),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">O'Neil & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&#39;Neil &amp; co&lt;/a&gt;"
        );
    }

    #[test]
    fn test_map_has_marker_per_record() {
        let html = render_map(&view(), &RenderOptions::default());

        assert_eq!(html.matches("\"popup\":").count(), 2);
        assert!(html.contains("setView([48.19, -4.295], 6)"));
        assert!(html.contains("\"fillColor\":\"orange\""));
        assert!(html.contains("\"French Departments\""));
        assert!(html.contains("<div class=\"metric\">2</div>"));
        assert!(html.contains("1 address(es) could not be placed"));
    }

    #[test]
    fn test_user_strings_are_escaped() {
        let html = render_map(&view(), &RenderOptions::default());

        assert!(!html.contains("Pharmacie <Port>"));
        assert!(html.contains("Pharmacie &lt;Port&gt;"));
    }

    #[test]
    fn test_script_json_cannot_close_script() {
        let s = script_json(&"</script><script>alert(1)");
        assert!(!s.contains("</script>"));
    }

    #[test]
    fn test_selection_query() {
        assert_eq!(
            selection_query(&DepartmentSelection::Department("Côtes-d'Armor".to_string())),
            "department=C%C3%B4tes-d%27Armor"
        );
        assert_eq!(
            selection_query(&DepartmentSelection::All),
            "department=All+Departments"
        );
    }

    #[test]
    fn test_page_selector() {
        let departments = vec!["Finistère".to_string(), "Morbihan".to_string()];
        let html = render_page(
            &departments,
            &DepartmentSelection::Unselected,
            PageContent::Info("Please select a department.".to_string()),
            &RenderOptions::default(),
        );

        let placeholder = html.find(PLACEHOLDER).unwrap();
        let finistere = html.find("<option value=\"Finistère\">").unwrap();
        assert!(placeholder < finistere);
        assert!(html.contains(&format!("<option value=\"{}\" selected>", PLACEHOLDER)));
        assert!(html.contains("Please select a department."));
        assert!(!html.contains("L.map"));
    }

    #[test]
    fn test_page_with_map_links_download() {
        let v = view();
        let html = render_page(
            &["Finistère".to_string()],
            &v.selection,
            PageContent::Map(&v),
            &RenderOptions::default(),
        );

        assert!(html.contains("/map/download?department=Finist%C3%A8re"));
        assert!(html.contains("<option value=\"Finistère\" selected>"));
    }
}
