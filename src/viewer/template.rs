//! Map page

use crate::models::StoredLocation;

pub const PLACEHOLDER: &str = "{{LOCATIONS}}";

const MAP_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Device locations</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
  <div id="map"></div>
  <script>
    var locations = {{LOCATIONS}};
    var map = L.map('map');
    var points = locations.map(function (l) { return [l.latitude, l.longitude]; });
    locations.forEach(function (l) {
      L.circle([l.latitude, l.longitude], { radius: l.horizontalAccuracy })
        .bindPopup(new Date(l.timeStamp).toLocaleString())
        .addTo(map);
    });
    if (points.length > 1) { L.polyline(points).addTo(map); }
    L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
      attribution: '&copy; OpenStreetMap contributors'
    }).addTo(map);
    if (points.length) { map.fitBounds(points, { maxZoom: 16 }); } else { map.setView([0, 0], 2); }
  </script>
</body>
</html>
"#;

pub fn render_map(locations: &[StoredLocation]) -> String {
    // Serializing plain structs cannot fail; fall back to an empty list anyway.
    let json = serde_json::to_string(locations).unwrap_or_else(|_| "[]".to_string());
    // Keep provider strings from closing the script element.
    MAP_PAGE.replace(PLACEHOLDER, &json.replace("</", "<\\/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_renders() {
        let page = render_map(&[]);
        assert!(page.contains("var locations = [];"));
    }

    #[test]
    fn test_script_close_is_escaped() {
        let location = StoredLocation {
            id: 1,
            device: 1,
            timestamp: 0,
            location_finished: true,
            longitude: 0.0,
            position_type: Some("</script><b>".to_string()),
            location_type: None,
            latitude: 0.0,
            is_old: false,
            is_inaccurate: false,
            horizontal_accuracy: 1.0,
        };

        let page = render_map(&[location]);

        assert!(page.contains("<\\/script><b>"));
        assert_eq!(page.matches("</script>").count(), 2);
    }
}
