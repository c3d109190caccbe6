//! GPX route analysis: total length, kilometre markers and a static SVG map.

use std::fmt::Write as _;
use std::io::Read;

use geo::{GeodesicDistance, Point};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use thiserror::Error;
use tracing::{error, info};

use crate::database::models::{format_km, RouteStatus, TrainingDistance};
use crate::utils::feedback::{CommandFeedback, FeedbackType, ProgressTracker};
use crate::utils::html::escape_html;

const MAP_WIDTH: f64 = 1200.0;
const MAP_HEIGHT: f64 = 1000.0;
const EARTH_RADIUS_M: f64 = 6_378_137.0;

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("failed to parse GPX: {0}")]
    Parse(#[from] gpx::errors::GpxError),
    #[error("GPX file contains no track or route points")]
    NoPoints,
    #[error("distance has no route attached")]
    MissingRoute,
    #[error("failed to download route: {0}")]
    Download(String),
    #[error("failed to store route result: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KmMarker {
    pub lat: f64,
    pub lon: f64,
    /// Distance from the start, rounded to 0.1 km.
    pub km: f64,
}

#[derive(Debug, Clone)]
pub struct RouteAnalysis {
    pub points: Vec<Point<f64>>,
    pub markers: Vec<KmMarker>,
    pub total_km: f64,
}

/// Track points, or route points when the file has no tracks.
pub fn parse_points<R: Read>(reader: R) -> Result<Vec<Point<f64>>, GpxError> {
    let gpx = gpx::read(reader)?;

    let mut points: Vec<Point<f64>> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|waypoint| waypoint.point())
        .collect();

    if points.is_empty() {
        points = gpx
            .routes
            .iter()
            .flat_map(|route| route.points.iter())
            .map(|waypoint| waypoint.point())
            .collect();
    }

    if points.is_empty() {
        return Err(GpxError::NoPoints);
    }
    Ok(points)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Walks the track accumulating geodesic length and drops a marker every `step_km`,
/// interpolated on the segment that crosses it. Start and finish are always marked.
pub fn analyze_points(points: Vec<Point<f64>>, step_km: f64) -> Result<RouteAnalysis, GpxError> {
    let first = *points.first().ok_or(GpxError::NoPoints)?;
    let mut markers = vec![KmMarker {
        lat: first.y(),
        lon: first.x(),
        km: 0.0,
    }];

    let mut total = 0.0_f64;
    let mut last_marker = 0.0_f64;

    for pair in points.windows(2) {
        let (prev, current) = (pair[0], pair[1]);
        let segment = prev.geodesic_distance(&current) / 1000.0;
        if segment <= 0.0 {
            continue;
        }
        total += segment;

        while total - last_marker >= step_km {
            let covered_before = total - segment;
            let ratio = (last_marker + step_km - covered_before) / segment;
            last_marker += step_km;
            markers.push(KmMarker {
                lat: prev.y() + ratio * (current.y() - prev.y()),
                lon: prev.x() + ratio * (current.x() - prev.x()),
                km: round1(last_marker),
            });
        }
    }

    let Some(last) = points.last() else {
        return Err(GpxError::NoPoints);
    };
    markers.push(KmMarker {
        lat: last.y(),
        lon: last.x(),
        km: round1(total),
    });

    Ok(RouteAnalysis {
        points,
        markers,
        total_km: total,
    })
}

pub fn analyze<R: Read>(reader: R) -> Result<RouteAnalysis, GpxError> {
    analyze_points(parse_points(reader)?, 1.0)
}

fn mercator(point: (f64, f64)) -> (f64, f64) {
    let (lon, lat) = point;
    let x = lon.to_radians() * EARTH_RADIUS_M;
    let y = (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS_M;
    (x, y)
}

impl RouteAnalysis {
    /// Track in red, start in green, finish in blue and whole kilometres in purple.
    pub fn render_svg(&self, title: &str) -> String {
        let projected: Vec<(f64, f64)> = self.points.iter().map(|p| mercator((p.x(), p.y()))).collect();

        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for (x, y) in &projected {
            min_x = min_x.min(*x);
            max_x = max_x.max(*x);
            min_y = min_y.min(*y);
            max_y = max_y.max(*y);
        }
        let span = (max_x - min_x).max(max_y - min_y).max(1.0);
        let buffer = span * 0.05;
        let scale = ((MAP_WIDTH - 40.0) / (max_x - min_x + 2.0 * buffer).max(1.0))
            .min((MAP_HEIGHT - 120.0) / (max_y - min_y + 2.0 * buffer).max(1.0));

        let to_canvas = |(x, y): (f64, f64)| -> (f64, f64) {
            (
                20.0 + (x - min_x + buffer) * scale,
                100.0 + (max_y + buffer - y) * scale,
            )
        };

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{MAP_WIDTH}" height="{MAP_HEIGHT}" viewBox="0 0 {MAP_WIDTH} {MAP_HEIGHT}" font-family="sans-serif">"#
        );
        let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#f4f1ea"/>"##);
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="40" font-size="24" text-anchor="middle">{}</text>"#,
            MAP_WIDTH / 2.0,
            escape_html(title)
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="72" font-size="18" text-anchor="middle">Загальна відстань: {:.2} км</text>"#,
            MAP_WIDTH / 2.0,
            self.total_km
        );

        let path = projected
            .iter()
            .map(|p| {
                let (x, y) = to_canvas(*p);
                format!("{x:.1},{y:.1}")
            })
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            svg,
            r#"<polyline points="{path}" fill="none" stroke="red" stroke-width="3" stroke-linejoin="round"/>"#
        );

        let last_index = self.markers.len().saturating_sub(1);
        for (index, marker) in self.markers.iter().enumerate() {
            let (label, color, radius) = if index == 0 {
                ("Старт".to_string(), "green", 9.0)
            } else if index == last_index {
                (format!("Фініш ({} км)", format_km(marker.km)), "blue", 9.0)
            } else if marker.km.fract() == 0.0 {
                (format!("{} км", format_km(marker.km)), "purple", 7.0)
            } else {
                continue;
            };

            let (x, y) = to_canvas(mercator((marker.lon, marker.lat)));
            let _ = writeln!(
                svg,
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="{radius}" fill="{color}"/>"#
            );
            let _ = writeln!(
                svg,
                r#"<text x="{x:.1}" y="{:.1}" font-size="14" font-weight="bold" text-anchor="middle" stroke="white" stroke-width="3" paint-order="stroke">{label}</text>"#,
                y - 14.0
            );
        }

        svg.push_str("</svg>\n");
        svg
    }

    pub fn markers_json(&self) -> String {
        serde_json::to_string(&self.markers).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Downloads the distance's GPX from Telegram, stores the analysis and sends the map to `chat_id`.
pub async fn process_distance_route(
    bot: &Bot,
    pool: &SqlitePool,
    distance_id: i64,
    chat_id: ChatId,
) -> Result<RouteAnalysis, GpxError> {
    TrainingDistance::set_route_status(pool, distance_id, RouteStatus::Processing).await?;

    match analyze_and_send(bot, pool, distance_id, chat_id).await {
        Ok(analysis) => Ok(analysis),
        Err(e) => {
            error!("Route analysis for distance {} failed: {}", distance_id, e);
            TrainingDistance::set_route_status(pool, distance_id, RouteStatus::Failed).await?;
            Err(e)
        }
    }
}

async fn download(bot: &Bot, file_id: String) -> Result<Vec<u8>, GpxError> {
    let file = bot
        .get_file(file_id)
        .await
        .map_err(|e| GpxError::Download(e.to_string()))?;
    let mut bytes = Vec::new();
    bot.download_file(&file.path, &mut bytes)
        .await
        .map_err(|e| GpxError::Download(e.to_string()))?;
    Ok(bytes)
}

/// Final status line of a failed route job.
fn failure_text(label: &str, error: &GpxError) -> String {
    match error {
        GpxError::Download(_) => format!("Не вдалося завантажити маршрут {label} км, надішліть файл ще раз"),
        _ => format!("Не вдалося обробити GPX для {label} км"),
    }
}

async fn analyze_and_send(
    bot: &Bot,
    pool: &SqlitePool,
    distance_id: i64,
    chat_id: ChatId,
) -> Result<RouteAnalysis, GpxError> {
    let distance = TrainingDistance::find_by_id(pool, distance_id)
        .await?
        .ok_or(GpxError::MissingRoute)?;
    let file_id = distance.route_gpx.clone().ok_or(GpxError::MissingRoute)?;
    let label = format_km(distance.distance);

    let mut progress = ProgressTracker::new(CommandFeedback::new(bot.clone(), chat_id), 3);
    let _ = progress.advance(&format!("Завантажую маршрут {label} км")).await;

    let bytes = match download(bot, file_id).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = progress.finish(FeedbackType::Error, &failure_text(&label, &e)).await;
            return Err(e);
        }
    };

    let _ = progress.advance(&format!("Аналізую маршрут {label} км")).await;
    let analysis = match analyze(bytes.as_slice()) {
        Ok(analysis) => analysis,
        Err(e) => {
            let _ = progress.finish(FeedbackType::Error, &failure_text(&label, &e)).await;
            return Err(e);
        }
    };
    TrainingDistance::set_route_result(pool, distance_id, round1(analysis.total_km), &analysis.markers_json())
        .await?;

    let _ = progress.advance("Будую карту маршруту").await;
    let svg = analysis.render_svg(&format!("Маршрут {label} км"));
    let document = InputFile::memory(svg.into_bytes()).file_name(format!("route_{label}km.svg"));
    if let Err(e) = bot
        .send_document(chat_id, document)
        .caption(format!("🗺 Маршрут {label} км: {:.2} км", analysis.total_km))
        .await
    {
        error!("Failed to send route map for distance {}: {}", distance_id, e);
    }
    let _ = progress
        .finish(FeedbackType::Success, &format!("Маршрут {label} км оброблено"))
        .await;

    info!(
        "Route for distance {} analysed: {:.2} km, {} markers",
        distance_id,
        analysis.total_km,
        analysis.markers.len()
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <rte>
    <rtept lat="50.4501" lon="30.5234"></rtept>
    <rtept lat="50.4600" lon="30.5234"></rtept>
  </rte>
</gpx>"#;

    #[test]
    fn test_failure_text_names_the_stage() {
        let download = failure_text("5", &GpxError::Download("timeout".into()));
        assert!(download.starts_with("Не вдалося завантажити маршрут 5 км"));
        assert_eq!(failure_text("10", &GpxError::NoPoints), "Не вдалося обробити GPX для 10 км");
    }

    #[test]
    fn test_route_points_fallback() {
        let points = parse_points(SAMPLE.as_bytes()).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[0].y() - 50.4501).abs() < 1e-9);
    }

    #[test]
    fn test_empty_gpx_is_an_error() {
        let empty = r#"<?xml version="1.0"?><gpx version="1.1" creator="t" xmlns="http://www.topografix.com/GPX/1/1"></gpx>"#;
        assert!(matches!(parse_points(empty.as_bytes()), Err(GpxError::NoPoints)));
    }

    #[test]
    fn test_markers_along_meridian() {
        // Roughly 3.34 km due north.
        let points = vec![Point::new(30.5234, 50.4501), Point::new(30.5234, 50.4801)];
        let analysis = analyze_points(points, 1.0).unwrap();
        assert_eq!(analysis.markers.len(), analysis.total_km.floor() as usize + 2);
        assert_eq!(analysis.markers[0].km, 0.0);
        assert_eq!(analysis.markers[1].km, 1.0);
        let last = analysis.markers.last().unwrap();
        assert_eq!(last.km, round1(analysis.total_km));
        assert!(analysis.markers[1].lat > 50.4501 && analysis.markers[1].lat < 50.4801);
    }

    #[test]
    fn test_svg_contains_track_and_labels() {
        let points = vec![Point::new(30.5234, 50.4501), Point::new(30.5234, 50.4801)];
        let svg = analyze_points(points, 1.0).unwrap().render_svg("Маршрут 3 км");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("Старт"));
        assert!(svg.contains("Фініш"));
        assert!(svg.contains("1 км"));
    }
}
