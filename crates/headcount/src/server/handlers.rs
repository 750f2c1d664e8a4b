//! Route handlers.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    Json,
};
use headcount_core::{CrowdLevel, Telemetry};
use serde::Serialize;
use serde_json::json;

use super::error::ApiError;
use super::AppState;

const IMAGE_FIELD: &str = "image";
const NO_IMAGE: &str = "No image field named 'image' in form-data";

/// Successful `update-bus` response.
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub status: &'static str,
    pub people_count: u32,
    pub crowd_level: CrowdLevel,
}

/// `POST /api/update-bus`: estimate the crowd in the uploaded photo and merge
/// it, with the telemetry headers, into the bus record.
pub async fn update_bus(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let telemetry = telemetry_from_headers(&headers)?;
    let multipart = multipart.map_err(|e| {
        tracing::debug!("Not a multipart body: {}", e.body_text());
        ApiError::BadUpload(NO_IMAGE.to_string())
    })?;
    let image = read_image(multipart).await?;

    tracing::info!(
        subject = %telemetry.subject_id,
        speed = telemetry.speed,
        bytes = image.len(),
        "Image received"
    );

    let estimation = state.headcount.submit(&telemetry, &image).await;

    Ok(Json(UpdateResponse {
        status: "success",
        people_count: estimation.estimate.count,
        crowd_level: estimation.estimate.level,
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": headcount_core::VERSION,
        "persistence": state.headcount.has_sink(),
    }))
}

/// `GET /`: the frontend's index page when a build is present.
pub async fn index(State(state): State<AppState>) -> Response {
    let index = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => Json(json!({
            "message": "Headcount backend running. Frontend build not found."
        }))
        .into_response(),
    }
}

fn telemetry_from_headers(headers: &HeaderMap) -> Result<Telemetry, ApiError> {
    let subject_id = header_str(headers, "bus-id")?.trim().to_string();
    if subject_id.is_empty() {
        return Err(ApiError::InvalidHeader(
            "Header bus-id must not be empty".to_string(),
        ));
    }

    Ok(Telemetry {
        subject_id,
        lat: header_f64(headers, "bus-lat")?,
        lng: header_f64(headers, "bus-lng")?,
        speed: header_f64(headers, "bus-speed")?,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    let value = headers
        .get(name)
        .ok_or_else(|| ApiError::InvalidHeader(format!("Missing header: {name}")))?;
    value
        .to_str()
        .map_err(|_| ApiError::InvalidHeader(format!("Header {name} is not valid text")))
}

fn header_f64(headers: &HeaderMap, name: &str) -> Result<f64, ApiError> {
    header_str(headers, name)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::InvalidHeader(format!("Header {name} must be a number")))
}

/// First `image` field of the form; other fields are skipped.
async fn read_image(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::BadUpload("Empty image data".to_string()));
        }
        return Ok(data);
    }
    Err(ApiError::BadUpload(NO_IMAGE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_telemetry_from_headers() {
        let telemetry = telemetry_from_headers(&headers(&[
            ("bus-id", "NB-1234"),
            ("bus-lat", "6.9271"),
            ("bus-lng", " 79.8612 "),
            ("bus-speed", "0"),
        ]))
        .unwrap();
        assert_eq!(telemetry.subject_id, "NB-1234");
        assert_eq!(telemetry.lat, 6.9271);
        assert_eq!(telemetry.lng, 79.8612);
        assert_eq!(telemetry.speed, 0.0);
    }

    #[test]
    fn test_missing_header_names_it() {
        let err = telemetry_from_headers(&headers(&[
            ("bus-id", "NB-1234"),
            ("bus-lat", "6.9"),
            ("bus-speed", "10"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing header: bus-lng");
    }

    #[test]
    fn test_non_numeric_header_is_rejected() {
        for bad in ["north", "NaN", "inf", ""] {
            let mut map = headers(&[("bus-id", "b"), ("bus-lat", "1"), ("bus-lng", "2")]);
            map.insert("bus-speed", HeaderValue::from_str(bad).unwrap());
            assert!(
                matches!(telemetry_from_headers(&map), Err(ApiError::InvalidHeader(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_blank_bus_id_is_rejected() {
        let err = telemetry_from_headers(&headers(&[
            ("bus-id", "  "),
            ("bus-lat", "1"),
            ("bus-lng", "2"),
            ("bus-speed", "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidHeader(_)));
    }
}
