//! HTTP front end.

use std::{fmt::Write as _, sync::Arc};

use axum::{
    extract::{rejection::FormRejection, Form, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_derive::Deserialize;
use serde_json::json;

use crate::assemble::land_data_table;
use crate::error::{InputError, MapError};
use crate::geography::District;
use crate::jobs::{JobKey, MapGenerationManager};
use crate::render::palette::PALETTES;

pub type AppState = Arc<MapGenerationManager>;

pub fn router(manager: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/districts", get(districts))
        .route("/generate_map", post(generate_map))
        .route("/map_status", get(map_status))
        .route("/map", get(map))
        .route("/land_data", get(land_data))
        .route("/municipalities/search", get(search_municipality))
        .with_state(manager)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(InputError),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::BadRequest(err)
    }
}

impl From<MapError> for ApiError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::UnknownDistrict(code) => ApiError::NotFound(format!("unknown district {code}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// The three request fields identifying a map, all kept as raw text so that
/// validation errors name the offending field.
#[derive(Debug, Default, Deserialize)]
pub struct JobParams {
    district: Option<String>,
    num_classes: Option<String>,
    color_palette: Option<String>,
}

impl JobParams {
    /// Fields from `other` take precedence.
    fn or(self, other: JobParams) -> JobParams {
        JobParams {
            district: other.district.or(self.district),
            num_classes: other.num_classes.or(self.num_classes),
            color_palette: other.color_palette.or(self.color_palette),
        }
    }

    fn job_key(&self) -> Result<JobKey, InputError> {
        let district = self.district.as_deref().ok_or(InputError::Missing("district"))?;
        let num_classes = self
            .num_classes
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(InputError::Missing("num_classes"))?;
        let num_classes = num_classes.parse::<i64>().map_err(|_| InputError::NotANumber {
            param: "num_classes",
            value: num_classes.to_owned(),
        })?;
        let palette = self.color_palette.as_deref().ok_or(InputError::Missing("color_palette"))?;
        JobKey::new(district, num_classes, palette)
    }
}

/// POST /generate_map
async fn generate_map(
    State(manager): State<AppState>,
    Query(query): Query<JobParams>,
    form: Result<Form<JobParams>, FormRejection>,
) -> ApiResult<Response> {
    let params = match form {
        Ok(Form(form)) => query.or(form),
        Err(_) => query,
    };
    let key = params.job_key()?;

    if manager.generate(key.clone()) {
        tracing::info!("{key}: Accepted");
        Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response())
    } else {
        Ok((StatusCode::CONFLICT, Json(json!({ "status": "already processing" }))).into_response())
    }
}

/// GET /map_status
async fn map_status(
    State(manager): State<AppState>,
    Query(params): Query<JobParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let key = params.job_key()?;
    let status = manager.status(&key);
    Ok(Json(json!({ "status": status.to_string() })))
}

/// GET /map
async fn map(
    State(manager): State<AppState>,
    Query(params): Query<JobParams>,
) -> ApiResult<Response> {
    let key = params.job_key()?;
    let path = manager.generator().artifact_path(&key);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(format!("no map generated for {key}")))
        }
        Err(err) => Err(ApiError::Internal(format!("reading {}: {err}", path.display()))),
    }
}

/// GET /districts
async fn districts(State(manager): State<AppState>) -> Json<Vec<District>> {
    Json(manager.generator().boundaries().districts())
}

#[derive(Debug, Deserialize)]
struct DistrictParam {
    district: Option<String>,
}

/// GET /land_data
async fn land_data(
    State(manager): State<AppState>,
    Query(param): Query<DistrictParam>,
) -> ApiResult<Html<String>> {
    let district = param.district.ok_or(InputError::Missing("district"))?;
    let generator = manager.generator();
    let table = land_data_table(&district, generator.boundaries(), generator.statistics()).await?;

    let mut html = String::new();
    let _ = write!(
        html,
        "<h2>{} ({}) &ndash; {}</h2><table class=\"land-data\"><thead><tr><th>Code</th><th>Name</th>",
        escape(&table.district.name),
        escape(&table.district.code),
        escape(&table.year),
    );
    for (_, header) in &table.columns {
        let _ = write!(html, "<th>{}</th>", escape(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        let _ = write!(html, "<tr><td>{}</td><td>{}</td>", escape(&row.code), escape(&row.name));
        for value in &row.values {
            match value {
                Some(value) => { let _ = write!(html, "<td>{value:.2}</td>"); }
                None => html.push_str("<td></td>"),
            }
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    Ok(Html(html))
}

#[derive(Debug, Deserialize)]
struct SearchParam {
    name: Option<String>,
}

/// GET /municipalities/search
async fn search_municipality(
    State(manager): State<AppState>,
    Query(param): Query<SearchParam>,
) -> ApiResult<Json<serde_json::Value>> {
    let name = param
        .name
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .ok_or(InputError::Missing("name"))?;

    let names = [name];
    let codes = manager
        .generator()
        .statistics()
        .municipality_codes(&names)
        .await
        .map_err(MapError::from)?;
    let [name] = names;
    match codes.get(&name) {
        Some(code) => Ok(Json(json!({ "name": name, "code": code }))),
        None => Err(ApiError::NotFound(format!("no municipality matches {name:?}"))),
    }
}

/// GET /
async fn index(State(manager): State<AppState>) -> Html<String> {
    let mut districts = String::new();
    for district in manager.generator().boundaries().districts() {
        let _ = write!(
            districts,
            "<option value=\"{}\">{} ({})</option>",
            escape(&district.code),
            escape(&district.name),
            escape(&district.code),
        );
    }
    let mut palettes = String::new();
    for palette in PALETTES {
        let _ = write!(palettes, "<option>{}</option>", palette.name);
    }
    Html(INDEX_PAGE.replace("{districts}", &districts).replace("{palettes}", &palettes))
}

const INDEX_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Agricultural land maps</title></head>
<body>
<h1>Agricultural land share by municipality</h1>
<form id="params">
  <select name="district">{districts}</select>
  <input name="num_classes" type="number" min="1" value="5">
  <select name="color_palette">{palettes}</select>
  <button type="submit">Generate</button>
</form>
<p id="status"></p>
<img id="map" alt="">
<div id="land-data"></div>
<script>
const form = document.getElementById('params');
const status = document.getElementById('status');
form.addEventListener('submit', async (event) => {
  event.preventDefault();
  const params = new URLSearchParams(new FormData(form));
  const response = await fetch('/generate_map', { method: 'POST', body: params });
  const body = await response.json();
  status.textContent = body.status || body.error;
  if (response.ok || response.status === 409) poll(params);
});
async function poll(params) {
  const response = await fetch('/map_status?' + params);
  const body = await response.json();
  status.textContent = body.status || body.error;
  if (body.status === 'Processing') {
    setTimeout(() => poll(params), 1000);
  } else if (body.status === 'Completed') {
    document.getElementById('map').src = '/map?' + params + '&t=' + Date.now();
    const table = await fetch('/land_data?district=' + encodeURIComponent(params.get('district')));
    document.getElementById('land-data').innerHTML = await table.text();
  }
}
</script>
</body>
</html>
"#;

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(district: Option<&str>, classes: Option<&str>, palette: Option<&str>) -> JobParams {
        JobParams {
            district: district.map(str::to_owned),
            num_classes: classes.map(str::to_owned),
            color_palette: palette.map(str::to_owned),
        }
    }

    #[test]
    fn job_key_from_request_fields() {
        let key = params(Some("SK0101"), Some(" 5 "), Some("Greens")).job_key().unwrap();
        assert_eq!(key.file_name(), "map_SK0101_5_Greens.png");
    }

    #[test]
    fn request_field_errors_name_the_field() {
        assert_eq!(
            params(None, Some("5"), Some("viridis")).job_key().unwrap_err(),
            InputError::Missing("district")
        );
        assert_eq!(
            params(Some("SK0101"), Some(""), Some("viridis")).job_key().unwrap_err(),
            InputError::Missing("num_classes")
        );
        assert_eq!(
            params(Some("SK0101"), Some("five"), Some("viridis")).job_key().unwrap_err(),
            InputError::NotANumber { param: "num_classes", value: "five".to_owned() }
        );
        assert_eq!(
            params(Some("SK0101"), Some("5"), None).job_key().unwrap_err(),
            InputError::Missing("color_palette")
        );
    }

    #[test]
    fn form_fields_override_query_fields() {
        let merged = params(Some("SK0101"), Some("3"), None).or(params(None, Some("7"), Some("magma")));
        assert_eq!(merged.job_key().unwrap().file_name(), "map_SK0101_7_magma.png");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>\"Pezinok\" & 'Modra'</b>"), "&lt;b&gt;&quot;Pezinok&quot; &amp; &#39;Modra&#39;&lt;/b&gt;");
    }
}
