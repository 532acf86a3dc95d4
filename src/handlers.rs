use crate::comparison::ComparisonEntity;
use crate::errors::AppError;
use crate::models::{
    ComparisonSeries, MovementResponse, OccupancyReport, SitesResponse, StationOptionsResponse,
    UploadAccepted, UploadBatch,
};
use crate::movements::{movement_series, MovementRow};
use crate::rows::MonthTag;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Local};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    pub site: Option<String>,
    pub year: Option<i32>,
    pub selection: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    pub site: Option<String>,
    pub year: Option<i32>,
    pub select: Option<String>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub site: Option<String>,
    pub typ: Option<String>,
    pub year: Option<i32>,
}

pub async fn get_sites(State(state): State<AppState>) -> Json<SitesResponse> {
    let uploads = state.uploads.lock().await;
    let sites: BTreeSet<String> = uploads
        .iter()
        .flat_map(|batch| batch.locations_data.keys())
        .map(|site| site.trim().to_string())
        .filter(|site| !site.is_empty())
        .collect();
    Json(SitesResponse {
        sites: sites.into_iter().collect(),
    })
}

pub async fn get_stations(
    State(state): State<AppState>,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<StationOptionsResponse>, AppError> {
    let site = required(query.site, "site")?;
    let year = query.year.unwrap_or_else(current_year);

    let uploads = state.uploads.lock().await;
    let report = state.session.aggregator().aggregate(&site, year, &uploads);
    let names: Vec<&str> = report
        .stations
        .iter()
        .map(|s| s.station_name.as_str())
        .collect();

    Ok(Json(StationOptionsResponse {
        options: state.session.groups.station_options(&names),
        site,
    }))
}

pub async fn get_occupancy(
    State(state): State<AppState>,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<OccupancyReport>, AppError> {
    let site = required(query.site, "site")?;
    let year = query.year.unwrap_or_else(current_year);

    let uploads = state.uploads.lock().await;
    let aggregator = state.session.aggregator();
    let report = match query.selection.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => {
            aggregator.aggregate_selection(&site, year, token, &uploads)
        }
        _ => aggregator.aggregate(&site, year, &uploads),
    };
    Ok(Json(report))
}

pub async fn get_comparison(
    State(state): State<AppState>,
    Query(query): Query<ComparisonQuery>,
) -> Result<Json<Vec<ComparisonSeries>>, AppError> {
    let site = required(query.site, "site")?;
    let year = query.year.unwrap_or_else(current_year);
    let select = required(query.select, "select")?;
    let tokens: Vec<&str> = select
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(AppError::bad_request("select must name at least one station or group"));
    }

    let uploads = state.uploads.lock().await;
    let aggregator = state.session.aggregator();
    let selection: Vec<ComparisonEntity> = tokens
        .iter()
        .take(state.comparison.selection_limit())
        .map(|token| {
            let report = aggregator.aggregate_selection(&site, year, token, &uploads);
            ComparisonEntity::from_site_months(*token, *token, &report.months)
        })
        .collect();

    let series = if query.all {
        let report = aggregator.aggregate(&site, year, &uploads);
        let all = ComparisonEntity::from_site_months("all", "Alle Stationen", &report.months);
        state.comparison.build_with_all(&selection, &all)
    } else {
        state.comparison.build(&selection)
    };
    Ok(Json(series))
}

/// Pivot sheets hold the whole year, so only the latest upload carrying
/// values for the requested site and type is used.
pub async fn get_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
) -> Result<Json<MovementResponse>, AppError> {
    let site = required(query.site, "site")?;
    let typ = required(query.typ, "typ")?;
    let this_year = current_year();

    let uploads = state.uploads.lock().await;
    let latest = uploads
        .iter()
        .rev()
        .filter(|batch| match (query.year, MonthTag::parse(&batch.month)) {
            (Some(year), Ok(tag)) => tag.year_or(this_year) == year,
            (Some(_), Err(_)) => false,
            (None, _) => true,
        })
        .map(|batch| movement_series(&movement_rows(batch), &site, &typ))
        .find(|months| months.iter().any(Option::is_some))
        .unwrap_or([None; 12]);

    let months = latest.to_vec();
    Ok(Json(MovementResponse { site, typ, months }))
}

pub async fn post_upload(
    State(state): State<AppState>,
    Json(batch): Json<UploadBatch>,
) -> Result<(StatusCode, Json<UploadAccepted>), AppError> {
    let tag = MonthTag::parse(&batch.month)?;
    let year = tag.year_or(current_year());

    let mut uploads = state.uploads.lock().await;
    uploads.push(batch);
    info!(month = tag.month, year, batches = uploads.len(), "upload batch accepted");

    Ok((
        StatusCode::CREATED,
        Json(UploadAccepted {
            month: tag.month,
            year,
            batches: uploads.len(),
        }),
    ))
}

fn movement_rows(batch: &UploadBatch) -> Vec<MovementRow> {
    batch
        .locations_data
        .values()
        .flatten()
        .flat_map(|file| file.data.iter())
        .filter_map(MovementRow::from_raw)
        .collect()
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("missing query parameter '{name}'")))
}

fn current_year() -> i32 {
    Local::now().year()
}
