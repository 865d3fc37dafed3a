//! Straight-line distances between node coordinates (measure `E`).

use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use super::DistanceMatrix;
use crate::model::bf16::f32_to_bf16;
use crate::model::property_map::numeric;
use crate::model::{NodeId, StreetGraph};
use crate::{Error, Result};

/// Mean Earth radius in meters (arXiv:1510.07674).
pub const AVG_EARTH_RADIUS_M: f64 = 6.3781e6;

/// Read two numeric node attributes for every node of `order`.
///
/// Fails on unknown nodes, missing attributes and non-numeric values.
pub fn coordinates(
    graph: &StreetGraph,
    order: &[NodeId],
    keys: (&str, &str),
) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut first = Vec::with_capacity(order.len());
    let mut second = Vec::with_capacity(order.len());
    for &id in order {
        let node = graph
            .node(id)
            .ok_or_else(|| Error::InvalidInput(format!("node {id} is not in the graph")))?;
        for (key, out) in [(keys.0, &mut first), (keys.1, &mut second)] {
            match numeric(&node.properties, key) {
                Ok(Some(v)) => out.push(v),
                Ok(None) => {
                    return Err(Error::InvalidInput(format!("node {id} has no `{key}` coordinate")));
                }
                Err(type_name) => {
                    return Err(Error::InvalidInput(format!(
                        "node {id} has non-numeric `{key}` coordinate ({type_name})",
                    )));
                }
            }
        }
    }
    Ok((first, second))
}

/// Pairwise Euclidean distances from projected `x`/`y` coordinates.
///
/// # Errors
///
/// - `NotProjected` if the graph carries no CRS or an angular one.
/// - `InvalidInput` if a coordinate is missing, non-numeric, NaN or infinite.
pub fn planar_distance_matrix(graph: &StreetGraph, node_order: &[NodeId]) -> Result<DistanceMatrix> {
    match graph.crs() {
        Some(crs) if crs.is_projected() => {}
        Some(crs) => return Err(Error::NotProjected(format!("CRS {} is angular", crs.name()))),
        None => return Err(Error::NotProjected("graph has no CRS metadata".into())),
    }

    let start = Instant::now();
    let (xs, ys) = coordinates(graph, node_order, ("x", "y"))?;
    if xs.iter().chain(&ys).any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput("graph has infinite or NaN coordinates".into()));
    }

    let n = node_order.len();
    let rows: Vec<Vec<u16>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    let d = (xs[i] - xs[j]).hypot(ys[i] - ys[j]);
                    f32_to_bf16(d as f32)
                })
                .collect()
        })
        .collect();

    debug!(nodes = n, elapsed = ?start.elapsed(), "planar distance matrix calculated");
    Ok(DistanceMatrix::from_bf16_rows(rows, n))
}

/// Pairwise great-circle distances (haversine) from `lat`/`lon` in degrees.
///
/// # Errors
///
/// `InvalidInput` if a coordinate is missing or non-numeric, a latitude is
/// outside `[-90, 90]` or a longitude outside `[-180, 180]`.
pub fn geographic_distance_matrix(graph: &StreetGraph, node_order: &[NodeId]) -> Result<DistanceMatrix> {
    let start = Instant::now();
    let (lat, lon) = coordinates(graph, node_order, ("lat", "lon"))?;
    if lat.iter().any(|v| !(-90.0..=90.0).contains(v)) {
        return Err(Error::InvalidInput("latitude values are not in the range [-90, 90]".into()));
    }
    if lon.iter().any(|v| !(-180.0..=180.0).contains(v)) {
        return Err(Error::InvalidInput("longitude values are not in the range [-180, 180]".into()));
    }

    let lat: Vec<f64> = lat.into_iter().map(f64::to_radians).collect();
    let lon: Vec<f64> = lon.into_iter().map(f64::to_radians).collect();
    let cos_lat: Vec<f64> = lat.iter().map(|v| v.cos()).collect();

    let n = node_order.len();
    let rows: Vec<Vec<u16>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    let d = haversine(lat[i], lon[i], lat[j], lon[j], cos_lat[i], cos_lat[j]);
                    f32_to_bf16(d as f32)
                })
                .collect()
        })
        .collect();

    debug!(
        nodes = n,
        elapsed = ?start.elapsed(),
        lat_span = span(&lat).to_degrees(),
        lon_span = span(&lon).to_degrees(),
        "geographic distance matrix calculated"
    );
    Ok(DistanceMatrix::from_bf16_rows(rows, n))
}

#[inline]
fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64, cos1: f64, cos2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let hav = (dlat / 2.0).sin().powi(2) + cos1 * cos2 * (dlon / 2.0).sin().powi(2);
    2.0 * AVG_EARTH_RADIUS_M * hav.clamp(0.0, 1.0).sqrt().asin()
}

fn span(values: &[f64]) -> f64 {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if values.is_empty() { 0.0 } else { max - min }
}
