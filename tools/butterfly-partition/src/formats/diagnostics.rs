//! Diagnostic JSON for map overlays: cut edges and sampled cell members

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{IoContext, Result};
use crate::graph::RoadGraph;
use crate::inertial_flow::CutEdge;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutEdgeCoords {
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSample {
    pub nodes: Vec<Coordinate>,
}

pub fn cut_edge_coords(graph: &RoadGraph, cut_edges: &[CutEdge]) -> Vec<CutEdgeCoords> {
    cut_edges
        .iter()
        .map(|e| {
            let from = graph.node(e.from);
            let to = graph.node(e.to);
            CutEdgeCoords {
                from_lat: from.lat,
                from_lon: from.lon,
                to_lat: to.lat,
                to_lon: to.lon,
            }
        })
        .collect()
}

/// A random `fraction` (rounded down) of every cell's node coordinates
pub fn sample_cells<R: Rng + ?Sized>(
    graph: &RoadGraph,
    cells: &[Vec<u32>],
    fraction: f64,
    rng: &mut R,
) -> Vec<CellSample> {
    cells
        .iter()
        .map(|cell| {
            let amount = (cell.len() as f64 * fraction) as usize;
            let nodes = cell
                .choose_multiple(rng, amount)
                .map(|&id| {
                    let node = graph.node(id);
                    Coordinate {
                        lat: node.lat,
                        lon: node.lon,
                    }
                })
                .collect();
            CellSample { nodes }
        })
        .collect()
}

pub fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path).with_path(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().with_path(path)?;
    Ok(())
}
