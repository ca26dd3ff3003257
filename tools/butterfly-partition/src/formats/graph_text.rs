//! Plain text road graph (`.graph.txt`)
//!
//! ```text
//! # comment lines and blank lines are ignored
//! <n> <m>
//! <lat> <lon>                      (n lines, node id = line order)
//! <from> <to> <weight> <directed>  (m lines, directed is 0 or 1)
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{IoContext, PartitionError, Result};
use crate::graph::{Edge, Node, RoadGraph};

pub struct GraphTextFile;

impl GraphTextFile {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<RoadGraph> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path).with_path(path)?);
        let mut lines = reader.lines().enumerate().filter_map(|(i, line)| match line {
            Ok(text) => {
                let content = text.split('#').next().unwrap_or("").trim().to_string();
                (!content.is_empty()).then_some(Ok((i + 1, content)))
            }
            Err(e) => Some(Err(e)),
        });

        let mut next_line = |what: &str| -> Result<(usize, String)> {
            match lines.next() {
                Some(line) => line.with_path(path),
                None => Err(PartitionError::malformed(
                    path,
                    format!("unexpected end of file, expected {}", what),
                )),
            }
        };

        let (line_no, header) = next_line("header")?;
        let mut fields = header.split_whitespace();
        let n: usize = parse_field(path, line_no, fields.next(), "node count")?;
        let m: usize = parse_field(path, line_no, fields.next(), "edge count")?;

        let mut nodes = Vec::new();
        for id in 0..n {
            let (line_no, text) = next_line("node line")?;
            let mut fields = text.split_whitespace();
            let lat: f64 = parse_field(path, line_no, fields.next(), "lat")?;
            let lon: f64 = parse_field(path, line_no, fields.next(), "lon")?;
            nodes.push(Node::new(id as u32, lat, lon));
        }

        let mut edges = Vec::new();
        for _ in 0..m {
            let (line_no, text) = next_line("edge line")?;
            let mut fields = text.split_whitespace();
            let from: u32 = parse_field(path, line_no, fields.next(), "from")?;
            let to: u32 = parse_field(path, line_no, fields.next(), "to")?;
            let weight: f64 = parse_field(path, line_no, fields.next(), "weight")?;
            let directed = match fields.next() {
                Some("1") => true,
                Some("0") => false,
                other => {
                    return Err(PartitionError::malformed(
                        path,
                        format!("line {}: directed flag must be 0 or 1, got {:?}", line_no, other),
                    ))
                }
            };
            edges.push(Edge::new(from, to, weight, directed));
        }

        RoadGraph::new(nodes, edges)
    }

    pub fn write<P: AsRef<Path>>(path: P, graph: &RoadGraph) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path).with_path(path)?);

        writeln!(writer, "{} {}", graph.node_count(), graph.edge_count()).with_path(path)?;
        for node in graph.nodes() {
            writeln!(writer, "{} {}", node.lat, node.lon).with_path(path)?;
        }
        for edge in graph.edges() {
            writeln!(
                writer,
                "{} {} {} {}",
                edge.from,
                edge.to,
                edge.weight,
                u8::from(edge.directed)
            )
            .with_path(path)?;
        }
        writer.flush().with_path(path)?;
        Ok(())
    }
}

fn parse_field<T: FromStr>(path: &Path, line_no: usize, field: Option<&str>, what: &str) -> Result<T> {
    let field = field.ok_or_else(|| {
        PartitionError::malformed(path, format!("line {}: missing {}", line_no, what))
    })?;
    field.parse().map_err(|_| {
        PartitionError::malformed(path, format!("line {}: invalid {} '{}'", line_no, what, field))
    })
}
