use butterfly_partition::formats::{self, CellsBinFile, GraphTextFile, MlpFile, OutputOptions};
use butterfly_partition::validate;
use butterfly_partition::{
    Edge, InertialFlowParams, MultilevelPartitioner, Node, PartitionConfig, RoadGraph,
};

/// Road-like grid: undirected streets, every fifth row one-way eastbound,
/// mildly varying weights
fn city_grid(width: u32, height: u32) -> RoadGraph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let id = y * width + x;
            nodes.push(Node::new(id, 51.0 + y as f64 * 0.002, 3.7 + x as f64 * 0.003));
            if x + 1 < width {
                let one_way = y % 5 == 0;
                edges.push(Edge::new(id, id + 1, 10.0 + (x % 3) as f64, one_way));
            }
            if y + 1 < height {
                edges.push(Edge::new(id, id + width, 12.5, false));
            }
        }
    }
    RoadGraph::new(nodes, edges).expect("valid grid")
}

fn seeded_config(sizes: &[usize]) -> PartitionConfig {
    PartitionConfig {
        name: "grid".to_string(),
        cell_sizes: sizes.to_vec(),
        inertial_flow: InertialFlowParams {
            seed: Some(2024),
            random_lines: 2,
            ..InertialFlowParams::default()
        },
        ..PartitionConfig::default()
    }
}

#[test]
fn test_full_pipeline_from_text_graph() {
    let dir = tempfile::tempdir().unwrap();
    let graph_path = dir.path().join("grid.graph.txt");
    GraphTextFile::write(&graph_path, &city_grid(30, 30)).unwrap();

    let graph = GraphTextFile::read(&graph_path).unwrap();
    assert_eq!(graph.node_count(), 900);

    let config = seeded_config(&[16, 64, 256]);
    let hierarchy = MultilevelPartitioner::new(&graph, config.clone())
        .unwrap()
        .run()
        .unwrap();

    let report = validate::validate_hierarchy(&hierarchy).unwrap();
    assert_eq!(report.levels, 3);
    for (k, &bound) in config.cell_sizes.iter().enumerate() {
        assert!(report.largest_cells[k] <= bound, "level {} over bound", k);
    }

    let outdir = dir.path().join("out");
    let inputs_sha = formats::file_sha256(&graph_path).unwrap();
    let written = formats::write_outputs(
        &outdir,
        &graph,
        &hierarchy,
        &OutputOptions {
            name: config.name.clone(),
            inputs_sha: Some(inputs_sha),
            diagnostics: true,
            sample_fraction: config.sample_fraction,
            seed: Some(1),
        },
    )
    .unwrap();
    assert_eq!(written.len(), 3 + 2 + 1 + 3);

    // level files and descriptor agree with each other
    let level_files: Vec<_> = (0..3)
        .map(|k| outdir.join(formats::level_file_name("grid", k)))
        .collect();
    let file_report = validate::validate_files(&outdir.join("grid.mlp"), &level_files).unwrap();
    assert_eq!(file_report.level_files_checked, 3);
    assert_eq!(file_report.cell_counts, hierarchy.cell_counts());

    let mlp = MlpFile::read(outdir.join("grid.mlp")).unwrap();
    let bin = CellsBinFile::read(outdir.join("grid.cells.bin")).unwrap();
    assert_eq!(bin.addresses, mlp.addresses);
    assert_eq!(bin.inputs_sha, inputs_sha);
    assert_eq!(bin.n_nodes, 900);

    let cut_json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(outdir.join("grid.cut_edges.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        cut_json.as_array().map(|a| a.len()),
        Some(hierarchy.cut_edges.len())
    );
}

#[test]
fn test_every_node_decodes_at_every_level() {
    let graph = city_grid(25, 20);
    let hierarchy = MultilevelPartitioner::new(&graph, seeded_config(&[10, 50, 200]))
        .unwrap()
        .run()
        .unwrap();

    for node in 0..graph.node_count() as u32 {
        for k in 0..hierarchy.level_count() {
            assert_eq!(
                hierarchy.cell_id(node, k),
                hierarchy.levels[k].cell_of[node as usize]
            );
        }
    }
}

#[test]
fn test_levels_refine_each_other() {
    let graph = city_grid(20, 20);
    let hierarchy = MultilevelPartitioner::new(&graph, seeded_config(&[8, 32, 128]))
        .unwrap()
        .run()
        .unwrap();

    for k in 0..hierarchy.level_count() - 1 {
        let finer = &hierarchy.levels[k];
        let coarser = &hierarchy.levels[k + 1];
        for cell in &finer.cells {
            let parent = coarser.cell_of[cell[0] as usize];
            for &v in cell {
                assert_eq!(coarser.cell_of[v as usize], parent);
            }
        }
    }

    let stats = hierarchy.overlay_stats(&graph);
    assert_eq!(stats.overlay_edges + stats.inner_edges, graph.edge_count());
    // boundaries can only shrink going up
    assert!(stats.boundary_edges[0] >= stats.boundary_edges[1]);
    assert!(stats.boundary_edges[1] >= stats.boundary_edges[2]);
    assert_eq!(stats.boundary_edges[0], hierarchy.cut_edges.len());
}

#[test]
fn test_scc_prepartition_with_dedicated_pool() {
    let base = city_grid(16, 16);
    let mut nodes = base.nodes().to_vec();
    let mut edges = base.edges().to_vec();
    // dead-end feeder roads: reachable nowhere from the grid
    for i in 0..5u32 {
        let id = 256 + i;
        nodes.push(Node::new(id, 50.9, 3.7 + i as f64 * 0.003));
        edges.push(Edge::new(id, i, 5.0, true));
    }
    let graph = RoadGraph::new(nodes, edges).unwrap();

    let config = PartitionConfig {
        scc_threshold: Some(4),
        threads: Some(2),
        ..seeded_config(&[12, 60])
    };
    let hierarchy = MultilevelPartitioner::new(&graph, config)
        .unwrap()
        .run()
        .unwrap();

    validate::validate_hierarchy(&hierarchy).unwrap();
    let coarse = &hierarchy.levels[1];
    for feeder in 256..261u32 {
        let cell = coarse.cell_of[feeder as usize] as usize;
        assert_eq!(coarse.cells[cell], vec![feeder]);
    }
}
