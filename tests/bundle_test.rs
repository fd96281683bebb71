// SPDX-License-Identifier: Apache-2.0

//! Loading a task bundle and running the full pipeline on it.

use std::io::Write;

use pretty_assertions::assert_eq;

use gridsynth::bundle::{load_task, TaskSpec};
use gridsynth::compose::{compose_pieces, ComposeOptions, IdentityFill};
use gridsynth::evaluate::{evaluate, select_answers};
use gridsynth::pieces::build_pieces;

fn bundle_json() -> String {
    // Two training pairs plus a test slot; each graph holds a single given
    // piece node whose grid equals the training outputs.
    let node = r#"{"grid": {"rows": [[0, 0], [0, 0]]}, "depth": 0, "is_piece": true}"#;
    let graph = format!(r#"{{"givens": 1, "nodes": [{node}], "edges": []}}"#);
    let pair = r#"{"input": {"rows": [[1, 1], [1, 1]]}, "output": {"rows": [[0, 0], [0, 0]]}}"#;
    format!(
        r#"{{
            "graphs": [{graph}, {graph}, {graph}],
            "train": [{pair}, {pair}],
            "out_sizes": [[2, 2], [2, 2], [2, 2]],
            "costs": [1]
        }}"#
    )
}

#[test]
fn bundle_runs_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();
    let spec: TaskSpec = serde_json::from_str(&bundle_json()).unwrap();
    let task = spec.into_task().unwrap();
    assert_eq!(task.graphs.len(), 3);
    assert_eq!(task.train.len(), 2);

    let expected = task.train[0].1.clone();
    let set = build_pieces(task.graphs, &task.costs);
    assert_eq!(set.pieces.len(), 1);

    let cands = compose_pieces(
        &set,
        &task.train,
        &task.out_sizes,
        &IdentityFill,
        &ComposeOptions::default(),
    );
    let scored = evaluate(&cands, &task.train);
    let answers = select_answers(&scored, 3);
    assert!(!answers.is_empty());
    assert_eq!(answers[0].imgs[answers[0].imgs.len() - 1], expected);
}

#[test]
fn load_task_reads_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bundle_json().as_bytes()).unwrap();
    let task = load_task(file.path()).unwrap();
    assert_eq!(task.graphs.len(), 3);
    assert_eq!(task.out_sizes.len(), 3);
    assert_eq!(task.costs.cost(0), 1);
}

#[test]
fn missing_test_graph_is_rejected() {
    let mut spec: TaskSpec = serde_json::from_str(&bundle_json()).unwrap();
    spec.graphs.pop();
    spec.out_sizes.pop();
    assert!(spec.into_task().is_err());
}

#[test]
fn givens_exceeding_a_sibling_graph_are_rejected() {
    // Expansion is seeded with graph 0's givens replicated into every graph,
    // so a smaller sibling graph must fail at load time, not during search.
    let mut spec: TaskSpec = serde_json::from_str(&bundle_json()).unwrap();
    let extra = spec.graphs[0].nodes[0].clone();
    spec.graphs[0].nodes.push(extra);
    spec.graphs[0].givens = 2;
    assert!(spec.into_task().is_err());
}

#[test]
fn dangling_edge_is_rejected() {
    let json = bundle_json().replace(r#""edges": []"#, r#""edges": [{"from": 0, "fi": 0, "to": 7}]"#);
    let spec: TaskSpec = serde_json::from_str(&json).unwrap();
    assert!(spec.into_task().is_err());
}
