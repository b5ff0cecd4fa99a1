#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use symvm::config::{Config, InputSource};
use symvm::runtime::Runtime;
use symvm::solver::{Model, ScriptedSolver};

/// A runtime over a scripted solver, with test cases going to a fresh
/// temporary directory.
pub fn runtime_with(solver: ScriptedSolver) -> (Runtime<ScriptedSolver>, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = Config {
        output_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let runtime = Runtime::new(config, solver).expect("runtime setup");
    (runtime, dir)
}

pub fn runtime() -> (Runtime<ScriptedSolver>, TempDir) {
    runtime_with(ScriptedSolver::new())
}

/// A runtime configured for file input, seeded with the given bytes.
pub fn runtime_with_input_file(
    solver: ScriptedSolver,
    input: &[u8],
) -> (Runtime<ScriptedSolver>, TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let input_path = dir.path().join("input.dat");
    std::fs::write(&input_path, input).expect("write input file");

    let config = Config {
        output_dir: dir.path().to_path_buf(),
        input: InputSource::File(input_path.clone()),
        ..Config::default()
    };
    let runtime = Runtime::new(config, solver).expect("runtime setup");
    (runtime, dir, input_path)
}

pub fn model(pairs: &[(usize, u8)]) -> Model {
    pairs.iter().copied().collect()
}

/// The test cases emitted into the output directory, in emission order.
pub fn emitted_test_cases(dir: &TempDir) -> Vec<Vec<u8>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir.path())
        .expect("read output dir")
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
        })
        .collect();
    entries.sort();
    entries
        .into_iter()
        .map(|path| std::fs::read(path).expect("read test case"))
        .collect()
}
