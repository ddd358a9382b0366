//! Property tests for the selection tree
//!
//! Random project layouts (some files ignored by the default `*.log` rule)
//! are driven through random toggle and set-all sequences. After every step
//! each directory must agree with its eligible children, and set-all must be
//! idempotent.
//!
//! `PROPTEST_CASES` overrides the number of cases (default: 32).

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use proptest::prelude::*;
use tempfile::TempDir;

use repopacker::{
    Config, FileSystemScanner, IgnoreFilter, NameOrder, NodeId, Selection, SelectionTree,
};

const DEFAULT_PROPTEST_CASES: u32 = 32;

fn proptest_config() -> ProptestConfig {
    let cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);
    ProptestConfig::with_cases(cases)
}

#[derive(Debug, Clone)]
enum Op {
    Toggle(usize),
    SelectAll(usize),
    ClearAll(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(Op::Toggle),
        1 => any::<usize>().prop_map(Op::SelectAll),
        1 => any::<usize>().prop_map(Op::ClearAll),
    ]
}

/// (directory depth 0..3, file number, ignored by extension)
fn layout_strategy() -> impl Strategy<Value = Vec<(usize, u8, bool)>> {
    prop::collection::vec((0usize..3, 0u8..6, any::<bool>()), 1..12)
}

fn build_project(layout: &[(usize, u8, bool)]) -> TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    for (depth, number, ignored) in layout {
        let mut dir: PathBuf = temp_dir.path().to_path_buf();
        for level in 0..*depth {
            dir.push(format!("d{}", level + (*number as usize % 2)));
        }
        fs::create_dir_all(&dir).unwrap();
        let ext = if *ignored { "log" } else { "txt" };
        fs::write(dir.join(format!("f{}.{}", number, ext)), b"content").unwrap();
    }
    temp_dir
}

fn open_tree(temp_dir: &TempDir) -> SelectionTree {
    let root = fs::canonicalize(temp_dir.path()).unwrap();
    let config = Config {
        root: root.clone(),
        name_order: NameOrder::CaseSensitive,
        ..Config::default()
    };
    let filter = Arc::new(IgnoreFilter::from_config(&root, &config).unwrap());
    SelectionTree::open(&root, filter, FileSystemScanner::new(config.name_order)).unwrap()
}

fn pick(tree: &SelectionTree, index: usize) -> NodeId {
    let nodes = tree.walk();
    nodes[index % nodes.len()]
}

fn snapshot(tree: &SelectionTree) -> Vec<(NodeId, Selection)> {
    tree.walk()
        .into_iter()
        .map(|id| (id, tree.selection(id).unwrap()))
        .collect()
}

fn check_tri_state(tree: &SelectionTree) -> Result<(), TestCaseError> {
    for id in tree.walk() {
        let node = tree.node(id).unwrap();
        if !node.eligible {
            prop_assert_eq!(node.selection, Selection::Unselected);
            continue;
        }
        if node.is_file() {
            prop_assert_ne!(node.selection, Selection::Partial);
            continue;
        }

        let states: Vec<Selection> = node
            .children
            .iter()
            .map(|c| tree.node(*c).unwrap())
            .filter(|c| c.eligible)
            .map(|c| c.selection)
            .collect();
        let expected = if states.iter().all(|s| *s == Selection::Unselected) {
            Selection::Unselected
        } else if states.iter().all(|s| *s == Selection::Selected) {
            Selection::Selected
        } else {
            Selection::Partial
        };
        prop_assert_eq!(node.selection, expected, "at {}", node.relative_path.display());
    }
    Ok(())
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn prop_tri_state_holds_after_every_operation(
        layout in layout_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..24),
    ) {
        let temp_dir = build_project(&layout);
        let mut tree = open_tree(&temp_dir);

        for op in ops {
            match op {
                Op::Toggle(i) => {
                    let id = pick(&tree, i);
                    tree.toggle(id).unwrap();
                }
                Op::SelectAll(i) => {
                    let id = pick(&tree, i);
                    tree.set_all(id, Selection::Selected).unwrap();
                }
                Op::ClearAll(i) => {
                    let id = pick(&tree, i);
                    tree.set_all(id, Selection::Unselected).unwrap();
                }
            }
            check_tri_state(&tree)?;
        }
    }

    #[test]
    fn prop_set_all_is_idempotent(
        layout in layout_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..8),
        target in any::<usize>(),
        select in any::<bool>(),
    ) {
        let temp_dir = build_project(&layout);
        let mut tree = open_tree(&temp_dir);
        for op in ops {
            if let Op::Toggle(i) = op {
                let id = pick(&tree, i);
                tree.toggle(id).unwrap();
            }
        }

        let state = if select { Selection::Selected } else { Selection::Unselected };
        let id = pick(&tree, target);
        tree.set_all(id, state).unwrap();
        let once = snapshot(&tree);

        prop_assert!(!tree.set_all(id, state).unwrap());
        prop_assert_eq!(snapshot(&tree), once);
        check_tri_state(&tree)?;
    }

    #[test]
    fn prop_file_toggle_is_an_involution(
        layout in layout_strategy(),
        target in any::<usize>(),
    ) {
        let temp_dir = build_project(&layout);
        let mut tree = open_tree(&temp_dir);
        tree.load_all().unwrap();

        let files: Vec<NodeId> = tree
            .walk()
            .into_iter()
            .filter(|id| tree.node(*id).unwrap().is_file())
            .collect();
        prop_assume!(!files.is_empty());
        let file = files[target % files.len()];

        let before = snapshot(&tree);
        tree.toggle(file).unwrap();
        tree.toggle(file).unwrap();
        prop_assert_eq!(snapshot(&tree), before);
    }
}
