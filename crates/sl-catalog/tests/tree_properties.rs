//! Property tests for the tree model, operations and move validator

use proptest::prelude::*;
use proptest::sample::Index;
use proptest::test_runner::TestCaseError;
use sl_catalog::model::compare_names;
use sl_catalog::{tree, CatalogTree, MoveRejection, MoveValidator, NodeRef};
use sl_remote::{DirectoryId, DirectoryRecord, LayerId, LayerRecord};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Random forest: directory `i` hangs under home or an earlier directory,
/// layers sit in home or any directory.
fn forest() -> impl Strategy<Value = (Vec<DirectoryRecord>, Vec<LayerRecord>)> {
    (1usize..12)
        .prop_flat_map(|n| {
            let parents: Vec<BoxedStrategy<Option<usize>>> = (0..n)
                .map(|i| {
                    if i == 0 {
                        Just(None::<usize>).boxed()
                    } else {
                        proptest::option::of(0..i).boxed()
                    }
                })
                .collect();
            let names = proptest::collection::vec("[a-cA-C]{1,3}", n);
            let layers = proptest::collection::vec((proptest::option::of(0..n), "[a-c]{1,3}"), 0..8);
            (parents, names, layers)
        })
        .prop_map(|(parents, names, layers)| {
            let dir = |i: usize| DirectoryId::new(i as u64 + 1);
            let directories = parents
                .into_iter()
                .zip(names)
                .enumerate()
                .map(|(i, (parent, name))| DirectoryRecord::new(dir(i), name, parent.map(dir)))
                .collect();
            let layers = layers
                .into_iter()
                .enumerate()
                .map(|(i, (owner, name))| {
                    LayerRecord::new(LayerId::new(100 + i as u64), name, owner.map(dir))
                })
                .collect();
            (directories, layers)
        })
}

fn parents(tree: &CatalogTree) -> Vec<Option<DirectoryId>> {
    std::iter::once(None)
        .chain(tree.flatten().0.into_iter().map(|d| Some(d.id)))
        .collect()
}

fn in_order<T: Ord>(a: &(String, T), b: &(String, T)) -> bool {
    compare_names(&a.0, &b.0).then_with(|| a.1.cmp(&b.1)) == Ordering::Less
}

fn directories_sorted(tree: &CatalogTree, parent: Option<DirectoryId>) -> bool {
    let dirs: Vec<_> = tree
        .subdirectories(parent)
        .iter()
        .map(|d| (d.name().to_string(), d.id()))
        .collect();
    dirs.windows(2).all(|w| in_order(&w[0], &w[1]))
}

fn layers_sorted(tree: &CatalogTree, parent: Option<DirectoryId>) -> bool {
    let layers: Vec<_> = tree
        .layers_in(parent)
        .iter()
        .map(|l| (l.name().to_string(), l.id()))
        .collect();
    layers.windows(2).all(|w| in_order(&w[0], &w[1]))
}

/// One step of an edit session; indexes pick among the nodes present
#[derive(Debug, Clone)]
enum Op {
    Insert { parent: Option<Index>, name: String },
    Rename { dir: Index, name: String },
    Remove { dir: Index },
    MoveDirectory { dir: Index, target: Option<Index> },
    MoveLayer { layer: Index, target: Option<Index> },
}

fn op() -> impl Strategy<Value = Op> {
    let name = || "[a-cA-C\u{e9}]{1,3}";
    prop_oneof![
        3 => (proptest::option::of(any::<Index>()), name())
            .prop_map(|(parent, name)| Op::Insert { parent, name }),
        2 => (any::<Index>(), name()).prop_map(|(dir, name)| Op::Rename { dir, name }),
        1 => any::<Index>().prop_map(|dir| Op::Remove { dir }),
        3 => (any::<Index>(), proptest::option::of(any::<Index>()))
            .prop_map(|(dir, target)| Op::MoveDirectory { dir, target }),
        2 => (any::<Index>(), proptest::option::of(any::<Index>()))
            .prop_map(|(layer, target)| Op::MoveLayer { layer, target }),
    ]
}

/// Expected `(name, parent)` of every node, maintained independently of the tree
#[derive(Debug, Default)]
struct Expected {
    directories: BTreeMap<DirectoryId, (String, Option<DirectoryId>)>,
    layers: BTreeMap<LayerId, (String, Option<DirectoryId>)>,
}

impl Expected {
    fn from_records(directories: &[DirectoryRecord], layers: &[LayerRecord]) -> Self {
        Self {
            directories: directories.iter().map(|d| (d.id, (d.name.clone(), d.parent))).collect(),
            layers: layers.iter().map(|l| (l.id, (l.name.clone(), l.directory))).collect(),
        }
    }

    fn remove(&mut self, root: DirectoryId) {
        let mut gone = BTreeSet::from([root]);
        loop {
            let more: Vec<_> = self
                .directories
                .iter()
                .filter(|(id, entry)| !gone.contains(*id) && entry.1.is_some_and(|p| gone.contains(&p)))
                .map(|(id, _)| *id)
                .collect();
            if more.is_empty() {
                break;
            }
            gone.extend(more);
        }
        self.directories.retain(|id, _| !gone.contains(id));
        self.layers.retain(|_, entry| !entry.1.is_some_and(|d| gone.contains(&d)));
    }

    fn matches(&self, tree: &CatalogTree) -> Result<(), TestCaseError> {
        let (dirs, layers) = tree.flatten();
        let dirs: BTreeMap<_, _> = dirs.into_iter().map(|d| (d.id, (d.name, d.parent))).collect();
        let layers: BTreeMap<_, _> = layers.into_iter().map(|l| (l.id, (l.name, l.directory))).collect();
        prop_assert_eq!(&dirs, &self.directories);
        prop_assert_eq!(&layers, &self.layers);
        Ok(())
    }
}

type Relations = (
    BTreeSet<(DirectoryId, String, Option<DirectoryId>)>,
    BTreeSet<(LayerId, String, Option<DirectoryId>)>,
);

fn relations(tree: &CatalogTree) -> Relations {
    let (dirs, layers) = tree.flatten();
    (
        dirs.into_iter().map(|d| (d.id, d.name, d.parent)).collect(),
        layers.into_iter().map(|l| (l.id, l.name, l.directory)).collect(),
    )
}

proptest! {
    #[test]
    fn flatten_rebuild_round_trips((directories, layers) in forest()) {
        let tree = CatalogTree::from_records(directories.clone(), layers.clone()).unwrap();
        let flat = tree.flatten();

        let rebuilt = CatalogTree::from_records(flat.0.clone(), flat.1.clone()).unwrap();
        prop_assert_eq!(rebuilt.flatten(), flat.clone());

        // Record order does not matter
        let reversed = CatalogTree::from_records(
            directories.into_iter().rev(),
            layers.into_iter().rev(),
        )
        .unwrap();
        prop_assert_eq!(reversed.flatten(), flat);
    }

    #[test]
    fn siblings_are_sorted_by_name_then_id((directories, layers) in forest()) {
        let tree = CatalogTree::from_records(directories, layers).unwrap();
        for parent in parents(&tree) {
            prop_assert!(directories_sorted(&tree, parent));
            prop_assert!(layers_sorted(&tree, parent));
        }
    }

    #[test]
    fn edit_sessions_keep_relations_and_sibling_order(
        (directories, layers) in forest(),
        ops in proptest::collection::vec(op(), 1..24),
    ) {
        let mut tree = CatalogTree::from_records(directories.clone(), layers.clone()).unwrap();
        let mut expected = Expected::from_records(&directories, &layers);
        let mut next_id = 1000;

        for op in ops {
            let dirs: Vec<DirectoryId> = expected.directories.keys().copied().collect();
            let pick = |index: &Index| dirs[index.index(dirs.len())];
            match op {
                Op::Insert { parent, name } => {
                    let parent = parent.filter(|_| !dirs.is_empty()).map(|i| pick(&i));
                    let id = DirectoryId::new(next_id);
                    next_id += 1;
                    tree = tree::insert(&tree, id, name.clone(), parent).unwrap();
                    expected.directories.insert(id, (name, parent));
                    prop_assert!(directories_sorted(&tree, parent));
                }
                Op::Rename { dir, name } if !dirs.is_empty() => {
                    let id = pick(&dir);
                    tree = tree::rename(&tree, id, name.clone()).unwrap();
                    if let Some(entry) = expected.directories.get_mut(&id) {
                        entry.0 = name;
                    }
                }
                Op::Remove { dir } if !dirs.is_empty() => {
                    let id = pick(&dir);
                    tree = tree::remove(&tree, id).unwrap();
                    expected.remove(id);
                }
                Op::MoveDirectory { dir, target } if !dirs.is_empty() => {
                    let id = pick(&dir);
                    let target = target.map(|i| pick(&i));
                    if MoveValidator::check(&tree, NodeRef::Directory(id), target).is_ok() {
                        tree = tree::reparent(&tree, NodeRef::Directory(id), target).unwrap();
                        if let Some(entry) = expected.directories.get_mut(&id) {
                            entry.1 = target;
                        }
                        prop_assert!(directories_sorted(&tree, target));
                    }
                }
                Op::MoveLayer { layer, target } if !expected.layers.is_empty() => {
                    let ids: Vec<LayerId> = expected.layers.keys().copied().collect();
                    let id = ids[layer.index(ids.len())];
                    let target = target.filter(|_| !dirs.is_empty()).map(|i| pick(&i));
                    tree = tree::reparent(&tree, NodeRef::Layer(id), target).unwrap();
                    if let Some(entry) = expected.layers.get_mut(&id) {
                        entry.1 = target;
                    }
                    prop_assert!(layers_sorted(&tree, target));
                }
                _ => {}
            }

            expected.matches(&tree)?;
            let (flat_dirs, flat_layers) = tree.flatten();
            let rebuilt = CatalogTree::from_records(flat_dirs, flat_layers).unwrap();
            prop_assert_eq!(relations(&rebuilt), relations(&tree));
        }
    }

    #[test]
    fn validator_matches_descendant_relation((directories, layers) in forest()) {
        let tree = CatalogTree::from_records(directories.clone(), layers).unwrap();
        for moving in &directories {
            let below = tree::find_descendants(&tree, moving.id).unwrap();
            for target in &directories {
                let verdict = MoveValidator::check(&tree, NodeRef::Directory(moving.id), Some(target.id));
                if moving.id == target.id {
                    prop_assert_eq!(verdict, Err(MoveRejection::SelfParent(moving.id)));
                } else if below.contains(&NodeRef::Directory(target.id)) {
                    prop_assert_eq!(
                        verdict,
                        Err(MoveRejection::IntoOwnDescendant { moving: moving.id, target: target.id })
                    );
                } else {
                    prop_assert!(verdict.is_ok());
                    // An accepted move keeps the forest acyclic and the subtree intact
                    let moved = tree::reparent(&tree, NodeRef::Directory(moving.id), Some(target.id)).unwrap();
                    let (dirs, lays) = moved.flatten();
                    prop_assert_eq!(dirs.len(), tree.directory_count());
                    prop_assert!(CatalogTree::from_records(dirs, lays).is_ok());
                    prop_assert_eq!(tree::find_descendants(&moved, moving.id).unwrap(), below.clone());
                }
            }
        }
    }

    #[test]
    fn remove_drops_exactly_the_subtree((directories, layers) in forest(), pick in any::<prop::sample::Index>()) {
        let tree = CatalogTree::from_records(directories.clone(), layers).unwrap();
        let victim = directories[pick.index(directories.len())].id;
        let below = tree::find_descendants(&tree, victim).unwrap();

        let pruned = tree::remove(&tree, victim).unwrap();
        prop_assert!(!pruned.contains(NodeRef::Directory(victim)));
        for node in &below {
            prop_assert!(!pruned.contains(*node));
        }
        prop_assert_eq!(
            pruned.directory_count() + pruned.layer_count() + below.len() + 1,
            tree.directory_count() + tree.layer_count()
        );
    }
}
