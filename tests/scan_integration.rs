//! Integration tests for ignore matching, scanning and tree building.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use ctxpack::matcher::{compile, matches};
use ctxpack::tree::FileTree;
use ctxpack::{scan_directory, DirectoryScanner, Entry, FilterConfig, IgnoreMatcher};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small project with build output, dependencies and logs.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(
        root,
        ".gitignore",
        "# generated\nbuild/\nnode_modules\n*.log\nlogs/**\n.env\n!important/.env\n",
    );
    write(root, "src/main.rs", "fn main() {}\n");
    write(root, "src/lib.rs", "pub mod util;\n");
    write(root, "src/util/mod.rs", "pub fn helper() {}\n");
    write(root, "src/node_modules/foo.js", "module.exports = 1;\n");
    write(root, "build/out.o", "binary");
    write(root, "build.rs", "fn main() {}\n");
    write(root, "logs/2024/a.txt", "log line\n");
    write(root, "debug.log", "noise\n");
    write(root, ".env", "SECRET=1\n");
    write(root, "important/.env", "KEEP=1\n");
    write(root, "README.md", "# Project\n");
    tmp
}

fn relative_paths(entries: &[Entry]) -> BTreeSet<String> {
    entries.iter().map(|e| e.relative_path.clone()).collect()
}

#[test]
fn test_literal_pattern_matches_any_segment() {
    let rules = compile(["node_modules"]);
    assert!(matches(&rules[0], "src/node_modules/foo.js", false));
    assert!(matches(&rules[0], "node_modules", true));
    assert!(!matches(&rules[0], "src/node_modules_old/foo.js", false));
}

#[test]
fn test_directory_only_pattern_skips_files() {
    let rules = compile(["build/"]);
    assert!(!matches(&rules[0], "build", false));
    assert!(matches(&rules[0], "build", true));
}

#[test]
fn test_negation_overrides_earlier_rule() {
    let matcher = IgnoreMatcher::compile([".env", "!important/.env"]);
    assert!(!matcher.is_ignored("important/.env", false));
    assert!(matcher.is_ignored(".env", false));
}

#[test]
fn test_double_star_prefix() {
    let matcher = IgnoreMatcher::compile(["logs/**"]);
    assert!(matcher.is_ignored("logs", true));
    assert!(matcher.is_ignored("logs/2024/a.txt", false));
    assert!(!matcher.is_ignored("catalogs/a.txt", false));
}

#[test]
fn test_scan_honors_ignore_file() {
    let tmp = project();
    let entries = scan_directory(tmp.path(), &FilterConfig::new()).unwrap();
    let paths = relative_paths(&entries);

    for kept in [
        ".gitignore",
        "README.md",
        "build.rs",
        "important",
        "important/.env",
        "src",
        "src/lib.rs",
        "src/main.rs",
        "src/util",
        "src/util/mod.rs",
    ] {
        assert!(paths.contains(kept), "missing {kept}");
    }
    for dropped in [
        "build",
        "build/out.o",
        "src/node_modules",
        "src/node_modules/foo.js",
        "logs",
        "logs/2024/a.txt",
        "debug.log",
        ".env",
    ] {
        assert!(!paths.contains(dropped), "unexpected {dropped}");
    }
}

#[test]
fn test_scan_without_ignore_file_sees_everything() {
    let tmp = project();
    let filters = FilterConfig::new().with_ignore_file(false);
    let entries = scan_directory(tmp.path(), &filters).unwrap();

    let expected: BTreeSet<String> = walkdir::WalkDir::new(tmp.path())
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| {
            e.path()
                .strip_prefix(tmp.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    assert_eq!(relative_paths(&entries), expected);
}

#[test]
fn test_scan_with_extension_and_name_filters() {
    let tmp = project();
    let filters = FilterConfig::new()
        .with_extensions([".rs"])
        .with_name_pattern("m*");
    let entries = scan_directory(tmp.path(), &filters).unwrap();

    let files: Vec<_> = entries
        .iter()
        .filter(|e| !e.is_dir)
        .map(|e| e.relative_path.as_str())
        .collect();
    assert_eq!(files.len(), 2);
    assert!(files.contains(&"src/main.rs"));
    assert!(files.contains(&"src/util/mod.rs"));
}

#[test]
fn test_scan_is_idempotent() {
    let tmp = project();
    let filters = FilterConfig::new().with_ignore_patterns(["*.md"]);
    let first = scan_directory(tmp.path(), &filters).unwrap();
    let second = scan_directory(tmp.path(), &filters).unwrap();

    let as_set = |entries: &[Entry]| -> BTreeSet<(String, bool, u64)> {
        entries
            .iter()
            .map(|e| (e.relative_path.clone(), e.is_dir, e.size))
            .collect()
    };
    assert_eq!(as_set(&first), as_set(&second));
    assert_eq!(first, second);
}

#[test]
fn test_unreadable_root_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing");
    let err = scan_directory(&missing, &FilterConfig::new()).unwrap_err();
    assert!(err.to_string().contains("cannot read root directory"));
}

#[test]
fn test_tree_round_trip_and_ordering() {
    let tmp = project();
    let entries = scan_directory(tmp.path(), &FilterConfig::new()).unwrap();
    let tree = FileTree::build(entries.clone());

    let flattened: Vec<Entry> = tree.flatten().into_iter().cloned().collect();
    assert_eq!(flattened.len(), entries.len());
    assert_eq!(relative_paths(&flattened), relative_paths(&entries));

    for id in tree.preorder() {
        let children = tree.children(id);
        let keys: Vec<(bool, String)> = children
            .iter()
            .map(|&c| (!tree.entry(c).is_dir, tree.entry(c).name.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}

#[test]
fn test_lazy_expansion_through_scanner() {
    let tmp = project();
    let filters = FilterConfig::new().with_max_depth(1);
    let scanner = DirectoryScanner::new(tmp.path(), filters).unwrap();
    let mut tree = FileTree::build(scanner.scan().unwrap());

    let src = tree.find("src").unwrap();
    assert!(!tree.node(src).is_loaded());
    let before = tree.total_tokens();

    let children = tree.expand(src, &scanner).unwrap().to_vec();
    let names: Vec<_> = children
        .iter()
        .map(|&c| tree.entry(c).name.clone())
        .collect();
    assert_eq!(names, vec!["util", "lib.rs", "main.rs"]);
    assert!(tree.node(src).is_loaded());
    assert!(tree.total_tokens() >= before);

    let again = tree.expand(src, &scanner).unwrap().len();
    assert_eq!(again, 3);
}

#[test]
fn test_freeze_selection_loads_frontier() {
    let tmp = project();
    let filters = FilterConfig::new().with_max_depth(1);
    let scanner = DirectoryScanner::new(tmp.path(), filters).unwrap();
    let mut tree = FileTree::build(scanner.scan().unwrap());

    assert_eq!(tree.select_paths(["src"]), 1);
    let selection = tree.freeze_selection(&scanner);
    let mut paths: Vec<_> = selection
        .files()
        .iter()
        .map(|f| f.path.strip_prefix(tmp.path()).unwrap().to_path_buf())
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            Path::new("src/lib.rs").to_path_buf(),
            Path::new("src/main.rs").to_path_buf(),
            Path::new("src/util/mod.rs").to_path_buf(),
        ]
    );
}
