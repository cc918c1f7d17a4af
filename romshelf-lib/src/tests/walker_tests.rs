use super::*;
use std::fs;

use tempfile::TempDir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"x").unwrap();
}

fn walk_relative(walker: &Walker) -> Vec<String> {
    walker
        .walk()
        .map(|p| walker.relative(&p.unwrap()).unwrap())
        .collect()
}

#[test]
fn ignore_patterns_exclude_files_and_prune_directories() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "keep.txt");
    touch(dir.path(), "ignore.txt");
    touch(dir.path(), "sub/anything");

    let walker = Walker::new(dir.path(), &["ignore.txt", "sub/**"]).unwrap();
    assert_eq!(walk_relative(&walker), vec!["keep.txt"]);
}

#[test]
fn yields_absolute_paths_depth_first() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "b.bin");
    touch(dir.path(), "a/one.bin");
    touch(dir.path(), "a/deeper/two.bin");

    let walker = Walker::new(dir.path(), &[] as &[&str]).unwrap();
    let paths: Vec<PathBuf> = walker.walk().map(Result::unwrap).collect();
    assert!(paths.iter().all(|p| p.is_absolute()));
    assert_eq!(
        walk_relative(&walker),
        vec!["a/deeper/two.bin", "a/one.bin", "b.bin"]
    );
}

#[test]
fn single_star_stays_within_one_segment() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "top.txt");
    touch(dir.path(), "nested/inner.txt");
    touch(dir.path(), "nested/game.bin");

    let walker = Walker::new(dir.path(), &["*.txt"]).unwrap();
    assert_eq!(
        walk_relative(&walker),
        vec!["nested/game.bin", "nested/inner.txt"]
    );

    let walker = Walker::new(dir.path(), &["**/*.txt"]).unwrap();
    assert_eq!(walk_relative(&walker), vec!["nested/game.bin"]);
}

#[test]
fn walk_is_restartable_and_lazy() {
    let dir = TempDir::new().unwrap();
    for name in ["a.bin", "b.bin", "c.bin"] {
        touch(dir.path(), name);
    }
    let walker = Walker::new(dir.path(), &[] as &[&str]).unwrap();

    let first = walker.walk().next().unwrap().unwrap();
    assert!(first.ends_with("a.bin"));
    assert_eq!(walker.walk().count(), 3);
    assert_eq!(walker.walk().count(), 3);
}

#[test]
fn invalid_pattern_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = Walker::new(dir.path(), &["[unclosed"]).unwrap_err();
    assert!(matches!(err, WalkError::Pattern { .. }));
}

#[test]
fn globstar_glued_to_a_name_spans_segments() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "a.bak");
    touch(dir.path(), "sub/b.bak");
    touch(dir.path(), "sub/deeper/c.bak");
    touch(dir.path(), "keep.bin");

    let walker = Walker::new(dir.path(), &["**.bak"]).unwrap();
    assert_eq!(walk_relative(&walker), vec!["keep.bin"]);
}

#[test]
fn inner_globstar_collapses_to_one_segment() {
    assert_eq!(normalize_globstar("**.bak"), "**/*.bak");
    assert_eq!(normalize_globstar("sub/a**b"), "sub/a*b");
    assert_eq!(normalize_globstar("sub/**/x"), "sub/**/x");
    assert_eq!(normalize_globstar("*.txt"), "*.txt");

    let dir = TempDir::new().unwrap();
    touch(dir.path(), "sub/axb");
    touch(dir.path(), "sub/nested/axb");
    let walker = Walker::new(dir.path(), &["sub/a**b"]).unwrap();
    assert_eq!(walk_relative(&walker), vec!["sub/nested/axb"]);
}
