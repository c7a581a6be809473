use super::*;
use crate::search::search_test_utils::content_match;
use crate::search::FileMatches;
use std::fs;

const ROOT: &str = "/tf-work/repo";

fn result(files: &[(&str, Vec<usize>)]) -> SearchResult {
    SearchResult {
        files: files
            .iter()
            .map(|(path, lines)| {
                let path = PathBuf::from(path);
                FileMatches {
                    matches: lines.iter().map(|l| content_match(&path, *l, 1, "needle")).collect(),
                    path,
                }
            })
            .collect(),
        truncated: false,
        error: None,
    }
}

fn shape(entries: &[DisplayEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| {
            let name = e.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            match e.kind {
                EntryKind::SearchHit => format!("{}:{}", "  ".repeat(e.depth), e.line.unwrap_or(0)),
                EntryKind::Path if e.is_dir => format!("{}{}/", "  ".repeat(e.depth), name),
                EntryKind::Path => format!("{}{}", "  ".repeat(e.depth), name),
            }
        })
        .collect()
}

// ─── Content tree ───────────────────────────────────────────────────

#[test]
fn test_content_tree_orders_dirs_first_with_hits_under_files() {
    let res = result(&[
        ("/tf-work/repo/a.py", vec![5]),
        ("/tf-work/repo/src/b.py", vec![9, 2]),
        ("/tf-work/repo/src/deep/c.py", vec![1]),
    ]);
    let entries = content_tree_entries(Path::new(ROOT), &res, &HashSet::new(), 0);
    assert_eq!(
        shape(&entries),
        vec![
            "repo/",
            "  src/",
            "    deep/",
            "      c.py",
            "        :1",
            "    b.py",
            "      :2",
            "      :9",
            "  a.py",
            "    :5",
        ]
    );
    assert!(entries.iter().all(|e| e.workspace_section == Some(0)));
    assert!(entries.iter().all(|e| e.workspace_root.as_deref() == Some(Path::new(ROOT))));
}

#[test]
fn test_content_tree_honors_collapsed_dirs() {
    let res = result(&[("/tf-work/repo/a.py", vec![5]), ("/tf-work/repo/src/b.py", vec![9])]);
    let collapsed = HashSet::from([PathBuf::from("/tf-work/repo/src")]);
    let entries = content_tree_entries(Path::new(ROOT), &res, &collapsed, 0);
    assert_eq!(shape(&entries), vec!["repo/", "  src/", "  a.py", "    :5"]);
}

#[test]
fn test_content_tree_root_cannot_collapse() {
    let res = result(&[("/tf-work/repo/a.py", vec![5])]);
    let collapsed = HashSet::from([PathBuf::from(ROOT)]);
    let entries = content_tree_entries(Path::new(ROOT), &res, &collapsed, 0);
    assert_eq!(entries.len(), 3);
}

#[test]
fn test_content_tree_skips_files_outside_root() {
    let res = result(&[("/tf-elsewhere/x.py", vec![1]), ("/tf-work/repo/a.py", vec![2])]);
    let entries = content_tree_entries(Path::new(ROOT), &res, &HashSet::new(), 0);
    assert_eq!(shape(&entries), vec!["repo/", "  a.py", "    :2"]);
}

#[test]
fn test_content_tree_empty_result_is_root_only() {
    let entries = content_tree_entries(Path::new(ROOT), &SearchResult::default(), &HashSet::new(), 3);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].depth, 0);
    assert_eq!(entries[0].workspace_section, Some(3));
}

#[test]
fn test_content_tree_is_deterministic() {
    let res = result(&[
        ("/tf-work/repo/Zeta.py", vec![1]),
        ("/tf-work/repo/alpha.py", vec![1]),
        ("/tf-work/repo/lib/m.py", vec![1]),
    ]);
    let first = content_tree_entries(Path::new(ROOT), &res, &HashSet::new(), 0);
    let second = content_tree_entries(Path::new(ROOT), &res, &HashSet::new(), 0);
    assert_eq!(first, second);
    assert_eq!(shape(&first)[1..4], ["  lib/", "    m.py", "      :1"]);
    assert_eq!(shape(&first)[4], "  alpha.py");
    assert_eq!(shape(&first)[6], "  Zeta.py");
}

#[test]
fn test_content_tree_orders_case_only_names_by_path() {
    let first = content_tree_entries(
        Path::new(ROOT),
        &result(&[
            ("/tf-work/repo/readme.md", vec![3]),
            ("/tf-work/repo/README.md", vec![1]),
            ("/tf-work/repo/Readme.md", vec![2]),
        ]),
        &HashSet::new(),
        0,
    );
    assert_eq!(
        shape(&first),
        vec!["repo/", "  README.md", "    :1", "  Readme.md", "    :2", "  readme.md", "    :3"]
    );
    // each build hashes with fresh seeds
    for _ in 0..100 {
        let res = result(&[
            ("/tf-work/repo/Readme.md", vec![2]),
            ("/tf-work/repo/readme.md", vec![3]),
            ("/tf-work/repo/README.md", vec![1]),
        ]);
        assert_eq!(content_tree_entries(Path::new(ROOT), &res, &HashSet::new(), 0), first);
    }
}

// ─── File tree ──────────────────────────────────────────────────────

#[test]
fn test_file_tree_includes_ancestors_and_no_hits() {
    let matched = vec![
        PathBuf::from("/tf-work/repo/src/main.rs"),
        PathBuf::from("docs/guide.md"),
    ];
    let entries = file_tree_entries(Path::new(ROOT), &matched, 0);
    assert_eq!(
        shape(&entries),
        vec!["repo/", "  docs/", "    guide.md", "  src/", "    main.rs"]
    );
    assert!(entries.iter().all(|e| !e.is_hit()));
}

// ─── Workspace ──────────────────────────────────────────────────────

#[test]
fn test_normalized_roots_dedupes_in_order() {
    let roots = vec![
        PathBuf::from("/tf-work/b"),
        PathBuf::from("/tf-work/a"),
        PathBuf::from("/tf-work/b"),
    ];
    assert_eq!(
        normalized_roots(&roots),
        vec![PathBuf::from("/tf-work/b"), PathBuf::from("/tf-work/a")]
    );
}

#[test]
fn test_workspace_content_entries_one_section_per_root() {
    let ws = Workspace::new(&[PathBuf::from("/tf-work/repo"), PathBuf::from("/tf-work/repo/src")], false);
    let res = result(&[("/tf-work/repo/src/b.py", vec![9])]);
    let entries = ws.content_entries(&res, &HashSet::new());
    // the file shows under both overlapping roots
    let hits: Vec<_> = entries.iter().filter(|e| e.is_hit()).collect();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].workspace_section, Some(0));
    assert_eq!(hits[1].workspace_section, Some(1));
    let root_rows: Vec<_> = entries.iter().filter(|e| e.depth == 0).map(|e| e.path.clone()).collect();
    assert_eq!(root_rows, vec![PathBuf::from("/tf-work/repo"), PathBuf::from("/tf-work/repo/src")]);
}

#[test]
fn test_workspace_file_entries_by_section() {
    let ws = Workspace::new(&[PathBuf::from("/tf-work/a"), PathBuf::from("/tf-work/b")], false);
    let matched = HashMap::from([(1usize, vec![PathBuf::from("/tf-work/b/x.txt")])]);
    let entries = ws.file_entries(&matched);
    assert_eq!(shape(&entries), vec!["a/", "b/", "  x.txt"]);
}

#[test]
fn test_set_roots_keeps_expansion_of_surviving_roots() {
    let mut ws = Workspace::new(&[PathBuf::from("/tf-work/a"), PathBuf::from("/tf-work/b")], false);
    assert!(ws.toggle_expanded(1, Path::new("/tf-work/b/src")));
    ws.set_roots(&[PathBuf::from("/tf-work/b"), PathBuf::from("/tf-work/c")]);
    assert_eq!(ws.roots().len(), 2);
    assert!(ws.expanded(0).unwrap().contains(Path::new("/tf-work/b/src")));
    assert!(ws.expanded(1).unwrap().contains(Path::new("/tf-work/c")));
}

#[test]
fn test_hidden_mode_controls_gitignore() {
    let mut ws = Workspace::new(&[PathBuf::from(ROOT)], false);
    assert!(ws.skip_gitignored());
    ws.set_show_hidden(true);
    assert!(!ws.skip_gitignored());
}

// ─── Browse tree ────────────────────────────────────────────────────

#[test]
fn test_browse_tree_reads_filesystem() {
    let tmp = tempfile::tempdir().unwrap();
    let root = resolve_path(tmp.path());
    fs::create_dir(root.join("src")).unwrap();
    fs::write(root.join("src").join("lib.rs"), "").unwrap();
    fs::write(root.join("B.md"), "").unwrap();
    fs::write(root.join("a.txt"), "").unwrap();
    fs::write(root.join(".hidden"), "").unwrap();

    let expanded = HashSet::from([root.clone()]);
    let entries = browse_tree_entries(&root, &expanded, false, true, 0);
    let names: Vec<_> = shape(&entries)[1..].to_vec();
    assert_eq!(names, vec!["  src/", "  a.txt", "  B.md"]);

    let expanded = HashSet::from([root.clone(), root.join("src")]);
    let entries = browse_tree_entries(&root, &expanded, true, false, 0);
    let names: Vec<_> = shape(&entries)[1..].to_vec();
    assert_eq!(names, vec!["  src/", "    lib.rs", "  .hidden", "  a.txt", "  B.md"]);
}

#[test]
fn test_browse_tree_skips_gitignored_unless_hidden_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let root = resolve_path(tmp.path());
    fs::write(root.join(".gitignore"), "build.log\n").unwrap();
    fs::write(root.join("build.log"), "").unwrap();
    fs::write(root.join("keep.rs"), "").unwrap();

    let expanded = HashSet::from([root.clone()]);
    let plain = browse_tree_entries(&root, &expanded, false, true, 0);
    assert!(plain.iter().all(|e| !e.path.ends_with("build.log")));

    let all = browse_tree_entries(&root, &expanded, true, false, 0);
    assert!(all.iter().any(|e| e.path.ends_with("build.log")));
}

#[test]
fn test_browse_tree_collapsed_root_is_single_row() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "").unwrap();
    let entries = browse_tree_entries(tmp.path(), &HashSet::new(), false, true, 0);
    assert_eq!(entries.len(), 1);
}
