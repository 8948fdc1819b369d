use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use swap_session::app::logging::LOG_TARGETS;

fn rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("read src dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            rust_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
}

/// Filters are written against subsystem names; an ad-hoc target silently
/// escapes them.
#[test]
fn every_log_target_is_a_known_subsystem() {
    let re = Regex::new(r#"target:\s*"([a-z_]+)""#).unwrap();
    let mut files = Vec::new();
    rust_files(Path::new("src"), &mut files);
    assert!(!files.is_empty());

    let mut seen = Vec::new();
    for file in files {
        let body = fs::read_to_string(&file).expect("read source");
        for caps in re.captures_iter(&body) {
            let target = caps[1].to_string();
            assert!(
                LOG_TARGETS.contains(&target.as_str()),
                "unknown log target {target:?} in {}",
                file.display()
            );
            seen.push(target);
        }
    }
    for target in ["reconciler", "allowance", "tracker", "orchestrator", "wallet"] {
        assert!(seen.iter().any(|t| t == target), "no events under {target:?}");
    }
}
