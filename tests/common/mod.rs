use std::fs;
use std::path::PathBuf;

/// Golden reports live under `tests/snapshots/`; set `LKMA_UPDATE_SNAPSHOTS`
/// to rewrite them from the current output.
pub fn assert_snapshot(name: &str, actual: &str) {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "snapshots", name]
        .iter()
        .collect();

    if std::env::var_os("LKMA_UPDATE_SNAPSHOTS").is_some() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("cannot read snapshot {}: {}", path.display(), err));
    let expected = report_lines(&expected);
    let actual = report_lines(actual);

    for (line_no, (want, got)) in expected.iter().zip(&actual).enumerate() {
        assert_eq!(
            want,
            got,
            "{}: line {} differs (LKMA_UPDATE_SNAPSHOTS=1 regenerates)",
            path.display(),
            line_no + 1
        );
    }
    assert_eq!(
        expected.len(),
        actual.len(),
        "{}: {} lines expected, {} rendered",
        path.display(),
        expected.len(),
        actual.len()
    );
}

/// Report lines with any `\r` left by a CRLF checkout removed. Leading
/// padding is significant, it is the right-justified byte column.
fn report_lines(input: &str) -> Vec<&str> {
    input.lines().map(|line| line.trim_end_matches('\r')).collect()
}
