use bzip2::write::BzEncoder;
use bzip2::Compression;
use fars_explorer::{Fars, FarsConfig, MapConfig, MapError, MapOutcome, YearOutcome};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

const ACCIDENTS_2015: &str = "\
ST_CASE,STATE,MONTH,DAY,LATITUDE,LONGITUD
10001,1,1,3,32.3668,-86.3000
10002,1,1,9,34.7304,-86.5861
10003,1,5,21,99.9999,999.9999
10004,4,5,30,33.4484,-112.0740
10005,4,11,2,99.9999,-111.9000
";

const ACCIDENTS_2016: &str = "\
ST_CASE,STATE,MONTH,DAY,LATITUDE,LONGITUD
20001,1,2,14,30.6954,-88.0399
20002,4,5,1,32.2226,-110.9747
";

fn write_year(dir: &Path, year: i64, contents: &str) {
    let file = File::create(dir.join(format!("accident_{}.csv.bz2", year))).unwrap();
    let mut encoder = BzEncoder::new(file, Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn fars_in(dir: &Path) -> Fars {
    write_year(dir, 2015, ACCIDENTS_2015);
    write_year(dir, 2016, ACCIDENTS_2016);
    Fars::new(FarsConfig {
        data_dir: dir.to_path_buf(),
        output_dir: dir.join("maps"),
        map: MapConfig {
            width: 640,
            height: 480,
            ..MapConfig::default()
        },
    })
}

#[test]
fn summary_counts_every_loaded_row() {
    let dir = tempdir().unwrap();
    let fars = fars_in(dir.path());

    let outcomes = fars.read_years(&[2015, 2017, 2016]).unwrap();
    let loaded: Vec<i64> = outcomes
        .iter()
        .filter(|o| o.is_loaded())
        .map(YearOutcome::year)
        .collect();
    assert_eq!(loaded, vec![2015, 2016]);
    assert!(matches!(outcomes[1], YearOutcome::Invalid { year: 2017, .. }));

    let summary = fars.summarize_years(&[2015, 2017, 2016]).unwrap();
    assert_eq!(summary.shape(), (4, 3));

    let total: u32 = ["2015", "2016"]
        .iter()
        .map(|name| {
            summary
                .column(name)
                .unwrap()
                .u32()
                .unwrap()
                .into_iter()
                .flatten()
                .sum::<u32>()
        })
        .sum();
    assert_eq!(total, 7);
}

#[test]
fn map_renders_only_reported_coordinates() {
    let dir = tempdir().unwrap();
    let fars = fars_in(dir.path());

    let output = fars.config().map_output(4, 2015).with_extension("svg");
    let map = match fars.map_state(4, 2015, &output).unwrap() {
        MapOutcome::Rendered(map) => map,
        other => panic!("expected a rendered map, got {:?}", other),
    };

    assert_eq!(map.accidents, 2);
    assert_eq!(map.points, vec![(-112.0740, 33.4484)]);
    assert_eq!(map.bounds.min_lon, -112.0740);
    assert_eq!(map.bounds.max_lon, -111.9000);
    assert_eq!(map.bounds.max_lat, 33.4484);
    assert!(fs::metadata(&output).unwrap().len() > 0);
}

#[test]
fn map_rejects_state_absent_from_year() {
    let dir = tempdir().unwrap();
    let fars = fars_in(dir.path());

    let output = dir.path().join("never.png");
    let err = fars.map_state(6, 2016, &output).unwrap_err();
    assert!(matches!(
        err,
        MapError::InvalidState { state: 6, ref present } if present == &vec![1, 4]
    ));
    assert!(!output.exists());
}

#[test]
fn map_of_missing_year_fails() {
    let dir = tempdir().unwrap();
    let fars = fars_in(dir.path());

    let err = fars
        .map_state(1, 2020, &dir.path().join("missing.png"))
        .unwrap_err();
    assert!(err.to_string().contains("accident_2020.csv.bz2"));
}
