use std::fs;

use concept_graph::categories::{NON_STANDARD, ZERO_RECORD};
use concept_graph::data_loader::{load_dataset, load_dataset_csv};
use concept_graph::errors::DataLoadError;
use concept_graph::{reduce, ContainerCache, DisplayAction, ViewerConfig};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_csv_dataset_to_rows() {
    let dir = TempDir::new().unwrap();
    let concepts = write(
        &dir,
        "concepts.csv",
        "concept_id,concept_name,vocabulary_id,standard_concept,total_cnt,distinct_person_cnt\n\
         201826,Type 2 diabetes mellitus,SNOMED,S,900,\"120,80\"\n\
         443238,Diabetic complication,SNOMED,S,0,0\n\
         45533017,E11,ICD10CM,,40,12\n",
    );
    let edges = write(&dir, "edges.csv", "source,target\n201826,443238\n");

    let dataset = load_dataset_csv(&concepts, &edges).unwrap();
    assert_eq!(dataset.concepts.len(), 3);
    assert_eq!(dataset.concepts[0].distinct_person_count(), 120);

    let mut cache = ContainerCache::new(ViewerConfig::default());
    let container = cache.get_or_build(&dataset).unwrap();
    assert_eq!(container.roots().len(), 2);
    assert!(container.registry().get(NON_STANDARD).unwrap().contains("45533017"));
    assert!(container.registry().get(ZERO_RECORD).unwrap().contains("443238"));

    let state = std::sync::Arc::new(cache.config().default_options());
    let state = reduce(&state, &DisplayAction::ToggleExpandAll);
    let state = reduce(&state, &DisplayAction::toggle_option(ZERO_RECORD));
    let paths: Vec<_> = cache
        .display(&state)
        .rows
        .into_iter()
        .map(|r| r.row_path)
        .collect();
    assert_eq!(paths, vec!["201826", "unlinked", "unlinked/45533017"]);
}

#[test]
fn test_json_dataset_with_mixed_ids() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "dataset.json",
        r#"{
            "concepts": [
                {"concept_id": 1, "concept_name": "Parent", "standard_concept": "S", "total_cnt": 5},
                {"concept_id": "2", "concept_name": "Child", "standard_concept": "S", "total_cnt": "7",
                 "distinct_person_cnt": "3,9"}
            ],
            "edges": [["1", 2]],
            "specialConceptCategories": {"definitionConcepts": ["2"]}
        }"#,
    );
    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.concepts[1].total_cnt, 7);
    assert_eq!(dataset.concepts[1].distinct_person_count(), 9);

    let mut cache = ContainerCache::new(ViewerConfig::default());
    let container = cache.get_or_build(&dataset).unwrap();
    assert_eq!(container.attributes("1").unwrap().drc, 12);

    // The definition concept shows through its collapsed parent.
    let output = container.display(&cache.config().default_options());
    let paths: Vec<_> = output.rows.iter().map(|r| r.row_path.as_str()).collect();
    assert_eq!(paths, vec!["1", "1/2"]);
}

#[test]
fn test_missing_concept_id_column() {
    let dir = TempDir::new().unwrap();
    let concepts = write(&dir, "concepts.csv", "id,name\n1,x\n");
    let edges = write(&dir, "edges.csv", "parent,child\n");
    let err = load_dataset_csv(&concepts, &edges).unwrap_err();
    assert!(matches!(err, DataLoadError::MissingColumn(_)));
}

#[test]
fn test_config_file_drives_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.yaml",
        "sibling_order: name\n\
         categories:\n\
         \x20 - name: nonStandard\n\
         \x20   rule: hide_though_expanded\n\
         \x20   default_active: true\n",
    );
    let config = ViewerConfig::load(&path).unwrap();
    let options = config.default_options();
    assert!(options.is_active(NON_STANDARD));
    assert_eq!(options.special_concept_treatment.len(), 1);
}
