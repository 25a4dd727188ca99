use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::concept::{ConceptId, ConceptRecord, Dataset, Edge, PersonCounts, StandardConcept};
use crate::errors::{DataLoadError, DataLoadResult};

/// Column offsets of a concepts file, resolved from its header row.
/// Only `concept_id` is required.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConceptLoadProfile {
    pub concept_id_column: usize,
    pub concept_name_column: Option<usize>,
    pub vocabulary_id_column: Option<usize>,
    pub standard_concept_column: Option<usize>,
    pub total_cnt_column: Option<usize>,
    pub distinct_person_cnt_column: Option<usize>,
}

impl Display for ConceptLoadProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Concept column offsets: concept_id:{}, concept_name:{:?}, vocabulary_id:{:?}, standard_concept:{:?}, total_cnt:{:?}, distinct_person_cnt:{:?}",
            self.concept_id_column,
            self.concept_name_column,
            self.vocabulary_id_column,
            self.standard_concept_column,
            self.total_cnt_column,
            self.distinct_person_cnt_column,
        )
    }
}

/// Column offsets of an edges file.
#[derive(Debug, PartialEq, Eq)]
pub struct EdgeLoadProfile {
    pub parent_column: usize,
    pub child_column: usize,
}

impl Display for EdgeLoadProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Edge column offsets: parent:{}, child:{}",
            self.parent_column, self.child_column
        )
    }
}

pub fn create_concept_load_profile(headers: &[String]) -> DataLoadResult<ConceptLoadProfile> {
    let mut concept_id_column = None;
    let mut profile = ConceptLoadProfile::default();
    for (i, field) in headers.iter().enumerate() {
        match field.as_str() {
            "concept_id" => concept_id_column = Some(i),
            "concept_name" => profile.concept_name_column = Some(i),
            "vocabulary_id" => profile.vocabulary_id_column = Some(i),
            "standard_concept" => profile.standard_concept_column = Some(i),
            "total_cnt" => profile.total_cnt_column = Some(i),
            "distinct_person_cnt" => profile.distinct_person_cnt_column = Some(i),
            _ => {}
        }
    }
    profile.concept_id_column =
        concept_id_column.ok_or_else(|| DataLoadError::MissingColumn("concept_id".into()))?;
    Ok(profile)
}

/// Accepts either `parent`/`child` or `source`/`target` headers.
pub fn create_edge_load_profile(headers: &[String]) -> DataLoadResult<EdgeLoadProfile> {
    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let parent_column =
        find(&["parent", "source"]).ok_or_else(|| DataLoadError::MissingColumn("parent".into()))?;
    let child_column =
        find(&["child", "target"]).ok_or_else(|| DataLoadError::MissingColumn("child".into()))?;
    Ok(EdgeLoadProfile {
        parent_column,
        child_column,
    })
}

fn separator_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

/// Headers and records of a delimited file; `.tsv` files are tab separated.
pub fn read_records(path: &Path) -> DataLoadResult<(Vec<String>, Vec<StringRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator_for(path))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|col_name| col_name.trim().to_string())
        .collect();
    let records: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;

    Ok((headers, records))
}

fn is_valid_id(id: &str) -> bool {
    let trimmed = id.trim();
    !trimmed.is_empty() && trimmed != "null" && trimmed != "None" && trimmed != "NaN"
}

fn optional_field(record: &StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|c| record.get(c))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_count(value: Option<String>, row: usize, column: &str) -> DataLoadResult<u64> {
    let Some(value) = value else {
        return Ok(0);
    };
    if let Ok(n) = value.parse::<u64>() {
        return Ok(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f >= 0.0 => Ok(f as u64),
        _ => Err(DataLoadError::InvalidValue {
            row,
            reason: format!("{} '{}' is not a count", column, value),
        }),
    }
}

pub fn load_concepts_csv(path: impl AsRef<Path>) -> DataLoadResult<Vec<ConceptRecord>> {
    let path = path.as_ref();
    let (headers, records) = read_records(path)?;
    let profile = create_concept_load_profile(&headers)?;
    debug!("{}", profile);

    let mut seen = HashSet::new();
    let mut concepts = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let row = index + 1;
        let id = record.get(profile.concept_id_column).unwrap_or_default();
        if !is_valid_id(id) {
            return Err(DataLoadError::InvalidValue {
                row,
                reason: format!("missing or invalid concept_id '{}'", id),
            });
        }
        if !seen.insert(id.to_string()) {
            warn!("Duplicate concept_id {} in row {}, keeping the first", id, row);
            continue;
        }

        let standard_concept =
            StandardConcept::from(optional_field(record, profile.standard_concept_column));
        let total_cnt = parse_count(
            optional_field(record, profile.total_cnt_column),
            row,
            "total_cnt",
        )?;
        let distinct_person_cnt = optional_field(record, profile.distinct_person_cnt_column)
            .map(|value| PersonCounts::parse(&value))
            .unwrap_or_default();

        concepts.push(ConceptRecord {
            concept_id: ConceptId::new(id),
            concept_name: optional_field(record, profile.concept_name_column),
            vocabulary_id: optional_field(record, profile.vocabulary_id_column),
            standard_concept,
            total_cnt,
            distinct_person_cnt,
            not_a_concept: false,
        });
    }

    info!("Loaded {} concepts from {}", concepts.len(), path.display());
    Ok(concepts)
}

/// Rows with a blank end are skipped; unknown ids are left for the graph
/// build to drop.
pub fn load_edges_csv(path: impl AsRef<Path>) -> DataLoadResult<Vec<Edge>> {
    let path = path.as_ref();
    let (headers, records) = read_records(path)?;
    let profile = create_edge_load_profile(&headers)?;
    debug!("{}", profile);

    let mut edges = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in &records {
        let parent = record.get(profile.parent_column).unwrap_or_default();
        let child = record.get(profile.child_column).unwrap_or_default();
        if !is_valid_id(parent) || !is_valid_id(child) {
            skipped += 1;
            continue;
        }
        edges.push(Edge::new(parent, child));
    }
    if skipped > 0 {
        warn!("Skipped {} edge rows with a missing end", skipped);
    }

    info!("Loaded {} edges from {}", edges.len(), path.display());
    Ok(edges)
}

/// JSON dataset file: `{"concepts": [...], "edges": [[p, c], ...],
/// "specialConceptCategories": {...}}`.
pub fn load_dataset(path: impl AsRef<Path>) -> DataLoadResult<Dataset> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let dataset: Dataset = serde_json::from_str(&content)?;
    info!("Loaded dataset from {}: {}", path.display(), dataset.stats());
    Ok(dataset)
}

/// Dataset from a concepts file and an edges file; categories come from
/// configuration-derived rules only.
pub fn load_dataset_csv(
    concepts: impl AsRef<Path>,
    edges: impl AsRef<Path>,
) -> DataLoadResult<Dataset> {
    Ok(Dataset::new(
        load_concepts_csv(concepts)?,
        load_edges_csv(edges)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_concept_profile_from_headers() {
        let profile =
            create_concept_load_profile(&headers(&["concept_name", "total_cnt", "concept_id"]))
                .unwrap();
        assert_eq!(profile.concept_id_column, 2);
        assert_eq!(profile.concept_name_column, Some(0));
        assert_eq!(profile.total_cnt_column, Some(1));
        assert_eq!(profile.vocabulary_id_column, None);

        let err = create_concept_load_profile(&headers(&["id", "label"])).unwrap_err();
        assert!(matches!(err, DataLoadError::MissingColumn(col) if col == "concept_id"));
    }

    #[test]
    fn test_edge_profile_accepts_source_target() {
        let profile = create_edge_load_profile(&headers(&["target", "source"])).unwrap();
        assert_eq!(profile.parent_column, 1);
        assert_eq!(profile.child_column, 0);
        assert!(create_edge_load_profile(&headers(&["parent"])).is_err());
    }

    #[test]
    fn test_load_concepts_csv() {
        let file = write_file(
            ".csv",
            "concept_id,concept_name,standard_concept,total_cnt,distinct_person_cnt\n\
             1,Diabetes,S,100,\"5,40,7\"\n\
             2,Type 2,,\n\
             1,Again,S,3,3\n",
        );
        let concepts = load_concepts_csv(file.path()).unwrap();
        assert_eq!(concepts.len(), 2);
        assert_eq!(concepts[0].concept_name.as_deref(), Some("Diabetes"));
        assert_eq!(concepts[0].total_cnt, 100);
        assert_eq!(concepts[0].distinct_person_count(), 40);
        assert_eq!(concepts[1].standard_concept, StandardConcept::NonStandard);
        assert_eq!(concepts[1].total_cnt, 0);
    }

    #[test]
    fn test_bad_count_reports_row() {
        let file = write_file(".csv", "concept_id,total_cnt\n1,5\n2,lots\n");
        let err = load_concepts_csv(file.path()).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidValue { row: 2, .. }));
    }

    #[test]
    fn test_load_edges_tsv() {
        let file = write_file(".tsv", "parent\tchild\n1\t2\n\t3\n2\t4\n");
        let edges = load_edges_csv(file.path()).unwrap();
        assert_eq!(edges, vec![Edge::new("1", "2"), Edge::new("2", "4")]);
    }

    #[test]
    fn test_load_dataset_json() {
        let file = write_file(
            ".json",
            r#"{
                "concepts": [{"concept_id": 1, "total_cnt": 2}, {"concept_id": "2"}],
                "edges": [[1, 2]],
                "specialConceptCategories": {"added": [2]}
            }"#,
        );
        let dataset = load_dataset(file.path()).unwrap();
        assert_eq!(dataset.concepts[0].concept_id, ConceptId::from("1"));
        assert_eq!(dataset.edges, vec![Edge::new("1", "2")]);
        assert_eq!(
            dataset.special_concept_categories["added"],
            vec![ConceptId::from("2")]
        );
    }
}
