use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::Result;

/// Structured domain facts the corpus is generated from.
///
/// Every category is optional and every field inside a record is optional.
/// Absent or blank values deserialize to `None` / empty, so nothing is left
/// for the templates to guess at later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactDocument {
    /// Departments keyed by short code (e.g. "FCSE")
    pub departments: BTreeMap<String, Department>,
    pub events: Vec<Event>,
    /// Faculty members keyed by department code
    pub faculty: BTreeMap<String, Vec<FacultyMember>>,
    pub publications: Vec<Publication>,
    pub news: Vec<NewsItem>,
}

impl FactDocument {
    /// Read a fact document from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Returns `true` if no category has any records.
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
            && self.events.is_empty()
            && self.faculty.values().all(Vec::is_empty)
            && self.publications.is_empty()
            && self.news.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Department {
    #[serde(deserialize_with = "text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text")]
    pub established: Option<String>,
    #[serde(deserialize_with = "list")]
    pub programs: Vec<String>,
    #[serde(deserialize_with = "list")]
    pub research_areas: Vec<String>,
    #[serde(deserialize_with = "list")]
    pub labs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(deserialize_with = "text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "text")]
    pub date: Option<String>,
    #[serde(deserialize_with = "text")]
    pub location: Option<String>,
    #[serde(deserialize_with = "text")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacultyMember {
    #[serde(deserialize_with = "text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "text")]
    pub designation: Option<String>,
    #[serde(deserialize_with = "text")]
    pub specialization: Option<String>,
    #[serde(deserialize_with = "text")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Publication {
    #[serde(deserialize_with = "text")]
    pub title: Option<String>,
    /// A single string or a list of names (joined with ", ")
    #[serde(deserialize_with = "text_or_list")]
    pub authors: Option<String>,
    #[serde(deserialize_with = "text")]
    pub journal: Option<String>,
    #[serde(deserialize_with = "text")]
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsItem {
    #[serde(deserialize_with = "text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "text")]
    pub date: Option<String>,
    #[serde(deserialize_with = "text")]
    pub content: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> Option<String> {
        let s = match self {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        };
        non_blank(s)
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}

/// String or number; null and blank become `None`.
fn text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?.and_then(Scalar::into_text))
}

/// List of strings or numbers; null becomes empty, blank entries are dropped.
fn list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<Option<Scalar>>>::deserialize(d)?
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(Scalar::into_text)
        .collect())
}

fn text_or_list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(Scalar),
        Many(Vec<Option<Scalar>>),
    }

    Ok(match Option::<Raw>::deserialize(d)? {
        None => None,
        Some(Raw::One(s)) => s.into_text(),
        Some(Raw::Many(items)) => {
            let names: Vec<String> = items.into_iter().flatten().filter_map(Scalar::into_text).collect();
            non_blank(names.join(", "))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        let doc: FactDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc, FactDocument::default());
    }

    #[test]
    fn test_numbers_and_blanks_normalized() {
        let doc: FactDocument = serde_json::from_str(
            r#"{
                "departments": {
                    "FCSE": {"name": "  Faculty of Computer Science  ", "established": 1993,
                             "programs": ["CS", "", null, "SE"]}
                },
                "publications": [{"title": "Graphs", "year": 2021, "authors": ["A. Khan", "B. Ali"]}],
                "events": [{"title": "", "date": null}]
            }"#,
        )
        .unwrap();

        let dept = &doc.departments["FCSE"];
        assert_eq!(dept.name.as_deref(), Some("Faculty of Computer Science"));
        assert_eq!(dept.established.as_deref(), Some("1993"));
        assert_eq!(dept.programs, vec!["CS", "SE"]);
        assert!(dept.labs.is_empty());

        assert_eq!(doc.publications[0].year.as_deref(), Some("2021"));
        assert_eq!(doc.publications[0].authors.as_deref(), Some("A. Khan, B. Ali"));
        assert_eq!(doc.events[0].title, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let doc: FactDocument = serde_json::from_str(
            r#"{"departments": {"FEE": {"faculty_count": 30}}, "admissions": {"open": true}}"#,
        )
        .unwrap();
        assert_eq!(doc.departments["FEE"], Department::default());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(&path, r#"{"faculty": {"FME": [{"name": "Dr. Rahman"}]}}"#).unwrap();

        let doc = FactDocument::from_path(&path).unwrap();
        assert_eq!(doc.faculty["FME"][0].name.as_deref(), Some("Dr. Rahman"));
        assert!(FactDocument::from_path(dir.path().join("missing.json")).is_err());
    }
}
