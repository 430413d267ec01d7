//! Question/answer corpus generation
//!
//! Turns a [`FactDocument`] into an ordered list of [`QaPair`]s using fixed
//! templates. The order is part of the contract: categories come in a fixed
//! sequence (departments, events, faculty, publications, news), keyed
//! categories iterate by ascending key and lists keep their document order.
//! Answer-pool indices downstream are therefore reproducible across rebuilds.
//!
//! # Usage
//!
//! ```ignore
//! use semqa_lib::corpus::{build_corpus, FactDocument};
//!
//! let facts = FactDocument::from_path("facts.json")?;
//! let pairs = build_corpus(&facts);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A question/answer pair treated as one unit of retrievable knowledge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub source: SourceTag,
}

/// Fact category a pair was generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Department,
    Event,
    Faculty,
    Publication,
    News,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Department => "department",
            Self::Event => "event",
            Self::Faculty => "faculty",
            Self::Publication => "publication",
            Self::News => "news",
        };
        f.write_str(name)
    }
}

/// Generate the QA corpus for `facts`.
///
/// Pure and infallible: records missing their identifying field are skipped
/// and detail pairs with nothing to say are left out.
pub fn build_corpus(facts: &FactDocument) -> Vec<QaPair> {
    let mut pairs = Vec::new();

    for (code, dept) in &facts.departments {
        department_pairs(code, dept, &mut pairs);
    }
    for event in &facts.events {
        pairs.extend(event_pair(event));
    }
    for (dept, members) in &facts.faculty {
        pairs.extend(members.iter().filter_map(|m| faculty_pair(dept, m)));
    }
    for publication in &facts.publications {
        pairs.extend(publication_pair(publication));
    }
    for item in &facts.news {
        pairs.extend(news_pair(item));
    }

    pairs
}

/// Split pairs into the aligned question and answer lists the store expects.
pub fn split_pairs(pairs: &[QaPair]) -> (Vec<&str>, Vec<String>) {
    pairs
        .iter()
        .map(|p| (p.question.as_str(), p.answer.clone()))
        .unzip()
}

fn pair(source: SourceTag, question: String, answer: String) -> QaPair {
    QaPair {
        question,
        answer,
        source,
    }
}

fn department_pairs(code: &str, dept: &Department, out: &mut Vec<QaPair>) {
    let name = dept.name.as_deref().unwrap_or(code);
    let answer = match &dept.established {
        Some(year) => format!("The {name} ({code}) was established in {year}."),
        None => format!("The {name} ({code})."),
    };
    out.push(pair(SourceTag::Department, format!("What is {code}?"), answer));

    if !dept.programs.is_empty() {
        out.push(pair(
            SourceTag::Department,
            format!("What programs are offered in {code}?"),
            format!("The {code} offers: {}", dept.programs.join(", ")),
        ));
    }
    if !dept.research_areas.is_empty() {
        out.push(pair(
            SourceTag::Department,
            format!("What research is done in {code}?"),
            format!("Research areas in {code} include: {}", dept.research_areas.join(", ")),
        ));
    }
    if !dept.labs.is_empty() {
        out.push(pair(
            SourceTag::Department,
            format!("What labs are in {code}?"),
            format!("Labs in {code} include: {}", dept.labs.join(", ")),
        ));
    }
}

fn event_pair(event: &Event) -> Option<QaPair> {
    let title = event.title.as_deref()?;

    let mut answer = title.to_string();
    match (&event.date, &event.location) {
        (Some(date), Some(location)) => answer.push_str(&format!(" is scheduled for {date} at {location}.")),
        (Some(date), None) => answer.push_str(&format!(" is scheduled for {date}.")),
        (None, Some(location)) => answer.push_str(&format!(" takes place at {location}.")),
        (None, None) => answer.push('.'),
    }
    if let Some(description) = &event.description {
        answer.push(' ');
        answer.push_str(description);
    }

    Some(pair(SourceTag::Event, format!("Tell me about {title}"), answer))
}

fn faculty_pair(dept: &str, member: &FacultyMember) -> Option<QaPair> {
    let name = member.name.as_deref()?;

    let mut answer = match &member.designation {
        Some(designation) => format!("{name} is a {designation} in {dept}"),
        None => format!("{name} is a faculty member in {dept}"),
    };
    if let Some(specialization) = &member.specialization {
        answer.push_str(&format!(", specializing in {specialization}"));
    }
    answer.push('.');
    if let Some(email) = &member.email {
        answer.push_str(&format!(" Contact: {email}."));
    }

    Some(pair(SourceTag::Faculty, format!("Who is {name}?"), answer))
}

fn publication_pair(publication: &Publication) -> Option<QaPair> {
    let title = publication.title.as_deref()?;

    let mut answer = format!("Research paper titled '{title}' was published");
    if let Some(journal) = &publication.journal {
        answer.push_str(&format!(" in {journal}"));
    }
    if let Some(year) = &publication.year {
        answer.push_str(&format!(" ({year})"));
    }
    if let Some(authors) = &publication.authors {
        answer.push_str(&format!(" by {authors}"));
    }
    answer.push('.');

    Some(pair(
        SourceTag::Publication,
        format!("Tell me about the research on {title}"),
        answer,
    ))
}

fn news_pair(item: &NewsItem) -> Option<QaPair> {
    let title = item.title.as_deref()?;

    let mut answer = match &item.date {
        Some(date) => format!("{title} ({date})"),
        None => title.to_string(),
    };
    match &item.content {
        Some(content) => answer.push_str(&format!(": {content}")),
        None => answer.push('.'),
    }

    Some(pair(SourceTag::News, format!("What happened with {title}?"), answer))
}

mod facts;

pub use facts::*;
