//! Reading and writing a feature's `_<name>.md` file.

use crate::error::{FlowError, Result};
use crate::feature::{Feature, ImprovementNote};
use crate::frontmatter::{self, Document};
use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// On-disk metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct FeatureMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_relationship: Option<String>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    test_paths: Vec<String>,
    #[serde(default)]
    code_paths: Vec<String>,
    #[serde(default)]
    artifacts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    improvement_history: Vec<ImprovementNote>,
    #[serde(flatten)]
    extra: Mapping,
}

/// RFC 3339 on write; RFC 3339 or a bare `YYYY-MM-DD` date on read.
mod timestamp {
    use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| parse(&s).map_err(de::Error::custom)).transpose()
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| format!("invalid timestamp '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Feature {
    /// Load a feature file. Anything short of a well-formed feature document
    /// is reported as `CorruptedState`.
    pub fn load(file: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(file)?;
        Self::parse(file, &text)
    }

    fn parse(file: &Path, text: &str) -> Result<Self> {
        if !frontmatter::starts_with_delimiter(text) {
            return Err(FlowError::corrupted(
                file,
                "file does not start with a frontmatter block",
            ));
        }
        let doc = frontmatter::decode(text).map_err(|e| FlowError::corrupted(file, e.to_string()))?;
        if !doc.has_metadata() {
            return Err(FlowError::corrupted(file, "frontmatter block is empty"));
        }

        let meta: FeatureMeta = serde_yaml::from_value(Value::Mapping(doc.metadata))
            .map_err(|e| FlowError::corrupted(file, e.to_string()))?;

        let phase = meta
            .phase
            .ok_or_else(|| FlowError::corrupted(file, "missing required field 'phase'"))?;
        let phase =
            Phase::from_str(&phase).map_err(|e| FlowError::corrupted(file, e.to_string()))?;

        let dir = file.parent().unwrap_or(Path::new("."));
        let name = match meta.feature_name {
            Some(name) => name,
            None => dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| FlowError::corrupted(file, "cannot derive feature name"))?,
        };

        let created_at = meta
            .created_at
            .or(meta.last_updated)
            .unwrap_or_else(Utc::now);
        let last_updated = meta.last_updated.unwrap_or(created_at);

        Ok(Feature {
            name,
            phase,
            path: dir.to_path_buf(),
            content: doc.body,
            created_at,
            last_updated,
            parent_feature: meta.parent_feature,
            parent_relationship: meta.parent_relationship,
            test_paths: meta.test_paths,
            code_paths: meta.code_paths,
            artifacts: meta.artifacts,
            improvement_history: meta.improvement_history,
            extra_metadata: meta.extra,
        })
    }

    /// Write `<path>/_<name>.md` in a single atomic replace.
    pub fn save(&self) -> Result<()> {
        let data = self.to_document()?;
        crate::io::atomic_write(&self.manifest_path(), data.as_bytes())
    }

    fn to_document(&self) -> Result<String> {
        let meta = FeatureMeta {
            phase: Some(self.phase.to_string()),
            feature_name: Some(self.name.clone()),
            parent_feature: self.parent_feature.clone(),
            parent_relationship: self.parent_relationship.clone(),
            created_at: Some(self.created_at),
            last_updated: Some(self.last_updated),
            test_paths: self.test_paths.clone(),
            code_paths: self.code_paths.clone(),
            artifacts: self.artifacts.clone(),
            improvement_history: self.improvement_history.clone(),
            extra: self.extra_metadata.clone(),
        };
        let metadata = match serde_yaml::to_value(&meta)? {
            Value::Mapping(m) => m,
            _ => Default::default(),
        };
        frontmatter::encode(&Document::new(metadata, self.content.as_str()))
    }

    /// Build a feature in `directory` with the default outline and persist it
    /// before returning.
    pub fn create_new(
        name: impl Into<String>,
        directory: &Path,
        parent_feature: Option<String>,
        parent_relationship: Option<String>,
    ) -> Result<Self> {
        let mut feature = Feature::new(name, directory);
        feature.content = default_body(
            &feature.name,
            parent_feature.as_deref(),
            parent_relationship.as_deref(),
        );
        feature.parent_feature = parent_feature;
        feature.parent_relationship = parent_relationship;
        feature.save()?;
        Ok(feature)
    }
}

fn title_case(name: &str) -> String {
    name.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_body(name: &str, parent: Option<&str>, relationship: Option<&str>) -> String {
    let mut body = format!("# {}\n\n", title_case(name));
    if let Some(parent) = parent {
        body.push_str("## Parent Feature\n\n");
        body.push_str(&format!("Builds on `{parent}`"));
        match relationship {
            Some(rel) => body.push_str(&format!(": {rel}\n\n")),
            None => body.push_str(".\n\n"),
        }
    }
    for section in [
        "Overview",
        "User Stories",
        "Requirements",
        "Acceptance Criteria",
        "Technical Notes",
    ] {
        body.push_str(&format!("## {section}\n\n_TBD_\n\n"));
    }
    body.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
