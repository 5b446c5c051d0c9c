//! Loading lab definitions from disk

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use super::model::Lab;

/// Errors raised while loading a lab
#[derive(Debug, Error)]
pub enum LabError {
    /// The lab file could not be read
    #[error("Failed to read lab file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The lab file is not valid JSON for the lab model
    #[error("Failed to parse lab: {0}")]
    Parse(#[from] serde_json::Error),

    /// The lab parsed but is structurally unusable
    #[error("Invalid lab: {0}")]
    Invalid(String),
}

/// Load and validate a lab from a JSON file
pub fn load_lab(path: &Path) -> Result<Lab, LabError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| LabError::Io { path: path.display().to_string(), source })?;
    let lab = parse_lab(&contents)?;
    tracing::debug!(lab = %lab.id, steps = lab.steps.len(), "loaded lab from {:?}", path);
    Ok(lab)
}

/// Parse and validate a lab from JSON text
pub fn parse_lab(json: &str) -> Result<Lab, LabError> {
    let lab: Lab = serde_json::from_str(json)?;
    validate(&lab)?;
    Ok(lab)
}

/// Reject labs the session cannot drive.
///
/// Hint/skeleton drift is not an error here; it degrades to missing markers
/// and is reported by the lint pass instead.
fn validate(lab: &Lab) -> Result<(), LabError> {
    if lab.steps.is_empty() {
        return Err(LabError::Invalid(format!("lab '{}' has no steps", lab.id)));
    }

    let mut seen = HashSet::new();
    for step in &lab.steps {
        if !seen.insert(step.id.as_str()) {
            return Err(LabError::Invalid(format!("duplicate step id '{}'", step.id)));
        }
        for (i, block) in step.code_blocks.iter().enumerate() {
            if block.full_solution.trim().is_empty() {
                return Err(LabError::Invalid(format!(
                    "step '{}' block {} has an empty solution",
                    step.id, i
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MINIMAL: &str = r#"{
        "number": 1,
        "id": "csfle",
        "title": "CSFLE",
        "steps": [
            { "id": "intro", "title": "Read me" },
            {
                "id": "cmk",
                "title": "Create the CMK",
                "codeBlocks": [
                    { "filename": "Terminal", "fullSolution": "aws kms create-key" }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_minimal_lab() {
        let lab = parse_lab(MINIMAL).unwrap();
        assert_eq!(lab.number, 1);
        assert_eq!(lab.steps.len(), 2);
        assert!(!lab.steps[0].has_code());
        assert!(lab.steps[1].has_code());
    }

    #[test]
    fn rejects_lab_without_steps() {
        let err = parse_lab(r#"{ "number": 1, "id": "x", "title": "x", "steps": [] }"#).unwrap_err();
        assert!(matches!(err, LabError::Invalid(_)));
    }

    #[test]
    fn rejects_duplicate_step_ids() {
        let json = r#"{ "number": 1, "id": "x", "title": "x", "steps": [
            { "id": "a", "title": "one" }, { "id": "a", "title": "two" }
        ] }"#;
        let err = parse_lab(json).unwrap_err();
        assert!(err.to_string().contains("duplicate step id"));
    }

    #[test]
    fn rejects_empty_solution() {
        let json = r#"{ "number": 1, "id": "x", "title": "x", "steps": [
            { "id": "a", "title": "one", "codeBlocks": [ { "filename": "f", "code": "  " } ] }
        ] }"#;
        assert!(matches!(parse_lab(json), Err(LabError::Invalid(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_lab(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, LabError::Io { .. }));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let lab = load_lab(file.path()).unwrap();
        assert_eq!(lab.id, "csfle");
    }

    #[test]
    fn bundled_demo_lab_is_valid() {
        let lab = parse_lab(include_str!("../../demos/csfle-fundamentals.json")).unwrap();
        assert_eq!(lab.number, 1);
        assert!(lab.steps.iter().any(|s| s.has_code()));
    }
}
