//! Local regex entity detectors

use parley_core::{Entity, EntityValue};
use regex::Regex;

use crate::NluError;

/// Named regular expression producing entities from raw text
///
/// The value is the first capture group when the pattern has one, the whole
/// match otherwise. Numeric values become numbers.
#[derive(Debug, Clone)]
pub struct EntityDetector {
    name: String,
    regex: Regex,
    score: f64,
}

impl EntityDetector {
    pub fn new(name: impl Into<String>, pattern: &str, score: f64) -> Result<Self, NluError> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|e| NluError::InvalidPattern {
            name: name.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            name,
            regex,
            score: score.clamp(0.0, 1.0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Detect entities with character offsets
    pub fn detect(&self, text: &str) -> Vec<Entity> {
        self.regex
            .captures_iter(text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let value = captures.get(1).unwrap_or(whole);
                let raw = value.as_str().trim();
                if raw.is_empty() {
                    return None;
                }

                let value = match raw.parse::<f64>() {
                    Ok(n) if n.is_finite() => EntityValue::Number(n),
                    _ => EntityValue::from(raw),
                };

                let start = text[..whole.start()].chars().count();
                let end = start + whole.as_str().chars().count();
                Some(Entity::new(self.name.clone(), value, self.score).with_span(start, end))
            })
            .collect()
    }

    /// Append detected entities unless an entity of the same name covers the span
    pub fn apply(&self, text: &str, entities: &mut Vec<Entity>) -> usize {
        let mut added = 0;
        for detected in self.detect(text) {
            let (start, end) = match (detected.start, detected.end) {
                (Some(start), Some(end)) => (start, end),
                _ => continue,
            };
            let taken = entities
                .iter()
                .any(|existing| existing.entity == detected.entity && existing.overlaps(start, end));
            if !taken {
                entities.push(detected);
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_with_char_offsets() {
        let detector = EntityDetector::new("number", r"\d+", 0.95).unwrap();
        let entities = detector.detect("žádný 12 a 345");

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].value, EntityValue::Number(12.0));
        assert_eq!(entities[0].start, Some(6));
        assert_eq!(entities[0].end, Some(8));
        assert_eq!(entities[1].span_len(), Some(3));
        assert_eq!(entities[1].score, 0.95);
    }

    #[test]
    fn test_capture_group_value() {
        let detector = EntityDetector::new("email", r"mail:\s*(\S+@\S+)", 1.0).unwrap();
        let entities = detector.detect("mail: a@b.cz");

        assert_eq!(entities[0].value, EntityValue::from("a@b.cz"));
        assert_eq!(entities[0].span_len(), Some(12));
    }

    #[test]
    fn test_apply_skips_overlaps() {
        let detector = EntityDetector::new("number", r"\d+", 1.0).unwrap();
        let mut entities = vec![Entity::new("number", EntityValue::Number(12.0), 0.9).with_span(0, 2)];

        let added = detector.apply("12 and 7", &mut entities);
        assert_eq!(added, 1);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].value, EntityValue::Number(7.0));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            EntityDetector::new("broken", "(", 1.0),
            Err(NluError::InvalidPattern { .. })
        ));
    }
}
