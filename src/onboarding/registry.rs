//! Step registry: the fixed, ordered catalogue of onboarding steps.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::RegistryError;

/// One named stage of the onboarding flow and its position in the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub id: String,
    pub index: usize,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Validated, ordered list of step identifiers.
///
/// Non-empty and duplicate-free. Order never changes after construction.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    steps: Vec<Step>,
}

impl StepRegistry {
    pub fn new<I, S>(ids: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut steps = Vec::new();

        for (index, id) in ids.into_iter().enumerate() {
            let id: String = id.into();
            if id.trim().is_empty() {
                return Err(RegistryError::BlankStep(index));
            }
            if !seen.insert(id.clone()) {
                return Err(RegistryError::DuplicateStep(id));
            }
            steps.push(Step { id, index });
        }

        if steps.is_empty() {
            return Err(RegistryError::Empty);
        }

        Ok(Self { steps })
    }

    /// Position of `id`, or `None` for an unrecognized identifier.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Step at `index`, or `None` past either end.
    pub fn step_at(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn is_valid(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn first(&self) -> &Step {
        &self.steps[0]
    }

    pub fn last(&self) -> &Step {
        &self.steps[self.steps.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn next_after(&self, index: usize) -> Option<&Step> {
        self.step_at(index.checked_add(1)?)
    }

    pub fn previous_before(&self, index: usize) -> Option<&Step> {
        self.step_at(index.checked_sub(1)?)
    }

    /// Resolve a server-provided resume pointer.
    ///
    /// Missing or unrecognized identifiers fall back to the first step.
    pub fn resolve(&self, id: Option<&str>) -> &Step {
        id.and_then(|id| self.index_of(id))
            .and_then(|i| self.step_at(i))
            .unwrap_or_else(|| self.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StepRegistry {
        StepRegistry::new(["terms", "basic-info", "phone-verification", "review"]).unwrap()
    }

    #[test]
    fn index_round_trips_for_every_step() {
        let registry = sample();
        for step in registry.steps() {
            let i = registry.index_of(&step.id).unwrap();
            let again = registry.step_at(i).unwrap();
            assert_eq!(registry.index_of(&again.id), Some(i));
            assert_eq!(step.index, i);
        }
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let registry = sample();
        assert_eq!(registry.index_of("not-a-real-step"), None);
        assert!(!registry.is_valid("not-a-real-step"));
        assert!(registry.is_valid("phone-verification"));
    }

    #[test]
    fn step_at_out_of_bounds() {
        let registry = sample();
        assert!(registry.step_at(4).is_none());
        assert!(registry.next_after(3).is_none());
        assert!(registry.previous_before(0).is_none());
        assert_eq!(registry.next_after(0).unwrap().id, "basic-info");
        assert_eq!(registry.previous_before(3).unwrap().id, "phone-verification");
    }

    #[test]
    fn rejects_duplicates_blank_and_empty() {
        assert_eq!(
            StepRegistry::new(["terms", "review", "terms"]).unwrap_err(),
            RegistryError::DuplicateStep("terms".to_string())
        );
        assert_eq!(
            StepRegistry::new(["terms", "  "]).unwrap_err(),
            RegistryError::BlankStep(1)
        );
        assert_eq!(
            StepRegistry::new(Vec::<String>::new()).unwrap_err(),
            RegistryError::Empty
        );
    }

    #[test]
    fn resolve_defaults_to_first() {
        let registry = sample();
        assert_eq!(registry.resolve(Some("phone-verification")).id, "phone-verification");
        assert_eq!(registry.resolve(Some("not-a-real-step")).id, "terms");
        assert_eq!(registry.resolve(None).id, "terms");
        assert_eq!(registry.first().id, "terms");
        assert_eq!(registry.last().id, "review");
    }
}
