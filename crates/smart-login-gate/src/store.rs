use std::collections::HashMap;

use smart_login_types::{Condition, ConditionId, SignalEvent};
use tracing::debug;

use crate::error::{GateError, GateResult};

/// Change notification produced by every applied status.
///
/// Carries the affected index so presentation can re-render one row.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionChange {
    pub index: usize,
    pub condition: Condition,
}

/// Ordered set of gating conditions, keyed by id for updates.
///
/// Order is presentation order and never changes after construction.
/// Owned exclusively by the aggregation controller.
#[derive(Clone, Debug)]
pub struct ConditionStore {
    conditions: Vec<Condition>,
    index: HashMap<ConditionId, usize>,
}

impl ConditionStore {
    /// Build a store from conditions in presentation order.
    ///
    /// Rejects an empty set (the gate would be vacuously open) and
    /// duplicate ids.
    pub fn new(conditions: Vec<Condition>) -> GateResult<Self> {
        if conditions.is_empty() {
            return Err(GateError::EmptyStore);
        }

        let mut index = HashMap::with_capacity(conditions.len());
        for (i, condition) in conditions.iter().enumerate() {
            if index.insert(condition.id, i).is_some() {
                return Err(GateError::DuplicateCondition(condition.id));
            }
        }

        Ok(Self { conditions, index })
    }

    /// The five application conditions, all pending.
    pub fn seeded() -> Self {
        let conditions: Vec<Condition> = ConditionId::ALL
            .iter()
            .map(|id| Condition::pending(*id, id.default_kind()))
            .collect();
        let index = conditions
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
        Self { conditions, index }
    }

    /// Update status text and pass flag for one condition.
    pub fn apply_status(
        &mut self,
        id: ConditionId,
        text: impl Into<String>,
        passed: bool,
    ) -> GateResult<ConditionChange> {
        let event = if passed {
            SignalEvent::passed(id, text)
        } else {
            SignalEvent::progress(id, text)
        };
        self.apply(&event)
    }

    /// Apply a full status event, including its failure classification.
    pub fn apply(&mut self, event: &SignalEvent) -> GateResult<ConditionChange> {
        let index = *self
            .index
            .get(&event.condition)
            .ok_or(GateError::UnknownCondition(event.condition))?;

        let condition = &mut self.conditions[index];
        condition.apply(event);

        debug!(
            condition = %event.condition,
            index,
            passed = event.passed,
            status = %event.status,
            "Condition status applied"
        );

        Ok(ConditionChange {
            index,
            condition: condition.clone(),
        })
    }

    /// True iff every condition currently passes. Recomputed on each call.
    pub fn all_passed(&self) -> bool {
        self.conditions.iter().all(|c| c.passed)
    }

    pub fn entry_for(&self, id: ConditionId) -> Option<&Condition> {
        self.index.get(&id).map(|&i| &self.conditions[i])
    }

    /// Ids of conditions not currently passing, in presentation order.
    pub fn outstanding(&self) -> Vec<ConditionId> {
        self.conditions
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.id)
            .collect()
    }

    /// Ordered clone of all conditions for rendering.
    pub fn snapshot(&self) -> Vec<Condition> {
        self.conditions.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
