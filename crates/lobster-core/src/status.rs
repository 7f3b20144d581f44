//! Tracing status evaluation
//!
//! The status of an item only depends on a handful of facts about it and on
//! which of its level's breakdown requirements are satisfied. [`evaluate`]
//! is that pure function; [`determine_status`] gathers the facts for one
//! item and [`assign_statuses`] applies the result to every item.

use crate::config::{Config, TraceGroup};
use crate::item::{Item, ItemMap, TracingStatus};
use tracing::debug;

/// What the status engine needs to know about an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Facts {
    pub needs_tracing_up: bool,
    pub needs_tracing_down: bool,
    pub has_up_ref: bool,
    /// Up or global justification present.
    pub has_just_up: bool,
    /// Down or global justification present.
    pub has_just_down: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: TracingStatus,
    pub messages: Vec<String>,
}

/// Classify an item. `chains` yields each breakdown requirement together
/// with whether one of the item's down references comes from a level in it.
pub fn evaluate<'a>(
    facts: Facts,
    chains: impl IntoIterator<Item = (&'a TraceGroup, bool)>,
) -> Evaluation {
    let mut messages = Vec::new();

    let mut ok_up = true;
    if facts.needs_tracing_up && !facts.has_up_ref && !facts.has_just_up {
        ok_up = false;
        messages.push("missing up reference".to_string());
    }

    let mut ok_down = true;
    if facts.needs_tracing_down {
        for (chain, satisfied) in chains {
            if !satisfied && !facts.has_just_down {
                ok_down = false;
                messages.push(format!("missing reference to {}", chain.join(" or ")));
            }
        }
    }

    let status = if ok_up && ok_down {
        if facts.has_just_up || facts.has_just_down {
            TracingStatus::Justified
        } else {
            TracingStatus::Ok
        }
    } else if (ok_up || ok_down) && facts.needs_tracing_up && facts.needs_tracing_down {
        TracingStatus::Partial
    } else {
        TracingStatus::Missing
    };

    Evaluation { status, messages }
}

/// Evaluate one item against its level and the rest of the item map.
///
/// An item whose level is not part of the policy cannot be evaluated and
/// gets [`TracingStatus::Error`].
pub fn determine_status(item: &Item, config: &Config, items: &ItemMap) -> Evaluation {
    let Some(level) = config.get(&item.level) else {
        return Evaluation {
            status: TracingStatus::Error,
            messages: vec![format!("level '{}' is not part of the policy", item.level)],
        };
    };

    let has_global = !item.just_global.is_empty();
    let facts = Facts {
        needs_tracing_up: level.needs_tracing_up,
        needs_tracing_down: level.needs_tracing_down,
        has_up_ref: !item.ref_up.is_empty(),
        has_just_up: !item.just_up.is_empty() || has_global,
        has_just_down: !item.just_down.is_empty() || has_global,
    };

    let down_levels: Vec<&str> = item
        .ref_down
        .iter()
        .filter_map(|tag| items.get(&tag.key()))
        .map(|owner| owner.level.as_str())
        .collect();

    let chains = level.breakdown_requirements.iter().map(|chain| {
        let satisfied = chain.iter().any(|name| down_levels.contains(&name.as_str()));
        (chain, satisfied)
    });

    evaluate(facts, chains)
}

/// Assign a status to every item, appending the evaluation's messages.
pub fn assign_statuses(config: &Config, items: &mut ItemMap) {
    let evaluations: Vec<(String, Evaluation)> = items
        .iter()
        .map(|(key, item)| (key.clone(), determine_status(item, config, items)))
        .collect();

    for (key, evaluation) in evaluations {
        if let Some(item) = items.get_mut(&key) {
            item.messages.extend(evaluation.messages);
            item.tracing_status = Some(evaluation.status);
        }
    }
    debug!(items = items.len(), "assigned tracing status");
}
