//! Reference resolution
//!
//! Links each item's declared targets into `ref_up` on the referencing item
//! and `ref_down` on the referenced one. Resolution is computed against a
//! snapshot of the declared targets first and applied afterwards, so the
//! result does not depend on the order items are visited in.

use crate::diagnostics::Diagnostics;
use crate::item::ItemMap;
use crate::tag::Tag;
use tracing::{debug, trace};

/// Outcome of resolving one declared target.
struct Link<'a> {
    source: &'a str,
    target: &'a Tag,
    /// False if the target does not exist.
    found: bool,
    message: Option<String>,
}

/// Drain every item's unresolved references into the reference graph.
///
/// A reference to an unknown tag, or with a version that does not match
/// the target, adds a message to the referencing item and a non-fatal error
/// diagnostic at its location. Duplicate references are kept.
pub fn resolve_references(items: &mut ItemMap, diagnostics: &mut Diagnostics) {
    let pending: Vec<(String, Vec<Tag>)> = items
        .iter_mut()
        .map(|(key, item)| (key.clone(), std::mem::take(&mut item.unresolved_references)))
        .collect();

    let links: Vec<Link<'_>> = pending
        .iter()
        .flat_map(|(source, targets)| {
            targets.iter().map(move |target| Link {
                source,
                target,
                found: false,
                message: None,
            })
        })
        .map(|link| check(items, link))
        .collect();

    let mut resolved = 0;
    for link in &links {
        let Some(source) = items.get_mut(link.source) else {
            continue;
        };
        let source_tag = source.tag.clone();
        if let Some(message) = &link.message {
            source.messages.push(message.clone());
            diagnostics.error(source.location.clone(), message.clone());
        }
        if !link.found {
            debug!(source = %source_tag, target = %link.target, "unknown tracing target");
            continue;
        }

        source.ref_up.push(link.target.clone());
        if let Some(target) = items.get_mut(&link.target.key()) {
            target.ref_down.push(source_tag);
        }
        resolved += 1;
    }

    debug!(resolved, declared = links.len(), "resolved references");
}

fn check<'a>(items: &ItemMap, mut link: Link<'a>) -> Link<'a> {
    let key = link.target.key();
    let Some(target) = items.get(&key) else {
        link.message = Some(format!("unknown tracing target {key}"));
        return link;
    };
    link.found = true;
    trace!(source = link.source, target = %key, "link");

    if let Some(wanted) = link.target.version() {
        link.message = match target.tag.version() {
            None => Some(format!("tracing destination {key} is unversioned")),
            Some(actual) if actual != wanted => Some(format!(
                "tracing destination {key} has version {actual} (expected {wanted})"
            )),
            Some(_) => None,
        };
    }
    link
}
