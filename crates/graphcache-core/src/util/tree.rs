//! Walking results alongside a parsed query.

use crate::query::ParsedQuery;
use crate::value::Value;

/// Depth-first walk of `result` following `root`.
///
/// `visitor` is called for every non-null value the query selects fields on,
/// with the selected response keys; `None` stands for a missing value. Lists
/// fan out to their items and `null` satisfies any selection. Returning true
/// from the visitor stops the walk.
pub fn walk_operation<'a, A>(
    root: &'a ParsedQuery<A>,
    result: Option<&'a Value>,
    mut visitor: impl FnMut(Option<&'a Value>, &[&'a str]) -> bool,
) {
    let mut stack = vec![(root, result)];

    while let Some((parsed, parent)) = stack.pop() {
        let parent = parent.filter(|value| !value.is_absent());
        match parent {
            Some(Value::Null) => continue,
            Some(Value::List(items)) => {
                // Reversed, so items are visited in order.
                for item in items.iter().rev() {
                    stack.push((parsed, Some(item)));
                }
                continue;
            }
            _ => {}
        }

        let mut fields = Vec::with_capacity(parsed.len());
        for (name, node) in parsed {
            fields.push(name.as_str());
            if let Some(children) = &node.children {
                stack.push((children, parent.and_then(|value| value.get(name))));
            }
        }

        if !fields.is_empty() && visitor(parent, &fields) {
            return;
        }
    }
}
