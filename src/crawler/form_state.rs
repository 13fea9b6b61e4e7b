//! Hidden form state carried between postbacks

use crate::crawler::planner::PaginationTarget;
use crate::document::ParsedDocument;

pub const VIEWSTATE: &str = "__VIEWSTATE";
pub const VIEWSTATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";
pub const EVENT_TARGET: &str = "__EVENTTARGET";
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";

/// Hidden fields read from every page, in the order they are echoed back
const STATE_FIELDS: [&str; 3] = [VIEWSTATE, VIEWSTATE_GENERATOR, EVENT_VALIDATION];

/// Server-issued tokens captured from exactly one response
///
/// The tokens rotate, so a `FormState` is only good for the postback that
/// immediately follows the page it was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    fields: Vec<(String, String)>,
}

impl FormState {
    /// Value of a captured field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of captured fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the page carried none of the hidden fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Form body that fires `target`: event target and argument first, then
    /// every captured field verbatim
    pub fn postback_form(&self, target: &PaginationTarget) -> Vec<(String, String)> {
        let mut form = Vec::with_capacity(self.fields.len() + 2);
        form.push((EVENT_TARGET.to_string(), target.target.clone()));
        form.push((EVENT_ARGUMENT.to_string(), target.argument.clone()));
        form.extend(self.fields.iter().cloned());
        form
    }
}

/// Reads the view-state, view-state generator and event validation fields
///
/// Fields that are absent or empty are left out; a page without any of them
/// yields an empty state rather than an error.
pub fn extract_form_state<D: ParsedDocument + ?Sized>(doc: &D) -> FormState {
    let fields = STATE_FIELDS
        .iter()
        .filter_map(|name| {
            doc.hidden_field(name)
                .filter(|value| !value.is_empty())
                .map(|value| (name.to_string(), value))
        })
        .collect();

    FormState { fields }
}
