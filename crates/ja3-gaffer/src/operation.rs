use ja3_domain::MutationBatch;
use serde::Serialize;

pub const ADD_ELEMENTS_CLASS: &str = "uk.gov.gchq.gaffer.operation.impl.add.AddElements";

/// Bulk "add elements" operation wrapping one mutation batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddElements<'a> {
    class: &'static str,
    validate: bool,
    skip_invalid_elements: bool,
    input: &'a MutationBatch,
}

impl<'a> AddElements<'a> {
    /// Validated insert that fails the whole operation on an invalid element.
    pub fn validated(input: &'a MutationBatch) -> Self {
        Self {
            class: ADD_ELEMENTS_CLASS,
            validate: true,
            skip_invalid_elements: false,
            input,
        }
    }
}
