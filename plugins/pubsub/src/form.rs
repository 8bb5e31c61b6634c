//! XEP-0004 data forms, read-only

use pubsub_core::prelude::*;

const FORM_TYPE: &str = "FORM_TYPE";

/// read a `<x xmlns='jabber:x:data'/>` into a [`Form`]. The hidden
/// `FORM_TYPE` field is lifted out of the field list.
pub fn parse_form(x: &Element) -> Form {
    let mut form = Form {
        kind: x.attr("type").map(str::to_owned),
        title: x
            .get_child("title", ns::DATA_FORMS)
            .map(|title| title.text()),
        ..Form::default()
    };
    for field in x.children_named("field", ns::DATA_FORMS) {
        let values = field
            .children_named("value", ns::DATA_FORMS)
            .map(|value| value.text())
            .collect::<Vec<_>>();
        if field.attr("var") == Some(FORM_TYPE) {
            form.form_type = values.into_iter().next();
            continue;
        }
        form.fields.push(Field {
            var: field.attr("var").map(str::to_owned),
            kind: field.attr("type").map(str::to_owned),
            label: field.attr("label").map(str::to_owned),
            values,
        });
    }
    form
}
