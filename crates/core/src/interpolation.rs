use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use leon::Template;

use crate::error::Result;

/// Find all tokens in the given templates, in order of first appearance.
pub fn get_tokens(templates: &[Template]) -> IndexSet<String> {
    let mut tokens = IndexSet::new();

    for template in templates {
        for key in template.keys() {
            let _ = tokens.insert((*key).to_string());
        }
    }

    tokens
}

pub fn get_templates<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Template<'_>>> {
    let mut templates: Vec<Template> = Vec::new();

    for text in texts {
        templates.push(Template::parse(text.as_ref())?);
    }

    Ok(templates)
}

/// Renders `text` with the plan variables.
pub fn interpolate(text: &str, variables: &IndexMap<String, String>) -> Result<String> {
    let lookup: HashMap<String, String> = variables
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Template::parse(text)?.render(&lookup)?)
}
