use indexmap::IndexMap;
use termux_cad_core::error::Error::VariableFormat;
use termux_cad_core::error::Result;

/// Parses arguments in the format `key=value`, keeping their order.
///
/// Only the first `=` separates key and value, so values may contain `=`
/// (as URLs with query strings do). A later argument overrides an earlier
/// one with the same key.
///
/// # Errors
///
/// Returns [`VariableFormat`] for an argument without `=` or with an empty key.
pub fn parse_key_values(arguments: &[String]) -> Result<IndexMap<String, String>> {
    let mut values = IndexMap::new();

    for argument in arguments {
        let Some((key, value)) = argument.split_once('=') else {
            return Err(VariableFormat(argument.to_string()));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(VariableFormat(argument.to_string()));
        }

        values.insert(key.to_string(), value.to_string());
    }

    Ok(values)
}

/// Joins the words of a trailing operation back into one shell string.
///
/// Words are not re-quoted; a word holding spaces is passed through as is.
pub fn join_operation(words: &[String]) -> String {
    words.join(" ")
}
