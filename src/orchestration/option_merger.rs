use crate::constants::HANDLER_OPTION_PREFIX;
use std::collections::BTreeMap;

/// Overlay caller options onto tool defaults.
///
/// Caller keys are namespaced with `handler-` so `foo` lands as `handler-foo`
/// and never overwrites a tool default of the same name. Absent maps count
/// as empty.
pub fn merge_options(
    tool_defaults: Option<&BTreeMap<String, String>>,
    caller_options: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut merged = tool_defaults.cloned().unwrap_or_default();
    if let Some(caller_options) = caller_options {
        merged.extend(
            caller_options
                .iter()
                .map(|(key, value)| (format!("{HANDLER_OPTION_PREFIX}{key}"), value.clone())),
        );
    }
    merged
}
