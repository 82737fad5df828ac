//! Default context windows for known model families.
//!
//! Tables are keyed by model id prefix and matched longest prefix first,
//! so `gpt-4-32k` wins over `gpt-4` regardless of table order.

/// Context window assumed for models missing from the table.
pub const DEFAULT_CONTEXT_LIMIT: usize = 4_095;

const CONTEXT_LIMITS: &[(&str, usize)] = &[
    ("gpt-5", 400_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4.5", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-vision", 128_000),
    ("gpt-4-1106", 128_000),
    ("gpt-4-0125", 128_000),
    ("gpt-4-32k", 32_768),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo-instruct", 4_096),
    ("gpt-3.5-turbo-0301", 4_096),
    ("gpt-3.5-turbo-0613", 4_096),
    ("gpt-3.5-turbo-16k", 16_385),
    ("gpt-3.5-turbo", 16_385),
    ("text-davinci", 4_097),
    ("o1-mini", 128_000),
    ("o1", 200_000),
    ("o3", 200_000),
    ("o4", 200_000),
    ("claude-", 200_000),
    ("deepseek-", 64_000),
    ("grok-", 131_072),
    ("qwen-", 32_768),
    ("qwq-", 32_768),
    ("llava", 4_096),
];

/// Look up `model` in a prefix table, longest matching prefix first.
pub(crate) fn lookup<T: Copy>(table: &[(&str, T)], model: &str) -> Option<T> {
    table
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, value)| *value)
}

/// Returns the default context limit (in tokens) for a model id.
pub fn default_context_limit(model: &str) -> usize {
    lookup(CONTEXT_LIMITS, model).unwrap_or(DEFAULT_CONTEXT_LIMIT)
}
