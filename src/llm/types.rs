/// One vendor-agnostic completion call: a system instruction plus a single
/// user turn.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    /// Correlates the call with the item it is about, e.g. `raid-42`.
    pub session_tag: String,
    pub temperature: f64,
    pub max_tokens: i32,
}
