//! The forwarding data plane: cooldown tracking, SWRR scheduling, and the
//! failover forwarder.

pub mod cooldown;
pub mod forwarder;
pub mod pool;
pub mod sse;

pub use cooldown::CooldownTracker;
pub use forwarder::{ForwardReply, Forwarder};
pub use pool::{PoolManager, SelectedEndpoint};

use crate::config::Settings;
use crate::types::PoolKind;

/// Resolve the requested model name to a pool.
///
/// Case-insensitive; the `haiku` test runs before `opus`, and anything
/// unmatched lands in the normal pool.
pub fn resolve_pool(model: &str, settings: &Settings) -> PoolKind {
    let model = model.to_lowercase();
    if model.contains("haiku") || model == settings.virtual_model_tool.to_lowercase() {
        PoolKind::Tool
    } else if model.contains("opus") || model == settings.virtual_model_advanced.to_lowercase() {
        PoolKind::Advanced
    } else {
        PoolKind::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("claude-haiku-4.5", PoolKind::Tool)]
    #[case("HAIKU", PoolKind::Tool)]
    #[case("claude-opus-4", PoolKind::Advanced)]
    #[case("opus", PoolKind::Advanced)]
    #[case("sonnet", PoolKind::Normal)]
    #[case("gpt-4o", PoolKind::Normal)]
    #[case("anything-else", PoolKind::Normal)]
    fn test_resolve_pool(#[case] model: &str, #[case] expected: PoolKind) {
        let settings = Settings::default();
        assert_eq!(resolve_pool(model, &settings), expected);
    }

    #[test]
    fn test_custom_virtual_names_route_exactly() {
        let settings = Settings {
            virtual_model_tool: "fast".into(),
            virtual_model_advanced: "smart".into(),
            ..Settings::default()
        };
        assert_eq!(resolve_pool("fast", &settings), PoolKind::Tool);
        assert_eq!(resolve_pool("smart", &settings), PoolKind::Advanced);
        // Substring of a custom name is not enough; exact match only.
        assert_eq!(resolve_pool("fastest", &settings), PoolKind::Normal);
    }

    #[test]
    fn test_haiku_wins_over_opus_ordering() {
        // Ordering of the substring tests is significant.
        let settings = Settings::default();
        assert_eq!(resolve_pool("haiku-opus-mix", &settings), PoolKind::Tool);
    }
}
