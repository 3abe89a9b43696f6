//! Tunable rates and thresholds for the simulation.

use serde::{Deserialize, Serialize};

/// Rates and thresholds used by the controller and by time advancement.
///
/// Scenarios may override any subset of these; omitted fields keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Need-attention gained per second by every part holding a grievance
    pub grievance_attention_rate: f64,

    /// Seconds between grievance messages from a source to each target
    pub grievance_interval: f64,

    /// Most messages one source sends each target in a single advance; a
    /// longer jump keeps only the latest intervals
    pub grievance_burst_limit: u64,

    /// Seconds a grievance message travels before delivery
    pub message_travel_time: f64,

    /// Need-attention added to the recipient of a delivered grievance
    pub attack_attention: f64,

    /// Need-attention at which an absent part queues a spontaneous blend
    pub attention_blend_threshold: f64,

    /// Seconds between queueing a pending blend and it taking effect
    pub pending_blend_delay: f64,

    /// Degree of a spontaneous blend
    pub spontaneous_degree: f64,

    /// Blend degree lost per second while blended
    pub blend_decay_rate: f64,

    /// Degree removed by one `separate` request
    pub separate_amount: f64,

    /// Trust gained per answered question, before openness/target scaling
    pub ray_trust_gain: f64,

    /// Trust lost when re-asking an already answered question
    pub already_told_penalty: f64,

    /// Trust required before gated fields are answered
    pub high_trust_gate: f64,

    /// Scale on `(1 - trust)` for the chance of deflecting an ungated field
    pub deflect_scale: f64,

    /// Base probability of clearing a proxy on `who_do_you_see`
    pub proxy_clear_base: f64,

    /// Trust gained when a part with no proxies sees the self
    pub sees_self_gain: f64,

    /// Flat trust gain on recognition
    pub recognition_base: f64,

    /// Share of the trust gap that flows on protector/protectee recognition
    pub recognition_rate: f64,

    /// Trust gained by the target of a generic notice
    pub notice_gain: f64,

    /// Trust lost by a protectee when its protector lashes back
    pub backlash_trust_loss: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            grievance_attention_rate: 0.01,
            grievance_interval: 10.0,
            grievance_burst_limit: 16,
            message_travel_time: 1.0,
            attack_attention: 0.05,
            attention_blend_threshold: 1.0,
            pending_blend_delay: 2.0,
            spontaneous_degree: 0.7,
            blend_decay_rate: 0.01,
            separate_amount: 0.3,
            ray_trust_gain: 0.2,
            already_told_penalty: 0.05,
            high_trust_gate: 0.6,
            deflect_scale: 0.3,
            proxy_clear_base: 0.3,
            sees_self_gain: 0.05,
            recognition_base: 0.05,
            recognition_rate: 0.5,
            notice_gain: 0.02,
            backlash_trust_loss: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let tuning: Tuning = serde_json::from_str(r#"{"grievance_interval": 3.0}"#).unwrap();
        assert_eq!(tuning.grievance_interval, 3.0);
        assert_eq!(tuning.grievance_attention_rate, 0.01);
    }
}
