//! Waiting for a volume's remote record to change after attach or detach.
//!
//! The control API has no notifications, so completion is detected by
//! re-fetching the volume listing at a fixed interval and comparing the
//! target record against the snapshot taken before the request. Any field
//! change counts.

use std::time::Duration;

use atmocl_api::AtmoApi;
use atmocl_core::{Volume, VolumeId};
use serde::Deserialize;
use tracing::{debug, warn};

/// Attempt budget and spacing for [`wait_for_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollConfig {
    /// Maximum number of listing fetches.
    #[serde(default = "PollConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Sleep before each fetch.
    #[serde(default = "PollConfig::default_delay", with = "crate::config::seconds")]
    pub delay: Duration,
}

impl PollConfig {
    const fn default_max_attempts() -> u32 {
        3
    }

    const fn default_delay() -> Duration {
        Duration::from_secs(10)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            delay: Self::default_delay(),
        }
    }
}

/// Result of polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A difference was observed on the given attempt (1-based).
    Changed {
        /// Attempt on which the change was seen.
        attempts: u32,
    },
    /// No difference was observed within the budget.
    TimedOut {
        /// Attempts made.
        attempts: u32,
    },
}

/// Poll the volume listing until the record for `id` differs from `prior`.
///
/// Each attempt sleeps for `config.delay`, then fetches the whole listing.
/// A record that vanished from the listing counts as changed. A failed
/// fetch is logged and counts as an attempt with no change.
pub async fn wait_for_change<A>(
    api: &A,
    id: &VolumeId,
    prior: &Volume,
    config: PollConfig,
    mut on_attempt: impl FnMut(u32, u32) + Send,
) -> PollOutcome
where
    A: AtmoApi + ?Sized,
{
    for attempt in 1..=config.max_attempts {
        on_attempt(attempt, config.max_attempts);
        tokio::time::sleep(config.delay).await;

        let volumes = match api.list_volumes().await {
            Ok(volumes) => volumes,
            Err(e) => {
                warn!(volume_id = %id, attempt, error = %e, "Volume refresh failed");
                continue;
            }
        };

        match volumes.iter().find(|volume| volume.id.matches(id)) {
            None => {
                debug!(volume_id = %id, attempt, "Volume left the listing");
                return PollOutcome::Changed { attempts: attempt };
            }
            Some(current) if current != prior => {
                debug!(
                    volume_id = %id,
                    attempt,
                    before = %prior.status,
                    after = %current.status,
                    "Volume record changed"
                );
                return PollOutcome::Changed { attempts: attempt };
            }
            Some(_) => debug!(volume_id = %id, attempt, "No change yet"),
        }
    }

    PollOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmocl_api::MockAtmoApi;

    fn volume(status: &str) -> Volume {
        Volume {
            id: VolumeId::parse("vol-0000ABCD").unwrap(),
            name: "data".to_string(),
            tags: String::new(),
            description: String::new(),
            status: status.to_string(),
            size: 10,
            create_time: String::new(),
            attached_device: None,
            attached_instance_id: None,
            attach_time: None,
            snapshot_id: None,
            num: 1,
        }
    }

    fn instant() -> PollConfig {
        PollConfig {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }

    fn id() -> VolumeId {
        VolumeId::parse("vol-0000abcd").unwrap()
    }

    #[tokio::test]
    async fn change_on_nth_poll_returns_after_n_polls() {
        for n in 1..=3u32 {
            let prior = volume("available");
            let api = MockAtmoApi::new().with_volumes(vec![prior.clone()]);
            for _ in 1..n {
                api.push_volume_listing(vec![prior.clone()]);
            }
            api.push_volume_listing(vec![volume("in-use")]);

            let outcome = wait_for_change(&api, &id(), &prior, instant(), |_, _| {}).await;
            assert_eq!(outcome, PollOutcome::Changed { attempts: n });
            assert_eq!(api.listing_count(), n as usize);
        }
    }

    #[tokio::test]
    async fn no_change_times_out_after_budget() {
        let prior = volume("available");
        let api = MockAtmoApi::new().with_volumes(vec![prior.clone()]);

        let mut seen = Vec::new();
        let outcome =
            wait_for_change(&api, &id(), &prior, instant(), |n, max| seen.push((n, max))).await;
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 3 });
        assert_eq!(api.listing_count(), 3);
        assert_eq!(seen, [(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn any_field_change_counts() {
        let prior = volume("in-use");
        let mut later = prior.clone();
        later.attach_time = Some("2011-07-11T10:05:00Z".to_string());
        let api = MockAtmoApi::new().with_volumes(vec![later]);

        let outcome = wait_for_change(&api, &id(), &prior, instant(), |_, _| {}).await;
        assert!(matches!(outcome, PollOutcome::Changed { .. }));
    }

    #[tokio::test]
    async fn vanished_record_counts_as_changed() {
        let prior = volume("available");
        let api = MockAtmoApi::new();

        let outcome = wait_for_change(&api, &id(), &prior, instant(), |_, _| {}).await;
        assert_eq!(outcome, PollOutcome::Changed { attempts: 1 });
    }

    #[tokio::test]
    async fn fetch_errors_use_up_attempts() {
        let prior = volume("available");
        let api = MockAtmoApi::new().with_volumes(vec![prior.clone()]);
        api.fail_listing();

        let outcome = wait_for_change(&api, &id(), &prior, instant(), |_, _| {}).await;
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 3 });
    }

    #[test]
    fn default_budget() {
        let config = PollConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay, Duration::from_secs(10));
    }

    #[test]
    fn config_from_json_seconds() {
        let config: PollConfig = serde_json::from_str(r#"{"delay": 2}"#).unwrap();
        assert_eq!(config.delay, Duration::from_secs(2));
        assert_eq!(config.max_attempts, 3);
    }
}
