//! Property-based tests for stream URL origin validation
//!
//! Every URL whose host falls outside the trusted suffixes must be rejected
//! with `UntrustedOrigin`, however it is dressed up.

use proptest::prelude::*;
use soul_core::{ResolutionError, TrustTier};
use soul_server_client::TrustPolicy;

// ===== Helpers =====

/// Hosts that look plausible but end in an untrusted registrable domain.
fn untrusted_host() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z0-9]{1,12}", 0..3),
        prop::sample::select(vec![
            "cloudfront.net",
            "s3.amazonaws.com",
            "amazonaws.com",
            "localhost",
            "",
        ]),
        prop::sample::select(vec!["evil.com", "example.org", "attacker.io", "cdn.net"]),
    )
        .prop_map(|(labels, decoy, tail)| {
            let mut parts: Vec<String> = labels;
            if !decoy.is_empty() {
                parts.push(decoy.to_string());
            }
            parts.push(tail.to_string());
            parts.join(".")
        })
}

fn scheme() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["http", "https"])
}

// ===== Property Tests =====

proptest! {
    /// Property: untrusted hosts are always rejected
    #[test]
    fn untrusted_hosts_always_rejected(
        scheme in scheme(),
        host in untrusted_host(),
        path in "[a-z0-9/]{0,20}",
        query in proptest::option::of("[a-zA-Z0-9=&]{1,30}"),
    ) {
        let mut raw = format!("{scheme}://{host}/{path}master.m3u8");
        if let Some(q) = query {
            raw.push('?');
            raw.push_str(&q);
        }

        let result = TrustPolicy::default().validate(&raw);
        prop_assert!(
            matches!(result, Err(ResolutionError::UntrustedOrigin(_))),
            "{} was accepted: {:?}", raw, result
        );
    }

    /// Property: trusted hosts smuggled into userinfo, path or query never count
    #[test]
    fn trusted_names_outside_host_ignored(
        host in untrusted_host(),
        trusted in prop::sample::select(vec!["d1.cloudfront.net", "bucket.s3.amazonaws.com", "localhost"]),
        placement in 0usize..3,
    ) {
        let raw = match placement {
            0 => format!("https://{trusted}@{host}/a.m3u8"),
            1 => format!("https://{host}/{trusted}/a.m3u8"),
            _ => format!("https://{host}/a.m3u8?u=https://{trusted}/"),
        };

        prop_assert!(TrustPolicy::default().validate(&raw).is_err(), "{} was accepted", raw);
    }

    /// Property: any CloudFront distribution over https is primary
    #[test]
    fn cloudfront_distributions_are_primary(dist in "[a-z0-9]{1,16}", path in "[a-z0-9/]{0,20}") {
        let raw = format!("https://{dist}.cloudfront.net/{path}");
        let endpoint = TrustPolicy::default().validate(&raw).unwrap();
        prop_assert_eq!(endpoint.tier, TrustTier::Primary);
    }

    /// Property: an empty policy trusts nothing
    #[test]
    fn empty_policy_rejects_everything(dist in "[a-z0-9]{1,16}") {
        let raw = format!("https://{dist}.cloudfront.net/a.m3u8");
        prop_assert!(TrustPolicy::empty().validate(&raw).is_err());
    }
}
