use std::sync::{Arc, Barrier};
use std::thread;

use base64::Engine as _;

use super::{Identity, NonceCipher, RejectReason, ReplayGuard, ReplayPolicy, Verdict};

const KEY: &[u8] = b"replay-guard-key";
const NOW: i64 = 1_750_000_000_000;

fn cipher() -> NonceCipher {
    NonceCipher::new(KEY).expect("test key should be accepted")
}

fn guard() -> ReplayGuard {
    ReplayGuard::new(cipher(), ReplayPolicy::default())
}

fn nonce(seed: u8) -> String {
    cipher().encrypt(&format!("nonce-{seed}|{NOW}"), [seed; 16])
}

fn alice() -> Identity {
    Identity::new("alice").expect("identity should be valid")
}

#[test]
fn admits_fresh_request_and_records_nonce() {
    let guard = guard();
    let n1 = nonce(1);

    assert_eq!(guard.admit(&alice(), &n1, NOW, NOW), Verdict::Accept);
    assert!(guard.contains_nonce(&n1));
    assert_eq!(guard.last_seen(&alice()), Some(NOW));
}

#[test]
fn same_nonce_never_admits_twice() {
    let guard = guard();
    let n1 = nonce(1);
    let bob = Identity::new("bob").expect("identity should be valid");

    assert!(guard.admit(&alice(), &n1, NOW, NOW).is_accepted());

    // Later, from the same or another identity, inside the window.
    for (identity, offset) in [(alice(), 5_000), (bob.clone(), 10_000), (bob, 240_000)] {
        assert_eq!(
            guard.admit(&identity, &n1, NOW + offset, NOW + offset),
            Verdict::Reject(RejectReason::Replay)
        );
    }
}

#[test]
fn whitespace_padded_copy_of_a_used_nonce_is_not_admitted() {
    let guard = guard();
    let n1 = nonce(1);
    let bob = Identity::new("bob").expect("identity should be valid");
    let carol = Identity::new("carol").expect("identity should be valid");

    assert!(guard.admit(&alice(), &n1, NOW, NOW).is_accepted());
    assert_eq!(
        guard.admit(&bob, &n1, NOW, NOW),
        Verdict::Reject(RejectReason::Replay)
    );
    assert_eq!(
        guard.admit(&bob, &format!("{n1} "), NOW, NOW),
        Verdict::Reject(RejectReason::DecryptionFailure)
    );
    assert_eq!(
        guard.admit(&carol, &format!("\t{n1}"), NOW, NOW),
        Verdict::Reject(RejectReason::DecryptionFailure)
    );
    assert_eq!(guard.used_nonce_count(), 1);
}

#[test]
fn expired_but_unswept_nonce_still_blocks_reuse() {
    let guard = guard();
    let policy = guard.policy();
    let n1 = nonce(1);
    assert!(guard.admit(&alice(), &n1, NOW, NOW).is_accepted());

    // Expiry is NOW + max_age; at exactly that instant the entry is expired
    // in spirit but not yet strictly before `now`, so no sweep removes it.
    let at_expiry = NOW + policy.max_age_ms;
    assert_eq!(
        guard.admit(&alice(), &n1, at_expiry, at_expiry),
        Verdict::Reject(RejectReason::Replay)
    );
}

#[test]
fn window_rejects_stale_and_accepts_just_inside() {
    let guard = guard();
    let max_age = guard.policy().max_age_ms;

    assert_eq!(
        guard.admit(&alice(), &nonce(1), NOW - max_age - 1, NOW),
        Verdict::Reject(RejectReason::StaleTimestamp)
    );
    assert_eq!(
        guard.admit(&alice(), &nonce(2), NOW - max_age + 1, NOW),
        Verdict::Accept
    );
}

#[test]
fn window_tolerates_bounded_future_skew() {
    let guard = guard();
    let skew = guard.policy().clock_skew_ms;

    assert_eq!(
        guard.admit(&alice(), &nonce(1), NOW + skew + 1, NOW),
        Verdict::Reject(RejectReason::FutureTimestamp)
    );
    assert_eq!(
        guard.admit(&alice(), &nonce(2), NOW + skew - 1, NOW),
        Verdict::Accept
    );
}

#[test]
fn rate_limits_requests_closer_than_min_interval() {
    let guard = guard();
    let interval = guard.policy().min_interval_ms;

    assert!(guard.admit(&alice(), &nonce(1), NOW, NOW).is_accepted());
    let soon = NOW + interval - 1;
    assert_eq!(
        guard.admit(&alice(), &nonce(2), soon, soon),
        Verdict::Reject(RejectReason::RateLimited)
    );

    // The rejected request did not consume its nonce.
    assert!(!guard.contains_nonce(&nonce(2)));

    let later = NOW + interval + 1;
    assert_eq!(guard.admit(&alice(), &nonce(2), later, later), Verdict::Accept);
}

#[test]
fn rate_limit_is_per_identity() {
    let guard = guard();
    let bob = Identity::new("bob").expect("identity should be valid");

    assert!(guard.admit(&alice(), &nonce(1), NOW, NOW).is_accepted());
    assert!(guard.admit(&bob, &nonce(2), NOW, NOW).is_accepted());
}

#[test]
fn undecryptable_nonce_is_rejected_and_not_recorded() {
    let guard = guard();
    let engine = base64::engine::general_purpose::STANDARD;
    let mut corrupted = engine.decode(nonce(1)).expect("own nonce should decode");
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x5a;
    let corrupted = engine.encode(corrupted);

    for bad in ["", "%%%not-base64%%%", "AAAAAAAAAAAAAAAAAAAAAA==", corrupted.as_str()] {
        if cipher().decrypt(bad).is_ok() {
            continue;
        }
        assert_eq!(
            guard.admit(&alice(), bad, NOW, NOW),
            Verdict::Reject(RejectReason::DecryptionFailure)
        );
    }

    assert_eq!(guard.last_seen(&alice()), None);
    assert_eq!(guard.used_nonce_count(), 0);
}

#[test]
fn wrong_key_nonce_is_admitted_only_if_it_decrypts() {
    let guard = guard();
    let foreign = NonceCipher::new(b"another-key-0000")
        .expect("key should be accepted")
        .encrypt("nonce-from-an-impostor", [7; 16]);

    let verdict = guard.admit(&alice(), &foreign, NOW, NOW);
    if cipher().decrypt(&foreign).is_err() {
        assert_eq!(verdict, Verdict::Reject(RejectReason::DecryptionFailure));
    } else {
        assert_eq!(verdict, Verdict::Accept);
    }
}

#[test]
fn checks_run_in_order_first_failure_wins() {
    let guard = guard();
    let n1 = nonce(1);
    assert!(guard.admit(&alice(), &n1, NOW, NOW).is_accepted());

    // Stale timestamp outranks rate limiting and replay.
    assert_eq!(
        guard.admit(&alice(), &n1, NOW - 10 * 60 * 1000, NOW),
        Verdict::Reject(RejectReason::StaleTimestamp)
    );
    // Rate limiting outranks replay.
    assert_eq!(
        guard.admit(&alice(), &n1, NOW, NOW + 10),
        Verdict::Reject(RejectReason::RateLimited)
    );
    // Replay outranks decryption for an identity that is not rate limited.
    let bob = Identity::new("bob").expect("identity should be valid");
    assert_eq!(
        guard.admit(&bob, &n1, NOW, NOW + 10),
        Verdict::Reject(RejectReason::Replay)
    );
}

#[test]
fn sweep_removes_only_entries_expired_before_now() {
    let guard = guard();
    let max_age = guard.policy().max_age_ms;
    let bob = Identity::new("bob").expect("identity should be valid");

    assert!(guard.admit(&alice(), &nonce(1), NOW, NOW).is_accepted());
    assert!(guard.admit(&bob, &nonce(2), NOW + 1000, NOW + 1000).is_accepted());
    assert_eq!(guard.used_nonce_count(), 2);

    assert_eq!(guard.sweep(NOW + max_age), 0);
    assert_eq!(guard.sweep(NOW + max_age + 1), 1);
    assert!(!guard.contains_nonce(&nonce(1)));
    assert!(guard.contains_nonce(&nonce(2)));
    assert_eq!(guard.sweep(NOW + max_age + 1001), 1);
    assert_eq!(guard.used_nonce_count(), 0);
}

#[test]
fn commit_sweeps_expired_entries_opportunistically() {
    let guard = guard();
    let max_age = guard.policy().max_age_ms;
    let bob = Identity::new("bob").expect("identity should be valid");

    assert!(guard.admit(&alice(), &nonce(1), NOW, NOW).is_accepted());
    let much_later = NOW + max_age + 5_000;
    assert!(
        guard
            .admit(&bob, &nonce(2), much_later, much_later)
            .is_accepted()
    );

    assert!(!guard.contains_nonce(&nonce(1)));
    assert_eq!(guard.used_nonce_count(), 1);
}

#[test]
fn swept_nonce_replay_is_still_stopped_by_the_window() {
    let guard = guard();
    let max_age = guard.policy().max_age_ms;
    let n1 = nonce(1);

    assert!(guard.admit(&alice(), &n1, NOW, NOW).is_accepted());
    let much_later = NOW + max_age + 5_000;
    assert_eq!(guard.sweep(much_later), 1);

    // The replayed request carries its original timestamp.
    assert_eq!(
        guard.admit(&alice(), &n1, NOW, much_later),
        Verdict::Reject(RejectReason::StaleTimestamp)
    );
}

#[test]
fn alice_scenario() {
    let guard = guard();
    let n1 = nonce(1);
    let n2 = nonce(2);

    assert_eq!(guard.admit(&alice(), &n1, NOW, NOW), Verdict::Accept);
    assert!(guard.contains_nonce(&n1));

    assert!(!guard.admit(&alice(), &n1, NOW, NOW).is_accepted());

    let later = NOW + guard.policy().min_interval_ms + 1;
    assert_eq!(guard.admit(&alice(), &n2, later, later), Verdict::Accept);
}

#[test]
fn concurrent_presentations_of_one_nonce_admit_at_most_once() {
    let guard = Arc::new(guard());
    let shared_nonce = nonce(42);
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles = (0..threads)
        .map(|index| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            let shared_nonce = shared_nonce.clone();
            thread::spawn(move || {
                // Distinct identities so rate limiting cannot mask the race.
                let identity =
                    Identity::new(&format!("user-{index}")).expect("identity should be valid");
                barrier.wait();
                guard.admit(&identity, &shared_nonce, NOW, NOW)
            })
        })
        .collect::<Vec<_>>();

    let accepted = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread should join"))
        .filter(|verdict| verdict.is_accepted())
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(guard.used_nonce_count(), 1);
}

#[tokio::test]
async fn background_sweeper_evicts_nonces_expired_against_the_wall_clock() {
    let guard = Arc::new(guard());
    let (n1, n2) = (nonce(1), nonce(2));
    let bob = Identity::new("bob").expect("identity should be valid");
    assert!(guard.admit(&alice(), &n1, NOW, NOW).is_accepted());
    assert!(guard.admit(&bob, &n2, NOW, NOW).is_accepted());
    assert_eq!(guard.used_nonce_count(), 2);

    // Both entries expired long before the real current time.
    let sweeper = guard.spawn_sweeper(std::time::Duration::from_millis(10));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    sweeper.abort();

    assert_eq!(guard.used_nonce_count(), 0);
}
