//! Unit and integration tests for channels and select.

use std::cell::RefCell;
use std::rc::Rc;

use csp_core::{CspError, Time};
use csp_kernel::{AnyOf, Env};

use crate::{Channel, CommState, execute, select, selected};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn log<T>() -> Rc<RefCell<Vec<T>>> {
    Rc::new(RefCell::new(Vec::new()))
}

// ── Wait-set arena ────────────────────────────────────────────────────────────

#[cfg(test)]
mod waitset_arena {
    use super::*;
    use crate::waitset::WaitSet;

    #[test]
    fn swap_remove_patches_cached_indices() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let comms: Vec<_> = (0..4u32).map(|v| chan.send(v).core.clone()).collect();

        let mut set = WaitSet::new();
        for c in &comms {
            set.insert(c.clone());
        }
        assert_eq!(set.len(), 4);

        // Removing slot 1 swaps the last member into it.
        assert!(set.remove(&comms[1]));
        assert_eq!(comms[3].wait_index.get(), Some(1));

        // Double removal is a no-op.
        assert!(!set.remove(&comms[1]));

        assert!(set.remove(&comms[3]));
        assert!(set.remove(&comms[0]));
        assert!(set.remove(&comms[2]));
        assert!(set.is_empty());
    }

    #[test]
    fn indices_stay_valid_under_interleaved_ops() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let comms: Vec<_> = (0..6u32).map(|v| chan.send(v).core.clone()).collect();

        let mut set = WaitSet::new();
        for c in comms.iter().take(4) {
            set.insert(c.clone());
        }
        set.remove(&comms[0]);
        set.insert(comms[4].clone());
        set.remove(&comms[2]);
        set.insert(comms[5].clone());

        // Every remaining member's cached index must point at itself.
        for c in [&comms[1], &comms[3], &comms[4], &comms[5]] {
            let i = c.wait_index.get().unwrap();
            assert!(Rc::ptr_eq(set.get(i), c));
        }
    }
}

// ── Rendezvous ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod rendezvous {
    use super::*;

    #[test]
    fn handoff_moves_the_entity() {
        let env = Env::new(0);
        let chan: Channel<String> = Channel::new(&env);
        let got = log();

        env.spawn({
            let chan = chan.clone();
            async move {
                chan.send("crate".to_string()).communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let chan = chan.clone();
            let got = got.clone();
            async move {
                got.borrow_mut().push(chan.receive().communicate().await?);
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*got.borrow(), vec!["crate".to_string()]);
        assert_eq!(chan.waiting_senders(), 0);
        assert_eq!(chan.waiting_receivers(), 0);
    }

    #[test]
    fn receiver_can_arrive_first() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let got = log();

        env.spawn({
            let chan = chan.clone();
            let got = got.clone();
            async move {
                got.borrow_mut().push(chan.receive().communicate().await?);
                Ok(())
            }
        });
        env.spawn({
            let env = env.clone();
            let chan = chan.clone();
            async move {
                env.timeout(3.0)?.wait().await;
                chan.send(11).communicate().await?;
                Ok(())
            }
        });

        let end = env.run().unwrap();
        assert_eq!(*got.borrow(), vec![11]);
        assert_eq!(end, Time(3.0));
    }

    #[test]
    fn five_sends_with_unit_delays_between() {
        let env = Env::new(3);
        let chan: Channel<u32> = Channel::new(&env);
        let got = log();

        env.spawn({
            let env = env.clone();
            let chan = chan.clone();
            async move {
                for v in 1..=5u32 {
                    chan.send(v).communicate().await?;
                    if v < 5 {
                        env.timeout(1.0)?.wait().await;
                    }
                }
                Ok(())
            }
        });
        env.spawn({
            let chan = chan.clone();
            let got = got.clone();
            async move {
                for _ in 0..5 {
                    let v = chan.receive().communicate().await?;
                    got.borrow_mut().push(v);
                }
                Ok(())
            }
        });

        let end = env.run().unwrap();
        assert_eq!(*got.borrow(), vec![1, 2, 3, 4, 5]);
        // First hand-off at t=0, four unit delays between the five sends.
        assert_eq!(end, Time(4.0));
    }

    #[test]
    fn sender_resolves_before_receiver_value_at_same_time() {
        let env = Env::new(0);
        let chan: Channel<&'static str> = Channel::new(&env);
        let order = log();

        env.spawn({
            let env = env.clone();
            let chan = chan.clone();
            let order = order.clone();
            async move {
                chan.send("payload").communicate().await?;
                order.borrow_mut().push(("sender done", env.now()));
                Ok(())
            }
        });
        env.spawn({
            let env = env.clone();
            let chan = chan.clone();
            let order = order.clone();
            async move {
                env.timeout(2.0)?.wait().await;
                let v = chan.receive().communicate().await?;
                order.borrow_mut().push((v, env.now()));
                Ok(())
            }
        });

        env.run().unwrap();
        // Both resolve at t=2, sender strictly first.
        assert_eq!(
            *order.borrow(),
            vec![("sender done", Time(2.0)), ("payload", Time(2.0))]
        );
    }

    #[test]
    fn unmatched_sender_stays_waiting() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let handle = env.spawn({
            let chan = chan.clone();
            async move {
                chan.send(1).communicate().await?;
                Ok(())
            }
        });

        env.run().unwrap();
        assert!(!handle.is_finished());
        assert_eq!(chan.waiting_senders(), 1);
        assert_eq!(env.live_processes(), 1);
    }

    #[test]
    fn direct_execute_on_erased_handle() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let got = log();

        env.spawn({
            let chan = chan.clone();
            async move {
                chan.send(21).communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let chan = chan.clone();
            let got = got.clone();
            async move {
                let r = chan.receive();
                execute(&r.comm()).await?;
                got.borrow_mut().push(r.entity());
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*got.borrow(), vec![Some(21)]);
    }
}

// ── Fairness and determinism ──────────────────────────────────────────────────

#[cfg(test)]
mod fairness {
    use super::*;

    /// One trial of: two waiting receivers, one send.  Returns the winner's
    /// tag.
    fn two_receivers_one_send(seed: u64) -> u8 {
        let env = Env::new(seed);
        let chan: Channel<u8> = Channel::new(&env);
        let winner = log();

        for tag in [1u8, 2u8] {
            env.spawn({
                let chan = chan.clone();
                let winner = winner.clone();
                async move {
                    chan.receive().communicate().await?;
                    winner.borrow_mut().push(tag);
                    Ok(())
                }
            });
        }
        env.spawn({
            let chan = chan.clone();
            async move {
                chan.send(0u8).communicate().await?;
                Ok(())
            }
        });

        env.run().unwrap();
        let winner = winner.borrow();
        assert_eq!(winner.len(), 1, "exactly one receiver gets the entity");
        winner[0]
    }

    #[test]
    fn pairing_choice_is_statistically_fair() {
        const TRIALS: u64 = 10_000;
        let first_wins = (0..TRIALS)
            .filter(|&seed| two_receivers_one_send(seed) == 1)
            .count();
        let share = first_wins as f64 / TRIALS as f64;
        assert!(
            (0.45..=0.55).contains(&share),
            "receiver 1 won {share} of trials"
        );
    }

    #[test]
    fn identical_seeds_replay_identically() {
        for seed in [0, 7, 1234, 99_999] {
            assert_eq!(
                two_receivers_one_send(seed),
                two_receivers_one_send(seed)
            );
        }
    }

    #[test]
    fn arming_order_does_not_bias_ready_select_branches() {
        const TRIALS: u64 = 400;
        let mut wins0 = 0usize;
        for seed in 0..TRIALS {
            let env = Env::new(seed);
            let c1: Channel<u32> = Channel::new(&env);
            let c2: Channel<u32> = Channel::new(&env);
            // Both channels have a sender ready before the select arms.
            for chan in [c1.clone(), c2.clone()] {
                env.spawn(async move {
                    chan.send(1).communicate().await?;
                    Ok(())
                });
            }
            let outcome = log();
            env.spawn({
                let c1 = c1.clone();
                let c2 = c2.clone();
                let outcome = outcome.clone();
                async move {
                    let r1 = c1.receive();
                    let r2 = c2.receive();
                    let winner = select(vec![Some(r1.comm()), Some(r2.comm())]).await?;
                    outcome.borrow_mut().push(winner);
                    Ok(())
                }
            });
            env.run().unwrap();
            if outcome.borrow()[0] == Some(0) {
                wins0 += 1;
            }
            // The losing channel's sender keeps waiting — it was never a
            // sibling, only the losing receiver was cancelled.
            assert_eq!(c1.waiting_senders() + c2.waiting_senders(), 1);
        }
        // Loose bounds: positional bias would pin this to 0 or TRIALS.
        assert!(
            (100..=300).contains(&wins0),
            "branch 0 won {wins0} of {TRIALS}"
        );
    }
}

// ── Select ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod select_choice {
    use super::*;

    #[test]
    fn takes_the_ready_branch() {
        let env = Env::new(5);
        let c1: Channel<u32> = Channel::new(&env);
        let c2: Channel<u32> = Channel::new(&env);
        let outcome = log();

        env.spawn({
            let c2 = c2.clone();
            async move {
                c2.send(7).communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let c1 = c1.clone();
            let c2 = c2.clone();
            let outcome = outcome.clone();
            async move {
                let r1 = c1.receive();
                let r2 = c2.receive();
                let winner = select(vec![Some(r1.comm()), Some(r2.comm())]).await?;
                outcome.borrow_mut().push((
                    winner,
                    selected(Some(&r1.comm())),
                    selected(Some(&r2.comm())),
                    r2.entity(),
                ));
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![(Some(1), false, true, Some(7))]);
        assert_eq!(c1.waiting_receivers(), 0, "loser left the wait set");
        assert_eq!(c2.waiting_receivers(), 0);
    }

    #[test]
    fn losing_branch_ends_aborted_never_triggered() {
        let env = Env::new(2);
        let c1: Channel<u32> = Channel::new(&env);
        let c2: Channel<u32> = Channel::new(&env);
        let states = log();

        env.spawn({
            let c2 = c2.clone();
            async move {
                c2.send(1).communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let c1 = c1.clone();
            let c2 = c2.clone();
            let states = states.clone();
            async move {
                let r1 = c1.receive();
                let r2 = c2.receive();
                select(vec![Some(r1.comm()), Some(r2.comm())]).await?;
                states
                    .borrow_mut()
                    .push((r1.comm().state(), r2.comm().state(), r1.is_aborted()));
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(
            *states.borrow(),
            vec![(CommState::Aborted, CommState::Matched, true)]
        );
    }

    #[test]
    fn false_guards_are_dropped() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let outcome = log();

        env.spawn({
            let chan = chan.clone();
            async move {
                chan.send(9).communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let chan = chan.clone();
            let outcome = outcome.clone();
            async move {
                let r = chan.receive();
                // Guard on the first branch evaluated false.
                let winner = select(vec![None, Some(r.comm())]).await?;
                outcome.borrow_mut().push((winner, r.entity()));
                Ok(())
            }
        });

        env.run().unwrap();
        // The winner index refers to the original argument positions.
        assert_eq!(*outcome.borrow(), vec![(Some(1), Some(9))]);
    }

    #[test]
    fn all_false_guards_resolve_immediately() {
        let env = Env::new(0);
        let outcome = log();
        env.spawn({
            let env = env.clone();
            let outcome = outcome.clone();
            async move {
                let winner = select(vec![None, None]).await?;
                outcome.borrow_mut().push((winner, env.now()));
                Ok(())
            }
        });
        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![(None, Time::ZERO)]);
    }

    #[test]
    fn selected_placeholder_is_false() {
        assert!(!selected(None));
    }

    #[test]
    fn mixing_environments_is_rejected() {
        let env_a = Env::new(0);
        let env_b = Env::new(1);
        let ca: Channel<u32> = Channel::new(&env_a);
        let cb: Channel<u32> = Channel::new(&env_b);

        env_a.spawn({
            let ca = ca.clone();
            let cb = cb.clone();
            async move {
                let ra = ca.receive();
                let rb = cb.receive();
                select(vec![Some(ra.comm()), Some(rb.comm())]).await?;
                Ok(())
            }
        });
        assert_eq!(env_a.run(), Err(CspError::MixedEnvironments));
    }

    #[test]
    fn pre_armed_branch_is_rejected() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        env.spawn({
            let chan = chan.clone();
            async move {
                let r = chan.receive();
                r.start()?;
                select(vec![Some(r.comm())]).await?;
                Ok(())
            }
        });
        assert_eq!(env.run(), Err(CspError::AlreadyArmed));
    }

    #[test]
    fn sending_to_oneself_is_rejected() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        env.spawn({
            let chan = chan.clone();
            async move {
                let s = chan.send(1);
                let r = chan.receive();
                select(vec![Some(s.comm()), Some(r.comm())]).await?;
                Ok(())
            }
        });
        assert_eq!(env.run(), Err(CspError::SelfCommunication));
    }

    #[test]
    fn winning_sender_branch_reports_its_index() {
        let env = Env::new(4);
        let c1: Channel<u32> = Channel::new(&env);
        let c2: Channel<u32> = Channel::new(&env);
        let outcome = log();

        // A receiver is ready on c1; nobody listens on c2.
        env.spawn({
            let c1 = c1.clone();
            async move {
                c1.receive().communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let c1 = c1.clone();
            let c2 = c2.clone();
            let outcome = outcome.clone();
            async move {
                let s1 = c1.send(5);
                let s2 = c2.send(6);
                let winner = select(vec![Some(s1.comm()), Some(s2.comm())]).await?;
                outcome.borrow_mut().push((winner, s1.selected(), s2.is_aborted()));
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![(Some(0), true, true)]);
    }
}

// ── Arming and cancellation contracts ─────────────────────────────────────────

#[cfg(test)]
mod contracts {
    use super::*;

    #[test]
    fn double_arming_is_rejected() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        env.spawn({
            let chan = chan.clone();
            async move {
                let s = chan.send(1);
                let _completion = s.start()?;
                s.start()?;
                Ok(())
            }
        });
        assert_eq!(env.run(), Err(CspError::AlreadyArmed));
    }

    #[test]
    fn arming_a_completed_event_is_rejected() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        env.spawn({
            let chan = chan.clone();
            async move {
                chan.send(1).communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let chan = chan.clone();
            async move {
                let r = chan.receive();
                r.communicate().await?;
                // The rendezvous is done; re-arming the same event is illegal.
                match execute(&r.comm()).await {
                    Err(CspError::AlreadyArmed) => Ok(()),
                    other => panic!("expected AlreadyArmed, got {other:?}"),
                }
            }
        });
        env.run().unwrap();
    }

    #[test]
    fn cancel_before_match_aborts_and_unregisters() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let outcome = log();

        env.spawn({
            let env = env.clone();
            let chan = chan.clone();
            let outcome = outcome.clone();
            async move {
                // Race a receive against a deadline; no sender ever shows up.
                let r = chan.receive();
                let completion = r.start()?;
                let deadline = env.timeout(1.0)?;
                let winner = AnyOf::new(vec![completion, deadline]).await;
                r.comm().cancel();
                outcome
                    .borrow_mut()
                    .push((winner, r.is_aborted(), chan.waiting_receivers()));
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![(Some(1), true, 0)]);
    }

    #[test]
    fn cancel_while_awaiting_receive_surfaces_cancelled() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let outcome = log();
        let r = chan.receive();

        env.spawn({
            let r = r.clone();
            let outcome = outcome.clone();
            async move {
                match r.communicate().await {
                    Err(CspError::Cancelled) => outcome.borrow_mut().push(true),
                    other => panic!("expected Cancelled, got {other:?}"),
                }
                Ok(())
            }
        });
        env.spawn({
            let env = env.clone();
            let r = r.clone();
            async move {
                env.timeout(1.0)?.wait().await;
                r.comm().cancel();
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![true]);
        assert!(r.is_aborted());
        assert_eq!(chan.waiting_receivers(), 0);
    }

    #[test]
    fn cancel_while_awaiting_send_surfaces_cancelled() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let outcome = log();
        let s = chan.send(17);

        env.spawn({
            let s = s.clone();
            let outcome = outcome.clone();
            async move {
                match s.communicate().await {
                    // The entity was handed to nobody; success would be a lie.
                    Err(CspError::Cancelled) => outcome.borrow_mut().push(true),
                    other => panic!("expected Cancelled, got {other:?}"),
                }
                Ok(())
            }
        });
        env.spawn({
            let env = env.clone();
            let s = s.clone();
            async move {
                env.timeout(1.0)?.wait().await;
                s.comm().cancel();
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![true]);
        assert!(s.is_aborted());
        assert_eq!(chan.waiting_senders(), 0);
    }

    #[test]
    fn cancel_while_awaiting_execute_surfaces_cancelled() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let outcome = log();
        let r = chan.receive();

        env.spawn({
            let r = r.clone();
            let outcome = outcome.clone();
            async move {
                match execute(&r.comm()).await {
                    Err(CspError::Cancelled) => outcome.borrow_mut().push(true),
                    other => panic!("expected Cancelled, got {other:?}"),
                }
                Ok(())
            }
        });
        env.spawn({
            let env = env.clone();
            let r = r.clone();
            async move {
                env.timeout(1.0)?.wait().await;
                r.comm().cancel();
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![true]);
    }

    #[test]
    fn cancel_after_match_is_a_noop() {
        let env = Env::new(0);
        let chan: Channel<u32> = Channel::new(&env);
        let outcome = log();

        env.spawn({
            let chan = chan.clone();
            async move {
                chan.send(3).communicate().await?;
                Ok(())
            }
        });
        env.spawn({
            let chan = chan.clone();
            let outcome = outcome.clone();
            async move {
                let r = chan.receive();
                let v = r.communicate().await?;
                r.comm().cancel();
                outcome.borrow_mut().push((v, r.comm().state(), r.selected()));
                Ok(())
            }
        });

        env.run().unwrap();
        assert_eq!(*outcome.borrow(), vec![(3, CommState::Matched, true)]);
    }
}
