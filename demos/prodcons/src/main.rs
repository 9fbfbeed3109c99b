//! prodcons — smallest example for the csp rendezvous kernel.
//!
//! Three producers hand numbered items to one consumer over a shared
//! rendezvous channel and sign off on a second channel; the consumer
//! selects between the two until every producer is done.  A watchdog
//! races a receive on a silent channel against a deadline.  Raise
//! PRODUCER_COUNT and ITEMS_PER_PRODUCER to stress the pairing choice
//! under contention.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use csp_chan::{Channel, select, selected};
use csp_core::{EventId, ProcessId, Time};
use csp_kernel::{AnyOf, Env, TraceHook};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:               u64   = 42;
const PRODUCER_COUNT:     usize = 3;
const ITEMS_PER_PRODUCER: usize = 5;
/// Virtual time between one producer's consecutive sends.
const PERIODS: [f64; PRODUCER_COUNT] = [1.0, 1.5, 2.5];
const WATCHDOG_DEADLINE: f64 = 4.0;

// ── Kernel statistics hook ────────────────────────────────────────────────────

#[derive(Default)]
struct KernelStats {
    spawned:  usize,
    finished: usize,
    triggers: usize,
    advances: usize,
}

struct StatsHook(Rc<RefCell<KernelStats>>);

impl TraceHook for StatsHook {
    fn on_spawn(&mut self, _pid: ProcessId) {
        self.0.borrow_mut().spawned += 1;
    }

    fn on_process_finished(&mut self, _pid: ProcessId) {
        self.0.borrow_mut().finished += 1;
    }

    fn on_clock_advance(&mut self, _now: Time) {
        self.0.borrow_mut().advances += 1;
    }

    fn on_event_triggered(&mut self, _event: EventId, _now: Time) {
        self.0.borrow_mut().triggers += 1;
    }
}

// ── Consumer report ───────────────────────────────────────────────────────────

struct ConsumerReport {
    per_producer: [usize; PRODUCER_COUNT],
    deliveries:   Vec<(Time, usize, usize)>,
    signoffs:     Vec<(Time, usize)>,
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    println!("=== prodcons — rendezvous channels over a virtual clock ===");
    println!("Producers: {PRODUCER_COUNT}  |  Items each: {ITEMS_PER_PRODUCER}  |  Seed: {SEED}");
    println!();

    let env = Env::new(SEED);
    let stats = Rc::new(RefCell::new(KernelStats::default()));
    env.set_trace(Box::new(StatsHook(stats.clone())));

    let data: Channel<(usize, usize)> = Channel::new(&env);
    let done: Channel<usize> = Channel::new(&env);

    // 1. Producers: hand each item over, then sign off.
    for producer in 0..PRODUCER_COUNT {
        env.spawn({
            let env = env.clone();
            let data = data.clone();
            let done = done.clone();
            async move {
                for item in 0..ITEMS_PER_PRODUCER {
                    env.timeout(PERIODS[producer])?.wait().await;
                    data.send((producer, item)).communicate().await?;
                }
                done.send(producer).communicate().await?;
                Ok(())
            }
        });
    }

    // 2. Consumer: select between the data and done channels until every
    //    producer has signed off.  Rendezvous guarantees a producer's
    //    sign-off cannot overtake its own items.
    let consumer = env.spawn({
        let env = env.clone();
        let data = data.clone();
        let done = done.clone();
        async move {
            let mut report = ConsumerReport {
                per_producer: [0; PRODUCER_COUNT],
                deliveries:   Vec::new(),
                signoffs:     Vec::new(),
            };
            while report.signoffs.len() < PRODUCER_COUNT {
                let item = data.receive();
                let signoff = done.receive();
                select(vec![Some(item.comm()), Some(signoff.comm())]).await?;
                if selected(Some(&item.comm())) {
                    if let Some((producer, seq)) = item.entity() {
                        report.per_producer[producer] += 1;
                        report.deliveries.push((env.now(), producer, seq));
                    }
                } else if let Some(producer) = signoff.entity() {
                    report.signoffs.push((env.now(), producer));
                }
            }
            Ok(report)
        }
    });

    // 3. Watchdog: race a receive nobody will answer against a deadline,
    //    then withdraw the attempt.
    let stalled: Channel<u32> = Channel::new(&env);
    let watchdog = env.spawn({
        let env = env.clone();
        let stalled = stalled.clone();
        async move {
            let attempt = stalled.receive();
            let completion = attempt.start()?;
            let deadline = env.timeout(WATCHDOG_DEADLINE)?;
            let first = AnyOf::new(vec![completion, deadline]).await;
            attempt.comm().cancel();
            Ok((first == Some(1), env.now()))
        }
    });

    // 4. Run to quiescence.
    let end = env.run()?;
    println!("Run complete at {end}");
    println!();

    // 5. Summary.
    let report = consumer
        .try_result()
        .map_err(|_| anyhow::anyhow!("consumer never finished"))??;
    let (timed_out, woke_at) = watchdog
        .try_result()
        .map_err(|_| anyhow::anyhow!("watchdog never finished"))??;

    println!("{:<10} {:<8} {:<8} {:<10}", "Producer", "Period", "Items", "Signed off");
    println!("{}", "-".repeat(38));
    for producer in 0..PRODUCER_COUNT {
        let signoff = report
            .signoffs
            .iter()
            .find(|(_, p)| *p == producer)
            .map(|(t, _)| t.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<10} {:<8} {:<8} {:<10}",
            producer, PERIODS[producer], report.per_producer[producer], signoff,
        );
    }
    println!();

    println!("First deliveries:");
    for (t, producer, seq) in report.deliveries.iter().take(5) {
        println!("  {t}: item {seq} from producer {producer}");
    }
    println!(
        "Watchdog: {} at {woke_at}",
        if timed_out { "deadline won" } else { "receive won" },
    );
    println!();

    let stats = stats.borrow();
    println!(
        "Kernel: {} processes ({} finished), {} event triggers, {} clock advances",
        stats.spawned, stats.finished, stats.triggers, stats.advances,
    );

    Ok(())
}
