//! End-to-end scheduling scenarios driven through the simulation harness.

use edf_rtos::config::MAX_TASKS;
use edf_rtos::{
    AdmissionError, EntryPoints, Mailbox, NoopPort, Port, Scheduler, SchedulerConfig,
    Simulation, TaskDescriptor, TaskId, TaskState, Tick,
};
use heapless::spsc::Queue;

fn body() {}

fn admit_all(sched: &mut Scheduler, periods: &[u32]) -> Vec<TaskId> {
    periods
        .iter()
        .map(|&period| sched.admit(period, None, 1, body).unwrap())
        .collect()
}

#[test]
fn light_load_never_misses() {
    let mut sched = Scheduler::default();
    let ids = admit_all(&mut sched, &[50, 100, 100]);
    let costs: Vec<_> = ids.iter().map(|&id| (id, 5)).collect();
    let mut sim = Simulation::with_costs(&costs);

    sim.run(&mut sched, 1000, &mut NoopPort, &mut EntryPoints).unwrap();

    assert_eq!(sched.total_deadline_misses(), 0);
    for &id in &ids {
        assert_eq!(sched.deadline_miss_count(id), 0);
    }
    assert_eq!(sched.task(ids[0]).unwrap().completed_jobs(), 20);
    assert_eq!(sched.task(ids[1]).unwrap().completed_jobs(), 10);
    assert_eq!(sched.cpu_load(100), 20);
    assert_eq!(sched.accounting().cpu_load_since_boot(), 20);
}

#[test]
fn overload_misses_within_first_hundred_ticks() {
    let mut sched = Scheduler::default();
    let ids = admit_all(&mut sched, &[10, 100]);
    let mut sim = Simulation::with_costs(&[(ids[0], 8), (ids[1], 50)]);

    // Ticks 0 through 100 inclusive.
    sim.run(&mut sched, 101, &mut NoopPort, &mut EntryPoints).unwrap();

    assert!(sched.total_deadline_misses() >= 1);
    assert!(sched.deadline_miss_count(ids[1]) >= 1);
    let miss = sched.task(ids[1]).unwrap().last_miss().unwrap();
    assert_eq!(miss.absolute_deadline, 100);
    assert!(miss.detected_at <= 100);
}

#[test]
fn overload_keeps_scheduling() {
    let mut sched = Scheduler::default();
    let ids = admit_all(&mut sched, &[10, 100]);
    let mut sim = Simulation::with_costs(&[(ids[0], 8), (ids[1], 50)]);

    sim.run(&mut sched, 1000, &mut NoopPort, &mut EntryPoints).unwrap();

    assert!(sched.halted().is_none());
    assert_eq!(sched.task(ids[0]).unwrap().completed_jobs(), 100);
    assert_eq!(sched.deadline_miss_count(ids[0]), 0);
    assert_eq!(sched.deadline_miss_count(ids[1]), 9);
    assert_eq!(sched.cpu_load(100), 100);
}

#[test]
fn zero_period_leaves_table_unchanged() {
    let mut sched = Scheduler::default();
    admit_all(&mut sched, &[10, 20]);
    let before = sched.task_count();

    assert_eq!(sched.admit(0, None, 1, body), Err(AdmissionError::ZeroPeriod));
    assert_eq!(sched.task_count(), before);
}

#[test]
fn full_table_rejects_without_partial_admission() {
    let mut sched = Scheduler::default();
    admit_all(&mut sched, &[10; MAX_TASKS]);
    assert!(matches!(
        sched.admit(10, None, 1, body),
        Err(AdmissionError::TableFull { .. })
    ));
    assert_eq!(sched.task_count(), MAX_TASKS);
}

#[derive(Default)]
struct SwitchLog {
    switches: Vec<Option<TaskId>>,
}

impl Port for SwitchLog {
    fn switch_to(&mut self, next: Option<&TaskDescriptor>) {
        self.switches.push(next.map(|task| task.id()));
    }
}

/// Run intervals as seen from outside the scheduler.
#[derive(Default)]
struct Observer {
    expected: [u64; 3],
    runs: [u32; 3],
    current: Option<(TaskId, Tick)>,
}

impl Observer {
    fn observe(&mut self, running: Option<TaskId>, at: Tick) {
        if self.current.map(|(id, _)| id) == running {
            return;
        }
        if let Some((id, since)) = self.current.take() {
            self.expected[id.index()] += at - since;
            self.runs[id.index()] += 1;
        }
        self.current = running.map(|id| (id, at));
    }
}

/// Drives the scheduler by hand, tracks every run interval from the
/// outside and compares the sums with the accounting records.
#[test]
fn accounting_matches_observed_run_intervals() {
    let mut sched = Scheduler::default();
    let ids = admit_all(&mut sched, &[7, 11, 13]);
    let costs = [2u32, 3, 4];
    let mut remaining = [0u32; 3];
    let mut releases: [Option<Tick>; 3] = [None; 3];
    let mut observer = Observer::default();
    let mut port = SwitchLog::default();

    for now in 0..500u64 {
        if now == 0 {
            sched.start(now, &mut port).unwrap();
        } else {
            sched.on_tick(now, &mut port).unwrap();
        }
        observer.observe(sched.running(), now);
        for &id in &ids {
            let task = sched.task(id).unwrap();
            if task.has_pending_job() && releases[id.index()] != Some(task.release_time()) {
                releases[id.index()] = Some(task.release_time());
                remaining[id.index()] = costs[id.index()];
            }
        }

        if let Some(id) = sched.running() {
            remaining[id.index()] -= 1;
            if remaining[id.index()] == 0 {
                sched.complete_job(id, now + 1, &mut port).unwrap();
                observer.observe(sched.running(), now + 1);
            }
        }
    }

    assert_eq!(sched.total_deadline_misses(), 0);
    for &id in &ids {
        let record = sched.accounting().record(id).unwrap();
        assert_eq!(record.total_time, observer.expected[id.index()], "{}", id);
        assert_eq!(record.runs, observer.runs[id.index()], "{}", id);
    }
    assert!(!port.switches.is_empty());
}

#[test]
fn duplicate_tick_changes_nothing() {
    let mut sched = Scheduler::default();
    let ids = admit_all(&mut sched, &[10, 15, 30]);
    let mut sim = Simulation::with_costs(&[(ids[0], 3), (ids[1], 4), (ids[2], 6)]);
    sim.run(&mut sched, 45, &mut NoopPort, &mut EntryPoints).unwrap();

    let now = sched.now().unwrap();
    let snapshot = |sched: &Scheduler| {
        sched
            .tasks()
            .iter()
            .map(|task| (task.state(), task.release_time(), task.absolute_deadline()))
            .collect::<Vec<_>>()
    };
    let tasks = snapshot(&sched);
    let stats = sched.stats();
    let running = sched.running();
    let ready = sched.ready().len();

    let mut port = SwitchLog::default();
    assert_eq!(sched.on_tick(now, &mut port), Ok(running));
    assert_eq!(sched.on_tick(now, &mut port), Ok(running));

    assert!(port.switches.is_empty());
    assert_eq!(snapshot(&sched), tasks);
    assert_eq!(sched.stats(), stats);
    assert_eq!(sched.ready().len(), ready);
}

#[test]
fn deadlines_never_decrease_across_releases() {
    let mut sched = Scheduler::default();
    let ids = admit_all(&mut sched, &[10, 100]);
    let mut sim = Simulation::with_costs(&[(ids[0], 8), (ids[1], 50)]);
    let mut last = [0u64; 2];

    for _ in 0..400 {
        sim.step(&mut sched, &mut NoopPort, &mut EntryPoints).unwrap();
        for &id in &ids {
            let deadline = sched.task(id).unwrap().absolute_deadline();
            assert!(deadline >= last[id.index()]);
            last[id.index()] = deadline;
        }
        let running = sched
            .tasks()
            .iter()
            .filter(|task| task.state() == TaskState::Running)
            .count();
        assert!(running <= 1);
    }
}

/// A consumer blocks on an empty mailbox and the producer wakes it.
#[test]
fn consumer_blocks_until_producer_sends() {
    let mut sched = Scheduler::new(SchedulerConfig::new());
    let producer = sched.admit(20, None, 1, body).unwrap();
    let consumer = sched.admit(10, None, 1, body).unwrap();
    let mut mailbox: Queue<u32, 4> = Queue::new();
    let mut port = NoopPort;

    // Consumer has the earlier deadline and finds nothing to read.
    assert_eq!(sched.start(0, &mut port), Ok(Some(consumer)));
    assert_eq!(mailbox.try_recv(), None);
    assert_eq!(sched.block(consumer, 1, Some(50), &mut port), Ok(Some(producer)));
    assert!(!sched.ready().contains(consumer));
    for now in 1..=2 {
        assert_eq!(sched.on_tick(now, &mut port), Ok(Some(producer)));
    }

    mailbox.try_send(42).unwrap();
    assert_eq!(sched.unblock(consumer, 3, &mut port), Ok(Some(consumer)));
    assert_eq!(sched.task(consumer).unwrap().absolute_deadline(), 10);
    assert_eq!(mailbox.try_recv(), Some(42));

    sched.on_tick(3, &mut port).unwrap();
    sched.complete_job(consumer, 4, &mut port).unwrap();
    assert_eq!(sched.running(), Some(producer));
    assert_eq!(sched.task(producer).unwrap().state(), TaskState::Running);
    assert_eq!(sched.accounting().record(consumer).unwrap().total_time, 2);
}

/// The idle task gets the CPU whenever the only job completes.
#[test]
fn completed_job_hands_cpu_to_idle() {
    let mut sched = Scheduler::default();
    let a = sched.admit(10, None, 1, body).unwrap();
    let mut sim = Simulation::with_costs(&[(a, 3)]);
    let mut port = SwitchLog::default();

    sim.run(&mut sched, 20, &mut port, &mut EntryPoints).unwrap();

    assert_eq!(port.switches, [Some(a), None, Some(a), None]);
    assert_eq!(sched.running(), None);
    assert_eq!(sim.idle_ticks(), 14);
    // The second idle period is still open.
    assert_eq!(sched.accounting().idle_time(), 7);
    assert_eq!(sched.stats().context_switches, 4);
}

/// A late timer interrupt still releases every task that fell due.
#[test]
fn skipped_ticks_release_late() {
    let mut sched = Scheduler::default();
    let fast = sched.admit(10, None, 1, body).unwrap();
    let slow = sched.admit(40, None, 1, body).unwrap();
    let mut port = SwitchLog::default();

    sched.start(0, &mut port).unwrap();
    assert_eq!(sched.complete_job(fast, 1, &mut port), Ok(Some(slow)));
    sched.on_tick(1, &mut port).unwrap();
    assert_eq!(sched.complete_job(slow, 2, &mut port), Ok(None));

    // Ticks 3 through 24 never arrive.
    assert_eq!(sched.on_tick(25, &mut port), Ok(Some(fast)));
    let task = sched.task(fast).unwrap();
    assert_eq!(task.release_time(), 25);
    assert_eq!(task.absolute_deadline(), 35);
    assert_eq!(task.next_release(), Some(35));
    assert_eq!(sched.task(slow).unwrap().state(), TaskState::Suspended);
    assert_eq!(sched.total_deadline_misses(), 0);

    // Two busy ticks out of the 25 since start.
    assert_eq!(sched.cpu_load(25), 8);
    assert_eq!(sched.accounting().idle_time(), 23);

    // The next release follows the late one, not the missed schedule.
    for now in 26..35 {
        assert_eq!(sched.on_tick(now, &mut port), Ok(Some(fast)));
    }
    assert_eq!(sched.deadline_miss_count(fast), 0);
    sched.on_tick(35, &mut port).unwrap();
    assert_eq!(sched.deadline_miss_count(fast), 1);
}
