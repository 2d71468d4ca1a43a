//! EDF scheduler demo firmware.
//!
//! Runs the six-task board demo: two button monitors and a periodic
//! transmitter feed a mailbox drained by a UART receiver, while two load
//! tasks burn CPU. Task bodies and their execution times are simulated, so
//! the same binary runs on ARM Cortex-M under QEMU (output via semihosting)
//! and on the host (output via env_logger).

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod semihosting_log;

#[cfg(target_os = "none")]
use panic_halt as _;

use edf_rtos::config::{MAILBOX_DEPTH, TICK_RATE_HZ};
use edf_rtos::{
    AdmissionError, DeadlineMiss, HealthMonitor, JobRunner, Mailbox, Port, Scheduler,
    SchedulerConfig, SchedulerError, Simulation, TaskDescriptor, TaskId, Tick,
};
use heapless::spsc::Queue;
use log::{debug, info, warn};

/// Five hyperperiods of the task set (LCM of the periods is 100 ticks).
const RUN_TICKS: u64 = 500;
const REPORT_EVERY: u64 = 100;

fn button_monitor() {}
fn periodic_transmitter() {}
fn uart_receiver() {}
fn load_simulation() {}

struct DemoTasks {
    button_1: TaskId,
    button_2: TaskId,
    transmitter: TaskId,
    receiver: TaskId,
    load_1: TaskId,
    load_2: TaskId,
}

/// Same periods as the board demo; total utilization is 0.72.
fn admit_all(sched: &mut Scheduler) -> Result<DemoTasks, AdmissionError> {
    Ok(DemoTasks {
        button_1: sched.admit_named("button_1_monitor", 50, None, 1, button_monitor)?,
        button_2: sched.admit_named("button_2_monitor", 50, None, 1, button_monitor)?,
        transmitter: sched.admit_named("periodic_transmitter", 100, None, 1, periodic_transmitter)?,
        receiver: sched.admit_named("uart_receiver", 20, None, 1, uart_receiver)?,
        load_1: sched.admit_named("load_1_simulation", 10, None, 1, load_simulation)?,
        load_2: sched.admit_named("load_2_simulation", 100, None, 1, load_simulation)?,
    })
}

/// Producer/consumer traffic between the demo tasks.
struct DemoApp {
    tasks: DemoTasks,
    mailbox: Queue<&'static str, MAILBOX_DEPTH>,
    uart_bytes: usize,
    dropped: u32,
}

impl DemoApp {
    fn send(&mut self, msg: &'static str) {
        if self.mailbox.try_send(msg).is_err() {
            self.dropped += 1;
        }
    }

    /// Button levels flip every 400 ticks.
    fn sample_button(&mut self, rising: &'static str, falling: &'static str, now: Tick) {
        if (now / 400) % 2 == 0 {
            self.send(falling);
        } else {
            self.send(rising);
        }
    }
}

impl JobRunner for DemoApp {
    fn run_job(&mut self, task: &TaskDescriptor, now: Tick) {
        let id = task.id();
        if id == self.tasks.button_1 {
            self.sample_button("Button_1 rising\n", "Button_1 falling\n", now);
        } else if id == self.tasks.button_2 {
            self.sample_button("Button_2 rising\n", "Button_2 falling\n", now);
        } else if id == self.tasks.transmitter {
            self.send("TX\n");
        } else if id == self.tasks.receiver {
            if let Some(msg) = self.mailbox.try_recv() {
                self.uart_bytes += msg.len();
                debug!("uart <- {}", msg.trim_end());
            }
        }
        (task.entry())()
    }
}

/// Stands in for the board: context switches and the tick hook pin.
#[derive(Default)]
struct BoardPort {
    tick_pin_pulses: u64,
    switches: u32,
    misses: u32,
}

impl Port for BoardPort {
    fn switch_to(&mut self, next: Option<&TaskDescriptor>) {
        self.switches += 1;
        match next {
            Some(task) => debug!("switch to {}", task.name()),
            None => debug!("switch to idle"),
        }
    }

    fn on_tick(&mut self, _now: Tick) {
        // Raise then lower the tick pin.
        self.tick_pin_pulses += 1;
    }

    fn on_deadline_miss(&mut self, _miss: &DeadlineMiss) {
        self.misses += 1;
    }
}

fn run_demo() -> Result<(), SchedulerError> {
    let mut sched = Scheduler::new(SchedulerConfig::new().with_load_window(100));
    let tasks = match admit_all(&mut sched) {
        Ok(tasks) => tasks,
        Err(err) => panic!("admission failed: {}", err),
    };

    let mut sim = Simulation::with_costs(&[
        (tasks.button_1, 1),
        (tasks.button_2, 1),
        (tasks.transmitter, 1),
        (tasks.receiver, 1),
        (tasks.load_1, 5),
        (tasks.load_2, 12),
    ]);
    let mut app = DemoApp {
        tasks,
        mailbox: Queue::new(),
        uart_bytes: 0,
        dropped: 0,
    };
    let mut port = BoardPort::default();
    let mut health = HealthMonitor::new();

    info!("running {} tasks for {} ticks", sched.task_count(), RUN_TICKS);
    for _ in 0..RUN_TICKS {
        sim.step(&mut sched, &mut port, &mut app)?;

        if sim.now() % REPORT_EVERY == 0 {
            let status = health.check(sched.tasks());
            info!(
                "tick={} load={}% misses={} switches={} health={:?}",
                sim.now(),
                sched.current_load(),
                sched.total_deadline_misses(),
                port.switches,
                status
            );
        }
    }

    let stats = sched.stats();
    info!("=== final stats ===");
    info!(
        "ticks:            {} ({} ms)",
        sim.now(),
        sim.now() * 1000 / u64::from(TICK_RATE_HZ)
    );
    info!("completed jobs:   {}", stats.completed_jobs);
    info!("deadline misses:  {}", stats.deadline_misses);
    info!("context switches: {}", stats.context_switches);
    info!("cpu load:         {}%", sched.accounting().cpu_load_since_boot());
    info!("tick pin pulses:  {}", port.tick_pin_pulses);
    info!("uart bytes:       {}", app.uart_bytes);
    for (task, record) in sched.tasks().iter().zip(sched.accounting().records()) {
        info!(
            "  {:<22} jobs={} misses={} cpu={} runs={}",
            task.name(),
            task.completed_jobs(),
            task.deadline_misses(),
            record.total_time,
            record.runs
        );
    }
    if app.dropped > 0 || port.misses > 0 {
        warn!(
            "{} messages dropped, {} deadline misses, indicator period {}",
            app.dropped,
            port.misses,
            health.indicator_period()
        );
    }
    Ok(())
}

#[cfg(target_os = "none")]
#[cortex_m_rt::entry]
fn main() -> ! {
    use cortex_m_semihosting::debug;

    semihosting_log::init();

    // Stand-in for the tick interrupt: kernel calls and ticks never overlap.
    let result = cortex_m::interrupt::free(|_| run_demo());
    if let Err(err) = result {
        panic!("{}", err);
    }

    debug::exit(debug::EXIT_SUCCESS);
    loop {
        cortex_m::asm::wfi();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run_demo() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
