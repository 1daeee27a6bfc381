//! # rts-tone Firmware
//!
//! Wires the node to real collaborators and runs the dispatch loop.
//!
//! | Target | Cycle counter | DAC | CAN | Console / log |
//! |--------|---------------|-----|-----|---------------|
//! | `thumbv7em-none-eabihf` | DWT `CYCCNT` | data register @ `0x4000_741C` | frames shown over semihosting | semihosting |
//! | hosted | wall clock scaled to 168 MHz | discarded | frames logged | stdout / `env_logger` |
//!
//! On the board, serial input is not wired up yet; a short demo script is
//! typed into the node, one character every two seconds. On the host,
//! characters are read from stdin.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use cortex_m_rt::entry;
#[cfg(target_os = "none")]
use panic_halt as _;

#[cfg(target_os = "none")]
#[entry]
fn main() -> ! {
    firmware::run()
}

#[cfg(not(target_os = "none"))]
fn main() {
    host::run()
}

// ---------------------------------------------------------------------------
// Bare-metal firmware
// ---------------------------------------------------------------------------

#[cfg(target_os = "none")]
mod firmware {
    use core::fmt;

    use cortex_m_semihosting::{hprint, hprintln};
    use log::{LevelFilter, Log, Metadata, Record};

    use rts_tone::arch::cortex_m4::{DacRegister, DwtCycleCounter};
    use rts_tone::config::CPU_FREQ_HZ;
    use rts_tone::{Can, CanFrame, CycleClock, DeadlineScheduler, Duration, Node};

    /// Demo session: transpose, speed up, louder, more load, profile,
    /// soft deadlines, profile the tone tick, mute, transpose down.
    const SCRIPT: &[u8] = b"3e250puu+wtam_2e";
    const SCRIPT_INTERVAL: Duration = Duration::from_ticks(2_000_000);

    struct SemihostingLogger;

    impl Log for SemihostingLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                let _ = hprintln!("[{}] {}", record.level(), record.args());
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: SemihostingLogger = SemihostingLogger;

    /// No CAN controller is brought up yet; outgoing frames are shown on the
    /// host debugger instead.
    struct SemihostingCan;

    impl Can for SemihostingCan {
        fn send(&mut self, frame: &CanFrame) {
            let _ = hprintln!("[CAN {}/{}] {}", frame.msg_id, frame.node_id, frame.text());
        }
    }

    struct Console;

    impl fmt::Write for Console {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let _ = hprint!("{}", s);
            Ok(())
        }
    }

    pub fn run() -> ! {
        let mut cp = cortex_m::Peripherals::take().unwrap();

        // Semihosting is slow enough to make every tone tick late; keep the
        // log to warnings and above.
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Warn);
        }

        let counter = DwtCycleCounter::new(&mut cp.DCB, cp.DWT);
        let mut scheduler = DeadlineScheduler::new(CycleClock::new(counter, CPU_FREQ_HZ));

        // SAFETY: the DAC register is only ever written through this handle.
        let dac = unsafe { DacRegister::new() };
        let mut node = Node::new(dac, Console, SemihostingCan);
        node.start(&mut scheduler);

        let mut script = SCRIPT.iter();
        let mut next_input = scheduler.now() + SCRIPT_INTERVAL;
        loop {
            if scheduler.now() >= next_input {
                if let Some(&byte) = script.next() {
                    node.receive(&mut scheduler, byte);
                }
                next_input = next_input + SCRIPT_INTERVAL;
            }
            scheduler.dispatch(&mut node);
        }
    }
}

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "none"))]
mod host {
    use std::fmt;
    use std::io::{self, Read, Write as _};
    use std::sync::mpsc;
    use std::thread;
    use std::time;

    use log::info;

    use rts_tone::config::CPU_FREQ_HZ;
    use rts_tone::{Can, CanFrame, CycleClock, CycleCounter, DeadlineScheduler, Node, NullDac};

    /// Wall clock presented as a 32-bit cycle counter.
    struct WallCounter {
        origin: time::Instant,
        clock_hz: u32,
    }

    impl CycleCounter for WallCounter {
        fn cycles(&mut self) -> u32 {
            let ns = self.origin.elapsed().as_nanos();
            (ns * self.clock_hz as u128 / 1_000_000_000) as u32
        }
    }

    /// Outgoing frames go to the log.
    struct LoggedCan;

    impl Can for LoggedCan {
        fn send(&mut self, frame: &CanFrame) {
            info!("CAN tx {}/{}: {}", frame.msg_id, frame.node_id, frame.text());
        }
    }

    struct Stdout;

    impl fmt::Write for Stdout {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let mut out = io::stdout().lock();
            out.write_all(s.as_bytes()).map_err(|_| fmt::Error)?;
            out.flush().map_err(|_| fmt::Error)
        }
    }

    pub fn run() {
        // A desktop scheduler misses 100 us deadlines routinely; only show
        // warnings when asked to.
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

        let (tx, rx) = mpsc::channel::<u8>();
        thread::spawn(move || {
            for byte in io::stdin().lock().bytes() {
                match byte {
                    Ok(b'\n') | Ok(b'\r') => continue,
                    Ok(b) => {
                        if tx.send(b).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let counter = WallCounter {
            origin: time::Instant::now(),
            clock_hz: CPU_FREQ_HZ,
        };
        let mut scheduler = DeadlineScheduler::new(CycleClock::new(counter, CPU_FREQ_HZ));
        let mut node = Node::new(NullDac, Stdout, LoggedCan);
        node.start(&mut scheduler);

        loop {
            while let Ok(byte) = rx.try_recv() {
                node.receive(&mut scheduler, byte);
            }
            if scheduler.dispatch(&mut node).is_none() {
                thread::yield_now();
            }
        }
    }
}
