use std::{cell::RefCell, rc::Rc};

use ateam_pack_monitor::{
    diagnostics::Diagnostic,
    drivers::switch_matrix::{SwitchLine, SwitchMatrix, NUM_SWITCH_LINES, THERMISTOR_LINES, VOLTAGE_BANK_ROUTES, VOLTAGE_LINES},
    filter::Filter,
    sampler::{Converter, LogicalChannel, PackSampler},
    settings::PackSettings,
};

#[derive(Clone, Copy, PartialEq, Debug)]
enum Kind {
    Voltage,
    Thermistor,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum Event {
    Set(SwitchLine, bool),
    Start(Kind),
    Read(Kind),
}

/// Simulated front end: switch states, the code each channel produces and
/// whether conversions complete in time.
struct Bench {
    lines: [bool; NUM_SWITCH_LINES],
    log: Vec<Event>,
    voltage_codes: [i16; 4],
    thermistor_codes: [i16; 4],
    ready: bool,
}

type SharedBench = Rc<RefCell<Bench>>;

fn bench(voltage_codes: [i16; 4], thermistor_codes: [i16; 4]) -> SharedBench {
    Rc::new(RefCell::new(Bench {
        lines: [false; NUM_SWITCH_LINES],
        log: Vec::new(),
        voltage_codes,
        thermistor_codes,
        ready: true,
    }))
}

struct FakeSwitches {
    bench: SharedBench,
}

impl SwitchMatrix for FakeSwitches {
    fn set_line(&mut self, line: SwitchLine, active: bool) {
        let mut bench = self.bench.borrow_mut();
        bench.lines[line as usize] = active;
        bench.log.push(Event::Set(line, active));
    }
}

struct FakeConverter {
    bench: SharedBench,
    kind: Kind,
    pending: Option<i16>,
}

impl FakeConverter {
    fn new(bench: &SharedBench, kind: Kind) -> Self {
        FakeConverter { bench: bench.clone(), kind, pending: None }
    }
}

impl Converter for FakeConverter {
    fn start_conversion(&mut self) {
        let mut bench = self.bench.borrow_mut();
        bench.log.push(Event::Start(self.kind));

        // latch whatever is routed right now
        self.pending = match self.kind {
            Kind::Voltage => VOLTAGE_BANK_ROUTES
                .iter()
                .position(|route| route.iter().all(|l| bench.lines[*l as usize]))
                .map(|bank| bench.voltage_codes[bank]),
            Kind::Thermistor => THERMISTOR_LINES
                .iter()
                .position(|l| bench.lines[*l as usize])
                .map(|bank| bench.thermistor_codes[bank]),
        };
    }

    fn read_conversion(&mut self) -> Option<i16> {
        let mut bench = self.bench.borrow_mut();
        bench.log.push(Event::Read(self.kind));
        if !bench.ready {
            return None;
        }
        self.pending.take()
    }
}

type TestSampler = PackSampler<FakeConverter, FakeConverter, FakeSwitches>;

fn sampler(bench: &SharedBench) -> TestSampler {
    PackSampler::new(
        FakeConverter::new(bench, Kind::Voltage),
        FakeConverter::new(bench, Kind::Thermistor),
        FakeSwitches { bench: bench.clone() },
    )
}

fn run(sampler: &mut TestSampler, settings: &PackSettings, ticks: usize) -> Vec<Diagnostic> {
    let mut diagnostics: heapless::Vec<Diagnostic, 64> = heapless::Vec::new();
    for _ in 0..ticks {
        sampler.tick(settings, &mut diagnostics);
    }
    diagnostics.into_iter().collect()
}

#[test]
fn first_tick_only_starts_conversions() {
    let bench = bench([100; 4], [10; 4]);
    let mut sampler = sampler(&bench);
    let settings = PackSettings::factory_default();

    run(&mut sampler, &settings, 1);

    assert!(!bench.borrow().log.iter().any(|e| matches!(e, Event::Read(_))));
    assert_eq!(
        (Some(LogicalChannel::Voltage(0)), Some(LogicalChannel::Thermistor(0))),
        sampler.in_flight()
    );
}

#[test]
fn results_land_in_the_channel_that_was_routed() {
    let bench = bench([100, 200, 300, 400], [10, 20, 30, 40]);
    let mut sampler = sampler(&bench);
    let settings = PackSettings::factory_default();

    // one priming tick plus 32 full sweeps
    run(&mut sampler, &settings, 1 + 4 * 32);

    let means = sampler.means();
    assert_eq!([100, 200, 300, 400], means.voltage);
    assert_eq!([10, 20, 30, 40], means.thermistor);

    for bank in 0..4 {
        assert!(sampler.window(LogicalChannel::Voltage(bank)).unwrap().is_warm());
        assert!(sampler.window(LogicalChannel::Thermistor(bank)).unwrap().filtered_value().is_some());
    }
}

#[test]
fn partial_window_mean_is_zero_padded() {
    let bench = bench([320; 4], [64; 4]);
    let mut sampler = sampler(&bench);
    let settings = PackSettings::factory_default();

    // ticks 2..=9 read banks 0,1,2,3,0,1,2,3
    run(&mut sampler, &settings, 9);

    let means = sampler.means();
    assert_eq!([2 * 320 / 32; 4], means.voltage);
    assert_eq!([2 * 64 / 32; 4], means.thermistor);
    assert!(!sampler.window(LogicalChannel::Voltage(0)).unwrap().is_warm());
}

#[test]
fn not_ready_conversions_leave_windows_alone() {
    let bench = bench([1000; 4], [500; 4]);
    let mut sampler = sampler(&bench);
    let settings = PackSettings::factory_default();

    bench.borrow_mut().ready = false;
    run(&mut sampler, &settings, 12);

    assert_eq!([0; 4], sampler.means().voltage);
    assert_eq!(0, sampler.window(LogicalChannel::Voltage(0)).unwrap().write_index());

    // the conversion in flight on bank 0 (tick 13) completes on tick 14
    run(&mut sampler, &settings, 1);
    bench.borrow_mut().ready = true;
    run(&mut sampler, &settings, 1);

    assert_eq!([1000 / 32, 0, 0, 0], sampler.means().voltage);
    assert_eq!([500 / 32, 0, 0, 0], sampler.means().thermistor);
}

#[test]
fn switches_release_before_asserting() {
    let bench = bench([1; 4], [1; 4]);
    let mut sampler = sampler(&bench);
    let settings = PackSettings::factory_default();

    run(&mut sampler, &settings, 20);

    let mut lines = [false; NUM_SWITCH_LINES];
    for event in bench.borrow().log.iter() {
        match *event {
            Event::Set(line, active) => {
                if active {
                    let group: &[SwitchLine] = if VOLTAGE_LINES.contains(&line) { &VOLTAGE_LINES } else { &THERMISTOR_LINES };
                    let route = VOLTAGE_BANK_ROUTES.iter().find(|r| r.contains(&line));

                    // anything still on must be the other half of the same route
                    for other in group.iter().filter(|l| lines[**l as usize]) {
                        assert!(route.is_some_and(|r| r.contains(other)), "{:?} on while asserting {:?}", other, line);
                    }
                }
                lines[line as usize] = active;
            }
            Event::Start(Kind::Voltage) => {
                let on = VOLTAGE_LINES.iter().filter(|l| lines[**l as usize]).count();
                assert_eq!(2, on);
            }
            Event::Start(Kind::Thermistor) => {
                let on = THERMISTOR_LINES.iter().filter(|l| lines[**l as usize]).count();
                assert_eq!(1, on);
            }
            Event::Read(_) => {}
        }
    }
}

#[test]
fn imbalance_reported_once_windows_are_warm() {
    // 1/1024 V per code keeps the millivolt math exact
    let mut settings = PackSettings::factory_default();
    settings.voltage_multipliers = [1.0 / 1024.0; 4];
    settings.balance_threshold_mv = 100;

    let bench = bench([1024, 1024, 1024, 1536], [0; 4]);
    let mut sampler = sampler(&bench);

    // bank 4 gets its 32nd sample on tick 129, first check after that is tick 132
    let warm_up = run(&mut sampler, &settings, 131);
    assert!(warm_up.is_empty());

    let diagnostics = run(&mut sampler, &settings, 9);
    assert_eq!(3, diagnostics.len());
    for diagnostic in diagnostics {
        assert_eq!(Diagnostic::PackImbalance { spread_mv: 500, threshold_mv: 100 }, diagnostic);
    }
}

#[test]
fn balanced_pack_is_quiet() {
    let mut settings = PackSettings::factory_default();
    settings.voltage_multipliers = [1.0 / 1024.0; 4];
    settings.balance_threshold_mv = 500;

    let bench = bench([1024, 1024, 1024, 1536], [0; 4]);
    let mut sampler = sampler(&bench);

    // spread equal to the threshold is not an imbalance
    assert!(run(&mut sampler, &settings, 200).is_empty());
    assert_eq!(None, sampler.check_balance(&settings));
}
