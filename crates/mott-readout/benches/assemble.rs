//! Criterion benchmarks for per-trigger event assembly.
//!
//! Assembly runs once per trigger inside the readout interrupt, so its cost
//! bounds the trigger rate the crate can sustain.
//!
//! Key metrics:
//! - Assembly time per event for various digitizer block sizes
//! - Cost of the sync-event residual sweep
//!
//! Run with: cargo bench --bench assemble

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mott_core::config::{DigitizerConfig, DigitizerSet, DigitizerType, RunConfiguration};
use mott_hardware::mock::{CallLog, MockDigitizerCrate, MockHelicityDecoder, MockTriggerInterface};
use mott_hardware::{DigitizerCrate, ModuleSet, TriggerInterface};
use mott_readout::{EventAssembler, RunType, SyncReconciler, TriggerContext};

type Mocks = ModuleSet<MockTriggerInterface, MockHelicityDecoder, MockDigitizerCrate>;

fn setup(samples: usize, hd_enabled: bool) -> (RunConfiguration, Mocks) {
    let mut counting = DigitizerConfig::zeroed(DigitizerType::Counting);
    counting.slot = 4;
    let mut integrating = DigitizerConfig::zeroed(DigitizerType::Integrating);
    integrating.slot = 6;
    let mut run = RunConfiguration {
        fadc250: DigitizerSet::new(counting, integrating),
        ..Default::default()
    };
    run.ti.blocklevel = 1;
    run.helicity_decoder.enabled = hd_enabled;

    let log = CallLog::new();
    let mut m = ModuleSet::new(
        MockTriggerInterface::new(log.clone()),
        MockHelicityDecoder::new(log.clone()),
        MockDigitizerCrate::new(log),
    );
    m.ti.init(3 << 19).unwrap();
    m.fadc.init(4, 4 << 19, 0).unwrap();
    m.fadc.enable(4).unwrap();
    m.fadc.set_samples(samples);
    (run, m)
}

/// Assembly time for digitizer blocks of increasing size.
fn assemble_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_event");
    let assembler = EventAssembler::new();

    for samples in [16usize, 256, 4096] {
        let (run, mut m) = setup(samples, true);
        let ctx = TriggerContext::new(1, RunType::Counting);

        group.throughput(Throughput::Bytes(((samples + 2) * 4) as u64));
        group.bench_with_input(BenchmarkId::new("samples", samples), &samples, |b, _| {
            b.iter(|| black_box(assembler.assemble(&run, black_box(&ctx), &mut m)));
        });
    }

    group.finish();
}

/// Residual sweep with every module already empty.
fn sync_sweep(c: &mut Criterion) {
    let (run, mut m) = setup(16, true);
    let reconciler = SyncReconciler::new();

    c.bench_function("sync_sweep_clean", |b| {
        b.iter(|| black_box(reconciler.reconcile(&run, RunType::Counting, 1, &mut m)));
    });
}

criterion_group!(benches, assemble_event, sync_sweep);
criterion_main!(benches);
