// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use criterion::BatchSize;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use meshlwf::ddi::sync::Rundown;
use meshlwf_bench::BenchPath;
use meshlwf_bench::Datagram;
use meshlwf_bench::MeasurementInfo;
use meshlwf_test_utils::*;
use std::hint::black_box;

pub fn guard<M: MeasurementInfo + 'static>(c: &mut Criterion<M>) {
    let rundown = Rundown::new();
    let mut c = c.benchmark_group(M::label());

    c.bench_function("guard enter/exit", |b| {
        b.iter(|| black_box(rundown.enter()))
    });

    rundown.wait_for_release();
    c.bench_function("guard refused", |b| {
        b.iter(|| black_box(rundown.enter()))
    });
}

pub fn deliver<M: MeasurementInfo + 'static>(c: &mut Criterion<M>) {
    // Reclaim each datagram as soon as it is indicated.
    let cfg = DatapathCfg {
        synchronous_receive: true,
        verify: VerifyCfg::off(),
        ..Default::default()
    };
    let path = BenchPath::new(cfg);
    let mut c = c.benchmark_group(M::label());

    for class in Datagram::ALL {
        for body_len in [0, 64, 1024] {
            let pkt = class.build(body_len);
            c.bench_function(
                &format!("deliver {} {}B", class.name(), pkt.len()),
                |b| {
                    b.iter_batched(
                        || path.msg(pkt.clone()),
                        |msg| path.dp.receive_ip6_message(black_box(msg)),
                        BatchSize::SmallInput,
                    )
                },
            );
        }
    }
}

pub fn queue<M: MeasurementInfo + 'static>(c: &mut Criterion<M>) {
    let cfg = DatapathCfg { verify: VerifyCfg::off(), ..Default::default() };
    let path = BenchPath::new(cfg);
    let frame = [0u8; 128];
    let mut c = c.benchmark_group(M::label());

    for count in [1, 8, 32] {
        c.bench_function(&format!("receive_nbls x{count}"), |b| {
            b.iter_batched(
                || rx_chain(&path.pool, count, 128, Some(TEST_CHANNEL)),
                |chain| {
                    path.dp.receive_nbls(
                        chain,
                        PortNumber::DEFAULT,
                        count,
                        ReceiveFlags::DISPATCH_LEVEL,
                    );
                    path.events.pop_ingress()
                },
                BatchSize::SmallInput,
            )
        });
    }

    c.bench_function("send_nbls x1", |b| {
        b.iter_batched(
            || tx_chain(&path.pool, &[(&frame[..], None)]),
            |chain| {
                path.dp.send_nbls(
                    chain,
                    PortNumber::DEFAULT,
                    SendFlags::empty(),
                );
                path.events.pop_egress()
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(wallclock, guard, deliver, queue);
criterion_main!(wallclock);
