use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tabula::{Command, Model, SheetId};

/// `A1` holds a constant, every later row adds one to the row above
fn build_chain(length: u32) -> (Model, SheetId) {
    let mut model = Model::default();
    let sheet = model.get_sheet_ids()[0];
    model.dispatch(Command::update_content(sheet, 0, 0, "1"));
    for row in 1..length {
        model.dispatch(Command::update_content(sheet, 0, row, format!("=A{}+1", row)));
    }
    (model, sheet)
}

/// One column of constants and a column of running totals over it
fn build_running_totals(length: u32) -> (Model, SheetId) {
    let mut model = Model::default();
    let sheet = model.get_sheet_ids()[0];
    for row in 0..length {
        model.dispatch(Command::update_content(sheet, 0, row, (row + 1).to_string()));
        model.dispatch(Command::update_content(sheet, 1, row, format!("=SUM($A$1:A{})", row + 1)));
    }
    (model, sheet)
}

fn bench_chain_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_edit");
    for length in [100u32, 1_000] {
        let (mut model, sheet) = build_chain(length);
        let mut n = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, _| {
            b.iter(|| {
                n += 1;
                black_box(model.dispatch(Command::update_content(sheet, 0, 0, n.to_string())));
            })
        });
    }
    group.finish();
}

fn bench_running_totals_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("running_totals_edit");
    group.sample_size(20);
    let (mut model, sheet) = build_running_totals(500);
    let mut n = 0u64;
    group.bench_function("edit_first_row", |b| {
        b.iter(|| {
            n += 1;
            black_box(model.dispatch(Command::update_content(sheet, 0, 0, n.to_string())));
        })
    });
    group.finish();
}

fn bench_unrelated_edit(c: &mut Criterion) {
    let (mut model, sheet) = build_chain(1_000);
    let mut n = 0u64;
    c.bench_function("unrelated_edit", |b| {
        b.iter(|| {
            n += 1;
            black_box(model.dispatch(Command::update_content(sheet, 5, 0, n.to_string())));
        })
    });
}

criterion_group!(benches, bench_chain_edit, bench_running_totals_edit, bench_unrelated_edit);
criterion_main!(benches);
