use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scram::config::AnalysisSettings;
use scram::error::SourceSpan;
use scram::model::event::{BasicEvent, Gate};
use scram::model::expression::Expression;
use scram::model::fault_tree::FaultTree;
use scram::model::formula::{Formula, FormulaArg, Operator};
use scram::model::Model;
use scram::AnalysisFacade;

/// Builds an OR-of-ANDs tree (`n` two-out-of-two pairs) so minimal cut-set
/// enumeration and cut-set counting both scale with `n`.
fn build_model(n: usize) -> (Model, std::rc::Rc<Gate>) {
    let mut model = Model::new();
    let mut tree = FaultTree::new("Bench");
    let mut pair_gates = Vec::with_capacity(n);

    for i in 0..n {
        let a = BasicEvent::new(format!("A{i}"));
        a.assign_expression(Expression::constant(0.01)).unwrap();
        let b = BasicEvent::new(format!("B{i}"));
        b.assign_expression(Expression::constant(0.02)).unwrap();

        let pair = Formula::new(
            Operator::And,
            vec![FormulaArg::Basic(a.clone()), FormulaArg::Basic(b.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let gate = Gate::new(format!("Pair{i}"), pair);
        pair_gates.push(FormulaArg::Gate(gate.clone()));

        tree.add_gate(gate);
        tree.add_basic_event(a);
        tree.add_basic_event(b);
    }

    let top_formula = Formula::new(Operator::Or, pair_gates, SourceSpan::unknown()).unwrap();
    let top = Gate::new("Top", top_formula);
    tree.add_top_gate(top.clone());
    model.add_fault_tree(tree);

    (model, top)
}

fn bench_probability_at(c: &mut Criterion) {
    let mut group = c.benchmark_group("probability_at");
    for &n in &[10usize, 50, 100, 200] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (model, top) = build_model(n);
            let facade = AnalysisFacade::new(&model, AnalysisSettings::default()).unwrap();
            b.iter(|| facade.probability_at(&top, 8760.0).unwrap());
        });
    }
    group.finish();
}

fn bench_minimal_cut_sets(c: &mut Criterion) {
    let mut group = c.benchmark_group("minimal_cut_sets");
    for &n in &[5usize, 10, 15] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (_model, top) = build_model(n);
            let ids: Vec<String> = (0..n)
                .flat_map(|i| vec![format!("a{i}"), format!("b{i}")])
                .collect();
            b.iter(|| scram::analysis::minimal_cut_sets(&top.formula(), &ids, 4));
        });
    }
    group.finish();
}

fn bench_uncertainty(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncertainty");
    group.sample_size(10);
    for &trials in &[100usize, 1_000] {
        group.throughput(Throughput::Elements(trials as u64));
        group.bench_with_input(BenchmarkId::from_parameter(trials), &trials, |b, &trials| {
            let (model, top) = build_model(10);
            let facade = AnalysisFacade::new(&model, AnalysisSettings::default()).unwrap();
            b.iter(|| facade.uncertainty(&top, 8760.0, trials).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_probability_at, bench_minimal_cut_sets, bench_uncertainty);
criterion_main!(benches);
